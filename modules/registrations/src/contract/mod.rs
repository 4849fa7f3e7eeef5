pub mod client;
pub mod error;
pub mod model;

pub use client::RegistrationsApi;
pub use error::{ErrorKind, RegistrationsError};
pub use model::*;
