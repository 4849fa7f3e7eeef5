// === PUBLIC CONTRACT ===
// Other modules and binaries consume only the contract.
pub mod contract;

pub use contract::{client, error, model};

// === MODULE DEFINITION ===
pub mod module;
pub use module::Registrations;

// === INTERNAL MODULES ===
// Exposed for integration tests; not a stable API.
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod gateways;
#[doc(hidden)]
pub mod infra;
