//! Process-level plumbing shared by the binaries: layered configuration,
//! home directory resolution and logging setup.

pub mod config;
pub mod logging;
pub mod paths;

pub use config::{AppConfig, CliArgs, DatabaseConfig, LoggingConfig, Section};
pub use logging::init_logging_from_config;
