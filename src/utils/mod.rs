//! Utility module
//!
//! - Configuration files
//! - Logging setup

mod config;
mod logging;

pub use config::{AppConfig, LoggingConfig, RuntimeConfig};
pub use logging::setup_logging;
