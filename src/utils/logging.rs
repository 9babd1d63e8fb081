//! Logging setup

use crate::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a console subscriber at `level` unless `RUST_LOG` overrides it
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(filter)
        .try_init()
        .ok();

    Ok(())
}
