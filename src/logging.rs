//! Diagnostic logging setup for binaries embedding the store.

use crate::error::{Result, StoreError};
use tracing_subscriber::{fmt, EnvFilter};

/// Install a global `tracing` subscriber writing to stderr.
///
/// `level` is an `EnvFilter` directive such as `"warn"` or
/// `"task_store=debug"`.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| StoreError::invalid_operation(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| StoreError::invalid_operation("logging already initialized"))
}
