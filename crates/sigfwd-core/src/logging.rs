use tracing_subscriber::{fmt, EnvFilter};

use crate::{Error, Result};

/// Initialize logging/tracing for the forwarder.
///
/// Structured log output is the only reporting channel the service has, so
/// this is called once by the binary before configuration is loaded.
pub fn init(service_name: &str) -> Result<()> {
    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,sigfwd=info,sigfwd_core=info,sigfwd_telegram=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::External(format!("failed to install log subscriber: {e}")))
}
