//! Tracing subscriber setup shared by the binaries

use crate::config::LoggingConfig;
use crate::error::{MailSecError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`. `logging.format` is
/// either `pretty` or `json`.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| MailSecError::Config(format!("invalid log level: {}", e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        other => {
            return Err(MailSecError::Config(format!(
                "unknown logging.format: {} (expected pretty or json)",
                other
            )))
        }
    };

    installed.map_err(|e| MailSecError::Config(format!("failed to set tracing subscriber: {}", e)))
}
