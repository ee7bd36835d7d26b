//! Logging configuration.
//!
//! # Basic Logging
//!
//! ```rust,no_run
//! use samsa::telemetry::{LogFormat, init_logging};
//!
//! // Pretty logging for development
//! init_logging(LogFormat::Pretty).expect("failed to init logging");
//!
//! // Or JSON logging for log aggregators
//! init_logging(LogFormat::Json).expect("failed to init logging");
//! ```
//!
//! # Environment Variables
//!
//! - `LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `RUST_LOG`: log-level filter (default: `info`)

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

use crate::error::{BrokerError, Result};

static LOG_INIT: OnceCell<()> = OnceCell::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty-print format (default).
    #[default]
    Pretty,
    /// JSON format for log aggregators (Elasticsearch, Loki, etc.).
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        })
    }
}

impl LogFormat {
    /// Read from the `LOG_FORMAT` environment variable.
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default()
    }
}

/// Initialize the global tracing subscriber with the given format.
///
/// Idempotent: repeated calls (common across tests) are no-ops after the
/// first successful initialization. Log levels come from `RUST_LOG`.
pub fn init_logging(format: LogFormat) -> Result<()> {
    LOG_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let result = match format {
            LogFormat::Pretty => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init(),
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init(),
        };
        result.map_err(|e| BrokerError::Config(format!("failed to init logging: {e}")))
    })?;
    Ok(())
}
