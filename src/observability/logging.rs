//! # Logging
//!
//! Installs the global tracing subscriber. `RUST_LOG` wins over the default
//! filter when set.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "registry_operator=info";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` falls back to text
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    if let Err(e) = result {
        // Already initialized, e.g. by a test harness
        eprintln!("tracing subscriber not installed: {e}");
    }
}
