//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_MAX_MINUTES, DEFAULT_BACKOFF_MIN_MINUTES, DEFAULT_CHART_MANIFEST_PATH,
    DEFAULT_CHART_NAMESPACE, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT,
    DEFAULT_WARNING_RESYNC_SECS,
};
use crate::observability::logging::LogFormat;
use std::path::PathBuf;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Rendered registry bundle the chart collaborator tears down
    pub chart_manifest_path: PathBuf,
    /// Namespace for namespaced bundle objects that do not name one
    pub chart_namespace: String,
    /// Requeue interval for Warning outcomes (seconds)
    pub warning_resync_secs: u64,
    /// Fibonacci backoff bounds for reconciliation errors (minutes)
    pub backoff_min_minutes: u64,
    pub backoff_max_minutes: u64,
    /// Maximum concurrent reconciliations
    pub max_concurrent_reconciliations: u16,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            chart_manifest_path: PathBuf::from(DEFAULT_CHART_MANIFEST_PATH),
            chart_namespace: DEFAULT_CHART_NAMESPACE.to_string(),
            warning_resync_secs: DEFAULT_WARNING_RESYNC_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            metrics_port: parsed_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            chart_manifest_path: lookup("CHART_MANIFEST_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.chart_manifest_path),
            chart_namespace: lookup("CHART_NAMESPACE").unwrap_or(defaults.chart_namespace),
            warning_resync_secs: parsed_or(
                &lookup,
                "WARNING_RESYNC_SECS",
                defaults.warning_resync_secs,
            ),
            backoff_min_minutes: parsed_or(
                &lookup,
                "BACKOFF_MIN_MINUTES",
                defaults.backoff_min_minutes,
            ),
            backoff_max_minutes: parsed_or(
                &lookup,
                "BACKOFF_MAX_MINUTES",
                defaults.backoff_max_minutes,
            ),
            max_concurrent_reconciliations: parsed_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
        }
    }

    pub fn warning_resync_duration(&self) -> Duration {
        Duration::from_secs(self.warning_resync_secs)
    }
}

/// Parses the value for `key`, falling back to `default` when it is missing
/// or malformed
fn parsed_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
