//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default namespace the registry bundle is installed into
pub const DEFAULT_CHART_NAMESPACE: &str = "kyma-system";

/// Default path of the rendered registry bundle
pub const DEFAULT_CHART_MANIFEST_PATH: &str = "/module-chart/manifest.yaml";

/// Requeue interval for objects in Warning state (seconds)
/// Warnings need operator action, so they are only re-checked on this slow resync
pub const DEFAULT_WARNING_RESYNC_SECS: u64 = 60;

/// Fibonacci backoff bounds for reconciliation errors (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Maximum number of objects reconciled in parallel
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;
