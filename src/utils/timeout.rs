//! Default durations used across the pipeline.

use std::time::Duration;

/// How long a deferred message may stay parked before it is forcibly
/// treated as cancelled.
pub const DEFAULT_DEFERRAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Suggested interval for hosts that call
/// [`crate::pipeline::InterceptionPipeline::expire_overdue`] manually
/// instead of relying on the tokio watchdog.
pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
