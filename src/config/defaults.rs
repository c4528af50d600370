//! Named constants shared across the pipeline.
//!
//! Values that are not operator-tunable live here; everything an operator
//! may want to change is a config field with its default next to the
//! struct in `settings.rs`.

/// Hard ceiling on notification object size (5 GiB). Events above this are
/// rejected at parse time regardless of the configured file-size limit.
pub const MAX_EVENT_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum accepted object-key length.
pub const MAX_KEY_LEN: usize = 1024;

/// Maximum accepted bucket-name length.
pub const MAX_BUCKET_LEN: usize = 63;

/// Accepted event-time window: up to one year in the past.
pub const EVENT_MAX_AGE_DAYS: i64 = 365;

/// Accepted event-time window: up to one day in the future.
pub const EVENT_MAX_SKEW_DAYS: i64 = 1;

/// Retry backoff delay cap (milliseconds).
pub const BACKOFF_CAP_MS: u64 = 30_000;

/// Jitter band applied to every computed backoff delay.
pub const JITTER_LOW: f64 = 0.75;
pub const JITTER_HIGH: f64 = 1.25;

/// Hysteresis margin for clearing the memory pressure flag: pressure set
/// at `threshold`, cleared below `threshold - margin`.
pub const PRESSURE_HYSTERESIS: f64 = 0.05;

/// Interval between activity-report log lines (seconds).
pub const ACTIVITY_REPORT_INTERVAL_SECS: u64 = 60;

/// Backoff applied to the poll loop after a queue error (milliseconds).
pub const POLL_ERROR_BACKOFF_MS: u64 = 2_000;

/// Stream name used when extraction finds no directory component.
pub const UNKNOWN_STREAM: &str = "unknown";

/// Meters per degree of latitude (WGS-84 mean).
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;
