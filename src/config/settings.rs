//! Pipeline configuration structs.
//!
//! Every section implements `Default` with production-sensible values so a
//! missing file or section never changes behavior silently; explicit
//! values are range-checked by [`PipelineConfig::validate`] and rejected
//! at startup when out of bounds.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one pipeline deployment.
///
/// Load with [`PipelineConfig::load`], which searches:
/// 1. the explicit path argument (from `--config`)
/// 2. `$WIFI_LOCATE_CONFIG`
/// 3. `./wifi_locate.toml`
/// 4. built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stage-1 measurement filtering.
    #[serde(default)]
    pub filtering: FilteringConfig,

    /// Memory governor tuning.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Batch assembly and delivery-stream retry policy.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Work-queue polling and worker pool.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Object-store limits.
    #[serde(default)]
    pub object: ObjectConfig,

    /// Feed routing.
    #[serde(default)]
    pub feeds: FeedsConfig,

    /// Positioning engine thresholds.
    #[serde(default)]
    pub positioning: PositioningConfig,
}

impl PipelineConfig {
    /// Load configuration using the standard search order.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded config from --config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var("WIFI_LOCATE_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), "Loaded config from WIFI_LOCATE_CONFIG");
                return Ok(config);
            }
            warn!(path = %path, "WIFI_LOCATE_CONFIG points to non-existent file, falling back");
        }

        let local = PathBuf::from("wifi_locate.toml");
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded config from ./wifi_locate.toml");
            return Ok(config);
        }

        info!("No wifi_locate.toml found — using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys produce warnings with suggestions; out-of-range values
    /// are hard errors.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every field that has documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(
            ok: bool,
            field: &'static str,
            reason: impl FnOnce() -> String,
        ) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    field,
                    reason: reason(),
                })
            }
        }

        let f = &self.filtering;
        check(
            (1.0..=1000.0).contains(&f.max_location_accuracy_m),
            "filtering.max_location_accuracy_m",
            || format!("{} not in [1, 1000]", f.max_location_accuracy_m),
        )?;
        check(
            (-100..=-10).contains(&f.min_rssi_dbm),
            "filtering.min_rssi_dbm",
            || format!("{} not in [-100, -10]", f.min_rssi_dbm),
        )?;
        check(
            (-10..=0).contains(&f.max_rssi_dbm),
            "filtering.max_rssi_dbm",
            || format!("{} not in [-10, 0]", f.max_rssi_dbm),
        )?;
        let weights: [(&'static str, f64); 3] = [
            ("filtering.connected_quality_weight", f.connected_quality_weight),
            ("filtering.scan_quality_weight", f.scan_quality_weight),
            (
                "filtering.low_link_speed_quality_weight",
                f.low_link_speed_quality_weight,
            ),
        ];
        for (field, value) in weights {
            check((0.1..=10.0).contains(&value), field, || {
                format!("{value} not in [0.1, 10.0]")
            })?;
        }
        for oui in &f.mobile_hotspot.oui_blacklist {
            check(
                crate::transform::is_valid_oui(oui),
                "filtering.mobile_hotspot.oui_blacklist",
                || format!("'{oui}' is not an aa:bb:cc OUI prefix"),
            )?;
        }

        let m = &self.memory;
        check(
            (0.5..=0.95).contains(&m.pressure_threshold),
            "memory.pressure_threshold",
            || format!("{} not in [0.5, 0.95]", m.pressure_threshold),
        )?;
        check(
            (1_000..=60_000).contains(&m.check_interval_ms),
            "memory.check_interval_ms",
            || format!("{} not in [1000, 60000]", m.check_interval_ms),
        )?;
        check(
            (1..=100).contains(&m.min_throttled_batch_size),
            "memory.min_throttled_batch_size",
            || format!("{} not in [1, 100]", m.min_throttled_batch_size),
        )?;
        check(m.heap_budget_bytes > 0, "memory.heap_budget_bytes", || {
            "must be positive".to_string()
        })?;

        let d = &self.delivery;
        check(!d.stream_name.is_empty(), "delivery.stream_name", || {
            "must not be empty".to_string()
        })?;
        check(d.max_batch_records > 0, "delivery.max_batch_records", || {
            "must be positive".to_string()
        })?;
        check(d.max_batch_bytes > 0, "delivery.max_batch_bytes", || {
            "must be positive".to_string()
        })?;
        check(
            d.max_in_flight_batches > 0,
            "delivery.max_in_flight_batches",
            || "must be positive".to_string(),
        )?;
        check(
            self.memory.min_throttled_batch_size <= d.max_batch_records,
            "memory.min_throttled_batch_size",
            || {
                format!(
                    "{} exceeds delivery.max_batch_records ({})",
                    self.memory.min_throttled_batch_size, d.max_batch_records
                )
            },
        )?;

        let q = &self.queue;
        check(
            (100..=10_000).contains(&q.channel_capacity),
            "queue.channel_capacity",
            || format!("{} not in [100, 10000]", q.channel_capacity),
        )?;
        check(q.workers > 0, "queue.workers", || "must be positive".to_string())?;
        check(
            q.max_messages_per_poll > 0,
            "queue.max_messages_per_poll",
            || "must be positive".to_string(),
        )?;

        check(
            self.object.max_file_size_bytes > 0,
            "object.max_file_size_bytes",
            || "must be positive".to_string(),
        )?;

        let p = &self.positioning;
        check(
            p.rssi_strong_dbm > p.rssi_medium_dbm && p.rssi_medium_dbm > p.rssi_weak_dbm,
            "positioning.rssi_strong_dbm",
            || {
                format!(
                    "thresholds must descend: strong {} > medium {} > weak {}",
                    p.rssi_strong_dbm, p.rssi_medium_dbm, p.rssi_weak_dbm
                )
            },
        )?;
        check(
            p.gdop_excellent < p.gdop_good && p.gdop_good < p.gdop_fair,
            "positioning.gdop_excellent",
            || {
                format!(
                    "thresholds must ascend: excellent {} < good {} < fair {}",
                    p.gdop_excellent, p.gdop_good, p.gdop_fair
                )
            },
        )?;
        check(p.path_loss_coeff > 0.0, "positioning.path_loss_coeff", || {
            "must be positive".to_string()
        })?;

        Ok(())
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Stage-1 measurement filtering thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteringConfig {
    /// Drop the whole measurement when the device fix is worse than this
    /// (meters). Range 1..1000.
    #[serde(default = "FilteringConfig::default_max_location_accuracy")]
    pub max_location_accuracy_m: f64,

    /// Drop AP observations weaker than this (dBm). Range [-100, -10].
    #[serde(default = "FilteringConfig::default_min_rssi")]
    pub min_rssi_dbm: i32,

    /// Drop AP observations stronger than this (dBm). Range [-10, 0];
    /// implausibly strong readings are sensor artifacts.
    #[serde(default = "FilteringConfig::default_max_rssi")]
    pub max_rssi_dbm: i32,

    /// Quality weight for observations of the associated AP.
    #[serde(default = "FilteringConfig::default_connected_weight")]
    pub connected_quality_weight: f64,

    /// Quality weight for background scan observations.
    #[serde(default = "FilteringConfig::default_scan_weight")]
    pub scan_quality_weight: f64,

    /// Quality weight for the associated AP when link speed is below the
    /// threshold (a slow link suggests a marginal or moving AP).
    #[serde(default = "FilteringConfig::default_low_link_speed_weight")]
    pub low_link_speed_quality_weight: f64,

    /// Link-speed threshold (Mbps) below which the connected weight is
    /// downgraded.
    #[serde(default = "FilteringConfig::default_low_link_speed_threshold")]
    pub low_link_speed_threshold_mbps: u32,

    /// Mobile hotspot OUI policy.
    #[serde(default)]
    pub mobile_hotspot: MobileHotspotConfig,
}

impl FilteringConfig {
    fn default_max_location_accuracy() -> f64 {
        150.0
    }
    fn default_min_rssi() -> i32 {
        -95
    }
    fn default_max_rssi() -> i32 {
        -10
    }
    fn default_connected_weight() -> f64 {
        2.0
    }
    fn default_scan_weight() -> f64 {
        1.0
    }
    fn default_low_link_speed_weight() -> f64 {
        0.5
    }
    fn default_low_link_speed_threshold() -> u32 {
        10
    }
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            max_location_accuracy_m: Self::default_max_location_accuracy(),
            min_rssi_dbm: Self::default_min_rssi(),
            max_rssi_dbm: Self::default_max_rssi(),
            connected_quality_weight: Self::default_connected_weight(),
            scan_quality_weight: Self::default_scan_weight(),
            low_link_speed_quality_weight: Self::default_low_link_speed_weight(),
            low_link_speed_threshold_mbps: Self::default_low_link_speed_threshold(),
            mobile_hotspot: MobileHotspotConfig::default(),
        }
    }
}

/// What to do with a measurement whose OUI is blacklisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotAction {
    /// Set the hotspot flag and keep the record.
    Flag,
    /// Drop the record.
    Exclude,
    /// Count it and keep the record unchanged.
    LogOnly,
}

/// Mobile hotspot detection by OUI prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileHotspotConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Blacklisted OUI prefixes, lowercase `aa:bb:cc` form.
    #[serde(default)]
    pub oui_blacklist: Vec<String>,

    #[serde(default = "MobileHotspotConfig::default_action")]
    pub action: HotspotAction,
}

impl MobileHotspotConfig {
    fn default_action() -> HotspotAction {
        HotspotAction::Flag
    }
}

impl Default for MobileHotspotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            oui_blacklist: Vec::new(),
            action: Self::default_action(),
        }
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Memory governor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Master switch; when off, the governor never reports pressure.
    #[serde(default = "MemoryConfig::default_enabled")]
    pub enabled: bool,

    /// Heap-usage ratio above which the pressure flag is set.
    /// Range [0.5, 0.95]; cleared with hysteresis.
    #[serde(default = "MemoryConfig::default_pressure_threshold")]
    pub pressure_threshold: f64,

    /// Denominator for the usage ratio: the heap budget this process is
    /// expected to stay within.
    #[serde(default = "MemoryConfig::default_heap_budget")]
    pub heap_budget_bytes: u64,

    /// Sampling interval. Range [1000, 60000] ms.
    #[serde(default = "MemoryConfig::default_check_interval")]
    pub check_interval_ms: u64,

    /// Whether pressure shrinks the effective batch-record bound.
    #[serde(default = "MemoryConfig::default_enabled")]
    pub enable_batch_throttling: bool,

    /// Floor for the throttled batch size. Range [1, 100].
    #[serde(default = "MemoryConfig::default_min_throttled")]
    pub min_throttled_batch_size: usize,

    /// Record serialization / flush latency samples.
    #[serde(default)]
    pub enable_performance_profiling: bool,
}

impl MemoryConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_pressure_threshold() -> f64 {
        0.80
    }
    fn default_heap_budget() -> u64 {
        512 * 1024 * 1024
    }
    fn default_check_interval() -> u64 {
        5_000
    }
    fn default_min_throttled() -> usize {
        10
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            pressure_threshold: Self::default_pressure_threshold(),
            heap_budget_bytes: Self::default_heap_budget(),
            check_interval_ms: Self::default_check_interval(),
            enable_batch_throttling: Self::default_enabled(),
            min_throttled_batch_size: Self::default_min_throttled(),
            enable_performance_profiling: false,
        }
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// Batch assembly bounds and delivery retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Downstream delivery stream name.
    #[serde(default = "DeliveryConfig::default_stream_name")]
    pub stream_name: String,

    /// Retry attempts for a retriable whole-batch failure before the batch
    /// counts as lost.
    #[serde(default = "DeliveryConfig::default_max_retries")]
    pub max_retries: u32,

    /// Base backoff (milliseconds); doubles per attempt, capped, jittered.
    #[serde(default = "DeliveryConfig::default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Record-count bound per batch.
    #[serde(default = "DeliveryConfig::default_max_batch_records")]
    pub max_batch_records: usize,

    /// Byte bound per batch.
    #[serde(default = "DeliveryConfig::default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Age bound: a non-empty batch older than this is flushed.
    #[serde(default = "DeliveryConfig::default_max_batch_age")]
    pub max_batch_age_ms: u64,

    /// Concurrent `write_batch` submissions allowed.
    #[serde(default = "DeliveryConfig::default_max_in_flight")]
    pub max_in_flight_batches: usize,

    /// Fixed delay before a failed subset is resubmitted.
    #[serde(default = "DeliveryConfig::default_partial_retry_delay")]
    pub partial_retry_delay_ms: u64,
}

impl DeliveryConfig {
    fn default_stream_name() -> String {
        "wifi-measurements".to_string()
    }
    fn default_max_retries() -> u32 {
        3
    }
    fn default_retry_backoff() -> u64 {
        200
    }
    fn default_max_batch_records() -> usize {
        500
    }
    fn default_max_batch_bytes() -> usize {
        4 * 1024 * 1024
    }
    fn default_max_batch_age() -> u64 {
        2_000
    }
    fn default_max_in_flight() -> usize {
        4
    }
    fn default_partial_retry_delay() -> u64 {
        500
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            stream_name: Self::default_stream_name(),
            max_retries: Self::default_max_retries(),
            retry_backoff_ms: Self::default_retry_backoff(),
            max_batch_records: Self::default_max_batch_records(),
            max_batch_bytes: Self::default_max_batch_bytes(),
            max_batch_age_ms: Self::default_max_batch_age(),
            max_in_flight_batches: Self::default_max_in_flight(),
            partial_retry_delay_ms: Self::default_partial_retry_delay(),
        }
    }
}

// ============================================================================
// Queue / Object / Feeds
// ============================================================================

/// Work-queue polling and worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Messages requested per long poll.
    #[serde(default = "QueueConfig::default_max_messages")]
    pub max_messages_per_poll: usize,

    /// Long-poll wait (seconds).
    #[serde(default = "QueueConfig::default_wait_time")]
    pub wait_time_secs: u64,

    /// Visibility timeout requested per receive (seconds).
    #[serde(default = "QueueConfig::default_visibility")]
    pub visibility_timeout_secs: u64,

    /// Bounded in-process channel capacity. Range [100, 10000]; a full
    /// channel backpressures the poll loop.
    #[serde(default = "QueueConfig::default_channel_capacity")]
    pub channel_capacity: usize,

    /// Concurrent message-processing workers.
    #[serde(default = "QueueConfig::default_workers")]
    pub workers: usize,

    /// Grace period for in-flight work at shutdown (milliseconds).
    #[serde(default = "QueueConfig::default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

impl QueueConfig {
    fn default_max_messages() -> usize {
        10
    }
    fn default_wait_time() -> u64 {
        20
    }
    fn default_visibility() -> u64 {
        120
    }
    fn default_channel_capacity() -> usize {
        1_024
    }
    fn default_workers() -> usize {
        4
    }
    fn default_shutdown_grace() -> u64 {
        10_000
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_messages_per_poll: Self::default_max_messages(),
            wait_time_secs: Self::default_wait_time(),
            visibility_timeout_secs: Self::default_visibility(),
            channel_capacity: Self::default_channel_capacity(),
            workers: Self::default_workers(),
            shutdown_grace_ms: Self::default_shutdown_grace(),
        }
    }
}

/// Object-store limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Objects larger than this are rejected before opening.
    #[serde(default = "ObjectConfig::default_max_file_size")]
    pub max_file_size_bytes: u64,
}

impl ObjectConfig {
    fn default_max_file_size() -> u64 {
        1024 * 1024 * 1024
    }
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: Self::default_max_file_size(),
        }
    }
}

/// Feed routing: which stream names use the legacy line shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Streams whose lines carry `wifiConnected`/`wifiScan` arrays instead
    /// of the canonical `scans` array.
    #[serde(default)]
    pub legacy_streams: Vec<String>,
}

// ============================================================================
// Positioning
// ============================================================================

/// Positioning engine thresholds and radio-model constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositioningConfig {
    /// Mean RSSI above this is STRONG.
    #[serde(default = "PositioningConfig::default_rssi_strong")]
    pub rssi_strong_dbm: f64,

    /// Mean RSSI above this (and ≤ strong) is MEDIUM.
    #[serde(default = "PositioningConfig::default_rssi_medium")]
    pub rssi_medium_dbm: f64,

    /// Mean RSSI above this (and ≤ medium) is WEAK; at or below, VERY_WEAK.
    #[serde(default = "PositioningConfig::default_rssi_weak")]
    pub rssi_weak_dbm: f64,

    /// GDOP classification thresholds.
    #[serde(default = "PositioningConfig::default_gdop_excellent")]
    pub gdop_excellent: f64,
    #[serde(default = "PositioningConfig::default_gdop_good")]
    pub gdop_good: f64,
    #[serde(default = "PositioningConfig::default_gdop_fair")]
    pub gdop_fair: f64,

    /// Path-loss coefficient: `10 × n` where `n` is the path-loss
    /// exponent. Also the divisor in the RSSI-ratio formula.
    #[serde(default = "PositioningConfig::default_path_loss_coeff")]
    pub path_loss_coeff: f64,

    /// Expected RSSI at 1 m from an AP (dBm), for distance estimation.
    #[serde(default = "PositioningConfig::default_reference_rssi")]
    pub reference_rssi_dbm: f64,

    /// RSSI stddev at or below which a spread classifies UNIFORM (dB).
    #[serde(default = "PositioningConfig::default_uniform_stddev")]
    pub uniform_stddev_max_db: f64,

    /// |z-score| above which a sample is an outlier.
    #[serde(default = "PositioningConfig::default_outlier_z")]
    pub outlier_z_threshold: f64,

    /// PCA minor-axis variance (m²) below which matched AP positions are
    /// treated as collinear.
    #[serde(default = "PositioningConfig::default_collinearity_epsilon")]
    pub collinearity_variance_epsilon_m2: f64,
}

impl PositioningConfig {
    fn default_rssi_strong() -> f64 {
        -70.0
    }
    fn default_rssi_medium() -> f64 {
        -85.0
    }
    fn default_rssi_weak() -> f64 {
        -95.0
    }
    fn default_gdop_excellent() -> f64 {
        2.0
    }
    fn default_gdop_good() -> f64 {
        4.0
    }
    fn default_gdop_fair() -> f64 {
        6.0
    }
    fn default_path_loss_coeff() -> f64 {
        20.0
    }
    fn default_reference_rssi() -> f64 {
        -40.0
    }
    fn default_uniform_stddev() -> f64 {
        6.0
    }
    fn default_outlier_z() -> f64 {
        2.0
    }
    fn default_collinearity_epsilon() -> f64 {
        25.0
    }
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            rssi_strong_dbm: Self::default_rssi_strong(),
            rssi_medium_dbm: Self::default_rssi_medium(),
            rssi_weak_dbm: Self::default_rssi_weak(),
            gdop_excellent: Self::default_gdop_excellent(),
            gdop_good: Self::default_gdop_good(),
            gdop_fair: Self::default_gdop_fair(),
            path_loss_coeff: Self::default_path_loss_coeff(),
            reference_rssi_dbm: Self::default_reference_rssi(),
            uniform_stddev_max_db: Self::default_uniform_stddev(),
            outlier_z_threshold: Self::default_outlier_z(),
            collinearity_variance_epsilon_m2: Self::default_collinearity_epsilon(),
        }
    }
}
