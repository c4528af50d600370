//! Config validation: unknown-key detection with Levenshtein suggestions.
//!
//! Two-pass parse approach: first deserialize the raw TOML into
//! `toml::Value`, walk the key tree, compare against known field names,
//! and emit warnings with "did you mean?" suggestions. Then proceed with
//! normal serde deserialization. Warnings never break existing configs;
//! range checks (which do) live in `PipelineConfig::validate`.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " — did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `PipelineConfig`.
///
/// Maintained manually to match the struct hierarchy in settings.rs. Any
/// new field added there must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [filtering]
        "filtering",
        "filtering.max_location_accuracy_m",
        "filtering.min_rssi_dbm",
        "filtering.max_rssi_dbm",
        "filtering.connected_quality_weight",
        "filtering.scan_quality_weight",
        "filtering.low_link_speed_quality_weight",
        "filtering.low_link_speed_threshold_mbps",
        // [filtering.mobile_hotspot]
        "filtering.mobile_hotspot",
        "filtering.mobile_hotspot.enabled",
        "filtering.mobile_hotspot.oui_blacklist",
        "filtering.mobile_hotspot.action",
        // [memory]
        "memory",
        "memory.enabled",
        "memory.pressure_threshold",
        "memory.heap_budget_bytes",
        "memory.check_interval_ms",
        "memory.enable_batch_throttling",
        "memory.min_throttled_batch_size",
        "memory.enable_performance_profiling",
        // [delivery]
        "delivery",
        "delivery.stream_name",
        "delivery.max_retries",
        "delivery.retry_backoff_ms",
        "delivery.max_batch_records",
        "delivery.max_batch_bytes",
        "delivery.max_batch_age_ms",
        "delivery.max_in_flight_batches",
        "delivery.partial_retry_delay_ms",
        // [queue]
        "queue",
        "queue.max_messages_per_poll",
        "queue.wait_time_secs",
        "queue.visibility_timeout_secs",
        "queue.channel_capacity",
        "queue.workers",
        "queue.shutdown_grace_ms",
        // [object]
        "object",
        "object.max_file_size_bytes",
        // [feeds]
        "feeds",
        "feeds.legacy_streams",
        // [positioning]
        "positioning",
        "positioning.rssi_strong_dbm",
        "positioning.rssi_medium_dbm",
        "positioning.rssi_weak_dbm",
        "positioning.gdop_excellent",
        "positioning.gdop_good",
        "positioning.gdop_fair",
        "positioning.path_loss_coeff",
        "positioning.reference_rssi_dbm",
        "positioning.uniform_stddev_max_db",
        "positioning.outlier_z_threshold",
        "positioning.collinearity_variance_epsilon_m2",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Collect every dotted key path present in a TOML value tree.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let toml::Value::Table(table) = value {
        for (name, child) in table {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            keys.push(path.clone());
            keys.extend(walk_toml_keys(child, &path));
        }
    }
    keys
}

/// Parse raw TOML and warn about keys that no config field matches.
pub fn validate_unknown_keys(contents: &str) -> Vec<ValidationWarning> {
    let Ok(value) = contents.parse::<toml::Value>() else {
        // Unparseable TOML is reported by the real deserialization pass.
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| {
            let suggestion = closest_known_key(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

/// Find the closest known key within an edit distance budget.
fn closest_known_key(key: &str, known: &HashSet<&'static str>) -> Option<String> {
    known
        .iter()
        .map(|candidate| (levenshtein(key, candidate), *candidate))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_string())
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
