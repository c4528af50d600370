//! Stage-1 sanity filtering and observation normalization.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::FilteringConfig;
use crate::metrics::PipelineMetrics;
use crate::transform::oui::{normalize_mac, HotspotDecision, HotspotPolicy};
use crate::types::Measurement;

/// One parsed upload line before filtering. Feed processors produce this;
/// the transformer consumes it.
#[derive(Debug, Clone, Default)]
pub struct RawUpload {
    pub device_id: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_accuracy_m: Option<f64>,
    pub observations: Vec<RawObservation>,
}

/// One AP observation as parsed off the wire.
#[derive(Debug, Clone)]
pub struct RawObservation {
    pub mac: Option<String>,
    pub rssi_dbm: Option<f64>,
    pub frequency_mhz: Option<u32>,
    pub ssid: Option<String>,
    pub connected: bool,
    pub link_speed_mbps: Option<u32>,
}

/// Applies the Stage-1 rules to parsed uploads.
///
/// Stateless apart from shared counters; safe to use from every worker.
pub struct RecordTransformer {
    config: FilteringConfig,
    hotspot: HotspotPolicy,
    metrics: Arc<PipelineMetrics>,
}

impl RecordTransformer {
    pub fn new(config: FilteringConfig, metrics: Arc<PipelineMetrics>) -> Self {
        let hotspot = HotspotPolicy::new(&config.mobile_hotspot);
        Self {
            config,
            hotspot,
            metrics,
        }
    }

    /// Transform one parsed line into zero or more measurements.
    ///
    /// The sanity filter drops the whole upload; the per-observation
    /// filters drop individual APs. Every drop increments its counter and
    /// nothing here ever fails the containing message.
    pub fn apply(&self, raw: RawUpload) -> Vec<Measurement> {
        let Some(sane) = self.sanity_check(raw) else {
            self.metrics.sanity_drops.fetch_add(1, Ordering::Relaxed);
            return Vec::new();
        };

        let mut out = Vec::with_capacity(sane.observations.len());
        for obs in &sane.observations {
            if let Some(measurement) = self.filter_observation(&sane, obs) {
                out.push(measurement);
            }
        }
        out
    }

    /// Whole-measurement sanity filter: device fix quality, WGS-84 range,
    /// timestamp presence, at least one AP observation, and the identity
    /// fields needed to emit anything at all.
    fn sanity_check(&self, raw: RawUpload) -> Option<SaneUpload> {
        let device_id = raw.device_id?;
        let observed_at = raw.observed_at?;
        let latitude = raw.latitude?;
        let longitude = raw.longitude?;
        let accuracy = raw.location_accuracy_m?;

        if !(1.0..=self.config.max_location_accuracy_m).contains(&accuracy) {
            debug!(accuracy, "Dropping upload: location accuracy out of bounds");
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            debug!(latitude, longitude, "Dropping upload: coordinates out of WGS-84 range");
            return None;
        }
        if raw.observations.is_empty() {
            debug!("Dropping upload: no AP observations");
            return None;
        }

        Some(SaneUpload {
            device_id,
            observed_at,
            latitude,
            longitude,
            location_accuracy_m: accuracy,
            observations: raw.observations,
        })
    }

    /// Per-observation RSSI bounds, MAC normalization, quality weight, and
    /// the hotspot policy.
    fn filter_observation(&self, upload: &SaneUpload, obs: &RawObservation) -> Option<Measurement> {
        let rssi = obs.rssi_dbm?;
        if rssi < f64::from(self.config.min_rssi_dbm) || rssi > f64::from(self.config.max_rssi_dbm)
        {
            self.metrics.rssi_drops.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let mac = match obs.mac.as_deref().and_then(normalize_mac) {
            Some(mac) => mac,
            None => {
                self.metrics.mac_drops.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let quality_weight = self.quality_weight(obs);

        let mut hotspot_flag = false;
        match self.hotspot.evaluate(&mac) {
            HotspotDecision::Keep => {}
            HotspotDecision::KeepFlagged => {
                self.metrics.hotspot_flagged.fetch_add(1, Ordering::Relaxed);
                hotspot_flag = true;
            }
            HotspotDecision::KeepLogged => {
                self.metrics.hotspot_logged.fetch_add(1, Ordering::Relaxed);
            }
            HotspotDecision::Drop => {
                self.metrics.hotspot_excluded.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }

        Some(Measurement {
            device_id: upload.device_id.clone(),
            observed_at: upload.observed_at,
            latitude: upload.latitude,
            longitude: upload.longitude,
            location_accuracy_m: upload.location_accuracy_m,
            mac,
            rssi_dbm: rssi.round() as i32,
            ssid: obs.ssid.clone(),
            frequency_mhz: obs.frequency_mhz,
            connected: obs.connected,
            link_speed_mbps: obs.link_speed_mbps,
            quality_weight,
            hotspot_flag,
        })
    }

    /// Quality weight rules: connected observations outrank scans, unless
    /// the link is slow enough to suggest a marginal AP.
    fn quality_weight(&self, obs: &RawObservation) -> f64 {
        if obs.connected {
            match obs.link_speed_mbps {
                Some(speed) if speed < self.config.low_link_speed_threshold_mbps => {
                    self.config.low_link_speed_quality_weight
                }
                _ => self.config.connected_quality_weight,
            }
        } else {
            self.config.scan_quality_weight
        }
    }
}

/// A `RawUpload` that passed the sanity filter.
struct SaneUpload {
    device_id: String,
    observed_at: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    location_accuracy_m: f64,
    observations: Vec<RawObservation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HotspotAction, MobileHotspotConfig};

    fn transformer(config: FilteringConfig) -> RecordTransformer {
        RecordTransformer::new(config, Arc::new(PipelineMetrics::new()))
    }

    fn observation(mac: &str, rssi: f64) -> RawObservation {
        RawObservation {
            mac: Some(mac.to_string()),
            rssi_dbm: Some(rssi),
            frequency_mhz: Some(2412),
            ssid: None,
            connected: false,
            link_speed_mbps: None,
        }
    }

    fn upload(observations: Vec<RawObservation>) -> RawUpload {
        RawUpload {
            device_id: Some("device-1".to_string()),
            observed_at: Some(Utc::now()),
            latitude: Some(37.77),
            longitude: Some(-122.41),
            location_accuracy_m: Some(20.0),
            observations,
        }
    }

    #[test]
    fn passes_clean_observations() {
        let t = transformer(FilteringConfig::default());
        let out = t.apply(upload(vec![observation("00:11:22:33:44:55", -60.0)]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].mac, "00:11:22:33:44:55");
        assert_eq!(out[0].rssi_dbm, -60);
        assert!((out[0].quality_weight - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn drops_out_of_band_rssi() {
        let t = transformer(FilteringConfig::default());
        let out = t.apply(upload(vec![
            observation("00:11:22:33:44:55", -120.0),
            observation("00:11:22:33:44:56", -5.0),
            observation("00:11:22:33:44:57", -70.0),
        ]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].mac, "00:11:22:33:44:57");
    }

    #[test]
    fn drops_whole_upload_on_bad_fix() {
        let t = transformer(FilteringConfig::default());
        let mut raw = upload(vec![observation("00:11:22:33:44:55", -60.0)]);
        raw.location_accuracy_m = Some(5_000.0);
        assert!(t.apply(raw).is_empty());

        let mut raw = upload(vec![observation("00:11:22:33:44:55", -60.0)]);
        raw.latitude = Some(120.0);
        assert!(t.apply(raw).is_empty());

        let mut raw = upload(vec![observation("00:11:22:33:44:55", -60.0)]);
        raw.observed_at = None;
        assert!(t.apply(raw).is_empty());

        assert!(t.apply(upload(Vec::new())).is_empty());
    }

    #[test]
    fn connected_and_slow_links_get_distinct_weights() {
        let t = transformer(FilteringConfig::default());
        let mut connected = observation("00:11:22:33:44:55", -55.0);
        connected.connected = true;
        connected.link_speed_mbps = Some(433);
        let mut slow = observation("00:11:22:33:44:56", -55.0);
        slow.connected = true;
        slow.link_speed_mbps = Some(2);

        let out = t.apply(upload(vec![connected, slow]));
        assert!((out[0].quality_weight - 2.0).abs() < f64::EPSILON);
        assert!((out[1].quality_weight - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stricter_thresholds_never_emit_more() {
        let observations = vec![
            observation("00:11:22:33:44:55", -92.0),
            observation("00:11:22:33:44:56", -60.0),
            observation("00:11:22:33:44:57", -75.0),
        ];

        let lax = transformer(FilteringConfig::default());
        let lax_count = lax.apply(upload(observations.clone())).len();

        let mut strict_config = FilteringConfig::default();
        strict_config.min_rssi_dbm = -80;
        strict_config.max_location_accuracy_m = 10.0;
        let strict = transformer(strict_config);
        let strict_count = strict.apply(upload(observations)).len();

        assert!(strict_count <= lax_count);
    }

    #[test]
    fn exclude_is_a_strict_subset_of_log_only() {
        let observations = vec![
            observation("da:a1:19:00:00:01", -60.0),
            observation("00:11:22:33:44:55", -60.0),
        ];
        let hotspot = MobileHotspotConfig {
            enabled: true,
            oui_blacklist: vec!["da:a1:19".to_string()],
            action: HotspotAction::LogOnly,
        };

        let mut log_config = FilteringConfig::default();
        log_config.mobile_hotspot = hotspot.clone();
        let logged: Vec<String> = transformer(log_config)
            .apply(upload(observations.clone()))
            .into_iter()
            .map(|m| m.mac)
            .collect();

        let mut exclude_config = FilteringConfig::default();
        exclude_config.mobile_hotspot = MobileHotspotConfig {
            action: HotspotAction::Exclude,
            ..hotspot
        };
        let kept: Vec<String> = transformer(exclude_config)
            .apply(upload(observations))
            .into_iter()
            .map(|m| m.mac)
            .collect();

        assert!(kept.iter().all(|mac| logged.contains(mac)));
        assert!(kept.len() < logged.len());
    }

    #[test]
    fn flag_action_marks_but_keeps() {
        let mut config = FilteringConfig::default();
        config.mobile_hotspot = MobileHotspotConfig {
            enabled: true,
            oui_blacklist: vec!["da:a1:19".to_string()],
            action: HotspotAction::Flag,
        };
        let out = transformer(config).apply(upload(vec![observation("DA-A1-19-00-00-01", -60.0)]));
        assert_eq!(out.len(), 1);
        assert!(out[0].hotspot_flag);
        assert_eq!(out[0].mac, "da:a1:19:00:00:01");
    }
}
