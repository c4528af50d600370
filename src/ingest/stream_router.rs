//! Feed routing: pick the line parser for a stream name.
//!
//! Processors are stateless and thread-safe. The router keeps them in
//! descending priority order and returns the first whose `can_process`
//! accepts the stream name, falling back to the default (canonical)
//! processor.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::transform::{RawObservation, RawUpload};

/// A feed-specific line parser.
pub trait FeedProcessor: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Higher priorities are consulted first.
    fn priority(&self) -> i32;

    /// Whether this processor handles the given stream.
    fn can_process(&self, stream_name: &str) -> bool;

    /// Parse one object line. `Err` is a syntactic parse failure; semantic
    /// problems surface later as filter drops.
    fn parse_line(&self, line: &str) -> Result<RawUpload, serde_json::Error>;
}

/// Priority-ordered processor registry with a default fallback.
pub struct StreamRouter {
    processors: Vec<Box<dyn FeedProcessor>>,
    default: Box<dyn FeedProcessor>,
}

impl StreamRouter {
    pub fn new(mut processors: Vec<Box<dyn FeedProcessor>>, default: Box<dyn FeedProcessor>) -> Self {
        processors.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        Self {
            processors,
            default,
        }
    }

    /// First processor accepting the stream, else the default.
    pub fn processor_for(&self, stream_name: &str) -> &dyn FeedProcessor {
        self.processors
            .iter()
            .find(|p| p.can_process(stream_name))
            .map_or(self.default.as_ref(), |p| p.as_ref())
    }
}

// ============================================================================
// Canonical shape
// ============================================================================

/// Canonical line shape: `{deviceId, timestamp, location{lat,lon,accuracy},
/// scans:[{mac,rssi,freq?,ssid?,connected?,linkSpeed?}]}`. Unknown fields
/// are ignored.
pub struct CanonicalFeedProcessor;

#[derive(Deserialize)]
struct CanonicalLine {
    #[serde(rename = "deviceId")]
    device_id: Option<String>,
    timestamp: Option<Value>,
    location: Option<CanonicalLocation>,
    scans: Option<Vec<CanonicalScan>>,
}

#[derive(Deserialize)]
struct CanonicalLocation {
    lat: Option<f64>,
    lon: Option<f64>,
    accuracy: Option<f64>,
}

#[derive(Deserialize)]
struct CanonicalScan {
    mac: Option<String>,
    rssi: Option<f64>,
    freq: Option<u32>,
    ssid: Option<String>,
    connected: Option<bool>,
    #[serde(rename = "linkSpeed")]
    link_speed: Option<u32>,
}

impl FeedProcessor for CanonicalFeedProcessor {
    fn name(&self) -> &'static str {
        "canonical"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn can_process(&self, _stream_name: &str) -> bool {
        true
    }

    fn parse_line(&self, line: &str) -> Result<RawUpload, serde_json::Error> {
        let parsed: CanonicalLine = serde_json::from_str(line)?;
        let location = parsed.location.unwrap_or(CanonicalLocation {
            lat: None,
            lon: None,
            accuracy: None,
        });
        Ok(RawUpload {
            device_id: parsed.device_id,
            observed_at: parsed.timestamp.as_ref().and_then(parse_timestamp),
            latitude: location.lat,
            longitude: location.lon,
            location_accuracy_m: location.accuracy,
            observations: parsed
                .scans
                .unwrap_or_default()
                .into_iter()
                .map(|scan| RawObservation {
                    mac: scan.mac,
                    rssi_dbm: scan.rssi,
                    frequency_mhz: scan.freq,
                    ssid: scan.ssid,
                    connected: scan.connected.unwrap_or(false),
                    link_speed_mbps: scan.link_speed,
                })
                .collect(),
        })
    }
}

// ============================================================================
// Legacy shape
// ============================================================================

/// Legacy line shape: split `wifiConnected`/`wifiScan` arrays with a flat
/// location. Bound to configured stream names.
pub struct LegacyFeedProcessor {
    streams: Vec<String>,
}

impl LegacyFeedProcessor {
    pub fn new(streams: Vec<String>) -> Self {
        Self { streams }
    }
}

#[derive(Deserialize)]
struct LegacyLine {
    #[serde(rename = "deviceId")]
    device_id: Option<String>,
    #[serde(rename = "observedAt")]
    observed_at: Option<Value>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(rename = "locationAccuracy")]
    location_accuracy: Option<f64>,
    #[serde(rename = "wifiConnected")]
    wifi_connected: Option<Vec<LegacyAp>>,
    #[serde(rename = "wifiScan")]
    wifi_scan: Option<Vec<LegacyAp>>,
}

#[derive(Deserialize)]
struct LegacyAp {
    mac: Option<String>,
    rssi: Option<f64>,
    frequency: Option<u32>,
    ssid: Option<String>,
    #[serde(rename = "linkSpeed")]
    link_speed: Option<u32>,
}

impl LegacyAp {
    fn into_observation(self, connected: bool) -> RawObservation {
        RawObservation {
            mac: self.mac,
            rssi_dbm: self.rssi,
            frequency_mhz: self.frequency,
            ssid: self.ssid,
            connected,
            link_speed_mbps: self.link_speed,
        }
    }
}

impl FeedProcessor for LegacyFeedProcessor {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn can_process(&self, stream_name: &str) -> bool {
        self.streams.iter().any(|s| s == stream_name)
    }

    fn parse_line(&self, line: &str) -> Result<RawUpload, serde_json::Error> {
        let parsed: LegacyLine = serde_json::from_str(line)?;
        let mut observations = Vec::new();
        for ap in parsed.wifi_connected.unwrap_or_default() {
            observations.push(ap.into_observation(true));
        }
        for ap in parsed.wifi_scan.unwrap_or_default() {
            observations.push(ap.into_observation(false));
        }
        Ok(RawUpload {
            device_id: parsed.device_id,
            observed_at: parsed.observed_at.as_ref().and_then(parse_timestamp),
            latitude: parsed.lat,
            longitude: parsed.lon,
            location_accuracy_m: parsed.location_accuracy,
            observations,
        })
    }
}

/// Timestamps arrive as RFC-3339 strings or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => {
            let millis = n.as_i64()?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> StreamRouter {
        StreamRouter::new(
            vec![Box::new(LegacyFeedProcessor::new(vec![
                "legacy-scan".to_string()
            ]))],
            Box::new(CanonicalFeedProcessor),
        )
    }

    #[test]
    fn routes_by_stream_name_with_default_fallback() {
        let r = router();
        assert_eq!(r.processor_for("legacy-scan").name(), "legacy");
        assert_eq!(r.processor_for("scan-feed").name(), "canonical");
        assert_eq!(r.processor_for("unknown").name(), "canonical");
    }

    #[test]
    fn canonical_line_parses() {
        let line = r#"{"deviceId":"d1","timestamp":"2024-06-01T08:00:00Z",
            "location":{"lat":37.0,"lon":-122.0,"accuracy":15.0},
            "scans":[{"mac":"00:11:22:33:44:55","rssi":-62,"freq":5180,"connected":true,"linkSpeed":433}],
            "somethingUnknown":42}"#;
        let raw = CanonicalFeedProcessor.parse_line(line).unwrap();
        assert_eq!(raw.device_id.as_deref(), Some("d1"));
        assert_eq!(raw.observations.len(), 1);
        assert!(raw.observations[0].connected);
        assert_eq!(raw.observations[0].link_speed_mbps, Some(433));
    }

    #[test]
    fn canonical_accepts_epoch_millis() {
        let line = r#"{"deviceId":"d1","timestamp":1717230000000,
            "location":{"lat":1.0,"lon":2.0,"accuracy":10.0},
            "scans":[{"mac":"00:11:22:33:44:55","rssi":-60}]}"#;
        let raw = CanonicalFeedProcessor.parse_line(line).unwrap();
        assert!(raw.observed_at.is_some());
    }

    #[test]
    fn legacy_line_merges_connected_and_scan_arrays() {
        let processor = LegacyFeedProcessor::new(vec!["legacy-scan".to_string()]);
        let line = r#"{"deviceId":"d2","observedAt":"2024-06-01T08:00:00Z",
            "lat":37.0,"lon":-122.0,"locationAccuracy":20.0,
            "wifiConnected":[{"mac":"00:11:22:33:44:55","rssi":-50,"linkSpeed":433}],
            "wifiScan":[{"mac":"00:11:22:33:44:56","rssi":-70},{"mac":"00:11:22:33:44:57","rssi":-80}]}"#;
        let raw = processor.parse_line(line).unwrap();
        assert_eq!(raw.observations.len(), 3);
        assert!(raw.observations[0].connected);
        assert!(!raw.observations[1].connected);
    }

    #[test]
    fn syntactic_garbage_is_an_error() {
        assert!(CanonicalFeedProcessor.parse_line("{not json").is_err());
    }
}
