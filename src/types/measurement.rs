//! Normalized WiFi measurement records.
//!
//! A [`Measurement`] is one AP observation that survived Stage-1 filtering,
//! tied to the device location fix it was scanned from. It exists between
//! the transformer and serialization; the canonical on-wire form is
//! [`DeliveryRecord`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One filtered, normalized AP observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub device_id: String,
    pub observed_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy of the device fix, meters.
    pub location_accuracy_m: f64,
    /// Lowercase colon-separated MAC (`aa:bb:cc:dd:ee:ff`).
    pub mac: String,
    pub rssi_dbm: i32,
    pub ssid: Option<String>,
    pub frequency_mhz: Option<u32>,
    /// Whether the device was associated with this AP during the scan.
    pub connected: bool,
    pub link_speed_mbps: Option<u32>,
    /// Quality weight assigned by the Stage-1 rules.
    pub quality_weight: f64,
    /// Set when the OUI hotspot policy flagged (but kept) this record.
    pub hotspot_flag: bool,
}

impl Measurement {
    /// Convert to the canonical delivery form.
    pub fn to_delivery_record(&self) -> DeliveryRecord {
        DeliveryRecord {
            device_id: self.device_id.clone(),
            observed_at: self
                .observed_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            latitude: self.latitude,
            longitude: self.longitude,
            location_accuracy_m: self.location_accuracy_m,
            mac: self.mac.clone(),
            rssi_dbm: self.rssi_dbm,
            ssid: self.ssid.clone(),
            frequency_mhz: self.frequency_mhz,
            connected: self.connected,
            link_speed_mbps: self.link_speed_mbps,
            quality_weight: self.quality_weight,
            hotspot_flag: self.hotspot_flag,
        }
    }
}

/// Canonical delivery-stream record.
///
/// Field order is the serialization order; canonical serialize → parse →
/// serialize is a fixed point. Records are newline-terminated on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub device_id: String,
    /// RFC-3339 with millisecond precision, UTC (`Z` suffix).
    pub observed_at: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_accuracy_m: f64,
    pub mac: String,
    pub rssi_dbm: i32,
    pub ssid: Option<String>,
    pub frequency_mhz: Option<u32>,
    pub connected: bool,
    pub link_speed_mbps: Option<u32>,
    pub quality_weight: f64,
    pub hotspot_flag: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Measurement {
        Measurement {
            device_id: "device-1".to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 5, 14, 10, 30, 0).unwrap(),
            latitude: 37.7749,
            longitude: -122.4194,
            location_accuracy_m: 12.5,
            mac: "00:11:22:33:44:55".to_string(),
            rssi_dbm: -65,
            ssid: Some("office".to_string()),
            frequency_mhz: Some(5180),
            connected: true,
            link_speed_mbps: Some(433),
            quality_weight: 2.0,
            hotspot_flag: false,
        }
    }

    #[test]
    fn canonical_serialization_is_a_fixed_point() {
        let record = sample().to_delivery_record();
        let first = serde_json::to_string(&record).unwrap();
        let reparsed: DeliveryRecord = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string(&reparsed).unwrap();
        assert_eq!(first, second);
        assert_eq!(record, reparsed);
    }

    #[test]
    fn observed_at_is_rfc3339_utc() {
        let record = sample().to_delivery_record();
        assert_eq!(record.observed_at, "2024-05-14T10:30:00.000Z");
    }
}
