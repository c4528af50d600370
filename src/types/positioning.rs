//! Positioning domain types: scan observations, AP reference records, and
//! position estimates.

use serde::{Deserialize, Serialize};

/// One AP observation from a device scan, as handed to the positioning
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanObservation {
    /// Lowercase colon-separated MAC.
    pub mac: String,
    pub rssi_dbm: f64,
    #[serde(default)]
    pub frequency_mhz: Option<u32>,
    #[serde(default)]
    pub ssid: Option<String>,
}

/// Lifecycle status of a reference AP.
///
/// Only `active`, `warning`, and `wifi-hotspot` records are eligible for
/// positioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApStatus {
    Active,
    Warning,
    Error,
    Expired,
    WifiHotspot,
}

impl ApStatus {
    /// Whether this status is usable for position estimation.
    pub fn eligible(self) -> bool {
        matches!(self, Self::Active | Self::Warning | Self::WifiHotspot)
    }
}

/// A reference AP from the access-point database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApRecord {
    pub mac: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: Option<f64>,
    pub horizontal_accuracy_m: f64,
    #[serde(default)]
    pub vertical_accuracy_m: Option<f64>,
    pub status: ApStatus,
    /// Database confidence in this record, `[0, 1]`.
    pub confidence: f64,
}

/// Immutable result of one positioning algorithm (or of the fuser).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: Option<f64>,
    pub accuracy_m: f64,
    /// Estimate confidence, `[0, 1]`.
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_matches_status_set() {
        assert!(ApStatus::Active.eligible());
        assert!(ApStatus::Warning.eligible());
        assert!(ApStatus::WifiHotspot.eligible());
        assert!(!ApStatus::Error.eligible());
        assert!(!ApStatus::Expired.eligible());
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ApStatus::WifiHotspot).unwrap(),
            "\"wifi-hotspot\""
        );
        let parsed: ApStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(parsed, ApStatus::Active);
    }
}
