//! End-to-end positioning engine scenarios over the in-memory AP store.

use wifi_locate::config::PositioningConfig;
use wifi_locate::error::PositioningError;
use wifi_locate::positioning::algorithms::AlgorithmKind;
use wifi_locate::positioning::{InMemoryApStore, PositioningEngine};
use wifi_locate::types::{ApRecord, ApStatus, ScanObservation};

fn scan(mac: &str, rssi: f64) -> ScanObservation {
    ScanObservation {
        mac: mac.to_string(),
        rssi_dbm: rssi,
        frequency_mhz: Some(2437),
        ssid: None,
    }
}

fn ap(mac: &str, lat: f64, lon: f64) -> ApRecord {
    ApRecord {
        mac: mac.to_string(),
        latitude: lat,
        longitude: lon,
        altitude_m: None,
        horizontal_accuracy_m: 12.0,
        vertical_accuracy_m: None,
        status: ApStatus::Active,
        confidence: 0.9,
    }
}

fn engine() -> PositioningEngine {
    PositioningEngine::new(PositioningConfig::default())
}

/// Scenario: single known AP, strong signal. The engine must return the
/// AP's own position with moderate accuracy and mid-band confidence.
#[test]
fn single_strong_ap_returns_ap_position() {
    let store = InMemoryApStore::new(vec![ap("00:11:22:33:44:01", 37.7749, -122.4194)]);
    let report = engine()
        .locate(&[scan("00:11:22:33:44:01", -65.0)], &store)
        .unwrap();

    assert!((report.position.latitude - 37.7749).abs() < 1e-9);
    assert!((report.position.longitude - -122.4194).abs() < 1e-9);
    assert!(
        (10.0..=15.0).contains(&report.position.accuracy_m),
        "accuracy {} outside [10, 15]",
        report.position.accuracy_m
    );
    assert!(
        (0.4..=0.5).contains(&report.position.confidence),
        "confidence {} outside [0.4, 0.5]",
        report.position.confidence
    );
    assert_eq!(report.contributing, vec![AlgorithmKind::Proximity]);
}

/// Scenario: two APs with a 20 dB gap. RSSI-Ratio must be selected with
/// non-zero weight; the fused longitude sits at the 10:1 split point.
#[test]
fn two_ap_ratio_split() {
    let store = InMemoryApStore::new(vec![
        ap("00:11:22:33:44:01", 1.0, 1.0),
        ap("00:11:22:33:44:02", 1.0, 2.0),
    ]);
    let scans = vec![
        scan("00:11:22:33:44:01", -60.0),
        scan("00:11:22:33:44:02", -80.0),
    ];
    let report = engine().locate(&scans, &store).unwrap();

    let ratio_weight = report
        .weights
        .iter()
        .find(|(kind, _)| *kind == AlgorithmKind::RssiRatio)
        .map(|(_, w)| *w)
        .unwrap_or(0.0);
    assert!(ratio_weight > 0.0, "rssi-ratio not selected: {:?}", report.weights);

    assert!((report.position.latitude - 1.0).abs() < 0.05);
    assert!(
        report.position.longitude > 1.85 && report.position.longitude < 1.95,
        "fused longitude {}",
        report.position.longitude
    );
}

/// Scenario: three APs forming a triangle around the device.
/// Trilateration participates and the fused fix stays inside the
/// constellation's latitude band.
#[test]
fn triangle_engages_trilateration() {
    let store = InMemoryApStore::new(vec![
        ap("00:11:22:33:44:01", 1.0, 1.0),
        ap("00:11:22:33:44:02", 1.0, 3.0),
        ap("00:11:22:33:44:03", 3.0, 2.0),
    ]);
    let scans = vec![
        scan("00:11:22:33:44:01", -70.0),
        scan("00:11:22:33:44:02", -65.0),
        scan("00:11:22:33:44:03", -60.0),
    ];
    let report = engine().locate(&scans, &store).unwrap();

    let trilat_weight = report
        .weights
        .iter()
        .find(|(kind, _)| *kind == AlgorithmKind::Trilateration)
        .map(|(_, w)| *w)
        .unwrap_or(0.0);
    assert!(trilat_weight > 0.0, "trilateration not selected: {:?}", report.weights);

    assert!(
        report.position.latitude > 1.5 && report.position.latitude < 3.0,
        "fused latitude {}",
        report.position.latitude
    );
    assert!((0.0..=1.0).contains(&report.position.confidence));
}

/// Scenario: five collinear APs with the signal peak at the second one.
/// The selector must zero Trilateration and Maximum Likelihood; the
/// centroid dominates and keeps the fix near the peak.
#[test]
fn collinear_constellation_disables_solvers() {
    let records: Vec<ApRecord> = (1..=5)
        .map(|i| ap(&format!("00:11:22:33:44:0{i}"), i as f64, i as f64))
        .collect();
    let store = InMemoryApStore::new(records);
    let rssi = [-75.0, -60.0, -75.0, -85.0, -95.0];
    let scans: Vec<ScanObservation> = (1..=5)
        .map(|i| scan(&format!("00:11:22:33:44:0{i}"), rssi[i - 1]))
        .collect();

    let report = engine().locate(&scans, &store).unwrap();

    for (kind, weight) in &report.weights {
        if matches!(
            kind,
            AlgorithmKind::Trilateration | AlgorithmKind::MaximumLikelihood
        ) {
            panic!("{kind} selected with weight {weight} on a collinear set");
        }
    }
    let centroid_weight = report
        .weights
        .iter()
        .find(|(kind, _)| *kind == AlgorithmKind::WeightedCentroid)
        .map(|(_, w)| *w)
        .unwrap_or(0.0);
    for (kind, weight) in &report.weights {
        if *kind != AlgorithmKind::WeightedCentroid {
            assert!(
                centroid_weight > *weight,
                "centroid ({centroid_weight}) should dominate {kind} ({weight})"
            );
        }
    }

    assert!(
        report.position.latitude >= 1.7 && report.position.latitude <= 2.3,
        "fused latitude {}",
        report.position.latitude
    );
}

/// When every algorithm weighs zero the engine returns its failure value,
/// and any successful fusion has confidence in [0, 1].
#[test]
fn zero_weight_context_fails_cleanly() {
    let store = InMemoryApStore::new(vec![
        ap("00:11:22:33:44:01", 1.0, 1.0),
        ap("00:11:22:33:44:02", 1.0, 2.0),
    ]);
    // TWO + VERY_WEAK: nothing survives the weight tables.
    let scans = vec![
        scan("00:11:22:33:44:01", -98.0),
        scan("00:11:22:33:44:02", -99.0),
    ];
    assert_eq!(
        engine().locate(&scans, &store).unwrap_err(),
        PositioningError::Unresolvable
    );
}

/// Confidence bound holds across a sweep of contexts.
#[test]
fn fused_confidence_is_always_in_unit_interval() {
    let store = InMemoryApStore::new(
        (1..=6)
            .map(|i| ap(&format!("00:11:22:33:44:0{i}"), 10.0 + i as f64 * 0.001, 20.0))
            .collect::<Vec<_>>(),
    );
    for base_rssi in [-45.0, -60.0, -75.0, -90.0] {
        let scans: Vec<ScanObservation> = (1..=6)
            .map(|i| scan(&format!("00:11:22:33:44:0{i}"), base_rssi - i as f64))
            .collect();
        if let Ok(report) = engine().locate(&scans, &store) {
            assert!(
                (0.0..=1.0).contains(&report.position.confidence),
                "confidence {} at base rssi {base_rssi}",
                report.position.confidence
            );
        }
    }
}
