//! Configuration loading and validation against real TOML files.

use std::io::Write;

use wifi_locate::config::{validation, HotspotAction, PipelineConfig};
use wifi_locate::error::ConfigError;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn full_config_loads() {
    let file = write_config(
        r#"
        [filtering]
        max_location_accuracy_m = 200.0
        min_rssi_dbm = -90
        max_rssi_dbm = -10
        connected_quality_weight = 3.0

        [filtering.mobile_hotspot]
        enabled = true
        oui_blacklist = ["da:a1:19", "02:00:00"]
        action = "exclude"

        [memory]
        pressure_threshold = 0.85
        check_interval_ms = 2000
        min_throttled_batch_size = 25

        [delivery]
        stream_name = "measurements-prod"
        max_retries = 5
        max_batch_records = 400

        [queue]
        channel_capacity = 2048
        workers = 8

        [positioning]
        path_loss_coeff = 30.0
        "#,
    );

    let config = PipelineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.filtering.min_rssi_dbm, -90);
    assert_eq!(config.filtering.mobile_hotspot.action, HotspotAction::Exclude);
    assert_eq!(config.delivery.stream_name, "measurements-prod");
    assert_eq!(config.queue.workers, 8);
    assert!((config.positioning.path_loss_coeff - 30.0).abs() < f64::EPSILON);
    // Untouched sections keep their defaults.
    assert_eq!(config.object.max_file_size_bytes, 1024 * 1024 * 1024);
}

#[test]
fn partial_config_fills_defaults() {
    let file = write_config("[delivery]\nmax_batch_records = 10\n");
    let config = PipelineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.delivery.max_batch_records, 10);
    assert_eq!(config.delivery.max_retries, 3);
    assert_eq!(config.filtering.min_rssi_dbm, -95);
}

#[test]
fn out_of_range_values_are_fatal() {
    let cases = [
        ("[memory]\npressure_threshold = 0.2\n", "memory.pressure_threshold"),
        ("[memory]\ncheck_interval_ms = 100\n", "memory.check_interval_ms"),
        ("[filtering]\nmin_rssi_dbm = -5\n", "filtering.min_rssi_dbm"),
        ("[filtering]\nmax_rssi_dbm = -50\n", "filtering.max_rssi_dbm"),
        (
            "[filtering]\nmax_location_accuracy_m = 5000.0\n",
            "filtering.max_location_accuracy_m",
        ),
        ("[queue]\nchannel_capacity = 10\n", "queue.channel_capacity"),
        (
            "[positioning]\ngdop_excellent = 9.0\n",
            "positioning.gdop_excellent",
        ),
    ];
    for (toml, expected_field) in cases {
        let file = write_config(toml);
        match PipelineConfig::load_from_file(file.path()) {
            Err(ConfigError::OutOfRange { field, .. }) => {
                assert_eq!(field, expected_field, "for config {toml:?}")
            }
            other => panic!("expected OutOfRange for {toml:?}, got {other:?}"),
        }
    }
}

#[test]
fn malformed_oui_entries_are_rejected() {
    let file = write_config(
        "[filtering.mobile_hotspot]\nenabled = true\noui_blacklist = [\"DAA119\"]\n",
    );
    assert!(matches!(
        PipelineConfig::load_from_file(file.path()),
        Err(ConfigError::OutOfRange { .. })
    ));
}

#[test]
fn unparseable_toml_is_a_parse_error() {
    let file = write_config("this is [not toml");
    assert!(matches!(
        PipelineConfig::load_from_file(file.path()),
        Err(ConfigError::Parse(..))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::path::Path::new("/nonexistent/wifi_locate.toml");
    assert!(matches!(
        PipelineConfig::load_from_file(path),
        Err(ConfigError::Io(..))
    ));
}

#[test]
fn unknown_keys_warn_with_suggestions_but_load() {
    let toml = r#"
        [delivery]
        max_batch_recrods = 100
        stream_name = "ok"
    "#;
    let warnings = validation::validate_unknown_keys(toml);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "delivery.max_batch_recrods");
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("delivery.max_batch_records")
    );

    let file = write_config(toml);
    // The typo'd key is ignored by serde; the config still loads.
    let config = PipelineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.delivery.stream_name, "ok");
    assert_eq!(config.delivery.max_batch_records, 500);
}
