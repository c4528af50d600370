//! Geometric helpers shared by the classifier and the algorithms.
//!
//! Scan geometries are small (hundreds of meters), so a local
//! equirectangular frame centered on the weighted centroid is accurate to
//! well below AP accuracy. All solver math runs in meters inside that
//! frame.

use crate::config::defaults::METERS_PER_DEG_LAT;
use crate::positioning::MatchedObservation;

/// Local east/north meter frame anchored at a reference coordinate.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    ref_lat: f64,
    ref_lon: f64,
    meters_per_deg_lon: f64,
}

impl LocalFrame {
    pub fn centered_at(lat: f64, lon: f64) -> Self {
        Self {
            ref_lat: lat,
            ref_lon: lon,
            meters_per_deg_lon: METERS_PER_DEG_LAT * lat.to_radians().cos().max(0.01),
        }
    }

    /// Geographic → local (x east, y north), meters.
    pub fn to_local(&self, lat: f64, lon: f64) -> (f64, f64) {
        (
            (lon - self.ref_lon) * self.meters_per_deg_lon,
            (lat - self.ref_lat) * METERS_PER_DEG_LAT,
        )
    }

    /// Local (x east, y north) → geographic.
    pub fn to_geo(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.ref_lat + y / METERS_PER_DEG_LAT,
            self.ref_lon + x / self.meters_per_deg_lon,
        )
    }
}

/// Linear-power weight for a dBm reading: `10^(rssi/10)`.
pub fn mw_weight(rssi_dbm: f64) -> f64 {
    10f64.powf(rssi_dbm / 10.0)
}

/// mW-weighted centroid of the matched AP positions.
pub fn weighted_centroid(matched: &[MatchedObservation]) -> (f64, f64) {
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    let mut weight_sum = 0.0;
    for m in matched {
        let w = mw_weight(m.scan.rssi_dbm);
        lat_sum += w * m.ap.latitude;
        lon_sum += w * m.ap.longitude;
        weight_sum += w;
    }
    if weight_sum <= 0.0 {
        let n = matched.len().max(1) as f64;
        return (
            matched.iter().map(|m| m.ap.latitude).sum::<f64>() / n,
            matched.iter().map(|m| m.ap.longitude).sum::<f64>() / n,
        );
    }
    (lat_sum / weight_sum, lon_sum / weight_sum)
}

/// Geometric dilution of precision: `√trace((HᵀH)⁻¹)` where H's rows are
/// unit vectors from the weighted centroid to each AP. `None` when the
/// normal matrix is singular (degenerate geometry).
pub fn gdop(matched: &[MatchedObservation]) -> Option<f64> {
    if matched.len() < 2 {
        return None;
    }
    let (centroid_lat, centroid_lon) = weighted_centroid(matched);
    let frame = LocalFrame::centered_at(centroid_lat, centroid_lon);

    let mut hxx = 0.0;
    let mut hxy = 0.0;
    let mut hyy = 0.0;
    for m in matched {
        let (x, y) = frame.to_local(m.ap.latitude, m.ap.longitude);
        let norm = (x * x + y * y).sqrt();
        if norm < 1e-6 {
            continue; // AP at the centroid contributes no direction
        }
        let (ux, uy) = (x / norm, y / norm);
        hxx += ux * ux;
        hxy += ux * uy;
        hyy += uy * uy;
    }

    let det = hxx * hyy - hxy * hxy;
    if det.abs() < 1e-9 {
        return None;
    }
    let trace_inverse = (hxx + hyy) / det;
    if trace_inverse <= 0.0 {
        return None;
    }
    Some(trace_inverse.sqrt())
}

/// Smaller eigenvalue of the position covariance in the local frame: the
/// variance along the minor principal axis, m². Near zero means the APs
/// sit on a line.
pub fn minor_axis_variance(matched: &[MatchedObservation]) -> f64 {
    if matched.len() < 3 {
        return 0.0;
    }
    let mean_lat = matched.iter().map(|m| m.ap.latitude).sum::<f64>() / matched.len() as f64;
    let mean_lon = matched.iter().map(|m| m.ap.longitude).sum::<f64>() / matched.len() as f64;
    let frame = LocalFrame::centered_at(mean_lat, mean_lon);

    let points: Vec<(f64, f64)> = matched
        .iter()
        .map(|m| frame.to_local(m.ap.latitude, m.ap.longitude))
        .collect();
    let n = points.len() as f64;
    let (mx, my) = (
        points.iter().map(|p| p.0).sum::<f64>() / n,
        points.iter().map(|p| p.1).sum::<f64>() / n,
    );

    let mut cxx = 0.0;
    let mut cxy = 0.0;
    let mut cyy = 0.0;
    for (x, y) in &points {
        cxx += (x - mx) * (x - mx);
        cxy += (x - mx) * (y - my);
        cyy += (y - my) * (y - my);
    }
    cxx /= n;
    cxy /= n;
    cyy /= n;

    // Eigenvalues of the 2×2 covariance matrix.
    let trace = cxx + cyy;
    let det = cxx * cyy - cxy * cxy;
    let discriminant = (trace * trace / 4.0 - det).max(0.0).sqrt();
    (trace / 2.0 - discriminant).max(0.0)
}

/// Log-distance path loss inverted for range: `10^((P0 − rssi) / coeff)`
/// meters, with `coeff = 10 × n`.
pub fn estimate_distance_m(rssi_dbm: f64, reference_rssi_dbm: f64, path_loss_coeff: f64) -> f64 {
    10f64.powf((reference_rssi_dbm - rssi_dbm) / path_loss_coeff).max(1.0)
}

/// Mean altitude over the APs that report one.
pub fn mean_known_altitude(matched: &[MatchedObservation]) -> Option<f64> {
    let altitudes: Vec<f64> = matched.iter().filter_map(|m| m.ap.altitude_m).collect();
    if altitudes.is_empty() {
        None
    } else {
        Some(altitudes.iter().sum::<f64>() / altitudes.len() as f64)
    }
}

/// Mean scan RSSI of the matched set.
pub fn mean_rssi(matched: &[MatchedObservation]) -> f64 {
    if matched.is_empty() {
        return 0.0;
    }
    matched.iter().map(|m| m.scan.rssi_dbm).sum::<f64>() / matched.len() as f64
}

/// Signal-strength factor in `[0, 1]`: 0 at −100 dBm, 1 at −40 dBm.
pub fn signal_strength_factor(mean_rssi_dbm: f64) -> f64 {
    ((mean_rssi_dbm + 100.0) / 60.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApRecord, ApStatus, ScanObservation};

    pub(crate) fn matched(lat: f64, lon: f64, rssi: f64) -> MatchedObservation {
        let mac = format!("00:11:22:33:44:{:02x}", (lat * 10.0) as u8);
        MatchedObservation {
            scan: ScanObservation {
                mac: mac.clone(),
                rssi_dbm: rssi,
                frequency_mhz: None,
                ssid: None,
            },
            ap: ApRecord {
                mac,
                latitude: lat,
                longitude: lon,
                altitude_m: None,
                horizontal_accuracy_m: 12.0,
                vertical_accuracy_m: None,
                status: ApStatus::Active,
                confidence: 0.9,
            },
        }
    }

    #[test]
    fn local_frame_round_trips() {
        let frame = LocalFrame::centered_at(37.7749, -122.4194);
        let (x, y) = frame.to_local(37.7760, -122.4180);
        let (lat, lon) = frame.to_geo(x, y);
        assert!((lat - 37.7760).abs() < 1e-9);
        assert!((lon - -122.4180).abs() < 1e-9);
    }

    #[test]
    fn centroid_leans_toward_strong_signals() {
        let set = vec![matched(1.0, 1.0, -60.0), matched(3.0, 3.0, -90.0)];
        let (lat, lon) = weighted_centroid(&set);
        assert!(lat < 1.1, "lat {lat} should hug the strong AP");
        assert!(lon < 1.1);
    }

    #[test]
    fn gdop_degrades_from_triangle_to_line() {
        let triangle = vec![
            matched(1.0, 1.0, -65.0),
            matched(1.0, 3.0, -65.0),
            matched(3.0, 2.0, -65.0),
        ];
        let spread = gdop(&triangle).unwrap();
        assert!(spread < 4.0, "triangle GDOP {spread}");

        let line = vec![
            matched(1.0, 1.0, -65.0),
            matched(2.0, 2.0, -65.0),
            matched(3.0, 3.0, -65.0),
        ];
        // Collinear normal matrix is singular.
        assert!(gdop(&line).is_none());
    }

    #[test]
    fn minor_variance_vanishes_on_a_line() {
        let line: Vec<_> = (1..=5).map(|i| matched(i as f64, i as f64, -70.0)).collect();
        assert!(minor_axis_variance(&line) < 1.0);

        let triangle = vec![
            matched(1.0, 1.0, -65.0),
            matched(1.0, 3.0, -65.0),
            matched(3.0, 2.0, -65.0),
        ];
        assert!(minor_axis_variance(&triangle) > 1e6);
    }

    #[test]
    fn path_loss_distances_are_monotone() {
        let near = estimate_distance_m(-45.0, -40.0, 20.0);
        let far = estimate_distance_m(-80.0, -40.0, 20.0);
        assert!(near < far);
        assert!((estimate_distance_m(-60.0, -40.0, 20.0) - 10.0).abs() < 1e-9);
    }
}
