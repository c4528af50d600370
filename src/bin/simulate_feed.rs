//! Synthetic feed generator for local pipeline runs.
//!
//! Writes measurement upload objects into a local object root and drops
//! the matching queue notifications into the spool, so a full pipeline
//! run needs nothing but this binary and `wifi-locate`:
//!
//! ```bash
//! simulate-feed --objects 5 --lines 200
//! wifi-locate --queue-dir spool --object-root objects
//! ```
//!
//! Devices random-walk around a seed coordinate scanning a fixed AP
//! constellation; RSSI follows the log-distance model with Gaussian
//! noise. A configurable fraction of malformed and out-of-band lines
//! exercises the Stage-1 filters.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::error;

// ============================================================================
// Radio Constants
// ============================================================================

/// Expected RSSI at 1 m (dBm).
const REFERENCE_RSSI: f64 = -40.0;
/// Path-loss coefficient (10 × exponent).
const PATH_LOSS_COEFF: f64 = 20.0;
/// RSSI noise stddev (dB).
const RSSI_SIGMA: f64 = 4.0;
/// AP constellation radius around the seed coordinate (meters).
const CONSTELLATION_RADIUS_M: f64 = 120.0;
/// Device walk step (meters per line).
const WALK_STEP_M: f64 = 3.0;
/// Meters per degree of latitude.
const METERS_PER_DEG: f64 = 111_320.0;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "simulate-feed")]
#[command(about = "Synthetic WiFi measurement feed generator")]
#[command(version)]
struct Args {
    /// Spool directory the notifications are dropped into.
    #[arg(long, default_value = "spool")]
    queue_dir: PathBuf,

    /// Object root the upload files are written under.
    #[arg(long, default_value = "objects")]
    object_root: PathBuf,

    /// Bucket name used in keys and notifications.
    #[arg(long, default_value = "uploads")]
    bucket: String,

    /// Stream (feed) name: second-to-last key component.
    #[arg(long, default_value = "scan-feed")]
    stream: String,

    /// Number of upload objects to generate.
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=1000))]
    objects: u32,

    /// Measurement lines per object.
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u32).range(1..=100_000))]
    lines: u32,

    /// Access points in the constellation.
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..=64))]
    aps: u32,

    /// Fraction of lines deliberately malformed or out of band.
    #[arg(long, default_value = "0.05")]
    noise: f64,

    /// Seed latitude/longitude of the constellation.
    #[arg(long, default_value = "37.7749")]
    lat: f64,
    #[arg(long, default_value = "-122.4194")]
    lon: f64,

    /// Random seed for reproducibility.
    #[arg(long)]
    seed: Option<u64>,
}

struct Ap {
    mac: String,
    lat: f64,
    lon: f64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Feed generation failed");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let noise = Normal::new(0.0, RSSI_SIGMA)?;

    let incoming = args.queue_dir.join("incoming");
    std::fs::create_dir_all(&incoming)?;
    let feed_dir = args
        .object_root
        .join(&args.bucket)
        .join("feeds")
        .join(&args.stream);
    std::fs::create_dir_all(&feed_dir)?;

    let constellation = build_constellation(args, &mut rng);

    for object_index in 0..args.objects {
        let file_name = format!("part-{object_index:04}.jsonl");
        let key = format!("feeds/{}/{}", args.stream, file_name);
        let path = feed_dir.join(&file_name);

        let mut file = std::fs::File::create(&path)?;
        let mut lat = args.lat;
        let mut lon = args.lon;
        for line_index in 0..args.lines {
            // Random walk.
            lat += rng.gen_range(-WALK_STEP_M..=WALK_STEP_M) / METERS_PER_DEG;
            lon += rng.gen_range(-WALK_STEP_M..=WALK_STEP_M)
                / (METERS_PER_DEG * args.lat.to_radians().cos());

            let line = if rng.gen_bool(args.noise.clamp(0.0, 1.0)) {
                noisy_line(&mut rng, line_index)
            } else {
                measurement_line(&mut rng, &noise, &constellation, object_index, lat, lon)
            };
            writeln!(file, "{line}")?;
        }
        file.flush()?;

        let size = std::fs::metadata(&path)?.len();
        let notification = notification_body(&args.bucket, &key, size);
        std::fs::write(
            incoming.join(format!("sim-{object_index:04}.json")),
            notification,
        )?;
        println!("wrote {} ({} lines) and its notification", path.display(), args.lines);
    }

    Ok(())
}

fn build_constellation(args: &Args, rng: &mut StdRng) -> Vec<Ap> {
    (0..args.aps)
        .map(|i| {
            let angle = rng.gen_range(0.0..std::f64::consts::TAU);
            let radius = rng.gen_range(10.0..CONSTELLATION_RADIUS_M);
            Ap {
                mac: format!("02:00:5e:{:02x}:{:02x}:{:02x}", i, rng.gen::<u8>(), rng.gen::<u8>()),
                lat: args.lat + radius * angle.sin() / METERS_PER_DEG,
                lon: args.lon
                    + radius * angle.cos() / (METERS_PER_DEG * args.lat.to_radians().cos()),
            }
        })
        .collect()
}

/// One well-formed measurement line: the device sees every AP within
/// plausible range, with log-distance RSSI plus Gaussian noise.
fn measurement_line(
    rng: &mut StdRng,
    noise: &Normal<f64>,
    constellation: &[Ap],
    object_index: u32,
    lat: f64,
    lon: f64,
) -> String {
    let mut scans = Vec::new();
    for ap in constellation {
        let dx = (ap.lon - lon) * METERS_PER_DEG * lat.to_radians().cos();
        let dy = (ap.lat - lat) * METERS_PER_DEG;
        let dist = (dx * dx + dy * dy).sqrt().max(1.0);
        let rssi = REFERENCE_RSSI - PATH_LOSS_COEFF * dist.log10() + noise.sample(rng);
        if rssi < -92.0 {
            continue; // below receiver sensitivity
        }
        scans.push(format!(
            r#"{{"mac":"{}","rssi":{:.0},"freq":2437}}"#,
            ap.mac, rssi
        ));
    }
    format!(
        r#"{{"deviceId":"sim-device-{object_index}","timestamp":"{}","location":{{"lat":{lat:.6},"lon":{lon:.6},"accuracy":{:.1}}},"scans":[{}]}}"#,
        Utc::now().to_rfc3339(),
        rng.gen_range(5.0..40.0),
        scans.join(",")
    )
}

/// Deliberately bad lines: garbage, a hopeless fix, or an out-of-band
/// reading — one of each filter class.
fn noisy_line(rng: &mut StdRng, line_index: u32) -> String {
    match line_index % 3 {
        0 => format!("garbage line {}", rng.gen::<u32>()),
        1 => format!(
            r#"{{"deviceId":"sim-noise","timestamp":"{}","location":{{"lat":37.0,"lon":-122.0,"accuracy":99999.0}},"scans":[{{"mac":"02:00:5e:00:00:01","rssi":-60}}]}}"#,
            Utc::now().to_rfc3339()
        ),
        _ => format!(
            r#"{{"deviceId":"sim-noise","timestamp":"{}","location":{{"lat":37.0,"lon":-122.0,"accuracy":10.0}},"scans":[{{"mac":"02:00:5e:00:00:01","rssi":-120}}]}}"#,
            Utc::now().to_rfc3339()
        ),
    }
}

fn notification_body(bucket: &str, key: &str, size: u64) -> String {
    format!(
        r#"{{"Records":[{{"eventSource":"aws:s3","eventTime":"{}","awsRegion":"local","s3":{{"bucket":{{"name":"{bucket}"}},"object":{{"key":"{key}","size":{size}}}}}}}]}}"#,
        Utc::now().to_rfc3339()
    )
}
