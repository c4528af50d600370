//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::defaults::{BACKOFF_CAP_MS, JITTER_HIGH, JITTER_LOW};

/// Computes retry delays: `min(base × 2^attempt, 30 s) × uniform(0.75, 1.25)`.
///
/// Pure apart from the jitter draw, so the bound is testable: every delay
/// lies inside the jitter band around the capped exponential.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64) -> Self {
        Self { base_ms }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(BACKOFF_CAP_MS);
        let jitter = rand::thread_rng().gen_range(JITTER_LOW..=JITTER_HIGH);
        Duration::from_millis((exponential as f64 * jitter).round() as u64)
    }

    /// Un-jittered delay, exposed for bound checks.
    pub fn nominal_ms(&self, attempt: u32) -> u64 {
        self.base_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(BACKOFF_CAP_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_stay_inside_the_jitter_band() {
        let backoff = Backoff::new(200);
        for attempt in 0..12 {
            let nominal = backoff.nominal_ms(attempt) as f64;
            for _ in 0..50 {
                let delay = backoff.delay(attempt).as_millis() as f64;
                assert!(
                    delay >= (nominal * JITTER_LOW).floor() && delay <= (nominal * JITTER_HIGH).ceil(),
                    "attempt {attempt}: {delay} outside [{}, {}]",
                    nominal * JITTER_LOW,
                    nominal * JITTER_HIGH
                );
            }
        }
    }

    #[test]
    fn exponential_growth_caps_at_thirty_seconds() {
        let backoff = Backoff::new(200);
        assert_eq!(backoff.nominal_ms(0), 200);
        assert_eq!(backoff.nominal_ms(1), 400);
        assert_eq!(backoff.nominal_ms(4), 3_200);
        assert_eq!(backoff.nominal_ms(10), BACKOFF_CAP_MS);
        assert_eq!(backoff.nominal_ms(63), BACKOFF_CAP_MS);
    }
}
