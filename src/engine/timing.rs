//! Delay between actions

use std::time::Duration;

use rand::Rng;

use super::action::{ActionConfig, DEFAULT_RATE};

/// Maximum jitter applied to a delay, as a fraction of the base delay
pub const JITTER: f64 = 0.2;

/// Shortest delay the loop will ever sleep, in seconds
pub const MIN_DELAY_SECS: f64 = 0.0001;

/// Base delay for a rate
///
/// Invalid rates, and positive rates so small that their delay cannot be
/// slept, fall back to the default rate.
pub fn base_delay_secs(rate_per_second: f64) -> f64 {
    if rate_per_second.is_finite() && rate_per_second > 0.0 {
        let secs = 1.0 / rate_per_second;
        if Duration::try_from_secs_f64(secs).is_ok() {
            return secs;
        }
    }
    default_delay_secs()
}

fn default_delay_secs() -> f64 {
    1.0 / DEFAULT_RATE
}

fn to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .unwrap_or_else(|_| Duration::from_secs_f64(default_delay_secs()))
}

/// Delay to sleep after one action, using the thread-local RNG
pub fn compute_delay(config: &ActionConfig) -> Duration {
    compute_delay_with(config, &mut rand::thread_rng())
}

pub fn compute_delay_with<R: Rng + ?Sized>(config: &ActionConfig, rng: &mut R) -> Duration {
    let base = base_delay_secs(config.rate_per_second);
    if !config.randomize {
        return to_duration(base);
    }

    let variation = rng.gen_range(-JITTER..=JITTER);
    to_duration((base * (1.0 + variation)).max(MIN_DELAY_SECS))
}
