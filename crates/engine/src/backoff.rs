//! Exponential backoff with jitter for the activation retry loop.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub jitter_max: Duration,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(10),
            jitter_max: Duration::from_secs(1),
            multiplier: 6.0,
        }
    }
}

/// Consecutive calls to [`Backoff::next`] return the wait before each retry:
/// `initial + jitter` the first time, then each call multiplies the
/// previous duration by `multiplier` (spec §4.3.2).
pub struct Backoff {
    next_duration: Duration,
    multiplier: f64,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let jitter_ms = config.jitter_max.as_millis().max(1) as u64;
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms));
        Self {
            next_duration: config.initial + jitter,
            multiplier: config.multiplier,
        }
    }

    pub fn next(&mut self) -> Duration {
        let current = self.next_duration;
        self.next_duration = current.mul_f64(self.multiplier);
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_wait_is_within_initial_plus_jitter_bound() {
        let mut backoff = Backoff::new(BackoffConfig::default());
        let first = backoff.next();
        assert!(first >= Duration::from_secs(10));
        assert!(first < Duration::from_secs(11));
    }

    #[test]
    fn subsequent_waits_multiply_by_the_configured_factor() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial: Duration::from_secs(10),
            jitter_max: Duration::from_millis(1),
            multiplier: 6.0,
        });
        let first = backoff.next();
        let second = backoff.next();
        assert_eq!(second.as_secs_f64(), first.as_secs_f64() * 6.0);
    }
}
