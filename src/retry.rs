use std::time::Duration;

use rand::{Rng, RngCore};

/// Exponential backoff schedule for commit retries.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial, max }
    }

    /// Delay before the next attempt, with equal jitter applied.
    pub fn next_delay(&mut self, rng: &mut impl RngCore) -> Duration {
        let current = self.next.min(self.max);
        self.next = current.saturating_mul(2).min(self.max);
        jittered(rng, current)
    }
}

// Equal jitter: delay lands in [backoff/2, backoff].
fn jittered(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
    if backoff_ms <= 1 {
        return backoff;
    }
    let half_ms = backoff_ms / 2;
    let jitter_ms = rng.gen_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn delays_double_until_capped() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(40));

        let bounds = [(5, 10), (10, 20), (20, 40), (20, 40), (20, 40)];
        for (lo, hi) in bounds {
            let d = backoff.next_delay(&mut rng);
            assert!(
                d >= Duration::from_millis(lo) && d <= Duration::from_millis(hi),
                "{:?} outside [{}, {}]",
                d,
                lo,
                hi
            );
        }
    }

    #[test]
    fn zero_backoff_stays_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut backoff = Backoff::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(backoff.next_delay(&mut rng), Duration::ZERO);
        assert_eq!(backoff.next_delay(&mut rng), Duration::ZERO);
    }
}
