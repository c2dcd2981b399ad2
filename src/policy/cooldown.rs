//! Randomized backoff after a policy runs out of sinks.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Optional deadline before which threshold triggers are suppressed.
#[derive(Clone, Debug)]
pub struct Cooldown {
    min: Duration,
    max: Duration,
    until: Option<Instant>,
}

impl Cooldown {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            until: None,
        }
    }

    /// Arm for a uniformly random duration in `[min, max]`.
    pub fn arm<R: Rng>(&mut self, now: Instant, rng: &mut R) -> Duration {
        let duration = if self.min >= self.max {
            self.min
        } else {
            rng.random_range(self.min..=self.max)
        };
        self.until = Some(now + duration);
        duration
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// Time left, or `None` when not armed or already elapsed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Whether the cooldown was armed and has run out.
    pub fn has_elapsed(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now >= until)
    }

    pub fn clear(&mut self) {
        self.until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn armed_duration_is_within_bounds() {
        let min = Duration::from_secs(300);
        let max = Duration::from_secs(600);
        let mut rng = StdRng::seed_from_u64(7);
        let now = Instant::now();

        for _ in 0..100 {
            let mut cooldown = Cooldown::new(min, max);
            let armed = cooldown.arm(now, &mut rng);
            assert!(armed >= min && armed <= max);
            assert_eq!(cooldown.remaining(now), Some(armed));
        }
    }

    #[test]
    fn cooldown_expires() {
        let now = Instant::now();
        let mut cooldown = Cooldown::new(Duration::from_secs(5), Duration::from_secs(5));
        assert!(!cooldown.is_active(now));

        cooldown.arm(now, &mut StdRng::seed_from_u64(1));
        assert!(cooldown.is_active(now + Duration::from_secs(4)));
        assert!(!cooldown.is_active(now + Duration::from_secs(5)));
        assert!(cooldown.has_elapsed(now + Duration::from_secs(5)));
        assert_eq!(cooldown.remaining(now + Duration::from_secs(6)), None);
    }

    #[test]
    fn clear_disarms() {
        let now = Instant::now();
        let mut cooldown = Cooldown::new(Duration::from_secs(1), Duration::from_secs(2));
        cooldown.arm(now, &mut StdRng::seed_from_u64(3));
        cooldown.clear();
        assert!(!cooldown.is_active(now));
        assert!(!cooldown.has_elapsed(now));
    }
}
