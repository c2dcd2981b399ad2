//! Injectable time source.
//!
//! Every timer in the crate (engine ticks, policy check intervals, cooldowns,
//! movement timeouts, the retaliation deadline) goes through [`Clock`], so
//! tests can drive virtual time instead of waiting on the wall clock.
//!
//! - [`TokioClock`] delegates to `tokio::time` and therefore honours
//!   `tokio::time::pause`/`advance` in tests.
//! - [`ManualClock`] only moves when [`ManualClock::advance`] is called.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Source of monotonic time, wall time and sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic now.
    fn now(&self) -> Instant;

    /// Wall-clock now, used for history timestamps.
    fn wall(&self) -> DateTime<Utc>;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock advanced explicitly.
///
/// Sleepers are woken whenever [`advance`](ManualClock::advance) moves time
/// past their deadline.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    elapsed: Mutex<Duration>,
    tick: Notify,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: Utc::now(),
            elapsed: Mutex::new(Duration::ZERO),
            tick: Notify::new(),
        }
    }

    /// Move virtual time forward and wake every sleeper.
    pub fn advance(&self, by: Duration) {
        {
            let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
            *elapsed += by;
        }
        self.tick.notify_waiters();
    }

    /// Virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + offset
    }

    async fn sleep(&self, duration: Duration) {
        let deadline = self.now() + duration;
        loop {
            let notified = self.tick.notified();
            tokio::pin!(notified);
            // Register interest before re-checking so an advance in between is not lost.
            notified.as_mut().enable();
            if self.now() >= deadline {
                return;
            }
            notified.await;
        }
    }
}

/// Run `fut` to completion unless `limit` elapses first on `clock`.
///
/// Returns `None` on timeout; the future is dropped in that case.
pub async fn with_timeout<F>(clock: &dyn Clock, limit: Duration, fut: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        output = fut => Some(output),
        _ = clock.sleep(limit) => None,
    }
}
