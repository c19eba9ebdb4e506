//! Time sources for TTL checks, record timestamps and backoff waits.
//!
//! Components take an `Arc<dyn Clock>` instead of reading the system time directly so
//! that tests can advance virtual time rather than sleep.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic instant used for TTL arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock time used for persisted timestamps.
    fn wall_time(&self) -> SystemTime;

    /// Timed suspension. Dropping the returned future cancels the wait.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer.
///
/// Honours `tokio::time::pause()`, so `#[tokio::test(start_paused = true)]` tests run
/// backoff waits in virtual time.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn wall_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct ManualState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

/// Manually driven clock for tests.
///
/// `sleep` yields once to the scheduler, then advances the clock by the requested duration
/// and records it, which makes backoff schedules observable. A sleep dropped before that
/// point leaves the clock untouched, so a deadline raced against work that finishes within
/// one scheduler turn never fires.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    wall_base: SystemTime,
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            wall_base: SystemTime::now(),
            state: Mutex::new(ManualState {
                offset: Duration::ZERO,
                sleeps: Vec::new(),
            }),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.offset += by;
    }

    /// Total virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offset
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sleeps
            .clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn wall_time(&self) -> SystemTime {
        self.wall_base + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::task::yield_now().await;
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.offset += duration;
        st.sleeps.push(duration);
    }
}
