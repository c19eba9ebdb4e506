//! Retry Orchestrator
//!
//! Wraps one slow, fallible generation call with bounded exponential backoff. Only
//! timeout-class failures are retried; everything else stops immediately.
//!
//! ```text
//! Attempting(1) ──ok──────────────▶ Success
//!      │ retryable && n < max
//!      ▼
//!   Waiting{n, base·2ⁿ} ──▶ Attempting(n+1)
//!      │ terminal or n == max
//!      ▼
//!    Failed
//! ```

use crate::cache::duration_secs;
use crate::clock::Clock;
use crate::error_code::FailureClass;
use crate::generation::BackendFailure;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry logic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    /// Upper bound for a single attempt; an elapsed attempt counts as a timeout.
    #[serde(with = "optional_secs")]
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            attempt_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }
    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }
    pub fn with_attempt_timeout(mut self, d: Option<Duration>) -> Self {
        self.attempt_timeout = d;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

pub(crate) mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => super::duration_secs::serialize(d, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

/// Coarse progress stage a caller can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Queued,
    Generating,
    Retrying,
    Normalizing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub attempt: u32,
    pub max_attempts: u32,
    pub stage: GenerationStage,
    /// Wait before the next attempt, for `Retrying`.
    pub delay: Option<Duration>,
    pub failure: Option<FailureClass>,
}

impl ProgressEvent {
    pub fn new(attempt: u32, max_attempts: u32, stage: GenerationStage) -> Self {
        Self {
            attempt,
            max_attempts,
            stage,
            delay: None,
            failure: None,
        }
    }
}

/// Receives progress notifications. Must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// States of one orchestrated call. `Success` and `Failed` are terminal.
#[derive(Debug)]
pub enum RetryState<T> {
    Attempting(u32),
    Waiting { attempt: u32, delay: Duration },
    Success { value: T, attempts: u32 },
    Failed { failure: BackendFailure, attempts: u32 },
}

impl<T> RetryState<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Success { .. } | RetryState::Failed { .. })
    }
}

/// A successful value and the attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

pub struct RetryOrchestrator {
    config: RetryConfig,
    clock: Arc<dyn Clock>,
}

impl RetryOrchestrator {
    pub fn new(config: RetryConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Wait after failed attempt `attempt` (1-based): `base * 2^attempt`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay.as_millis() as u64;
        let cap = self.config.max_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor).min(cap))
    }

    /// Runs `op` until it succeeds, fails terminally, or the attempt cap is reached.
    ///
    /// `op` receives the 1-based attempt number. Terminal failures are converted into
    /// the typed [`Error`](crate::Error) for their class, annotated with the attempt count.
    pub async fn execute<T, F, Fut>(
        &self,
        mut op: F,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<RetryOutcome<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, BackendFailure>>,
    {
        let max = self.config.max_attempts.max(1);
        let notify = |event: ProgressEvent| {
            if let Some(o) = observer {
                o.on_progress(&event);
            }
        };

        let mut state = RetryState::Attempting(1);
        loop {
            state = match state {
                RetryState::Attempting(n) => {
                    notify(ProgressEvent::new(n, max, GenerationStage::Generating));
                    match self.attempt(&mut op, n).await {
                        Ok(value) => RetryState::Success { value, attempts: n },
                        Err(failure) if failure.class.retryable() && n < max => {
                            let delay = self.backoff(n);
                            warn!(
                                attempt = n,
                                max_attempts = max,
                                delay_ms = delay.as_millis() as u64,
                                class = failure.class.name(),
                                "generation attempt failed, retrying"
                            );
                            notify(ProgressEvent {
                                delay: Some(delay),
                                failure: Some(failure.class),
                                ..ProgressEvent::new(n, max, GenerationStage::Retrying)
                            });
                            RetryState::Waiting { attempt: n, delay }
                        }
                        Err(failure) => RetryState::Failed {
                            failure,
                            attempts: n,
                        },
                    }
                }
                RetryState::Waiting { attempt, delay } => {
                    self.clock.sleep(delay).await;
                    RetryState::Attempting(attempt + 1)
                }
                RetryState::Success { value, attempts } => {
                    debug!(attempts, "generation attempt succeeded");
                    return Ok(RetryOutcome { value, attempts });
                }
                RetryState::Failed { failure, attempts } => {
                    notify(ProgressEvent {
                        failure: Some(failure.class),
                        ..ProgressEvent::new(attempts, max, GenerationStage::Failed)
                    });
                    return Err(failure.into_error(attempts));
                }
            };
        }
    }

    async fn attempt<T, F, Fut>(&self, op: &mut F, n: u32) -> std::result::Result<T, BackendFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, BackendFailure>>,
    {
        let Some(limit) = self.config.attempt_timeout else {
            return op(n).await;
        };
        // The deadline runs on the injected clock, same as the backoff waits.
        tokio::select! {
            biased;
            result = op(n) => result,
            _ = self.clock.sleep(limit) => Err(BackendFailure::new(
                FailureClass::Timeout,
                format!("attempt {} exceeded {:?}", n, limit),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn orchestrator(clock: Arc<ManualClock>) -> RetryOrchestrator {
        RetryOrchestrator::new(
            RetryConfig::new()
                .with_base_delay(Duration::from_millis(100))
                .with_attempt_timeout(None),
            clock,
        )
    }

    #[tokio::test]
    async fn backoff_doubles_per_attempt_and_stops_at_cap() {
        let clock = Arc::new(ManualClock::new());
        let retry = orchestrator(clock.clone());
        let calls = AtomicU32::new(0);

        let result: Result<RetryOutcome<()>> = retry
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(BackendFailure::new(FailureClass::Timeout, "slow")) }
                },
                None,
            )
            .await;

        assert!(matches!(result, Err(Error::GenerationTimeout { attempts: 3 })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(200), Duration::from_millis(400)]
        );
    }

    #[tokio::test]
    async fn terminal_failure_is_not_retried() {
        let clock = Arc::new(ManualClock::new());
        let retry = orchestrator(clock.clone());
        let calls = AtomicU32::new(0);

        let result: Result<RetryOutcome<()>> = retry
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(BackendFailure::new(FailureClass::ServerFault, "500")) }
                },
                None,
            )
            .await;

        match result {
            Err(Error::UpstreamUnavailable { class, attempts, .. }) => {
                assert_eq!(class, FailureClass::ServerFault);
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn succeeds_after_transient_timeouts_and_reports_progress() {
        let clock = Arc::new(ManualClock::new());
        let retry = orchestrator(clock);
        let events = Mutex::new(Vec::new());
        let observer = |e: &ProgressEvent| events.lock().unwrap().push(e.clone());

        let outcome = retry
            .execute(
                |n| async move {
                    if n < 3 {
                        Err(BackendFailure::new(FailureClass::Timeout, "slow"))
                    } else {
                        Ok("plan")
                    }
                },
                Some(&observer as &dyn ProgressObserver),
            )
            .await
            .unwrap();

        assert_eq!(outcome, RetryOutcome { value: "plan", attempts: 3 });
        let stages: Vec<_> = events.lock().unwrap().iter().map(|e| (e.attempt, e.stage)).collect();
        assert_eq!(
            stages,
            vec![
                (1, GenerationStage::Generating),
                (1, GenerationStage::Retrying),
                (2, GenerationStage::Generating),
                (2, GenerationStage::Retrying),
                (3, GenerationStage::Generating),
            ]
        );
        assert_eq!(events.lock().unwrap()[1].delay, Some(Duration::from_millis(200)));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_attempt_counts_as_timeout() {
        let retry = RetryOrchestrator::new(
            RetryConfig::new()
                .with_max_attempts(2)
                .with_base_delay(Duration::from_millis(10))
                .with_attempt_timeout(Some(Duration::from_secs(5))),
            Arc::new(crate::clock::TokioClock),
        );
        let result: Result<RetryOutcome<()>> = retry
            .execute(
                |_| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::GenerationTimeout { attempts: 2 })));
    }

    #[tokio::test]
    async fn attempt_deadline_follows_injected_clock() {
        let clock = Arc::new(ManualClock::new());
        let retry = RetryOrchestrator::new(
            RetryConfig::new()
                .with_base_delay(Duration::from_millis(100))
                .with_attempt_timeout(Some(Duration::from_secs(5))),
            clock.clone(),
        );
        let outcome = retry
            .execute(
                |n| async move {
                    if n < 3 {
                        std::future::pending::<()>().await;
                    }
                    Ok::<u32, BackendFailure>(n)
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!((outcome.value, outcome.attempts), (3, 3));
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(5),
                Duration::from_millis(200),
                Duration::from_secs(5),
                Duration::from_millis(400),
            ]
        );
    }

    #[test]
    fn backoff_is_capped() {
        let retry = RetryOrchestrator::new(
            RetryConfig::new()
                .with_base_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(5)),
            Arc::new(ManualClock::new()),
        );
        assert_eq!(retry.backoff(1), Duration::from_secs(2));
        assert_eq!(retry.backoff(2), Duration::from_secs(4));
        assert_eq!(retry.backoff(3), Duration::from_secs(5));
        assert_eq!(retry.backoff(200), Duration::from_secs(5));
    }

    #[test]
    fn terminal_states() {
        assert!(!RetryState::<()>::Attempting(1).is_terminal());
        assert!(RetryState::Success { value: (), attempts: 1 }.is_terminal());
    }
}
