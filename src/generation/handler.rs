//! Idempotent generation: replay a stored result for an identical request, otherwise
//! generate, normalize and persist.

use super::backend::GenerationBackend;
use super::prompt::GenerationRequest;
use super::store::{GenerationRecord, GenerationStore, RecordFilter};
use crate::cache::{CacheKeyGenerator, DedupDigest};
use crate::clock::Clock;
use crate::config::PlannerConfig;
use crate::plan::{normalize, NormalizedPlan};
use crate::resilience::{GenerationStage, ProgressEvent, ProgressObserver, RetryOrchestrator};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};
use uuid::Uuid;

/// Result handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWorkout {
    pub workout_id: Uuid,
    pub plan: NormalizedPlan,
    /// True when served from a stored record or the cache rather than a fresh generation.
    pub deduped: bool,
    /// Backend attempts made for this call; zero for replays.
    pub attempts: u32,
    pub digest: DedupDigest,
    pub created_at: SystemTime,
}

impl GeneratedWorkout {
    pub(crate) fn from_record(record: GenerationRecord) -> Self {
        Self {
            workout_id: record.id,
            plan: record.result_plan,
            deduped: true,
            attempts: 0,
            digest: record.dedup_digest,
            created_at: record.created_at,
        }
    }
}

pub struct IdempotentGenerationHandler {
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn GenerationStore>,
    retry: RetryOrchestrator,
    keys: CacheKeyGenerator,
    replay_window: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl IdempotentGenerationHandler {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn GenerationStore>,
        config: &PlannerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            store,
            retry: RetryOrchestrator::new(config.retry.clone(), Arc::clone(&clock)),
            keys: CacheKeyGenerator::new(config.contract_version.clone()),
            replay_window: config.idempotency.replay_window,
            clock,
        }
    }

    pub fn contract_version(&self) -> &str {
        self.keys.contract_version()
    }

    pub fn store(&self) -> &Arc<dyn GenerationStore> {
        &self.store
    }

    /// Digest identifying `request` under the current contract version.
    pub fn digest_for(&self, request: &GenerationRequest) -> DedupDigest {
        self.keys.generate(&request.descriptor()).digest
    }

    /// Returns the stored plan for an identical earlier request, or generates a new one.
    ///
    /// Two concurrent calls for the same digest may both miss the lookup and both reach the
    /// backend; wrap this handler in a [`Coalescer`](crate::resilience::Coalescer) to merge
    /// them within one process.
    pub async fn handle(
        &self,
        request: &GenerationRequest,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<GeneratedWorkout> {
        request.validate()?;
        let digest = self.digest_for(request);
        let version = self.keys.contract_version();
        let max = self.retry.config().max_attempts.max(1);
        let notify = |event: ProgressEvent| {
            if let Some(o) = observer {
                o.on_progress(&event);
            }
        };

        if let Some(record) = self.lookup(request, &digest).await? {
            info!(
                owner_id = %request.owner_id,
                digest = digest.short(),
                workout_id = %record.id,
                "idempotent replay"
            );
            notify(ProgressEvent::new(0, max, GenerationStage::Completed));
            return Ok(GeneratedWorkout::from_record(record));
        }

        notify(ProgressEvent::new(0, max, GenerationStage::Queued));
        let prompt = request.prompt();
        let hints = request.hints();
        let backend = &self.backend;
        let (prompt_ref, hints_ref) = (&prompt, &hints);
        let outcome = self
            .retry
            .execute(move |_| backend.generate(prompt_ref, hints_ref), observer)
            .await?;

        notify(ProgressEvent::new(outcome.attempts, max, GenerationStage::Normalizing));
        let plan = match normalize(&outcome.value) {
            Ok(plan) => plan,
            Err(e) => {
                notify(ProgressEvent::new(outcome.attempts, max, GenerationStage::Failed));
                return Err(e);
            }
        };

        let record = GenerationRecord::new(
            request.owner_id.clone(),
            digest.clone(),
            version,
            serde_json::to_value(request)?,
            plan,
            self.clock.wall_time(),
        );
        let workout = match self.store.create(record).await {
            Ok(created) => {
                info!(
                    owner_id = %request.owner_id,
                    digest = digest.short(),
                    workout_id = %created.id,
                    attempts = outcome.attempts,
                    backend = self.backend.name(),
                    "generated new plan"
                );
                GeneratedWorkout {
                    workout_id: created.id,
                    plan: created.result_plan,
                    deduped: false,
                    attempts: outcome.attempts,
                    digest: created.dedup_digest,
                    created_at: created.created_at,
                }
            }
            Err(Error::DuplicateRecordRace { digest: raced }) => {
                let filter = RecordFilter::idempotency_key(&request.owner_id, &digest, version);
                match self.store.find_one(&filter).await? {
                    Some(winner) => {
                        warn!(
                            owner_id = %request.owner_id,
                            digest = digest.short(),
                            workout_id = %winner.id,
                            "duplicate record race, returning existing record"
                        );
                        GeneratedWorkout::from_record(winner)
                    }
                    None => return Err(Error::DuplicateRecordRace { digest: raced }),
                }
            }
            Err(e) => return Err(e),
        };

        notify(ProgressEvent::new(outcome.attempts, max, GenerationStage::Completed));
        Ok(workout)
    }

    async fn lookup(
        &self,
        request: &GenerationRequest,
        digest: &DedupDigest,
    ) -> Result<Option<GenerationRecord>> {
        let mut filter =
            RecordFilter::idempotency_key(&request.owner_id, digest, self.keys.contract_version());
        if let Some(window) = self.replay_window {
            if let Some(cutoff) = self.clock.wall_time().checked_sub(window) {
                filter = filter.with_created_after(cutoff);
            }
        }
        self.store.find_one(&filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error_code::FailureClass;
    use crate::generation::{
        BackendFailure, FindOptions, GenerationHints, InMemoryGenerationStore, OwnerProfile,
        WorkoutRequest,
    };
    use crate::resilience::RetryConfig;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedBackend {
        calls: AtomicUsize,
        script: Mutex<VecDeque<std::result::Result<Value, BackendFailure>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<std::result::Result<Value, BackendFailure>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn legs_plan() -> Value {
        json!({
            "title": "Leg Day",
            "warmUp": [{"name": "Leg Swings", "duration": "30s"}],
            "main": [{"name": "Bodyweight Squat"}, {"name": "Walking Lunge", "sets": 3, "reps": 10}],
            "coolDown": ["Quad Stretch"]
        })
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(
            &self,
            _prompt: &str,
            _hints: &GenerationHints,
        ) -> std::result::Result<Value, BackendFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(legs_plan()))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn config(version: &str) -> PlannerConfig {
        let mut cfg = PlannerConfig::default();
        cfg.contract_version = version.to_string();
        cfg.retry = RetryConfig::new()
            .with_base_delay(Duration::from_millis(10))
            .with_attempt_timeout(None);
        cfg
    }

    fn request(owner: &str) -> GenerationRequest {
        GenerationRequest::resolve(
            &OwnerProfile::new(owner, "beginner"),
            &WorkoutRequest::new("Legs", 30).with_equipment(["bodyweight"]),
        )
    }

    fn handler(
        backend: Arc<ScriptedBackend>,
        store: Arc<dyn GenerationStore>,
        cfg: &PlannerConfig,
        clock: Arc<ManualClock>,
    ) -> IdempotentGenerationHandler {
        IdempotentGenerationHandler::new(backend, store, cfg, clock)
    }

    #[tokio::test]
    async fn second_identical_call_replays_without_backend() {
        let backend = ScriptedBackend::new(vec![]);
        let store = Arc::new(InMemoryGenerationStore::new());
        let h = handler(backend.clone(), store.clone(), &config("v2"), Arc::new(ManualClock::new()));

        let first = h.handle(&request("u1"), None).await.unwrap();
        let second = h.handle(&request("u1"), None).await.unwrap();

        assert_eq!(backend.calls(), 1);
        assert!(!first.deduped);
        assert!(second.deduped);
        assert_eq!(first.workout_id, second.workout_id);
        assert_eq!(
            serde_json::to_string(&first.plan).unwrap(),
            serde_json::to_string(&second.plan).unwrap()
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn contract_version_bump_regenerates() {
        let backend = ScriptedBackend::new(vec![]);
        let store: Arc<dyn GenerationStore> = Arc::new(InMemoryGenerationStore::new());
        let clock = Arc::new(ManualClock::new());

        let v2 = handler(backend.clone(), store.clone(), &config("v2"), clock.clone());
        let v3 = handler(backend.clone(), store.clone(), &config("v3"), clock);

        let a = v2.handle(&request("u1"), None).await.unwrap();
        let b = v3.handle(&request("u1"), None).await.unwrap();
        assert_eq!(backend.calls(), 2);
        assert!(!b.deduped);
        assert_ne!(a.digest, b.digest);
    }

    #[tokio::test]
    async fn owners_do_not_share_records() {
        let backend = ScriptedBackend::new(vec![]);
        let store = Arc::new(InMemoryGenerationStore::new());
        let h = handler(backend.clone(), store, &config("v2"), Arc::new(ManualClock::new()));

        h.handle(&request("u1"), None).await.unwrap();
        let other = h.handle(&request("u2"), None).await.unwrap();
        assert!(!other.deduped);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn replay_window_expires_old_records() {
        let backend = ScriptedBackend::new(vec![]);
        let store = Arc::new(InMemoryGenerationStore::new());
        let clock = Arc::new(ManualClock::new());
        let mut cfg = config("v2");
        cfg.idempotency.replay_window = Some(Duration::from_secs(3600));
        let h = handler(backend.clone(), store, &cfg, clock.clone());

        h.handle(&request("u1"), None).await.unwrap();
        clock.advance(Duration::from_secs(1800));
        assert!(h.handle(&request("u1"), None).await.unwrap().deduped);

        clock.advance(Duration::from_secs(3600));
        assert!(!h.handle(&request("u1"), None).await.unwrap().deduped);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn timeouts_are_retried_then_surface_with_attempt_count() {
        let timeout = || Err(BackendFailure::new(FailureClass::Timeout, "slow"));
        let backend = ScriptedBackend::new(vec![timeout(), timeout(), timeout()]);
        let store = Arc::new(InMemoryGenerationStore::new());
        let clock = Arc::new(ManualClock::new());
        let h = handler(backend.clone(), store.clone(), &config("v2"), clock.clone());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let events = events.clone();
            move |e: &ProgressEvent| events.lock().unwrap().push(e.stage)
        };
        let err = h.handle(&request("u1"), Some(&sink as &dyn ProgressObserver)).await.unwrap_err();

        assert!(matches!(err, Error::GenerationTimeout { attempts: 3 }));
        assert_eq!(backend.calls(), 3);
        assert!(store.is_empty());
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(20), Duration::from_millis(40)]
        );
        let stages = events.lock().unwrap().clone();
        assert_eq!(stages.first(), Some(&GenerationStage::Queued));
        assert_eq!(stages.last(), Some(&GenerationStage::Failed));
        assert_eq!(
            stages.iter().filter(|s| **s == GenerationStage::Retrying).count(),
            2
        );
    }

    #[tokio::test]
    async fn recovers_after_one_timeout() {
        let backend = ScriptedBackend::new(vec![Err(BackendFailure::new(FailureClass::Timeout, "slow"))]);
        let store = Arc::new(InMemoryGenerationStore::new());
        let h = handler(backend.clone(), store, &config("v2"), Arc::new(ManualClock::new()));

        let workout = h.handle(&request("u1"), None).await.unwrap();
        assert_eq!(workout.attempts, 2);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn empty_plan_is_not_stored() {
        let backend = ScriptedBackend::new(vec![Ok(json!({"title": "nothing"}))]);
        let store = Arc::new(InMemoryGenerationStore::new());
        let h = handler(backend, store.clone(), &config("v2"), Arc::new(ManualClock::new()));

        let err = h.handle(&request("u1"), None).await.unwrap_err();
        assert!(matches!(err, Error::EmptyPlan));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_backend() {
        let backend = ScriptedBackend::new(vec![]);
        let h = handler(
            backend.clone(),
            Arc::new(InMemoryGenerationStore::new()),
            &config("v2"),
            Arc::new(ManualClock::new()),
        );
        let mut req = request("u1");
        req.duration_minutes = 0;
        assert!(matches!(h.handle(&req, None).await, Err(Error::Validation { .. })));
        assert_eq!(backend.calls(), 0);
    }

    /// Unique-index store where another writer lands between our lookup and our create.
    struct RacingStore {
        inner: InMemoryGenerationStore,
        winner: Mutex<Option<GenerationRecord>>,
        raced: AtomicBool,
    }

    #[async_trait]
    impl GenerationStore for RacingStore {
        async fn find_one(&self, filter: &RecordFilter) -> Result<Option<GenerationRecord>> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let winner = self.winner.lock().unwrap().take();
                if let Some(w) = winner {
                    self.inner.create(w).await?;
                }
                return Ok(None);
            }
            self.inner.find_one(filter).await
        }

        async fn create(&self, record: GenerationRecord) -> Result<GenerationRecord> {
            self.inner.create(record).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<GenerationRecord>> {
            self.inner.find_by_id(id).await
        }

        async fn find(
            &self,
            filter: &RecordFilter,
            options: FindOptions,
        ) -> Result<Vec<GenerationRecord>> {
            self.inner.find(filter, options).await
        }

        fn name(&self) -> &'static str {
            "racing"
        }
    }

    #[tokio::test]
    async fn duplicate_race_returns_winning_record() {
        let backend = ScriptedBackend::new(vec![]);
        let clock = Arc::new(ManualClock::new());
        let cfg = config("v2");
        let req = request("u1");

        let keys = CacheKeyGenerator::new("v2");
        let winner = GenerationRecord::new(
            "u1",
            keys.generate(&req.descriptor()).digest,
            "v2",
            json!({}),
            normalize(&legs_plan()).unwrap(),
            clock.wall_time(),
        );
        let winner_id = winner.id;
        let store = Arc::new(RacingStore {
            inner: InMemoryGenerationStore::enforce_unique(),
            winner: Mutex::new(Some(winner)),
            raced: AtomicBool::new(false),
        });
        let h = handler(backend.clone(), store.clone(), &cfg, clock);

        let result = h.handle(&req, None).await.unwrap();
        assert_eq!(backend.calls(), 1);
        assert!(result.deduped);
        assert_eq!(result.workout_id, winner_id);
        assert_eq!(store.inner.len(), 1);
    }
}
