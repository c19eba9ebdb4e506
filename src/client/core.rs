use super::profile::ProfileProvider;
use crate::cache::{
    CacheKey, CacheKeyGenerator, CacheManager, CacheStats, KeyPattern, OperationKind,
    RequestDescriptor,
};
use crate::config::PlannerConfig;
use crate::generation::{
    FindOptions, GeneratedWorkout, GenerationRequest, IdempotentGenerationHandler, OwnerProfile,
    RecordFilter, WorkoutRequest,
};
use crate::resilience::{Coalescer, ProgressObserver};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const PROFILE_PATH: &str = "/api/profile";
pub const HISTORY_PATH: &str = "/api/workouts/history";

/// Caller-facing planner: cached reads, in-flight coalescing and idempotent generation.
pub struct PlanClient {
    pub(crate) config: PlannerConfig,
    pub(crate) handler: Arc<IdempotentGenerationHandler>,
    pub(crate) profiles: Arc<dyn ProfileProvider>,
    pub(crate) cache: Arc<CacheManager>,
    pub(crate) keys: CacheKeyGenerator,
    pub(crate) coalescer: Coalescer<GeneratedWorkout>,
}

impl PlanClient {
    pub fn builder() -> super::PlanClientBuilder {
        super::PlanClientBuilder::new()
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Requests a plan for `owner_id`.
    ///
    /// Identical requests are answered from the TTL cache, merged with an identical call
    /// already in flight, or replayed from the record store, in that order. Only when all
    /// three miss is the backend called.
    pub async fn request_plan(
        &self,
        owner_id: &str,
        request: &WorkoutRequest,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<GeneratedWorkout> {
        request.validate()?;
        let profile = self.profile(owner_id).await?;
        let resolved = GenerationRequest::resolve(&profile, request);
        resolved.validate()?;

        let key = self.keys.generate(&resolved.descriptor());
        if let Some(mut cached) = self.cache.get::<GeneratedWorkout>(&key) {
            debug!(owner_id, digest = key.digest.short(), "plan cache hit");
            cached.deduped = true;
            cached.attempts = 0;
            return Ok(cached);
        }
        debug!(owner_id, digest = key.digest.short(), "plan cache miss");

        // Settles inside the shared operation, so the result is cached even when the
        // caller that started it has gone away.
        let handler = Arc::clone(&self.handler);
        let cache = Arc::clone(&self.cache);
        let plan_key = key.clone();
        self.coalescer
            .run(&key.digest, move || async move {
                let workout = handler.handle(&resolved, observer.as_deref()).await?;
                store_in_cache(&cache, &plan_key, &workout, OperationKind::Plan);
                if !workout.deduped {
                    cache.invalidate(KeyPattern::Prefix(HISTORY_PATH.to_string()));
                }
                Ok(workout)
            })
            .await
    }

    /// Profile for `owner_id`, cached for the profile TTL.
    pub async fn profile(&self, owner_id: &str) -> Result<OwnerProfile> {
        let key = self.profile_key(owner_id);
        if let Some(profile) = self.cache.get::<OwnerProfile>(&key) {
            return Ok(profile);
        }
        let profile = self
            .profiles
            .fetch_profile(owner_id)
            .await?
            .ok_or_else(|| Error::profile_incomplete(owner_id))?;
        store_in_cache(&self.cache, &key, &profile, OperationKind::Profile);
        Ok(profile)
    }

    /// Drops the cached profile so the next request sees the update.
    pub fn on_profile_updated(&self, owner_id: &str) -> usize {
        let key = self.profile_key(owner_id);
        self.cache.invalidate(KeyPattern::Contains(key.digest.as_str().to_string()))
    }

    /// Most recent plans for `owner_id`, newest first.
    pub async fn recent_plans(&self, owner_id: &str, limit: usize) -> Result<Vec<GeneratedWorkout>> {
        let key = self.keys.generate(
            &RequestDescriptor::new("GET", HISTORY_PATH)
                .param("ownerId", owner_id)
                .param("limit", limit),
        );
        if let Some(plans) = self.cache.get::<Vec<GeneratedWorkout>>(&key) {
            return Ok(plans);
        }
        let records = self
            .handler
            .store()
            .find(&RecordFilter::new().with_owner(owner_id), FindOptions::newest(limit))
            .await?;
        let plans: Vec<GeneratedWorkout> =
            records.into_iter().map(GeneratedWorkout::from_record).collect();
        store_in_cache(&self.cache, &key, &plans, OperationKind::History);
        Ok(plans)
    }

    /// A stored plan by id, provided it belongs to `owner_id`.
    pub async fn workout(&self, owner_id: &str, id: Uuid) -> Result<Option<GeneratedWorkout>> {
        let record = self.handler.store().find_by_id(id).await?;
        Ok(record
            .filter(|r| r.owner_id == owner_id)
            .map(GeneratedWorkout::from_record))
    }

    pub fn invalidate(&self, pattern: impl Into<KeyPattern>) -> usize {
        self.cache.invalidate(pattern)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of distinct generations currently running.
    pub fn in_flight(&self) -> usize {
        self.coalescer.in_flight_len()
    }

    fn profile_key(&self, owner_id: &str) -> CacheKey {
        self.keys
            .generate(&RequestDescriptor::new("GET", PROFILE_PATH).param("ownerId", owner_id))
    }
}

fn store_in_cache<T: serde::Serialize>(
    cache: &CacheManager,
    key: &CacheKey,
    value: &T,
    kind: OperationKind,
) {
    if let Err(e) = cache.put(key, value, kind) {
        warn!(digest = key.digest.short(), error = %e, "failed to cache value");
    }
}
