use super::core::PlanClient;
use super::profile::{ProfileProvider, StaticProfiles};
use crate::cache::{CacheKeyGenerator, CacheManager};
use crate::clock::{Clock, TokioClock};
use crate::config::PlannerConfig;
use crate::generation::{
    GenerationBackend, GenerationStore, HttpGenerationBackend, IdempotentGenerationHandler,
    InMemoryGenerationStore,
};
use crate::resilience::Coalescer;
use crate::Result;
use std::sync::Arc;

/// Builder for [`PlanClient`].
///
/// Anything not set falls back to: the HTTP backend from `config.backend`, an in-memory
/// record store, an empty profile table and the tokio clock.
pub struct PlanClientBuilder {
    config: PlannerConfig,
    backend: Option<Arc<dyn GenerationBackend>>,
    store: Option<Arc<dyn GenerationStore>>,
    profiles: Option<Arc<dyn ProfileProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PlanClientBuilder {
    pub fn new() -> Self {
        Self {
            config: PlannerConfig::default(),
            backend: None,
            store: None,
            profiles: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Applies `WORKOUT_PLANNER_*` environment overrides to the current config.
    pub fn with_env(mut self) -> Result<Self> {
        self.config = self.config.with_env_overrides()?;
        Ok(self)
    }

    pub fn contract_version(mut self, version: impl Into<String>) -> Self {
        self.config.contract_version = version.into();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn store(mut self, store: Arc<dyn GenerationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn profiles(mut self, profiles: Arc<dyn ProfileProvider>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Clock for cache TTLs, record timestamps and backoff waits.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<PlanClient> {
        self.config.validate()?;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let backend: Arc<dyn GenerationBackend> = match self.backend {
            Some(b) => b,
            None => Arc::new(HttpGenerationBackend::new(&self.config.backend)?),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryGenerationStore::new()));
        let profiles = self
            .profiles
            .unwrap_or_else(|| Arc::new(StaticProfiles::new()));

        let handler =
            IdempotentGenerationHandler::new(backend, store, &self.config, Arc::clone(&clock));
        Ok(PlanClient {
            cache: Arc::new(CacheManager::new(self.config.cache.clone(), clock)),
            keys: CacheKeyGenerator::new(self.config.contract_version.clone()),
            handler: Arc::new(handler),
            profiles,
            coalescer: Coalescer::new(),
            config: self.config,
        })
    }
}

impl Default for PlanClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
