//! In-process generation backends that count calls

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use workout_planner::client::{ProfileProvider, StaticProfiles};
use workout_planner::clock::Clock;
use workout_planner::generation::{BackendFailure, GenerationBackend, GenerationHints};
use workout_planner::resilience::RetryConfig;
use workout_planner::{OwnerProfile, PlanClient, PlannerConfig};

/// Profile source that records which owners were fetched.
pub struct CountingProfiles {
    inner: Arc<StaticProfiles>,
    fetched: Mutex<Vec<String>>,
}

impl CountingProfiles {
    pub fn new(inner: Arc<StaticProfiles>) -> Self {
        Self {
            inner,
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fetches(&self, owner_id: &str) -> usize {
        self.fetched.lock().unwrap().iter().filter(|o| *o == owner_id).count()
    }
}

#[async_trait]
impl ProfileProvider for CountingProfiles {
    async fn fetch_profile(&self, owner_id: &str) -> workout_planner::Result<Option<OwnerProfile>> {
        self.fetched.lock().unwrap().push(owner_id.to_string());
        self.inner.fetch_profile(owner_id).await
    }
}

pub fn leg_day() -> Value {
    json!({
        "title": "Bodyweight Legs",
        "warmUp": [{"name": "Leg Swings", "duration": "30s"}, "Bodyweight Good Morning"],
        "blocks": [
            {"name": "Strength", "exercises": [
                {"name": "Bodyweight Squat", "sets": [{"reps": 15, "rest": "60s"}, {"reps": 12}, {"reps": 10}]},
                {"name": "Reverse Lunge"}
            ]}
        ],
        "finisher": [{"name": "Jump Squats", "duration": "45s"}],
        "coolDown": ["Quad Stretch", {"name": "Hamstring Stretch", "duration": 40}]
    })
}

/// Backend that counts invocations, optionally waits, and replays a failure script first.
pub struct CountingBackend {
    calls: AtomicUsize,
    delay: Duration,
    script: Mutex<VecDeque<Result<Value, BackendFailure>>>,
    plan: Value,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            plan: leg_day(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_script(self, script: Vec<Result<Value, BackendFailure>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn with_plan(mut self, plan: Value) -> Self {
        self.plan = plan;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for CountingBackend {
    async fn generate(
        &self,
        _prompt: &str,
        _hints: &GenerationHints,
    ) -> Result<Value, BackendFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.plan.clone()))
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

pub fn test_config(version: &str) -> PlannerConfig {
    let mut cfg = PlannerConfig::default();
    cfg.contract_version = version.to_string();
    cfg.retry = RetryConfig::new()
        .with_base_delay(Duration::from_millis(100))
        .with_attempt_timeout(None);
    cfg
}

pub fn profiles() -> Arc<StaticProfiles> {
    Arc::new(
        StaticProfiles::new()
            .with_profile(OwnerProfile::new("alice", "beginner").with_goals(vec!["strength".into()]))
            .with_profile(OwnerProfile::new("bob", "advanced")),
    )
}

pub fn planner(backend: Arc<CountingBackend>, clock: Arc<dyn Clock>, config: PlannerConfig) -> PlanClient {
    PlanClient::builder()
        .config(config)
        .backend(backend)
        .profiles(profiles())
        .clock(clock)
        .build()
        .expect("client builds")
}
