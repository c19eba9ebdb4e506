//! Planner configuration.
//!
//! Loaded from YAML (every field optional) and then overridden from the environment:
//!
//! - `WORKOUT_PLANNER_CONTRACT_VERSION`
//! - `WORKOUT_PLANNER_MAX_ATTEMPTS`
//! - `WORKOUT_PLANNER_BACKOFF_BASE_MS`
//! - `WORKOUT_PLANNER_PLAN_TTL_SECS`
//! - `WORKOUT_PLANNER_BACKEND_URL`
//! - `WORKOUT_PLANNER_BACKEND_TIMEOUT_SECS`

use crate::cache::{duration_secs, CacheConfig};
use crate::resilience::retry::optional_secs;
use crate::resilience::RetryConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONTRACT_VERSION: &str = "v2";
pub const API_KEY_ENV: &str = "WORKOUT_PLANNER_BACKEND_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Only replay records younger than this. `None` replays forever.
    #[serde(with = "optional_secs")]
    pub replay_window: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Option<String>,
    /// Read from `WORKOUT_PLANNER_BACKEND_API_KEY` when unset.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Transport-level timeout for one HTTP call.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub proxy_url: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout: Duration::from_secs(120),
            proxy_url: None,
        }
    }
}

impl BackendConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Prompt/response contract version. Bumping it invalidates every stored replay.
    pub contract_version: String,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub idempotency: IdempotencyConfig,
    pub backend: BackendConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            contract_version: DEFAULT_CONTRACT_VERSION.to_string(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            idempotency: IdempotencyConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl PlannerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("failed to read config: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies `WORKOUT_PLANNER_*` overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("WORKOUT_PLANNER_CONTRACT_VERSION") {
            self.contract_version = v.trim().to_string();
        }
        if let Some(n) = parse_env::<u32, _>(&lookup, "WORKOUT_PLANNER_MAX_ATTEMPTS")? {
            self.retry.max_attempts = n;
        }
        if let Some(ms) = parse_env::<u64, _>(&lookup, "WORKOUT_PLANNER_BACKOFF_BASE_MS")? {
            self.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_env::<u64, _>(&lookup, "WORKOUT_PLANNER_PLAN_TTL_SECS")? {
            self.cache.plan_ttl = Duration::from_secs(secs);
        }
        if let Some(url) = lookup("WORKOUT_PLANNER_BACKEND_URL").filter(|s| !s.trim().is_empty()) {
            self.backend.url = Some(url.trim().to_string());
        }
        if let Some(url) = lookup("WORKOUT_PLANNER_PROXY_URL").filter(|s| !s.trim().is_empty()) {
            self.backend.proxy_url = Some(url.trim().to_string());
        }
        if let Some(secs) = parse_env::<u64, _>(&lookup, "WORKOUT_PLANNER_BACKEND_TIMEOUT_SECS")? {
            self.backend.timeout = Duration::from_secs(secs.max(1));
        }
        if self.backend.api_key.is_none() {
            self.backend.api_key = lookup(API_KEY_ENV).filter(|s| !s.is_empty());
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.contract_version.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "contract version must not be empty",
                ErrorContext::new().with_field_path("contract_version"),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::configuration_with_context(
                "max_attempts must be at least 1",
                ErrorContext::new().with_field_path("retry.max_attempts"),
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(Error::configuration_with_context(
                "max_delay must not be shorter than base_delay",
                ErrorContext::new().with_field_path("retry.max_delay"),
            ));
        }
        if let Some(raw) = &self.backend.url {
            let parsed = url::Url::parse(raw).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid backend url: {}", e),
                    ErrorContext::new()
                        .with_field_path("backend.url")
                        .with_details(raw.clone()),
                )
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::configuration_with_context(
                    "backend url must use http or https",
                    ErrorContext::new()
                        .with_field_path("backend.url")
                        .with_details(raw.clone()),
                ));
            }
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                format!("{} is not a valid number", name),
                ErrorContext::new()
                    .with_details(raw)
                    .with_source("environment"),
            )
        }),
    }
}
