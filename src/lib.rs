//! # workout-planner
//!
//! 这是 AI 训练计划生成的核心管线：请求规范化、去重摘要、TTL 缓存、在途合并、有界重试与幂等生成。
//!
//! Caching, deduplication and idempotent-generation pipeline that sits between callers
//! and a slow, costly, non-deterministic plan generator.
//!
//! ## Overview
//!
//! A workout request is reduced to a canonical key, hashed together with the prompt
//! contract version, and then answered by the cheapest source available:
//!
//! 1. the client-side TTL cache,
//! 2. an identical generation already in flight,
//! 3. a stored generation record for the same owner, digest and contract version,
//! 4. the generation backend, wrapped in bounded retries, with the result normalized
//!    and persisted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workout_planner::client::StaticProfiles;
//! use workout_planner::generation::{OwnerProfile, WorkoutRequest};
//! use workout_planner::{PlanClient, PlannerConfig};
//!
//! #[tokio::main]
//! async fn main() -> workout_planner::Result<()> {
//!     let profiles = StaticProfiles::new().with_profile(OwnerProfile::new("u1", "beginner"));
//!     let client = PlanClient::builder()
//!         .config(PlannerConfig::from_env()?)
//!         .profiles(Arc::new(profiles))
//!         .build()?;
//!
//!     let request = WorkoutRequest::new("Legs", 30).with_equipment(["bodyweight"]);
//!     let workout = client.request_plan("u1", &request, None).await?;
//!     println!("{} ({} exercises)", workout.workout_id, workout.plan.exercise_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Canonical keys, dedup digests, TTL cache and statistics |
//! | [`resilience`] | In-flight coalescing and retry with backoff |
//! | [`generation`] | Backend seam, HTTP backend, record store, idempotent handler |
//! | [`plan`] | Normalization of loose backend output into the plan contract |
//! | [`client`] | [`PlanClient`] and its builder |
//! | [`config`] | YAML and environment configuration |
//! | [`clock`] | Real and manual time sources |

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod error_code;
pub mod generation;
pub mod plan;
pub mod resilience;

// Re-export main types for convenience
pub use client::{PlanClient, PlanClientBuilder};
pub use config::PlannerConfig;
pub use error_code::FailureClass;
pub use generation::{GeneratedWorkout, OwnerProfile, WorkoutRequest};
pub use plan::NormalizedPlan;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
