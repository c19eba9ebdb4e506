//! Caller-facing planner client.
//!
//! Keeps the public surface small: build a [`PlanClient`], then call
//! [`PlanClient::request_plan`]. Implementation details live under `src/client/`.

pub mod builder;
pub mod core;
pub mod profile;

pub use builder::PlanClientBuilder;
pub use core::{PlanClient, HISTORY_PATH, PROFILE_PATH};
pub use profile::{ProfileProvider, StaticProfiles};
