//! 计划生成模块：生成后端接口、请求构造、记录存储与幂等处理。
//!
//! # Generation Module
//!
//! Everything between a resolved request and a stored, normalized plan.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`backend`] | [`GenerationBackend`] seam and [`BackendFailure`] classification |
//! | [`http`] | reqwest-based backend for a remote generator |
//! | [`prompt`] | [`WorkoutRequest`], [`OwnerProfile`] and the merged [`GenerationRequest`] |
//! | [`store`] | [`GenerationRecord`] persistence behind [`GenerationStore`] |
//! | [`handler`] | [`IdempotentGenerationHandler`]: replay or generate |

pub mod backend;
pub mod handler;
pub mod http;
pub mod prompt;
pub mod store;

pub use backend::{BackendFailure, GenerationBackend, GenerationHints};
pub use handler::{GeneratedWorkout, IdempotentGenerationHandler};
pub use http::HttpGenerationBackend;
pub use prompt::{GenerationRequest, OwnerProfile, WorkoutRequest};
pub use store::{
    FindOptions, GenerationRecord, GenerationStore, InMemoryGenerationStore, RecordFilter,
    SortOrder,
};
