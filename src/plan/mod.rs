//! 计划规范化模块：将生成后端的松散输出映射为固定的计划契约。
//!
//! # Plan Normalization Module
//!
//! The generation backend loosely separates warm-up, main and cool-down work and often
//! omits set data. This module reads that payload field by field ([`raw`]) and produces a
//! [`NormalizedPlan`] in which every exercise has at least one set and every set has reps
//! or a duration.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`raw`] | Tagged intermediate representation of the payload |
//! | [`category`] | Exercise category inference and default schemes |
//! | [`format`] | Rest/duration display and lenient parsing |
//! | [`normalize()`] | The normalizer itself |
//!
//! ```rust
//! use serde_json::json;
//! use workout_planner::plan::normalize;
//!
//! let plan = normalize(&json!({"main": [{"name": "Goblet Squat"}]})).unwrap();
//! assert_eq!(plan.main[0].sets, 3);
//! assert_eq!(plan.main[0].rest_display, "90s");
//! ```

pub mod category;
pub mod format;
mod normalize;
pub mod raw;
mod types;

pub use normalize::{normalize, normalize_raw};
pub use types::{
    Coaching, ExerciseCategory, ExerciseKind, NormalizedExercise, NormalizedPlan, SetEntry,
};
