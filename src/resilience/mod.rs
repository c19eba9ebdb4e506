//! 弹性模式模块：在途请求合并与带退避的有界重试。
//!
//! # Resilience Primitives Module
//!
//! Generation calls are slow, costly and non-deterministic. This module keeps them from
//! being repeated by accident.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`coalescer`] | At most one concurrent invocation per digest; all callers share the result |
//! | [`retry`] | Bounded exponential backoff on timeout-class failures with progress events |
//!
//! ## Coalescing
//!
//! ```rust
//! use workout_planner::cache::{digest, RequestDescriptor};
//! use workout_planner::resilience::coalescer::Coalescer;
//!
//! # async fn demo() -> workout_planner::Result<()> {
//! let coalescer = Coalescer::<String>::new();
//! let d = digest(&RequestDescriptor::new("POST", "/api/workouts/generate").canonicalize(), "v2");
//! let (a, b) = tokio::join!(
//!     coalescer.run(&d, || async { Ok("plan".to_string()) }),
//!     coalescer.run(&d, || async { Ok("never runs".to_string()) }),
//! );
//! assert_eq!(a?, b?);
//! # Ok(())
//! # }
//! ```

pub mod coalescer;
pub mod retry;

pub use coalescer::{Coalescer, Role};
pub use retry::{
    GenerationStage, ProgressEvent, ProgressObserver, RetryConfig, RetryOrchestrator,
    RetryOutcome, RetryState,
};
