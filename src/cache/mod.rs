//! 请求缓存模块：规范化请求键、内容寻址摘要与 TTL 缓存。
//!
//! # Request Caching Module
//!
//! This module turns a request into a stable, content-addressed key and caches read
//! results under that key for a per-operation lifetime.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestDescriptor`] | Operation, path and parameters of one call |
//! | [`canonicalize`] | Order-independent [`CanonicalKey`] for a descriptor |
//! | [`digest()`] | SHA-256 [`DedupDigest`] of a canonical key and contract version |
//! | [`CacheKeyGenerator`] | Builds a [`CacheKey`] (digest + scope) for a contract version |
//! | [`TtlCache`] | Digest-keyed cache with lazy expiry and pattern invalidation |
//! | [`CacheManager`] | Typed JSON front with per-operation TTL and statistics |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use workout_planner::cache::{CacheConfig, CacheKeyGenerator, CacheManager, OperationKind, RequestDescriptor};
//! use workout_planner::clock::TokioClock;
//!
//! let keys = CacheKeyGenerator::new("v2");
//! let a = keys.generate(&RequestDescriptor::new("GET", "/api/catalogue").param("tags", vec!["b", "a"]));
//! let b = keys.generate(&RequestDescriptor::new("GET", "/api/catalogue").param("tags", vec!["a", "b"]));
//! assert_eq!(a, b);
//!
//! let cache = CacheManager::new(CacheConfig::default(), Arc::new(TokioClock));
//! cache.put(&a, &vec!["dumbbells"], OperationKind::Catalogue).unwrap();
//! assert_eq!(cache.get::<Vec<String>>(&b), Some(vec!["dumbbells".to_string()]));
//! ```

mod backend;
mod digest;
mod key;
mod manager;

pub use backend::{CacheEntry, KeyPattern, TtlCache};
pub use digest::{digest, DedupDigest};
pub use key::{canonicalize, CacheKey, CacheKeyGenerator, CanonicalKey, ParamValue, RequestDescriptor};
pub use manager::{CacheConfig, CacheManager, CacheStats, OperationKind};
pub(crate) use manager::duration_secs;
