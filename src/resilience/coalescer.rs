//! In-flight request coalescing.

use crate::cache::DedupDigest;
use crate::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;
type InFlightMap<T> = Arc<Mutex<HashMap<DedupDigest, InFlightEntry<T>>>>;

struct InFlightEntry<T: Clone> {
    id: u64,
    result: SharedResult<T>,
}

fn lock_map<T: Clone>(
    map: &Mutex<HashMap<DedupDigest, InFlightEntry<T>>>,
) -> MutexGuard<'_, HashMap<DedupDigest, InFlightEntry<T>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the owning entry when the operation settles, on every exit path
/// (completion, panic, or the shared future being dropped).
struct Settle<T: Clone> {
    map: InFlightMap<T>,
    digest: DedupDigest,
    id: u64,
}

impl<T: Clone> Drop for Settle<T> {
    fn drop(&mut self) {
        let mut map = lock_map(&self.map);
        if map.get(&self.digest).map(|e| e.id) == Some(self.id) {
            map.remove(&self.digest);
        }
    }
}

/// Whether a caller started the operation or attached to one already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

/// Merges concurrent operations that share a digest into one invocation.
///
/// The check-then-insert on the in-flight map happens under one lock, so at most one
/// invocation per digest is running at any time. Every attached caller receives a clone
/// of the same `Result`. The entry is removed before the result is handed out, so a call
/// made after settlement starts a fresh invocation.
///
/// A caller that stops waiting does not cancel the operation while other callers are still
/// attached; the map itself holds a handle, so the next caller for the digest resumes it.
pub struct Coalescer<T: Clone> {
    in_flight: InFlightMap<T>,
    next_id: AtomicU64,
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub async fn run<F, Fut>(&self, digest: &DedupDigest, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.run_with_role(digest, operation).await.0
    }

    pub async fn run_with_role<F, Fut>(&self, digest: &DedupDigest, operation: F) -> (Result<T>, Role)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (shared, role) = {
            let mut map = lock_map(&self.in_flight);
            if let Some(entry) = map.get(digest) {
                debug!(digest = digest.short(), "joined in-flight operation");
                (entry.result.clone(), Role::Follower)
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let settle = Settle {
                    map: Arc::clone(&self.in_flight),
                    digest: digest.clone(),
                    id,
                };
                let result = async move {
                    let outcome = AssertUnwindSafe(operation()).catch_unwind().await;
                    drop(settle);
                    match outcome {
                        Ok(result) => result,
                        Err(panic) => std::panic::resume_unwind(panic),
                    }
                }
                .boxed()
                .shared();
                map.insert(
                    digest.clone(),
                    InFlightEntry {
                        id,
                        result: result.clone(),
                    },
                );
                (result, Role::Leader)
            }
        };
        (shared.await, role)
    }

    pub fn is_in_flight(&self, digest: &DedupDigest) -> bool {
        lock_map(&self.in_flight).contains_key(digest)
    }

    pub fn in_flight_len(&self) -> usize {
        lock_map(&self.in_flight).len()
    }
}

impl<T> Default for Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
