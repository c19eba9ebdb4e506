//! In-flight coalescing under concurrent callers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use workout_planner::cache::{digest, RequestDescriptor};
use workout_planner::resilience::{Coalescer, Role};
use workout_planner::{Error, ErrorContext};

fn d(tag: &str) -> workout_planner::cache::DedupDigest {
    digest(
        &RequestDescriptor::new("POST", "/api/workouts/generate")
            .param("tag", tag)
            .canonicalize(),
        "v2",
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_callers_share_one_invocation() {
    for n in [2usize, 8, 32] {
        let coalescer = Arc::new(Coalescer::<usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(tokio::sync::Notify::new());
        let digest = d("shared");

        let leader = {
            let (coalescer, calls, gate, digest) =
                (coalescer.clone(), calls.clone(), gate.clone(), digest.clone());
            tokio::spawn(async move {
                coalescer
                    .run_with_role(&digest, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(7)
                    })
                    .await
            })
        };
        while !coalescer.is_in_flight(&digest) {
            tokio::task::yield_now().await;
        }

        let followers: Vec<_> = (1..n)
            .map(|_| {
                let (coalescer, calls, digest) = (coalescer.clone(), calls.clone(), digest.clone());
                tokio::spawn(async move {
                    coalescer
                        .run_with_role(&digest, move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(0)
                        })
                        .await
                })
            })
            .collect();

        // Followers attach before the leader is released.
        tokio::time::sleep(Duration::from_millis(100)).await;
        gate.notify_one();

        let (value, role) = leader.await.unwrap();
        assert_eq!((value.unwrap(), role), (7, Role::Leader));
        for f in followers {
            let (value, role) = f.await.unwrap();
            assert_eq!((value.unwrap(), role), (7, Role::Follower));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "n = {}", n);
        assert!(!coalescer.is_in_flight(&digest));
    }
}

#[tokio::test]
async fn settled_digest_starts_a_fresh_invocation() {
    let coalescer = Coalescer::<u32>::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let digest = d("sequential");

    for expected in 1..=3 {
        let calls = calls.clone();
        let value = coalescer
            .run(&digest, move || async move {
                Ok(calls.fetch_add(1, Ordering::SeqCst) as u32 + 1)
            })
            .await
            .unwrap();
        assert_eq!(value, expected);
    }
    assert_eq!(coalescer.in_flight_len(), 0);
}

#[tokio::test]
async fn failure_reaches_every_caller_and_is_not_remembered() {
    let coalescer = Coalescer::<u32>::new();
    let digest = d("failing");
    let fail = || async {
        tokio::task::yield_now().await;
        Err(Error::validation_with_context(
            "bad input",
            ErrorContext::new().with_source("test"),
        ))
    };

    let (a, b) = tokio::join!(coalescer.run(&digest, fail), coalescer.run(&digest, fail));
    assert!(matches!(a, Err(Error::Validation { .. })));
    assert!(matches!(b, Err(Error::Validation { .. })));
    assert!(!coalescer.is_in_flight(&digest));

    let ok = coalescer.run(&digest, || async { Ok(1) }).await;
    assert_eq!(ok.unwrap(), 1);
}
