//! Seed scenario: two workers race on the same report.

use crate::prelude::*;
use tally_adapters::{DeliveryContext, StateLockStore};
use tally_core::{CompletionKind, JobOutcome};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_workers_one_artifact() {
    let deps = Deps::new();

    // two workers receive the same message simultaneously; fencing
    // values differ per delivery
    let first = {
        let handler = deps.handler.clone();
        tokio::spawn(async move {
            handler
                .process(&job(), &DeliveryContext::new("m-1"))
                .await
        })
    };
    let second = {
        let handler = deps.handler.clone();
        tokio::spawn(async move {
            handler
                .process(&job(), &DeliveryContext::new("m-2"))
                .await
        })
    };

    let outcomes = vec![first.await.unwrap(), second.await.unwrap()];

    let completed = outcomes
        .iter()
        .filter(|o| **o == JobOutcome::Ok(CompletionKind::Completed))
        .count();
    assert_eq!(completed, 1, "exactly one worker publishes, got {outcomes:?}");
    assert!(
        outcomes.iter().all(JobOutcome::is_ok),
        "the loser skips without error, got {outcomes:?}"
    );

    // no double-write to the artifact
    assert_eq!(deps.bucket.put_count(), 1);
    assert!(deps.bucket.object(ARTIFACT_KEY).is_some());
}

#[tokio::test]
async fn held_lock_skips_immediately() {
    let deps = Deps::new();
    let id = tally_core::ReportId::new(REPORT_ID);
    deps.store
        .acquire_lock(&id, "other-worker", std::time::Duration::from_secs(300))
        .await
        .unwrap();

    deps.queue.publish(&job());
    deps.queue.run(deps.handler.as_ref()).await;

    let deliveries = deps.queue.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(
        deliveries[0].1,
        JobOutcome::Ok(CompletionKind::SkippedBusy)
    );
    // no work happened
    assert_eq!(deps.runner.calls().len(), 0);
    assert_eq!(deps.bucket.put_count(), 0);
}
