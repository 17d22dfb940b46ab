//! Seed scenario: metadata write fails after the object was written.

use crate::prelude::*;
use tally_adapters::MetadataError;
use tally_core::ReportStatus;

fn unavailable() -> MetadataError {
    MetadataError::new(
        Some("unavailable".to_string()),
        "firestore unavailable",
        true,
    )
}

#[tokio::test]
async fn object_rolls_back_and_redelivery_republishes() {
    let deps = Deps::new();
    // first failure hits the processing heartbeat, second the completion
    // write after the object is already stored
    deps.metadata.fail_next_modify(unavailable());
    deps.metadata.fail_next_modify(unavailable());
    deps.queue.publish(&job());

    deps.queue.run(deps.handler.as_ref()).await;

    let deliveries = deps.queue.deliveries();
    assert_eq!(deliveries.len(), 2, "transient failure must redeliver");
    assert!(!deliveries[0].1.is_ok());
    assert!(deliveries[1].1.is_ok());

    // the redelivery took the save-only path: no extra pipeline work
    assert_eq!(deps.runner.calls().len(), 4);

    // final state: artifact present, metadata completed
    assert!(deps.bucket.object(ARTIFACT_KEY).is_some());
    assert_eq!(deps.record().status, ReportStatus::Completed);
}

#[tokio::test]
async fn rollback_leaves_no_artifact_behind() {
    let deps = Deps::new();
    let queue = tally_adapters::FakeQueue::with_max_deliveries(1);
    deps.metadata.fail_next_modify(unavailable());
    deps.metadata.fail_next_modify(unavailable());
    queue.publish(&job());

    queue.run(deps.handler.as_ref()).await;

    // exactly the failing delivery ran: object deleted, metadata still
    // processing, so no reader can observe a half-published report
    assert_eq!(deps.bucket.object(ARTIFACT_KEY), None);
    assert_eq!(deps.record().status, ReportStatus::Processing);
}
