//! Seed scenario: permanent validation errors.

use crate::prelude::*;
use tally_core::{CommentRecord, JobOutcome, ReportStatus};

#[tokio::test]
async fn missing_system_instructions_fails_without_lock() {
    let deps = Deps::new();
    let mut bad = job();
    bad.instructions.system = String::new();
    deps.queue.publish(&bad);

    deps.queue.run(deps.handler.as_ref()).await;

    // acked on the first delivery: no retry loop for impossible jobs
    let deliveries = deps.queue.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(
        deliveries[0].1,
        JobOutcome::permanent("Missing required field: system instructions")
    );

    // the failure is user-visible on the metadata record
    let record = deps.record();
    assert_eq!(record.status, ReportStatus::Failed);
    assert_eq!(
        record.error_message.as_deref(),
        Some("Missing required field: system instructions")
    );

    // no lock, no state, no pipeline work
    assert_eq!(deps.store.save_count(), 0);
    assert_eq!(deps.runner.calls().len(), 0);
    assert_eq!(deps.bucket.put_count(), 0);
}

#[tokio::test]
async fn empty_comments_never_take_the_lock() {
    let deps = Deps::new();
    let mut bad = job();
    bad.comments.clear();
    deps.queue.publish(&bad);

    deps.queue.run(deps.handler.as_ref()).await;

    assert_eq!(
        deps.queue.deliveries()[0].1,
        JobOutcome::permanent("No comments provided")
    );
    assert_eq!(deps.store.save_count(), 0);
}

#[tokio::test]
async fn whitespace_comments_list_offending_ids() {
    let deps = Deps::new();
    let mut bad = job();
    bad.comments = (1..=7)
        .map(|i| CommentRecord {
            id: format!("c{i}"),
            text: " ".to_string(),
            speaker: None,
        })
        .collect();
    deps.queue.publish(&bad);

    deps.queue.run(deps.handler.as_ref()).await;

    let record = deps.record();
    assert_eq!(record.status, ReportStatus::Failed);
    assert_eq!(
        record.error_message.as_deref(),
        Some("Comments with empty text: c1, c2, c3, c4, c5 (and 2 more)")
    );
}
