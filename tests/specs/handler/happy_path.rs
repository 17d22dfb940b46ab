//! Seed scenario: happy path.

use crate::prelude::*;
use tally_core::{ReportId, ReportStatus};

#[tokio::test]
async fn delivery_produces_artifact_metadata_and_ack() {
    let deps = Deps::new();
    deps.queue.publish(&job());

    deps.queue.run(deps.handler.as_ref()).await;

    // one delivery, acked
    let deliveries = deps.queue.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert!(deliveries[0].1.is_ok());

    // metadata transitioned processing -> completed with the object URI
    let record = deps.record();
    assert_eq!(record.status, ReportStatus::Completed);
    assert_eq!(
        record.report_data_uri.as_deref(),
        Some("gs://fake-bucket/R1.json")
    );
    assert_eq!(record.num_people, Some(2));
    assert_eq!(record.error_message, None);

    // the artifact is versioned and has a non-empty tree
    let report = deps.stored_report();
    assert_eq!(report.version, "pipeline-worker-v1.0");
    assert!(!report.sorted_tree.is_empty());
    assert_eq!(report.report_details.title, "Dogs vs cats");

    // the lock is gone
    assert_eq!(deps.store.lock_holder(&ReportId::new(REPORT_ID)), None);
}

#[tokio::test]
async fn artifact_counts_match_tree() {
    let deps = Deps::new();
    deps.queue.publish(&job());
    deps.queue.run(deps.handler.as_ref()).await;

    let record = deps.record();
    let report = deps.stored_report();
    let claims: u64 = report
        .sorted_tree
        .iter()
        .map(|(_, topic)| topic.counts.claims)
        .sum();
    assert_eq!(record.num_topics, Some(report.sorted_tree.len() as u64));
    assert_eq!(record.num_claims, Some(claims));
}

#[tokio::test]
async fn analytics_cover_every_step() {
    let deps = Deps::new();
    deps.queue.publish(&job());
    deps.queue.run(deps.handler.as_ref()).await;

    let report = deps.stored_report();
    assert_eq!(report.analytics.step_analytics.len(), 4);
    assert!(report.analytics.total_tokens > 0);
}
