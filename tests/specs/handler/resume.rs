//! Seed scenario: crash mid-pipeline, redelivery resumes.

use crate::prelude::*;
use tally_adapters::StateLockStore;
use tally_core::{ReportId, ReportStatus, StepName};
use tally_engine::StepError;

#[tokio::test]
async fn redelivery_resumes_after_mid_pipeline_failure() {
    let deps = Deps::new();
    // the sort step dies once (worker crash / transient LLM outage)
    deps.runner.fail_next(
        StepName::SortAndDeduplicate,
        StepError::transient("connection reset"),
    );
    deps.queue.publish(&job());

    deps.queue.run(deps.handler.as_ref()).await;

    // delivery 1 nacked, delivery 2 resumed and completed
    let deliveries = deps.queue.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert!(!deliveries[0].1.is_ok());
    assert!(deliveries[1].1.is_ok());

    // completed steps were not re-executed
    let calls = deps.runner.calls();
    assert_eq!(
        calls,
        vec![
            StepName::Clustering,
            StepName::Claims,
            StepName::SortAndDeduplicate,
            StepName::SortAndDeduplicate,
            StepName::Summaries,
        ]
    );

    let record = deps.record();
    assert_eq!(record.status, ReportStatus::Completed);
    assert!(deps.bucket.object(ARTIFACT_KEY).is_some());
}

#[tokio::test]
async fn preserved_checkpoints_keep_their_analytics() {
    let deps = Deps::new();
    deps.runner
        .fail_next(StepName::Summaries, StepError::transient("timeout"));
    deps.queue.publish(&job());

    deps.queue.run(deps.handler.as_ref()).await;

    let state = deps
        .store
        .get_state(&ReportId::new(REPORT_ID))
        .await
        .unwrap()
        .unwrap();
    // clustering and claims analytics stem from the first delivery and
    // survived the resume untouched
    let clustering = &state.step_analytics[&StepName::Clustering];
    let summaries = &state.step_analytics[&StepName::Summaries];
    assert!(clustering.completed_at.unwrap() < summaries.completed_at.unwrap());

    let report = deps.stored_report();
    assert_eq!(report.analytics.step_analytics.len(), 4);
}

#[tokio::test]
async fn resumed_artifact_matches_fresh_run() {
    // run once with a mid-pipeline failure and resume
    let interrupted = Deps::new();
    interrupted.runner.fail_next(
        StepName::SortAndDeduplicate,
        StepError::transient("connection reset"),
    );
    interrupted.queue.publish(&job());
    interrupted.queue.run(interrupted.handler.as_ref()).await;

    // run once cleanly
    let fresh = Deps::new();
    fresh.queue.publish(&job());
    fresh.queue.run(fresh.handler.as_ref()).await;

    let mut resumed_report = interrupted.stored_report();
    let fresh_report = fresh.stored_report();
    // analytics and timestamps legitimately differ; the content must not
    resumed_report.analytics = fresh_report.analytics.clone();
    resumed_report.completed_at = fresh_report.completed_at;
    assert_eq!(resumed_report, fresh_report);
}
