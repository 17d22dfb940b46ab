//! Seed scenario: duplicate delivery is an idempotent no-op.

use crate::prelude::*;
use tally_core::{CompletionKind, JobOutcome};

#[tokio::test]
async fn redelivery_after_completion_does_no_work() {
    let deps = Deps::new();
    deps.queue.publish(&job());
    deps.queue.run(deps.handler.as_ref()).await;

    let record_before = deps.record();
    let report_before = deps.stored_report();
    let puts_before = deps.bucket.put_count();
    let steps_before = deps.runner.calls().len();

    // the producer retried, or the queue redelivered a slow ack
    deps.queue.publish(&job());
    deps.queue.run(deps.handler.as_ref()).await;

    let deliveries = deps.queue.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(
        deliveries[1].1,
        JobOutcome::Ok(CompletionKind::IdempotentSkip)
    );

    // no pipeline work, no object rewrite
    assert_eq!(deps.runner.calls().len(), steps_before);
    assert_eq!(deps.bucket.put_count(), puts_before);
    assert_eq!(deps.stored_report(), report_before);

    // terminal metadata is byte-for-byte the same record
    assert_eq!(deps.record(), record_before);
}
