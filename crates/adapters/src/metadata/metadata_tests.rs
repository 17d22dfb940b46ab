// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};
use tally_core::ReportStatus;

fn record(id: &str) -> ReportMetadata {
    ReportMetadata {
        id: ReportId::new(id),
        user_id: "u-1".to_string(),
        title: "t".to_string(),
        description: "d".to_string(),
        report_data_uri: None,
        status: ReportStatus::Processing,
        num_topics: None,
        num_subtopics: None,
        num_claims: None,
        num_people: None,
        created_date: None,
        last_status_update: Utc.timestamp_millis_opt(0).single().unwrap(),
        error_message: None,
    }
}

#[tokio::test]
async fn modify_merges_into_fresh_record() {
    let store = FakeMetadataStore::new();
    store.seed(record("R1"));
    let id = ReportId::new("R1");
    let now = Utc.timestamp_millis_opt(9_000).single().unwrap();

    let merged = store
        .modify(&id, ReportPatch::failed("boom", now))
        .await
        .unwrap();
    assert_eq!(merged.status, ReportStatus::Failed);
    assert_eq!(merged.error_message.as_deref(), Some("boom"));
    // unrelated fields untouched
    assert_eq!(merged.title, "t");
    assert_eq!(store.record(&id).unwrap().status, ReportStatus::Failed);
}

#[tokio::test]
async fn modify_missing_record_is_permanent_not_found() {
    let store = FakeMetadataStore::new();
    let id = ReportId::new("nope");
    let now = Utc.timestamp_millis_opt(0).single().unwrap();

    let err = store
        .modify(&id, ReportPatch::processing(now))
        .await
        .unwrap_err();
    assert!(!err.transient);
    assert_eq!(err.code.as_deref(), Some("not-found"));
}

#[tokio::test]
async fn injected_failures_are_consumed_in_order() {
    let store = FakeMetadataStore::new();
    store.seed(record("R1"));
    let id = ReportId::new("R1");
    let now = Utc.timestamp_millis_opt(0).single().unwrap();

    store.fail_next_modify(MetadataError::new(
        Some("unavailable".to_string()),
        "firestore unavailable",
        true,
    ));

    let err = store
        .modify(&id, ReportPatch::processing(now))
        .await
        .unwrap_err();
    assert!(err.transient);

    // next attempt succeeds
    store
        .modify(&id, ReportPatch::processing(now))
        .await
        .unwrap();
    assert_eq!(store.modify_count(), 1);
}

#[test]
fn error_display_includes_code() {
    let err = MetadataError::new(Some("unavailable".to_string()), "backend down", true);
    assert_eq!(err.to_string(), "metadata error [unavailable]: backend down");
    let uncoded = MetadataError::new(None, "odd", false);
    assert_eq!(uncoded.to_string(), "metadata error [unclassified]: odd");
}
