// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tally_core::{FakeClock, PipelineState};

const TTL: Duration = Duration::from_secs(300);

fn store() -> FakeStateLock {
    FakeStateLock::new(FakeClock::new(1_000_000))
}

#[test]
fn key_namespaces() {
    let id = ReportId::new("R1");
    assert_eq!(state_key(&id), "state:R1");
    assert_eq!(lock_key(&id), "lock:R1");
}

#[tokio::test]
async fn acquire_is_exclusive_while_live() {
    let store = store();
    let id = ReportId::new("R1");

    assert!(store.acquire_lock(&id, "msg-1", TTL).await.unwrap());
    assert!(!store.acquire_lock(&id, "msg-2", TTL).await.unwrap());
    assert_eq!(store.lock_holder(&id).as_deref(), Some("msg-1"));
}

#[tokio::test]
async fn expired_lease_can_be_taken_over() {
    let store = store();
    let id = ReportId::new("R1");

    assert!(store.acquire_lock(&id, "msg-1", TTL).await.unwrap());
    store.clock().advance(TTL.as_millis() as u64 + 1);
    assert!(store.acquire_lock(&id, "msg-2", TTL).await.unwrap());
    assert_eq!(store.lock_holder(&id).as_deref(), Some("msg-2"));
}

#[tokio::test]
async fn extend_requires_matching_live_lease() {
    let store = store();
    let id = ReportId::new("R1");
    store.acquire_lock(&id, "msg-1", TTL).await.unwrap();

    // wrong fencing value
    assert!(!store.extend_lock(&id, "msg-2", TTL).await.unwrap());

    // matching value extends
    assert!(store.extend_lock(&id, "msg-1", TTL).await.unwrap());

    // a silently expired lease must NOT be extendable
    store.clock().advance(TTL.as_millis() as u64 + 1);
    assert!(!store.extend_lock(&id, "msg-1", TTL).await.unwrap());
}

#[tokio::test]
async fn extend_after_takeover_fails_for_old_holder() {
    let store = store();
    let id = ReportId::new("R1");
    store.acquire_lock(&id, "msg-1", TTL).await.unwrap();
    store.clock().advance(TTL.as_millis() as u64 + 1);
    store.acquire_lock(&id, "msg-2", TTL).await.unwrap();

    assert!(!store.extend_lock(&id, "msg-1", TTL).await.unwrap());
    assert!(store.extend_lock(&id, "msg-2", TTL).await.unwrap());
}

#[tokio::test]
async fn release_is_compare_and_delete() {
    let store = store();
    let id = ReportId::new("R1");
    store.acquire_lock(&id, "msg-1", TTL).await.unwrap();

    assert!(!store.release_lock(&id, "msg-2").await.unwrap());
    assert_eq!(store.lock_holder(&id).as_deref(), Some("msg-1"));

    assert!(store.release_lock(&id, "msg-1").await.unwrap());
    assert_eq!(store.lock_holder(&id), None);

    // releasing an already-released lease reports false, not an error
    assert!(!store.release_lock(&id, "msg-1").await.unwrap());
}

#[tokio::test]
async fn verify_lock_checks_value_and_liveness() {
    let store = store();
    let id = ReportId::new("R1");
    store.acquire_lock(&id, "msg-1", TTL).await.unwrap();

    assert!(store.verify_lock(&id, "msg-1").await.unwrap());
    assert!(!store.verify_lock(&id, "msg-2").await.unwrap());

    store.clock().advance(TTL.as_millis() as u64 + 1);
    assert!(!store.verify_lock(&id, "msg-1").await.unwrap());
}

#[tokio::test]
async fn save_state_sets_strictly_advancing_updated_at() {
    let store = store();
    let id = ReportId::new("R1");
    let mut state = PipelineState::new(id.clone());

    let first = store.save_state(&id, &state).await.unwrap();
    assert_eq!(first, 1_000_000);
    state.updated_at = first;

    // wall clock stalled: updated_at still advances
    let second = store.save_state(&id, &state).await.unwrap();
    assert_eq!(second, first + 1);

    store.clock().advance(5_000);
    state.updated_at = second;
    let third = store.save_state(&id, &state).await.unwrap();
    assert_eq!(third, 1_005_000);

    let loaded = store.get_state(&id).await.unwrap().unwrap();
    assert_eq!(loaded.updated_at, third);
}

#[tokio::test]
async fn injected_failures_surface_classified() {
    let store = store();
    let id = ReportId::new("R1");
    store.fail_next(StoreOp::AcquireLock, StateStoreError::transient("redis down"));

    let err = store.acquire_lock(&id, "msg-1", TTL).await.unwrap_err();
    assert!(err.transient);

    // queue drained; next call succeeds
    assert!(store.acquire_lock(&id, "msg-1", TTL).await.unwrap());
}
