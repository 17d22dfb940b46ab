// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake state/lock store for testing.
//!
//! TTLs are honored against an injected [`FakeClock`], so tests drive
//! lease expiry by advancing the clock instead of sleeping.

use super::{StateLockStore, StateStoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{Clock, FakeClock, PipelineState, ReportId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetState,
    SaveState,
    AcquireLock,
    VerifyLock,
    ExtendLock,
    ReleaseLock,
    Ping,
}

struct Lease {
    fencing: String,
    expires_at_ms: u64,
}

#[derive(Default)]
struct FakeStoreState {
    states: HashMap<ReportId, PipelineState>,
    locks: HashMap<ReportId, Lease>,
    failures: HashMap<StoreOp, Vec<StateStoreError>>,
    save_count: u64,
}

/// In-memory [`StateLockStore`] with clock-driven TTLs and fault
/// injection.
#[derive(Clone)]
pub struct FakeStateLock {
    inner: Arc<Mutex<FakeStoreState>>,
    clock: FakeClock,
}

impl FakeStateLock {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeStoreState::default())),
            clock,
        }
    }

    pub fn clock(&self) -> &FakeClock {
        &self.clock
    }

    /// Queue an error for the next call of `op`.
    pub fn fail_next(&self, op: StoreOp, error: StateStoreError) {
        self.inner.lock().failures.entry(op).or_default().push(error);
    }

    /// Seed a pipeline state directly.
    pub fn put_state(&self, state: PipelineState) {
        let mut inner = self.inner.lock();
        inner.states.insert(state.report_id.clone(), state);
    }

    /// Current fencing value of the lock for `id`, if a live lease exists.
    pub fn lock_holder(&self, id: &ReportId) -> Option<String> {
        let now = self.clock.epoch_ms();
        let inner = self.inner.lock();
        inner
            .locks
            .get(id)
            .filter(|lease| lease.expires_at_ms > now)
            .map(|lease| lease.fencing.clone())
    }

    /// Number of successful state saves.
    pub fn save_count(&self) -> u64 {
        self.inner.lock().save_count
    }

    fn take_failure(&self, op: StoreOp) -> Option<StateStoreError> {
        let mut inner = self.inner.lock();
        let queue = inner.failures.get_mut(&op)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

#[async_trait]
impl StateLockStore for FakeStateLock {
    async fn get_state(&self, id: &ReportId) -> Result<Option<PipelineState>, StateStoreError> {
        if let Some(err) = self.take_failure(StoreOp::GetState) {
            return Err(err);
        }
        Ok(self.inner.lock().states.get(id).cloned())
    }

    async fn save_state(
        &self,
        id: &ReportId,
        state: &PipelineState,
    ) -> Result<u64, StateStoreError> {
        if let Some(err) = self.take_failure(StoreOp::SaveState) {
            return Err(err);
        }
        let mut stored = state.clone();
        stored.updated_at = self.clock.epoch_ms().max(state.updated_at + 1);
        let updated_at = stored.updated_at;
        let mut inner = self.inner.lock();
        inner.states.insert(id.clone(), stored);
        inner.save_count += 1;
        Ok(updated_at)
    }

    async fn acquire_lock(
        &self,
        id: &ReportId,
        fencing: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        if let Some(err) = self.take_failure(StoreOp::AcquireLock) {
            return Err(err);
        }
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let live = inner
            .locks
            .get(id)
            .is_some_and(|lease| lease.expires_at_ms > now);
        if live {
            return Ok(false);
        }
        inner.locks.insert(
            id.clone(),
            Lease {
                fencing: fencing.to_string(),
                expires_at_ms: now + ttl.as_millis() as u64,
            },
        );
        Ok(true)
    }

    async fn verify_lock(&self, id: &ReportId, fencing: &str) -> Result<bool, StateStoreError> {
        if let Some(err) = self.take_failure(StoreOp::VerifyLock) {
            return Err(err);
        }
        Ok(self.lock_holder(id).as_deref() == Some(fencing))
    }

    async fn extend_lock(
        &self,
        id: &ReportId,
        fencing: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        if let Some(err) = self.take_failure(StoreOp::ExtendLock) {
            return Err(err);
        }
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        match inner.locks.get_mut(id) {
            Some(lease) if lease.expires_at_ms > now && lease.fencing == fencing => {
                lease.expires_at_ms = now + ttl.as_millis() as u64;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_lock(&self, id: &ReportId, fencing: &str) -> Result<bool, StateStoreError> {
        if let Some(err) = self.take_failure(StoreOp::ReleaseLock) {
            return Err(err);
        }
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let held = inner
            .locks
            .get(id)
            .is_some_and(|lease| lease.expires_at_ms > now && lease.fencing == fencing);
        if held {
            inner.locks.remove(id);
        }
        Ok(held)
    }

    async fn ping(&self) -> Result<(), StateStoreError> {
        if let Some(err) = self.take_failure(StoreOp::Ping) {
            return Err(err);
        }
        Ok(())
    }
}
