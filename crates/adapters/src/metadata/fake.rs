// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake metadata store for testing

use super::{MetadataError, MetadataStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tally_core::{ReportId, ReportMetadata, ReportPatch};

#[derive(Default)]
struct FakeMetadataState {
    records: HashMap<ReportId, ReportMetadata>,
    fail_next_get: Vec<MetadataError>,
    fail_next_modify: Vec<MetadataError>,
    modify_count: u64,
}

/// In-memory [`MetadataStore`] with fault injection.
#[derive(Clone, Default)]
pub struct FakeMetadataStore {
    inner: Arc<Mutex<FakeMetadataState>>,
}

impl FakeMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record.
    pub fn seed(&self, record: ReportMetadata) {
        self.inner.lock().records.insert(record.id.clone(), record);
    }

    /// Current record for `id`, if any.
    pub fn record(&self, id: &ReportId) -> Option<ReportMetadata> {
        self.inner.lock().records.get(id).cloned()
    }

    /// Queue an error for the next `get`.
    pub fn fail_next_get(&self, error: MetadataError) {
        self.inner.lock().fail_next_get.push(error);
    }

    /// Queue an error for the next `modify` (after any earlier queued ones).
    pub fn fail_next_modify(&self, error: MetadataError) {
        self.inner.lock().fail_next_modify.push(error);
    }

    /// Number of successful modify operations.
    pub fn modify_count(&self) -> u64 {
        self.inner.lock().modify_count
    }
}

#[async_trait]
impl MetadataStore for FakeMetadataStore {
    async fn get(&self, id: &ReportId) -> Result<Option<ReportMetadata>, MetadataError> {
        let mut state = self.inner.lock();
        if !state.fail_next_get.is_empty() {
            return Err(state.fail_next_get.remove(0));
        }
        Ok(state.records.get(id).cloned())
    }

    async fn modify(
        &self,
        id: &ReportId,
        patch: ReportPatch,
    ) -> Result<ReportMetadata, MetadataError> {
        let mut state = self.inner.lock();
        if !state.fail_next_modify.is_empty() {
            return Err(state.fail_next_modify.remove(0));
        }
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| MetadataError::not_found(id))?;
        patch.apply(record);
        state.modify_count += 1;
        Ok(state.records[id].clone())
    }
}
