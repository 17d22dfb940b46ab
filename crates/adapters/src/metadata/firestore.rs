// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Firestore-backed metadata store

use super::{MetadataError, MetadataStore};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreDb;
use tally_core::classify::{is_transient, ErrorFacets};
use tally_core::{ReportId, ReportMetadata, ReportPatch};

/// Metadata store backed by a Firestore collection.
#[derive(Clone)]
pub struct FirestoreMetadata {
    db: FirestoreDb,
    collection: String,
}

impl FirestoreMetadata {
    /// Connect to the project's Firestore database.
    pub async fn connect(
        project_id: &str,
        collection: impl Into<String>,
    ) -> Result<Self, MetadataError> {
        let db = FirestoreDb::new(project_id).await.map_err(convert)?;
        Ok(Self {
            db,
            collection: collection.into(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

fn convert(err: FirestoreError) -> MetadataError {
    let message = err.to_string();
    let (code, transient) = match &err {
        FirestoreError::DataNotFoundError(_) => (Some("not-found"), false),
        FirestoreError::DataConflictError(_) => (Some("already-exists"), false),
        FirestoreError::InvalidParametersError(_) => (Some("invalid-argument"), false),
        FirestoreError::SerializeError(_) | FirestoreError::DeserializeError(_) => (None, false),
        FirestoreError::DatabaseError(db_err) => (None, db_err.retry_possible),
        FirestoreError::NetworkError(_) => (Some("unavailable"), true),
        _ => {
            let facets = ErrorFacets {
                http_status: None,
                store_code: None,
                message: &message,
            };
            (None, is_transient(facets))
        }
    };
    MetadataError::new(code.map(String::from), message, transient)
}

#[async_trait]
impl MetadataStore for FirestoreMetadata {
    async fn get(&self, id: &ReportId) -> Result<Option<ReportMetadata>, MetadataError> {
        let result = self
            .db
            .fluent()
            .select()
            .by_id_in(&self.collection)
            .obj::<ReportMetadata>()
            .one(id.as_str())
            .await;
        match result {
            Ok(record) => Ok(record),
            Err(FirestoreError::DataNotFoundError(_)) => Ok(None),
            Err(e) => Err(convert(e)),
        }
    }

    async fn modify(
        &self,
        id: &ReportId,
        patch: ReportPatch,
    ) -> Result<ReportMetadata, MetadataError> {
        // Read-merge-write: absent patch fields must not clobber stored
        // values, so merge into a fresh read.
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| MetadataError::not_found(id))?;
        patch.apply(&mut record);
        self.db
            .fluent()
            .update()
            .in_col(&self.collection)
            .document_id(id.as_str())
            .object(&record)
            .execute::<ReportMetadata>()
            .await
            .map_err(convert)?;
        Ok(record)
    }
}
