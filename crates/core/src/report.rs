// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Report metadata record (document store shape).

use crate::id::ReportId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a report as seen by readers.
///
/// Only the job handler transitions a record to `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Processing => write!(f, "processing"),
            ReportStatus::Completed => write!(f, "completed"),
            ReportStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Authoritative report record in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub id: ReportId,
    pub user_id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_data_uri: Option<String>,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_topics: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_subtopics: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_claims: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_people: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    pub last_status_update: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Partial update applied to a metadata record by merge.
///
/// Absent fields never clobber stored values; the store adapter merges a
/// patch into a freshly read record before writing it back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPatch {
    pub status: Option<ReportStatus>,
    pub report_data_uri: Option<String>,
    pub num_topics: Option<u64>,
    pub num_subtopics: Option<u64>,
    pub num_claims: Option<u64>,
    pub num_people: Option<u64>,
    pub last_status_update: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Clear any stored error message (used when a retry succeeds).
    pub clear_error: bool,
}

impl ReportPatch {
    /// Patch marking the report completed with its artifact location and
    /// derived counts.
    pub fn completed(uri: String, counts: crate::artifact::ReportCounts, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(ReportStatus::Completed),
            report_data_uri: Some(uri),
            num_topics: Some(counts.topics),
            num_subtopics: Some(counts.subtopics),
            num_claims: Some(counts.claims),
            num_people: Some(counts.people),
            last_status_update: Some(now),
            clear_error: true,
            ..Default::default()
        }
    }

    /// Patch marking the report failed with a user-actionable message.
    pub fn failed(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(ReportStatus::Failed),
            error_message: Some(message.into()),
            last_status_update: Some(now),
            ..Default::default()
        }
    }

    /// Patch refreshing the processing heartbeat timestamp.
    pub fn processing(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(ReportStatus::Processing),
            last_status_update: Some(now),
            ..Default::default()
        }
    }

    /// Merge this patch into `record`, leaving absent fields untouched.
    pub fn apply(&self, record: &mut ReportMetadata) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(uri) = &self.report_data_uri {
            record.report_data_uri = Some(uri.clone());
        }
        if let Some(n) = self.num_topics {
            record.num_topics = Some(n);
        }
        if let Some(n) = self.num_subtopics {
            record.num_subtopics = Some(n);
        }
        if let Some(n) = self.num_claims {
            record.num_claims = Some(n);
        }
        if let Some(n) = self.num_people {
            record.num_people = Some(n);
        }
        if let Some(ts) = self.last_status_update {
            record.last_status_update = ts;
        }
        if let Some(msg) = &self.error_message {
            record.error_message = Some(msg.clone());
        } else if self.clear_error {
            record.error_message = None;
        }
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
