// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue message model.
//!
//! A [`JobMessage`] is produced upstream, delivered at least once, and
//! never mutated by the worker. Field names follow the producer's wire
//! format (camelCase JSON).

use crate::comment::CommentRecord;
use crate::id::ReportId;
use serde::{Deserialize, Serialize};

/// Per-step LLM instruction strings carried by the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructions {
    pub system: String,
    pub clustering: String,
    pub extraction: String,
    pub dedup: String,
    pub summaries: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crux: Option<String>,
}

/// Topic ordering requested for the final tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortStrategy {
    #[default]
    #[serde(rename = "numClaims")]
    NumClaims,
    #[serde(rename = "numPeople")]
    NumPeople,
}

/// Job-level feature switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    #[serde(default)]
    pub cruxes_enabled: bool,
    #[serde(default)]
    pub sort_strategy: SortStrategy,
}

/// Human-facing report descriptors, copied verbatim into the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetails {
    pub title: String,
    pub description: String,
    pub question: String,
    pub filename: String,
}

/// A "process these comments" job as delivered by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    /// Producer-assigned job id.
    pub id: String,
    pub report_id: ReportId,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub comments: Vec<CommentRecord>,
    pub instructions: Instructions,
    pub model: String,
    #[serde(default)]
    pub options: JobOptions,
    pub api_key: String,
    pub report_details: ReportDetails,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
