// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Published artifact document.
//!
//! The artifact is the versioned JSON report written to the object bucket
//! at `{reportId}.json`. Readers only ever see a fully written document
//! (the object store adapter publishes atomically), so this module is
//! purely shape: the typed tree, analytics, prompts, and the derived
//! counts recorded on the metadata record.

use crate::comment::CommentRecord;
use crate::id::ReportId;
use crate::job::ReportDetails;
use crate::state::{StepAnalytics, StepName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Artifact schema version.
pub const ARTIFACT_VERSION: &str = "pipeline-worker-v1.0";

/// Object key of a report's artifact.
pub fn artifact_key(report_id: &ReportId) -> String {
    format!("{report_id}.json")
}

/// Claim/speaker tallies attached to each tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeCounts {
    pub claims: u64,
    pub speakers: u64,
}

/// An extracted, deduplicated claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub claim: String,
    #[serde(default)]
    pub quotes: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// A subtopic holding its claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtopicNode {
    pub claims: Vec<Claim>,
    pub speakers: Vec<String>,
    pub counts: TreeCounts,
}

/// A topic holding named subtopics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub topics: Vec<(String, SubtopicNode)>,
    pub speakers: Vec<String>,
    pub counts: TreeCounts,
}

/// The hierarchical topic/subtopic/claim structure, ordered by the
/// pipeline's sort step. Serializes as `[[topicName, {...}], ...]`.
pub type SortedTree = Vec<(String, TopicNode)>;

/// Run-level analytics embedded in the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_duration_ms: u64,
    pub step_analytics: BTreeMap<StepName, StepAnalytics>,
}

/// The instruction strings the report was generated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompts {
    pub system_instructions: String,
    pub clustering_instructions: String,
    pub extraction_instructions: String,
    pub dedup_instructions: String,
    pub summaries_instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crux_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_language: Option<String>,
}

/// The published report artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub version: String,
    pub report_details: ReportDetails,
    pub sorted_tree: SortedTree,
    pub analytics: Analytics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cruxes: Option<Value>,
    pub prompts: Prompts,
    pub completed_at: DateTime<Utc>,
}

impl Report {
    /// Structural integrity check beyond what typed deserialization
    /// already guarantees: the version tag must match and every node's
    /// recorded counts must agree with its contents. A mismatch means
    /// the state the artifact was rebuilt from is corrupt.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != ARTIFACT_VERSION {
            return Err(format!(
                "unexpected artifact version: {} (expected {})",
                self.version, ARTIFACT_VERSION
            ));
        }
        for (topic_name, topic) in &self.sorted_tree {
            let mut topic_claims = 0;
            for (subtopic_name, subtopic) in &topic.topics {
                let claims = subtopic.claims.len() as u64;
                if subtopic.counts.claims != claims {
                    return Err(format!(
                        "subtopic {topic_name}/{subtopic_name}: counts.claims {} != {} claims",
                        subtopic.counts.claims, claims
                    ));
                }
                topic_claims += claims;
            }
            if topic.counts.claims != topic_claims {
                return Err(format!(
                    "topic {topic_name}: counts.claims {} != {} claims",
                    topic.counts.claims, topic_claims
                ));
            }
        }
        Ok(())
    }
}

/// Counts derived from a finished report, recorded on the metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportCounts {
    pub topics: u64,
    pub subtopics: u64,
    pub claims: u64,
    pub people: u64,
}

impl ReportCounts {
    /// Derive counts in a single pass over the tree; `people` is the
    /// number of distinct non-empty speakers across the input comments.
    pub fn derive(tree: &SortedTree, comments: &[CommentRecord]) -> Self {
        let mut counts = ReportCounts {
            topics: tree.len() as u64,
            ..Default::default()
        };
        for (_, topic) in tree {
            counts.subtopics += topic.topics.len() as u64;
            for (_, subtopic) in &topic.topics {
                counts.claims += subtopic.claims.len() as u64;
            }
        }
        let people: HashSet<&str> = comments.iter().filter_map(|c| c.speaker_name()).collect();
        counts.people = people.len() as u64;
        counts
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
