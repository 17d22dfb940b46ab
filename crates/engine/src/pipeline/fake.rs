// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake step runner for testing.
//!
//! Produces small, internally consistent step results so a full run
//! yields an artifact that passes schema validation: one topic, one
//! subtopic, one claim per input comment.

use super::{PipelineInput, StepError, StepOutput, StepRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tally_core::{Claim, SortedTree, StepName, SubtopicNode, TopicNode, TreeCounts};

#[derive(Default)]
struct FakeRunnerState {
    failures: HashMap<StepName, Vec<StepError>>,
    overrides: HashMap<StepName, Value>,
    calls: Vec<StepName>,
}

/// Scripted [`StepRunner`] with call recording and failure injection.
#[derive(Clone, Default)]
pub struct FakeStepRunner {
    inner: Arc<Mutex<FakeRunnerState>>,
}

impl FakeStepRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next execution of `step`.
    pub fn fail_next(&self, step: StepName, error: StepError) {
        self.inner.lock().failures.entry(step).or_default().push(error);
    }

    /// Replace the canned result for `step`.
    pub fn set_result(&self, step: StepName, result: Value) {
        self.inner.lock().overrides.insert(step, result);
    }

    /// Steps executed, in order, across all runs.
    pub fn calls(&self) -> Vec<StepName> {
        self.inner.lock().calls.clone()
    }

    /// The deterministic tree the summaries step produces for `input`.
    pub fn tree_for(input: &PipelineInput) -> SortedTree {
        let claims: Vec<Claim> = input
            .comments
            .iter()
            .enumerate()
            .map(|(i, c)| Claim {
                id: format!("cl{}", i + 1),
                claim: c.text.clone(),
                quotes: vec![json!({"text": c.text, "commentId": c.id})],
                speaker: c.speaker_name().map(String::from),
            })
            .collect();
        let mut speakers: Vec<String> = input
            .comments
            .iter()
            .filter_map(|c| c.speaker_name().map(String::from))
            .collect();
        speakers.sort();
        speakers.dedup();
        let counts = TreeCounts {
            claims: claims.len() as u64,
            speakers: speakers.len() as u64,
        };
        vec![(
            "Overview".to_string(),
            TopicNode {
                topics: vec![(
                    "General".to_string(),
                    SubtopicNode {
                        claims,
                        speakers: speakers.clone(),
                        counts,
                    },
                )],
                speakers,
                counts,
            },
        )]
    }
}

#[async_trait]
impl StepRunner for FakeStepRunner {
    async fn run_step(
        &self,
        step: StepName,
        input: &PipelineInput,
        completed: &BTreeMap<StepName, Value>,
    ) -> Result<StepOutput, StepError> {
        {
            let mut state = self.inner.lock();
            state.calls.push(step);
            if let Some(queue) = state.failures.get_mut(&step) {
                if !queue.is_empty() {
                    return Err(queue.remove(0));
                }
            }
            if let Some(result) = state.overrides.get(&step) {
                return Ok(StepOutput {
                    result: result.clone(),
                    tokens: 1,
                    cost: 0.001,
                });
            }
        }

        let result = match step {
            StepName::Clustering => json!({
                "topics": [{"name": "Overview", "subtopics": ["General"]}]
            }),
            StepName::Claims => json!({
                "claims": input
                    .comments
                    .iter()
                    .map(|c| json!({"commentId": c.id, "text": c.text}))
                    .collect::<Vec<_>>()
            }),
            StepName::SortAndDeduplicate => completed
                .get(&StepName::Claims)
                .cloned()
                .unwrap_or_else(|| json!({"claims": []})),
            StepName::Summaries => serde_json::to_value(Self::tree_for(input))
                .map_err(|e| StepError::permanent(format!("tree encoding failed: {e}")))?,
            StepName::Cruxes => json!({
                "controversyMatrix": [],
                "topCruxes": []
            }),
        };

        Ok(StepOutput {
            result,
            tokens: 10,
            cost: 0.01,
        })
    }
}
