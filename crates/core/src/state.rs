// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpointed pipeline state.
//!
//! [`PipelineState`] is the durable record of a report's progress through
//! the step plan. It lives in the state store under `state:{reportId}`
//! and is the source of truth for resume decisions and for the save-only
//! retry path. Mutators are idempotent: re-applying a transition that
//! already happened is a no-op, which keeps redelivered work safe.

use crate::id::ReportId;
use crate::job::JobOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Named stage of the pipeline plan, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Clustering,
    Claims,
    SortAndDeduplicate,
    Summaries,
    Cruxes,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Clustering => "clustering",
            StepName::Claims => "claims",
            StepName::SortAndDeduplicate => "sort_and_deduplicate",
            StepName::Summaries => "summaries",
            StepName::Cruxes => "cruxes",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ordered step plan for a job.
///
/// Cruxes run only when enabled; the last step of the returned plan is
/// the terminal step whose completion marks the whole pipeline complete.
pub fn plan_for(options: &JobOptions) -> Vec<StepName> {
    let mut plan = vec![
        StepName::Clustering,
        StepName::Claims,
        StepName::SortAndDeduplicate,
        StepName::Summaries,
    ];
    if options.cruxes_enabled {
        plan.push(StepName::Cruxes);
    }
    plan
}

/// Overall pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Running,
    Completed,
    Failed,
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// Per-step execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAnalytics {
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Durable mid-pipeline checkpoint for one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub report_id: ReportId,
    pub status: PipelineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepName>,
    #[serde(default)]
    pub completed_results: BTreeMap<StepName, Value>,
    #[serde(default)]
    pub step_analytics: BTreeMap<StepName, StepAnalytics>,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub total_duration_ms: u64,
    /// Epoch ms, set by the state store on every write.
    #[serde(default)]
    pub updated_at: u64,
}

impl PipelineState {
    /// Fresh state for a report about to start running.
    pub fn new(report_id: ReportId) -> Self {
        Self {
            report_id,
            status: PipelineStatus::Running,
            current_step: None,
            completed_results: BTreeMap::new(),
            step_analytics: BTreeMap::new(),
            total_tokens: 0,
            total_cost: 0.0,
            total_duration_ms: 0,
            updated_at: 0,
        }
    }

    /// Whether `step` has a durable completed result.
    pub fn is_step_completed(&self, step: StepName) -> bool {
        self.completed_results.contains_key(&step)
            && self
                .step_analytics
                .get(&step)
                .is_some_and(|a| a.status == StepStatus::Completed)
    }

    /// Whether the terminal step of `plan` is completed.
    pub fn is_plan_completed(&self, plan: &[StepName]) -> bool {
        plan.last().is_some_and(|last| self.is_step_completed(*last))
    }

    /// Milliseconds since the last write, per the provided now.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.updated_at)
    }

    /// Mark a step as in progress. No-op if the step already completed.
    pub fn begin_step(&mut self, step: StepName, now_ms: u64) {
        if self.is_step_completed(step) {
            return;
        }
        self.status = PipelineStatus::Running;
        self.current_step = Some(step);
        let entry = self.step_analytics.entry(step).or_insert(StepAnalytics {
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            tokens: None,
            cost: None,
            error_message: None,
        });
        entry.status = StepStatus::InProgress;
        entry.started_at = Some(now_ms);
        entry.error_message = None;
    }

    /// Record a completed step result. Idempotent: a step that already
    /// completed keeps its original result and analytics.
    pub fn complete_step(
        &mut self,
        step: StepName,
        result: Value,
        tokens: u64,
        cost: f64,
        now_ms: u64,
    ) {
        if self.is_step_completed(step) {
            return;
        }
        let started = self
            .step_analytics
            .get(&step)
            .and_then(|a| a.started_at)
            .unwrap_or(now_ms);
        let duration = now_ms.saturating_sub(started);
        self.step_analytics.insert(
            step,
            StepAnalytics {
                status: StepStatus::Completed,
                started_at: Some(started),
                completed_at: Some(now_ms),
                duration_ms: Some(duration),
                tokens: Some(tokens),
                cost: Some(cost),
                error_message: None,
            },
        );
        self.completed_results.insert(step, result);
        self.total_tokens += tokens;
        self.total_cost += cost;
        self.total_duration_ms += duration;
    }

    /// Record a failed step and mark the whole pipeline failed.
    pub fn fail_step(&mut self, step: StepName, message: &str, now_ms: u64) {
        if self.is_step_completed(step) {
            return;
        }
        let started = self.step_analytics.get(&step).and_then(|a| a.started_at);
        self.step_analytics.insert(
            step,
            StepAnalytics {
                status: StepStatus::Failed,
                started_at: started,
                completed_at: Some(now_ms),
                duration_ms: started.map(|s| now_ms.saturating_sub(s)),
                tokens: None,
                cost: None,
                error_message: Some(message.to_string()),
            },
        );
        self.status = PipelineStatus::Failed;
        self.current_step = Some(step);
    }

    /// Mark the pipeline completed once every step of `plan` is done.
    pub fn finish(&mut self, plan: &[StepName]) {
        if self.is_plan_completed(plan) {
            self.status = PipelineStatus::Completed;
            self.current_step = None;
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
