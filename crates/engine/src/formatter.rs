// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact composition and reconstruction.
//!
//! Two paths produce the published document: a fresh pipeline run's
//! outputs, or a completed checkpoint state on the save-only retry path
//! (pipeline done earlier, publish failed, redelivery finishes the job).
//! The reconstructed artifact is schema-validated before it is written;
//! a validation failure means the state store lost or mangled data.

use crate::error::HandlerError;
use crate::pipeline::{PipelineInput, PipelineOutputs};
use chrono::{DateTime, Utc};
use tally_core::{
    Analytics, PipelineState, PipelineStatus, Prompts, Report, ReportDetails, SortedTree,
    StepName, ARTIFACT_VERSION,
};

fn prompts(input: &PipelineInput) -> Prompts {
    Prompts {
        system_instructions: input.instructions.system.clone(),
        clustering_instructions: input.instructions.clustering.clone(),
        extraction_instructions: input.instructions.extraction.clone(),
        dedup_instructions: input.instructions.dedup.clone(),
        summaries_instructions: input.instructions.summaries.clone(),
        crux_instructions: input.instructions.crux.clone(),
        output_language: None,
    }
}

fn analytics(state: &PipelineState) -> Analytics {
    Analytics {
        total_tokens: state.total_tokens,
        total_cost: state.total_cost,
        total_duration_ms: state.total_duration_ms,
        step_analytics: state.step_analytics.clone(),
    }
}

fn build(
    details: &ReportDetails,
    input: &PipelineInput,
    state: &PipelineState,
    sorted_tree: SortedTree,
    cruxes: Option<serde_json::Value>,
    completed_at: DateTime<Utc>,
) -> Report {
    Report {
        version: ARTIFACT_VERSION.to_string(),
        report_details: details.clone(),
        sorted_tree,
        analytics: analytics(state),
        cruxes,
        prompts: prompts(input),
        completed_at,
    }
}

/// Compose the artifact from a successful run's outputs.
pub fn compose(
    details: &ReportDetails,
    input: &PipelineInput,
    state: &PipelineState,
    outputs: &PipelineOutputs,
    completed_at: DateTime<Utc>,
) -> Report {
    build(
        details,
        input,
        state,
        outputs.sorted_tree.clone(),
        outputs.cruxes.clone(),
        completed_at,
    )
}

/// Rebuild the artifact from a completed checkpoint state.
///
/// Fails with [`HandlerError::Corrupt`] when the state is not actually
/// completed or its stored results do not parse into a valid artifact.
pub fn reconstruct(
    details: &ReportDetails,
    input: &PipelineInput,
    state: &PipelineState,
    completed_at: DateTime<Utc>,
) -> Result<Report, HandlerError> {
    if state.status != PipelineStatus::Completed {
        return Err(HandlerError::Corrupt(format!(
            "cannot reconstruct from {:?} state",
            state.status
        )));
    }
    let tree_value = state
        .completed_results
        .get(&StepName::Summaries)
        .ok_or_else(|| {
            HandlerError::Corrupt("completed state has no summaries result".to_string())
        })?;
    let sorted_tree: SortedTree = serde_json::from_value(tree_value.clone())
        .map_err(|e| HandlerError::Corrupt(format!("stored tree does not parse: {e}")))?;
    let cruxes = state.completed_results.get(&StepName::Cruxes).cloned();

    let report = build(details, input, state, sorted_tree, cruxes, completed_at);
    report
        .validate()
        .map_err(|e| HandlerError::Corrupt(format!("reconstructed artifact invalid: {e}")))?;
    Ok(report)
}

#[cfg(test)]
#[path = "formatter_tests.rs"]
mod tests;
