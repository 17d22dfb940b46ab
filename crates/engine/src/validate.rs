// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job message validation and input conversion.
//!
//! Validation runs before the lock is acquired; a failure here is
//! terminal and the message is never retried. The collected problems
//! become the user-actionable error message on the metadata record.

use crate::pipeline::PipelineInput;
use tally_core::JobMessage;
use thiserror::Error;

/// The maximum number of offending comment ids listed in a message.
const MAX_LISTED_IDS: usize = 5;

/// One or more validation problems, joined for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

fn missing(field: &str) -> String {
    format!("Missing required field: {field}")
}

/// Validate a delivered job and convert it into pipeline input.
pub fn prepare(
    job: &JobMessage,
    fallback_owner: Option<&str>,
) -> Result<PipelineInput, ValidationError> {
    let mut problems = Vec::new();

    let required = [
        (&job.instructions.system, "system instructions"),
        (&job.instructions.clustering, "clustering instructions"),
        (&job.instructions.extraction, "extraction instructions"),
        (&job.instructions.dedup, "dedup instructions"),
        (&job.instructions.summaries, "summaries instructions"),
    ];
    for (value, field) in required {
        if value.trim().is_empty() {
            problems.push(missing(field));
        }
    }
    if job.options.cruxes_enabled
        && job
            .instructions
            .crux
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
    {
        problems.push(missing("crux instructions"));
    }
    if job.model.trim().is_empty() {
        problems.push(missing("model"));
    }
    if job.api_key.trim().is_empty() {
        problems.push(missing("api key"));
    }

    // Owner resolution: the message's user id, else the configured
    // legacy fallback for transferred reports.
    let user_id = match job.user_id.trim() {
        "" => match fallback_owner.map(str::trim).filter(|s| !s.is_empty()) {
            Some(owner) => owner.to_string(),
            None => {
                problems.push(missing("user id"));
                String::new()
            }
        },
        owner => owner.to_string(),
    };

    if job.comments.is_empty() {
        problems.push("No comments provided".to_string());
    } else {
        let blank: Vec<&str> = job
            .comments
            .iter()
            .filter(|c| c.is_blank())
            .map(|c| c.id.as_str())
            .collect();
        if !blank.is_empty() {
            let listed = blank
                .iter()
                .take(MAX_LISTED_IDS)
                .copied()
                .collect::<Vec<_>>()
                .join(", ");
            let suffix = if blank.len() > MAX_LISTED_IDS {
                format!(" (and {} more)", blank.len() - MAX_LISTED_IDS)
            } else {
                String::new()
            };
            problems.push(format!("Comments with empty text: {listed}{suffix}"));
        }
    }

    if !problems.is_empty() {
        return Err(ValidationError { problems });
    }

    Ok(PipelineInput {
        user_id,
        comments: job.comments.clone(),
        instructions: job.instructions.clone(),
        model: job.model.clone(),
        api_key: job.api_key.clone(),
        options: job.options,
    })
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
