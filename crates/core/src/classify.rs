// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transient/permanent error classification.
//!
//! Every raw infrastructure or pipeline error is reduced to a
//! [`Classification`] at the adapter boundary; the job handler never
//! re-classifies. The rules are applied in order:
//!
//! 1. numeric HTTP-like status code,
//! 2. document-store string code taxonomy,
//! 3. case-insensitive substring heuristics on the message,
//! 4. default: permanent (unknown errors must not retry forever).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad bucket an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Infrastructure,
    Pipeline,
    Concurrency,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Infrastructure => write!(f, "infrastructure"),
            ErrorCategory::Pipeline => write!(f, "pipeline"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// The classified view of a raw error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub transient: bool,
    pub category: ErrorCategory,
    pub message: String,
}

/// The facets of a raw error the classifier inspects.
///
/// Adapters extract these from their client library's error type; the
/// shape-sniffing lives here and nowhere else.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorFacets<'a> {
    pub http_status: Option<u16>,
    pub store_code: Option<&'a str>,
    pub message: &'a str,
}

/// Message substrings indicating a retryable condition.
const TRANSIENT_HINTS: &[&str] = &[
    "timeout",
    "etimedout",
    "econnrefused",
    "econnreset",
    "unavailable",
    "deadline",
    "429",
    "503",
    "504",
];

/// Message substrings indicating a terminal condition.
const PERMANENT_HINTS: &[&str] = &[
    "permission",
    "access denied",
    "unauthorized",
    "forbidden",
    "not found",
    "no such object",
    "invalid",
    "403",
    "401",
    "404",
];

/// Document-store string codes that are worth retrying.
const TRANSIENT_STORE_CODES: &[&str] = &[
    "unavailable",
    "deadline-exceeded",
    "aborted",
    "internal",
    "resource-exhausted",
];

/// Document-store string codes that will never succeed on retry.
const PERMANENT_STORE_CODES: &[&str] = &[
    "permission-denied",
    "unauthenticated",
    "not-found",
    "already-exists",
    "failed-precondition",
    "invalid-argument",
];

/// Classify a raw error into the two-bucket retry taxonomy.
pub fn classify(category: ErrorCategory, facets: ErrorFacets<'_>) -> Classification {
    Classification {
        transient: is_transient(facets),
        category,
        message: facets.message.to_string(),
    }
}

/// The pure transient/permanent decision.
pub fn is_transient(facets: ErrorFacets<'_>) -> bool {
    if let Some(status) = facets.http_status {
        return match status {
            408 | 429 => true,
            500..=599 => true,
            _ => false,
        };
    }

    if let Some(code) = facets.store_code {
        let code = code.to_ascii_lowercase();
        if TRANSIENT_STORE_CODES.contains(&code.as_str()) {
            return true;
        }
        if PERMANENT_STORE_CODES.contains(&code.as_str()) {
            return false;
        }
    }

    let message = facets.message.to_ascii_lowercase();
    if TRANSIENT_HINTS.iter().any(|hint| message.contains(hint)) {
        return true;
    }
    if PERMANENT_HINTS.iter().any(|hint| message.contains(hint)) {
        return false;
    }

    // Unknown errors default to permanent so redelivery cannot loop on
    // a job that will never succeed.
    false
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
