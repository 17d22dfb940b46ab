// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline input element

use serde::{Deserialize, Serialize};

/// A single comment to be processed by the pipeline.
///
/// Invariant (enforced at validation, not construction): `text` is
/// non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl CommentRecord {
    /// True when the text is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// The speaker name, if present and non-empty after trimming.
    pub fn speaker_name(&self) -> Option<&str> {
        self.speaker
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
#[path = "comment_tests.rs"]
mod tests;
