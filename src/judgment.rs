//! # Judgment Module
//!
//! The two decision points of a run are answered by the model as JSON:
//!
//! - after each search: `{"sufficient": bool, "follow_up_queries": [..]}`
//! - after each draft: `{"complete": bool, "gaps": [..]}`
//!
//! Parsing is strict about shape and types. Anything that does not fit is a
//! [`ResearchError::MalformedJudgment`], which callers recover from with the
//! terminating branch (`*_or_fail_open`).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ResearchError, Result};

// =============================================================================
// RESEARCH SUFFICIENCY
// =============================================================================
/// Whether the accumulated research answers the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchJudgment {
    pub sufficient: bool,

    #[serde(default)]
    pub follow_up_queries: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ResearchJudgment {
    /// Parse a model completion.
    ///
    /// An "insufficient" judgment must name at least one non-blank follow-up
    /// query, otherwise there is nothing to act on and it counts as malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let mut judgment: Self = parse_json_object(text)?;

        judgment.follow_up_queries = judgment
            .follow_up_queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect();

        if !judgment.sufficient && judgment.follow_up_queries.is_empty() {
            return Err(ResearchError::MalformedJudgment(
                "insufficient judgment without follow-up queries".to_string(),
            ));
        }

        Ok(judgment)
    }

    /// Parse, falling back to "sufficient" when the completion is malformed.
    pub fn parse_or_fail_open(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|e| {
            warn!(error = %e, "Unusable research judgment, ending research");
            Self::sufficient()
        })
    }

    /// The terminating judgment.
    pub fn sufficient() -> Self {
        Self {
            sufficient: true,
            follow_up_queries: Vec::new(),
            reasoning: None,
        }
    }
}

// =============================================================================
// DRAFT COMPLETENESS
// =============================================================================
/// Whether a draft fully answers the query, and what it is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftVerdict {
    pub complete: bool,

    #[serde(default)]
    pub gaps: Vec<String>,
}

impl DraftVerdict {
    pub fn parse(text: &str) -> Result<Self> {
        let mut verdict: Self = parse_json_object(text)?;
        verdict.gaps.retain(|g| !g.trim().is_empty());
        Ok(verdict)
    }

    /// Parse, falling back to "complete" when the completion is malformed.
    pub fn parse_or_fail_open(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|e| {
            warn!(error = %e, "Unusable draft verdict, treating draft as complete");
            Self::complete()
        })
    }

    pub fn complete() -> Self {
        Self {
            complete: true,
            gaps: Vec::new(),
        }
    }
}

// =============================================================================
// JSON EXTRACTION
// =============================================================================
fn parse_json_object<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T> {
    let json = extract_json_object(text).ok_or_else(|| {
        ResearchError::MalformedJudgment(format!("no JSON object in: {}", preview(text)))
    })?;

    serde_json::from_str(json).map_err(|e| ResearchError::MalformedJudgment(e.to_string()))
}

/// Locate the outermost `{...}` in a completion, ignoring code fences and
/// surrounding prose.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(80) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
