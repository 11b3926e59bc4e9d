//! # Error Module
//!
//! Typed errors for every stage of a research run.
//!
//! Provider failures are never retried or converted into partial answers:
//! they travel up to the orchestrator, which tags them with the phase that
//! failed (see [`RunError`]).

use std::fmt;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Everything that can go wrong while researching a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResearchError {
    /// Missing or invalid configuration. Raised before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The search provider errored, timed out or rejected the request.
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// The language model provider errored or could not be reached.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The language model declined to answer (content policy or empty reply).
    #[error("Model refused the request: {0}")]
    ModelRefused(String),

    /// A sufficiency/revision judgment could not be parsed.
    ///
    /// Callers recover from this locally by taking the terminating branch.
    #[error("Malformed model judgment: {0}")]
    MalformedJudgment(String),

    /// The overall wall-clock budget for the run was exhausted.
    #[error("Research run exceeded its {0}s time budget")]
    TimedOut(u64),
}

/// The stage of a run in which an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Search + analysis loop
    Research,
    /// Draft synthesis
    Draft,
    /// Evaluation, revision and finalization
    Review,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Research => write!(f, "research"),
            Phase::Draft => write!(f, "draft"),
            Phase::Review => write!(f, "review"),
        }
    }
}

/// A failed run: which phase broke, and the underlying error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{phase} phase failed: {source}")]
pub struct RunError {
    pub phase: Phase,
    #[source]
    pub source: ResearchError,
}

impl RunError {
    pub fn new(phase: Phase, source: ResearchError) -> Self {
        Self { phase, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_error_names_phase() {
        let err = RunError::new(
            Phase::Research,
            ResearchError::SearchUnavailable("HTTP 503".to_string()),
        );
        let message = err.to_string();
        assert!(message.starts_with("research phase failed"));
        assert!(message.contains("HTTP 503"));
    }

    #[test]
    fn test_run_error_exposes_source() {
        use std::error::Error;

        let err = RunError::new(Phase::Draft, ResearchError::ModelUnavailable("down".into()));
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Model unavailable: down"));
    }
}
