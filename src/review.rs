//! # Review Step
//!
//! Evaluate → revise rounds followed by one finalize call.
//!
//! The evaluation runs at most `max_revision_rounds` times and stops at the
//! first "complete" verdict. A verdict that cannot be parsed counts as
//! complete. The finalize call turns the (possibly revised) draft into the
//! [`FinalAnswer`], whose citations are checked against the source list.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::draft::Draft;
use crate::error::Result;
use crate::judgment::DraftVerdict;
use crate::llm::{CompletionRequest, LanguageModel, PromptTask};
use crate::prompts::ResearchPrompts;
use crate::state::Source;

// =============================================================================
// FINAL ANSWER
// =============================================================================
/// The polished answer and the sources it cites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub text: String,

    /// Cited sources, ascending by number, each once
    pub citations: Vec<Source>,
}

impl FinalAnswer {
    /// Build the answer from the finalize completion.
    ///
    /// The text is kept as written except for citation markers that point at
    /// no source, which are removed. A References section is appended only
    /// when the text cites sources and has no References heading of its own.
    pub fn from_completion(text: String, sources: &[Source]) -> Self {
        let mut citations = Vec::new();
        let mut dangling = false;
        for number in cited_numbers(&text) {
            match sources.iter().find(|s| s.number == number) {
                Some(source) => citations.push(source.clone()),
                None => {
                    warn!(citation = number, "Dangling citation in final answer, removing it");
                    dangling = true;
                }
            }
        }

        let text = if dangling {
            strip_dangling_citations(&text, sources)
        } else {
            text
        };

        let text = if !citations.is_empty() && !has_references_section(&text) {
            format!("{}\n\n{}", text.trim_end(), references_section(&citations))
        } else {
            text
        };

        Self { text, citations }
    }
}

impl fmt::Display for FinalAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Numbers inside one bracket pair, if it is a citation marker.
fn marker_numbers(inner: &str) -> Option<Vec<usize>> {
    let is_citation = inner.chars().any(|c| c.is_ascii_digit())
        && inner.chars().all(|c| c.is_ascii_digit() || c == ',' || c == ' ');
    is_citation.then(|| {
        inner
            .split(',')
            .filter_map(|n| n.trim().parse::<usize>().ok())
            .collect()
    })
}

/// Every `[n]` citation number in `text`, including grouped ones like `[1, 3]`.
pub fn cited_numbers(text: &str) -> BTreeSet<usize> {
    let mut numbers = BTreeSet::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        rest = &rest[open + 1..];
        let Some(close) = rest.find(']') else {
            break;
        };

        if let Some(found) = marker_numbers(&rest[..close]) {
            numbers.extend(found);
        }
    }

    numbers
}

/// Rewrite citation markers so only numbers with a source remain.
///
/// A marker left with no numbers is removed together with its `(url)` link
/// target and the space before it.
fn strip_dangling_citations(text: &str, sources: &[Source]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find(']') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let Some(numbers) = marker_numbers(&after[..close]) else {
            out.push('[');
            rest = after;
            continue;
        };

        let kept: Vec<String> = numbers
            .iter()
            .filter(|n| sources.iter().any(|s| s.number == **n))
            .map(|n| n.to_string())
            .collect();
        let mut tail = &after[close + 1..];

        if kept.is_empty() {
            if tail.starts_with('(') {
                if let Some(end) = tail.find(')') {
                    tail = &tail[end + 1..];
                }
            }
            if out.ends_with(' ') {
                out.pop();
            }
        } else if kept.len() == numbers.len() {
            out.push_str(&rest[open..open + close + 2]);
        } else {
            out.push_str(&format!("[{}]", kept.join(", ")));
        }

        rest = tail;
    }

    out.push_str(rest);
    out
}

/// `References:` followed by one line per source.
pub fn references_section(sources: &[Source]) -> String {
    let lines: Vec<String> = sources.iter().map(Source::reference_line).collect();
    format!("References:\n{}", lines.join("\n"))
}

/// Whether some line is a References heading (`References:`, `## References`,
/// `**References**`).
fn has_references_section(text: &str) -> bool {
    text.lines().any(|line| {
        let heading = line
            .trim()
            .trim_start_matches('#')
            .trim_matches(|c: char| c == '*' || c.is_whitespace())
            .trim_end_matches(':')
            .trim_end_matches('*');
        heading.eq_ignore_ascii_case("references")
    })
}

// =============================================================================
// REVIEW STEP
// =============================================================================
pub struct ReviewStep<'a> {
    model: &'a dyn LanguageModel,
    config: &'a Config,
}

impl<'a> ReviewStep<'a> {
    pub fn new(model: &'a dyn LanguageModel, config: &'a Config) -> Self {
        Self { model, config }
    }

    /// Evaluate, revise as needed, then finalize.
    pub async fn run(&self, query: &str, mut draft: Draft) -> Result<FinalAnswer> {
        for round in 1..=self.config.max_revision_rounds {
            info!(round, "Evaluating draft...");
            let verdict = self.evaluate(query, &draft).await?;

            if verdict.complete {
                info!(round, "Draft judged complete");
                break;
            }

            info!(round, gaps = verdict.gaps.len(), "Revising draft...");
            draft.text = self.revise(query, &draft, &verdict.gaps).await?;
            draft.revisions += 1;
        }

        info!(revisions = draft.revisions, "Finalizing answer...");
        let request = CompletionRequest::new(
            PromptTask::Finalize,
            ResearchPrompts::editor(),
            ResearchPrompts::finalize(query, &draft.text, &draft.sources),
        );
        let text = self.model.complete(&request).await?;

        let answer = FinalAnswer::from_completion(text, &draft.sources);
        info!(citations = answer.citations.len(), "Final answer ready");
        Ok(answer)
    }

    async fn evaluate(&self, query: &str, draft: &Draft) -> Result<DraftVerdict> {
        let request = CompletionRequest::new(
            PromptTask::Evaluate,
            ResearchPrompts::evaluator(),
            ResearchPrompts::evaluate(query, &draft.text, &draft.sources),
        );
        let response = self.model.complete(&request).await?;
        Ok(DraftVerdict::parse_or_fail_open(&response))
    }

    async fn revise(&self, query: &str, draft: &Draft, gaps: &[String]) -> Result<String> {
        let request = CompletionRequest::new(
            PromptTask::Revise,
            ResearchPrompts::reviser(),
            ResearchPrompts::revise(query, &draft.text, gaps, &draft.sources),
        );
        self.model.complete(&request).await
    }
}
