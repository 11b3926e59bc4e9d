//! Prompt templates for each step of a research run.
//!
//! - Analyst: judges research sufficiency, proposes follow-up queries
//! - Drafter: synthesizes research into a cited answer
//! - Evaluator: judges draft completeness
//! - Reviser: closes the gaps the evaluator found
//! - Editor: polishes the draft into the final answer with references
//!
//! Judgment prompts ask for a single JSON object; see [`crate::judgment`].

use crate::state::{format_cited_sources, ResearchState, Source};

/// Prompt templates for the research workflow
pub struct ResearchPrompts;

impl ResearchPrompts {
    /// Analyst preamble for the sufficiency judgment.
    pub fn analyst(max_follow_ups: usize) -> String {
        format!(
            r#"You are a research analyst who evaluates search results.

Decide whether the search results adequately answer the original query.
If they do not, propose at most {max_follow_ups} focused follow-up search queries
that would gather the missing information. Do not repeat queries that were
already searched.

Respond with a single JSON object and nothing else:

{{"sufficient": true|false, "follow_up_queries": ["..."], "reasoning": "..."}}

When "sufficient" is false, "follow_up_queries" must not be empty."#
        )
    }

    /// User prompt for the sufficiency judgment.
    pub fn analyze(state: &ResearchState) -> String {
        format!(
            "Original Query: {}\n\nQueries already searched:\n{}\n\nResearch Results:\n{}",
            state.query,
            bullet_list(&state.issued_queries),
            state.format_results()
        )
    }

    /// Drafter preamble.
    pub fn drafter() -> String {
        r#"You are an expert at synthesizing research into clear, comprehensive answers.

Based on the provided research results, write a well-structured and informative
response that directly addresses the original query.

- At the end of each paragraph or key point, cite the supporting source by its
  number, like [1] or [2].
- If multiple results support a point, include up to 2 citations.
- Only cite numbers that appear in the research results below.
- If the research results do not contain enough information to fully answer
  the query, say so."#
            .to_string()
    }

    /// User prompt for the first draft.
    pub fn draft(query: &str, sources: &[Source]) -> String {
        format!(
            "Original Query: {query}\n\nResearch Results:\n{}",
            cited_or_placeholder(sources)
        )
    }

    /// Evaluator preamble for the completeness verdict.
    pub fn evaluator() -> String {
        r#"You evaluate the quality and completeness of an answer draft.

Determine whether the draft adequately addresses every part of the original
query given the research results. If aspects remain unaddressed or the
information seems insufficient, list what is missing.

Respond with a single JSON object and nothing else:

{"complete": true|false, "gaps": ["..."]}"#
            .to_string()
    }

    /// User prompt for the completeness verdict.
    pub fn evaluate(query: &str, draft: &str, sources: &[Source]) -> String {
        format!(
            "Original Query: {query}\n\nDrafted Answer:\n{draft}\n\nResearch Results:\n{}",
            cited_or_placeholder(sources)
        )
    }

    /// Reviser preamble.
    pub fn reviser() -> String {
        r#"You revise answer drafts so they fully address the original query.

Rewrite the draft to close the listed gaps using only the research results.
Keep every existing citation that is still supported, cite new material by its
source number like [3], and never invent sources. If the research results do
not cover a gap, state that plainly instead of guessing."#
            .to_string()
    }

    /// User prompt for a revision round.
    pub fn revise(query: &str, draft: &str, gaps: &[String], sources: &[Source]) -> String {
        format!(
            "Original Query: {query}\n\nCurrent Draft:\n{draft}\n\n\
             Missing from the draft:\n{}\n\nResearch Results:\n{}",
            bullet_list(gaps),
            cited_or_placeholder(sources)
        )
    }

    /// Editor preamble for the final answer.
    pub fn editor() -> String {
        r#"You are a skilled editor who refines draft content into polished, final answers.

Review the drafted answer and improve it:
1. Ensure all parts of the original query are addressed
2. Improve clarity, structure, and flow
3. Eliminate redundancy
4. At the end of each key point, cite the research source as [1], [2], etc.
5. Format the answer with headers and bullet points where they help
6. End with a complete References section listing every cited source

Format the References section like this:

References:
1. [Title 1](URL1)
2. [Title 2](URL2)

Every citation in the text must have a matching References entry.
Do not remove citations from the body."#
            .to_string()
    }

    /// User prompt for the final answer.
    pub fn finalize(query: &str, draft: &str, sources: &[Source]) -> String {
        format!(
            "Original Query: {query}\n\nDraft Answer:\n{draft}\n\nResearch Results:\n{}",
            cited_or_placeholder(sources)
        )
    }
}

fn cited_or_placeholder(sources: &[Source]) -> String {
    if sources.is_empty() {
        "(no usable research results)".to_string()
    } else {
        format_cited_sources(sources)
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
