//! Research state accumulated during one run.
//!
//! `ResearchState` is created per query, only ever grows, and is owned by a
//! single run. The numbered [`Source`] list derived from it is what every
//! citation in the final answer points into.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::search::SearchHit;

/// Characters of content used to recognise duplicate results without a URL.
const CONTENT_SIGNATURE_CHARS: usize = 100;

/// A numbered, deduplicated source available for citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// 1-based citation number
    pub number: usize,
    pub title: String,
    pub url: String,
    pub content: String,
}

impl Source {
    /// Citation marker as shown to the model: `[n](url)` or `[n]`.
    pub fn marker(&self) -> String {
        if self.url.is_empty() {
            format!("[{}]", self.number)
        } else {
            format!("[{}]({})", self.number, self.url)
        }
    }

    /// Reference-list line: `n. [title](url)`.
    pub fn reference_line(&self) -> String {
        let title = if self.title.trim().is_empty() {
            self.url.as_str()
        } else {
            self.title.as_str()
        };

        if self.url.is_empty() {
            format!("{}. {}", self.number, title)
        } else {
            format!("{}. [{}]({})", self.number, title, self.url)
        }
    }
}

/// Accumulated search results and loop bookkeeping for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    /// Original research query
    pub query: String,

    /// Every hit collected so far, in arrival order
    pub results: Vec<SearchHit>,

    /// Queries already searched, in issue order
    pub issued_queries: Vec<String>,

    /// Searches performed (the initial search included)
    pub iterations: usize,

    /// Upper bound for `iterations`
    pub max_iterations: usize,

    /// Stored content is truncated to this many characters
    pub max_content_chars: usize,
}

impl ResearchState {
    /// Create a new state for a query.
    pub fn new(query: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            issued_queries: Vec::new(),
            iterations: 0,
            max_iterations,
            max_content_chars: 2000,
        }
    }

    /// Configure the content truncation limit.
    pub fn with_content_limit(mut self, max_chars: usize) -> Self {
        self.max_content_chars = max_chars;
        self
    }

    /// Check if another search fits in the budget.
    pub fn can_search(&self) -> bool {
        self.iterations < self.max_iterations
    }

    /// Remaining search budget.
    pub fn remaining_searches(&self) -> usize {
        self.max_iterations.saturating_sub(self.iterations)
    }

    /// Whether an equivalent query has already been searched.
    pub fn has_issued(&self, query: &str) -> bool {
        let needle = normalize_query(query);
        self.issued_queries
            .iter()
            .any(|issued| normalize_query(issued) == needle)
    }

    /// Record one completed search.
    ///
    /// When `follow_up` is set, every hit is tagged with `query` as the
    /// follow-up it answers. Each call consumes one iteration.
    pub fn record_search(&mut self, query: &str, hits: Vec<SearchHit>, follow_up: bool) {
        debug_assert!(self.can_search(), "search recorded past the iteration bound");

        let limit = self.max_content_chars;
        self.results.extend(hits.into_iter().map(|mut hit| {
            hit.content = truncate_chars(&hit.content, limit);
            if follow_up {
                hit.follow_up_query = Some(query.to_string());
            }
            hit
        }));

        self.issued_queries.push(query.to_string());
        self.iterations += 1;
    }

    /// The deduplicated, numbered source list.
    ///
    /// Results are keyed by URL, or by the start of their content when they
    /// have no URL. Empty results are skipped. Numbering follows first
    /// appearance, so it is stable as the state grows.
    pub fn sources(&self) -> Vec<Source> {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for hit in &self.results {
            if hit.content.trim().is_empty() {
                continue;
            }

            let key = if hit.url.is_empty() {
                let signature: String =
                    hit.content.chars().take(CONTENT_SIGNATURE_CHARS).collect();
                format!("content:{signature}")
            } else {
                format!("url:{}", hit.url)
            };

            if seen.insert(key) {
                sources.push(Source {
                    number: sources.len() + 1,
                    title: hit.title.clone(),
                    url: hit.url.clone(),
                    content: hit.content.clone(),
                });
            }
        }

        sources
    }

    /// Look up a source by citation number.
    pub fn source(&self, number: usize) -> Option<Source> {
        self.sources().into_iter().find(|s| s.number == number)
    }

    /// Raw results formatted for the analysis prompt.
    pub fn format_results(&self) -> String {
        if self.results.is_empty() {
            return "(no results)".to_string();
        }

        self.results
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                let origin = hit
                    .follow_up_query
                    .as_deref()
                    .map(|q| format!(" (follow-up: {q})"))
                    .unwrap_or_default();
                format!(
                    "{}. {}{}\n   URL: {}\n   {}",
                    i + 1,
                    hit.title,
                    origin,
                    hit.url,
                    hit.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Format sources with their citation markers for drafting prompts.
pub fn format_cited_sources(sources: &[Source]) -> String {
    sources
        .iter()
        .map(|s| format!("{} {}", s.content, s.marker()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whitespace-collapsed, lowercased form used to compare queries.
pub(crate) fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Truncate to at most `max_chars` characters, on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
