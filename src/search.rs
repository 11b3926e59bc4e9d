//! # Search Module
//!
//! The web search side of the agent: the [`SearchClient`] trait the research
//! loop talks to, and [`TavilySearch`], the production implementation backed
//! by the Tavily Search API.
//!
//! Failures are reported once and never retried here. Every provider problem
//! (bad key, rate limit, timeout, 5xx) becomes
//! [`ResearchError::SearchUnavailable`] and the caller decides what to do.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ResearchError, Result};

// =============================================================================
// SEARCH RESULT STRUCT
// =============================================================================
/// A single search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Page title
    pub title: String,

    /// Page URL (may be empty when the provider has none)
    pub url: String,

    /// Extracted content/snippet
    pub content: String,

    /// Provider relevance score (0-1)
    #[serde(default)]
    pub score: f64,

    /// The follow-up query this hit answers, if it did not come from the
    /// original query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_query: Option<String>,
}

impl SearchHit {
    /// Create a hit with no score.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
            score: 0.0,
            follow_up_query: None,
        }
    }

    /// Set the relevance score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score.clamp(0.0, 1.0);
        self
    }
}

/// Format hits as a numbered markdown list (used by quick-search mode).
pub fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for: {query}");
    }

    let formatted = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. **{}**\n   URL: {}\n   {}\n",
                i + 1,
                hit.title,
                hit.url,
                hit.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("## Search Results for: {query}\n\n{formatted}")
}

// =============================================================================
// SEARCH CLIENT TRAIT
// =============================================================================
/// Anything that can turn a query into an ordered list of hits.
///
/// # Rust Concept: async-trait
///
/// `#[async_trait]` boxes the returned futures so the trait stays object
/// safe; the orchestrator holds an `Arc<dyn SearchClient>` and does not care
/// whether it talks to Tavily or to a test stub.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run one search.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;

    /// Provider name, for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// TAVILY ERRORS
// =============================================================================
/// Typed errors for the Tavily API, folded into `SearchUnavailable` at the
/// trait boundary.
#[derive(Debug, Error)]
enum TavilyError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized - check TAVILY_API key")]
    Unauthorized,

    #[error("rate limited - too many requests")]
    RateLimited,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    HttpError(u16, String),

    #[error("failed to parse response: {0}")]
    ParseError(String),
}

impl From<TavilyError> for ResearchError {
    fn from(e: TavilyError) -> Self {
        ResearchError::SearchUnavailable(format!("Tavily {e}"))
    }
}

impl From<reqwest::Error> for TavilyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TavilyError::Timeout
        } else if e.is_connect() {
            TavilyError::Connection(e.to_string())
        } else {
            TavilyError::Network(e.to_string())
        }
    }
}

/// Request body for the Tavily API
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    topic: &'static str,
    include_answer: bool,
}

/// Response from the Tavily API
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

impl From<TavilyResult> for SearchHit {
    fn from(r: TavilyResult) -> Self {
        SearchHit::new(r.title, r.url, r.content).with_score(r.score)
    }
}

// =============================================================================
// TAVILY CLIENT
// =============================================================================
/// Search client for the Tavily Search API.
#[derive(Clone)]
pub struct TavilySearch {
    api_key: String,
    api_base: String,
    client: Client,
    max_results: usize,
}

impl TavilySearch {
    /// Build a client from the run configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                ResearchError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            api_key: config.tavily_api_key.clone(),
            api_base: config.tavily_api_base.trim_end_matches('/').to_string(),
            client,
            max_results: config.max_search_results,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.api_base)
    }

    async fn execute(&self, query: &str) -> std::result::Result<TavilyResponse, TavilyError> {
        let request = TavilyRequest {
            query,
            max_results: self.max_results,
            search_depth: "basic",
            topic: "general",
            include_answer: false,
        };

        debug!(endpoint = %self.endpoint(), "Sending Tavily request");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            return response
                .json::<TavilyResponse>()
                .await
                .map_err(|e| TavilyError::ParseError(e.to_string()));
        }

        let error_text = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(TavilyError::Unauthorized),
            429 => Err(TavilyError::RateLimited),
            400 => Err(TavilyError::BadRequest(error_text)),
            code @ 500..=599 => Err(TavilyError::ServerError(code, error_text)),
            code => Err(TavilyError::HttpError(code, error_text)),
        }
    }
}

#[async_trait]
impl SearchClient for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::SearchUnavailable(
                "refusing to search for an empty query".to_string(),
            ));
        }

        info!(query = %query, "Performing web search");

        let response = self.execute(query).await.map_err(|e| {
            warn!(query = %query, error = %e, "Tavily search failed");
            ResearchError::from(e)
        })?;

        let hits: Vec<SearchHit> = response
            .results
            .into_iter()
            .take(self.max_results)
            .map(SearchHit::from)
            .collect();

        if hits.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = hits.len(), "Search completed");
        }

        Ok(hits)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}
