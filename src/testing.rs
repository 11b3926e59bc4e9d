//! Scripted clients for driving a run without network access.
//!
//! [`ScriptedModel`] answers per [`PromptTask`] from a queue of responses;
//! the last response for a task repeats once the queue is down to it.
//! [`ScriptedSearch`] answers per query. Both record every call so tests can
//! assert on what the pipeline asked for.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ResearchError, Result};
use crate::llm::{CompletionRequest, LanguageModel, PromptTask};
use crate::search::{SearchClient, SearchHit};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// SCRIPTED MODEL
// =============================================================================
/// A language model that replays scripted responses per task.
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<HashMap<PromptTask, VecDeque<Result<String>>>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text response for `task`.
    pub fn respond(self, task: PromptTask, text: impl Into<String>) -> Self {
        lock(&self.scripts)
            .entry(task)
            .or_default()
            .push_back(Ok(text.into()));
        self
    }

    /// Queue a failure for `task`.
    pub fn fail(self, task: PromptTask, error: ResearchError) -> Self {
        lock(&self.scripts)
            .entry(task)
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    /// Tasks of every request received, in order.
    pub fn tasks(&self) -> Vec<PromptTask> {
        lock(&self.calls).iter().map(|r| r.task).collect()
    }

    /// Number of requests received for `task`.
    pub fn calls_for(&self, task: PromptTask) -> usize {
        lock(&self.calls).iter().filter(|r| r.task == task).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        lock(&self.calls).push(request.clone());

        let mut scripts = lock(&self.scripts);
        let queue = scripts.get_mut(&request.task).ok_or_else(|| {
            ResearchError::ModelUnavailable(format!(
                "no scripted response for {} step",
                request.task
            ))
        })?;

        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };

        next.unwrap_or_else(|| {
            Err(ResearchError::ModelUnavailable(format!(
                "no scripted response for {} step",
                request.task
            )))
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// =============================================================================
// SCRIPTED SEARCH
// =============================================================================
/// A search client with canned hits per query.
///
/// Queries without canned hits return one generic hit derived from the
/// query, so every search contributes a distinct source.
#[derive(Default)]
pub struct ScriptedSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    failing: HashSet<String>,
    fail_all: Option<ResearchError>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned hits for `query`.
    pub fn with_hits(mut self, query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        self.hits.insert(query.into(), hits);
        self
    }

    /// Fail every search for `query`.
    pub fn fail_on(mut self, query: impl Into<String>) -> Self {
        self.failing.insert(query.into());
        self
    }

    /// Fail every search.
    pub fn unavailable(mut self, error: ResearchError) -> Self {
        self.fail_all = Some(error);
        self
    }

    /// Sleep for `delay` before answering each search.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries received, in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.queries).len()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        lock(&self.queries).push(query.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.fail_all {
            return Err(error.clone());
        }
        if self.failing.contains(query) {
            return Err(ResearchError::SearchUnavailable(format!(
                "scripted failure for '{query}'"
            )));
        }

        Ok(self.hits.get(query).cloned().unwrap_or_else(|| {
            let slug: String = query
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
                .collect();
            vec![SearchHit::new(
                query,
                format!("https://example.com/{slug}"),
                format!("Background on {query}"),
            )]
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: PromptTask) -> CompletionRequest {
        CompletionRequest::new(task, "preamble", "prompt")
    }

    #[tokio::test]
    async fn test_scripted_model_replays_then_repeats_last() {
        let model = ScriptedModel::new()
            .respond(PromptTask::Analyze, "first")
            .respond(PromptTask::Analyze, "second");

        assert_eq!(model.complete(&request(PromptTask::Analyze)).await.unwrap(), "first");
        assert_eq!(model.complete(&request(PromptTask::Analyze)).await.unwrap(), "second");
        assert_eq!(model.complete(&request(PromptTask::Analyze)).await.unwrap(), "second");
        assert_eq!(model.calls_for(PromptTask::Analyze), 3);
    }

    #[tokio::test]
    async fn test_scripted_model_unscripted_task_is_unavailable() {
        let model = ScriptedModel::new();
        let err = model.complete(&request(PromptTask::Draft)).await.unwrap_err();

        assert!(matches!(err, ResearchError::ModelUnavailable(_)));
        assert_eq!(model.tasks(), vec![PromptTask::Draft]);
    }

    #[tokio::test]
    async fn test_scripted_search_defaults_and_failures() {
        let search = ScriptedSearch::new().fail_on("broken");

        let hits = search.search("Rust async").await.unwrap();
        assert_eq!(hits[0].url, "https://example.com/rust-async");
        assert!(search.search("broken").await.is_err());
        assert_eq!(search.queries(), vec!["Rust async", "broken"]);
    }
}
