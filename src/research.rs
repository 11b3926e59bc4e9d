//! # Research Step
//!
//! The iterative deepening loop:
//!
//! ```text
//! Searching -> Analyzing -> Done
//!                  |
//!                  +-> FollowUp -> Searching (one per follow-up) -> Analyzing
//! ```
//!
//! Every search, the initial one included, consumes one unit of the
//! iteration bound. The analysis runs after every search pass and its
//! judgment is the only way to keep researching; anything it cannot be
//! understood as ends the loop.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{Config, ExecutionMode};
use crate::error::{ResearchError, Result};
use crate::judgment::ResearchJudgment;
use crate::llm::{CompletionRequest, LanguageModel, PromptTask};
use crate::prompts::ResearchPrompts;
use crate::search::SearchClient;
use crate::state::{normalize_query, ResearchState};

/// Runs the search/analyze loop for one query.
///
/// # Rust Concept: Borrowed Trait Objects
///
/// The step only borrows the clients (`&dyn SearchClient`), so the
/// orchestrator keeps ownership and can reuse them for the next phase.
pub struct ResearchStep<'a> {
    search: &'a dyn SearchClient,
    model: &'a dyn LanguageModel,
    config: &'a Config,
}

impl<'a> ResearchStep<'a> {
    pub fn new(
        search: &'a dyn SearchClient,
        model: &'a dyn LanguageModel,
        config: &'a Config,
    ) -> Self {
        Self {
            search,
            model,
            config,
        }
    }

    /// Research `query` until the model is satisfied or the bound is hit.
    ///
    /// Search and model failures abort the step. Malformed judgments do not.
    /// A zero iteration bound is a [`ResearchError::Configuration`] error
    /// raised before any search.
    pub async fn run(&self, query: &str) -> Result<ResearchState> {
        if self.config.max_research_iterations == 0 {
            return Err(ResearchError::Configuration(
                "max_research_iterations must be at least 1".to_string(),
            ));
        }

        let mut state = ResearchState::new(query, self.config.max_research_iterations)
            .with_content_limit(self.config.max_content_chars);

        info!(query = %query, "Searching the web...");
        let hits = self.search.search(query).await?;
        debug!(hits = hits.len(), "Initial search returned");
        state.record_search(query, hits, false);

        loop {
            info!(
                iteration = state.iterations,
                max_iterations = state.max_iterations,
                results = state.results.len(),
                "Analyzing research needs..."
            );
            let judgment = self.analyze(&state).await?;

            if judgment.sufficient {
                info!(iteration = state.iterations, "Research judged sufficient");
                break;
            }

            if !state.can_search() {
                info!(
                    max_iterations = state.max_iterations,
                    "Iteration bound reached, ending research"
                );
                break;
            }

            let follow_ups = self.select_follow_ups(&state, &judgment);
            if follow_ups.is_empty() {
                warn!(
                    proposed = judgment.follow_up_queries.len(),
                    per_round = self.config.max_follow_up_queries,
                    remaining = state.remaining_searches(),
                    "No new follow-up query fits the per-round limit and search budget, \
                     ending research"
                );
                break;
            }

            info!(
                count = follow_ups.len(),
                mode = %self.config.execution_mode,
                "Searching the web..."
            );
            match self.config.execution_mode {
                ExecutionMode::Sequential => {
                    self.follow_up_sequential(&mut state, &follow_ups).await?
                }
                ExecutionMode::Concurrent => {
                    self.follow_up_concurrent(&mut state, &follow_ups).await?
                }
            }
        }

        info!(
            searches = state.iterations,
            sources = state.sources().len(),
            "Research complete"
        );
        Ok(state)
    }

    async fn analyze(&self, state: &ResearchState) -> Result<ResearchJudgment> {
        let request = CompletionRequest::new(
            PromptTask::Analyze,
            ResearchPrompts::analyst(self.config.max_follow_up_queries),
            ResearchPrompts::analyze(state),
        );

        let response = self.model.complete(&request).await?;
        Ok(ResearchJudgment::parse_or_fail_open(&response))
    }

    /// New follow-up queries, capped by the per-analysis limit and by the
    /// remaining search budget. Queries equal after whitespace and case
    /// folding count once.
    fn select_follow_ups(
        &self,
        state: &ResearchState,
        judgment: &ResearchJudgment,
    ) -> Vec<String> {
        let limit = self
            .config
            .max_follow_up_queries
            .min(state.remaining_searches());

        let mut selected: Vec<String> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for candidate in &judgment.follow_up_queries {
            if selected.len() >= limit {
                break;
            }

            let normalized = normalize_query(candidate);
            let repeated = state.has_issued(candidate) || seen.contains(&normalized);
            if repeated {
                debug!(query = %candidate, "Skipping repeated follow-up");
                continue;
            }

            seen.push(normalized);
            selected.push(candidate.clone());
        }

        selected
    }

    async fn follow_up_sequential(
        &self,
        state: &mut ResearchState,
        queries: &[String],
    ) -> Result<()> {
        for query in queries {
            debug!(query = %query, "Follow-up search");
            let hits = self.search.search(query).await?;
            state.record_search(query, hits, true);
        }
        Ok(())
    }

    /// Issue all follow-ups together; results are recorded in follow-up
    /// order regardless of completion order.
    async fn follow_up_concurrent(
        &self,
        state: &mut ResearchState,
        queries: &[String],
    ) -> Result<()> {
        let outcomes = join_all(queries.iter().map(|query| self.search.search(query))).await;

        for (query, outcome) in queries.iter().zip(outcomes) {
            let hits = outcome?;
            state.record_search(query, hits, true);
        }
        Ok(())
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchHit;
    use crate::testing::{ScriptedModel, ScriptedSearch};

    fn config(max_iterations: usize, mode: ExecutionMode) -> Config {
        let mut config = Config::with_keys("sk-test", "tvly-test");
        config.max_research_iterations = max_iterations;
        config.execution_mode = mode;
        config
    }

    fn insufficient(queries: &[&str]) -> String {
        serde_json::json!({ "sufficient": false, "follow_up_queries": queries }).to_string()
    }

    const SUFFICIENT: &str = r#"{"sufficient": true}"#;

    #[tokio::test]
    async fn test_sufficient_after_first_search() {
        let search = ScriptedSearch::new()
            .with_hits("q", vec![SearchHit::new("A", "https://a.com", "alpha")]);
        let model = ScriptedModel::new().respond(PromptTask::Analyze, SUFFICIENT);
        let config = config(3, ExecutionMode::Sequential);

        let state = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap();

        assert_eq!(state.iterations, 1);
        assert_eq!(search.queries(), vec!["q"]);
        assert_eq!(model.calls_for(PromptTask::Analyze), 1);
    }

    #[tokio::test]
    async fn test_follow_ups_capped_by_remaining_budget() {
        let search = ScriptedSearch::new();
        let model = ScriptedModel::new()
            .respond(PromptTask::Analyze, insufficient(&["a", "b", "c"]));
        let config = config(2, ExecutionMode::Sequential);

        let state = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap();

        assert_eq!(state.iterations, 2);
        assert_eq!(search.queries(), vec!["q", "a"]);
    }

    #[tokio::test]
    async fn test_follow_ups_capped_per_analysis() {
        let search = ScriptedSearch::new();
        let model = ScriptedModel::new()
            .respond(PromptTask::Analyze, insufficient(&["a", "b", "c", "d"]))
            .respond(PromptTask::Analyze, SUFFICIENT);
        let mut config = config(10, ExecutionMode::Sequential);
        config.max_follow_up_queries = 2;

        let state = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap();

        assert_eq!(search.queries(), vec!["q", "a", "b"]);
        assert_eq!(state.iterations, 3);
    }

    #[tokio::test]
    async fn test_repeated_follow_ups_end_research() {
        let search = ScriptedSearch::new();
        let model =
            ScriptedModel::new().respond(PromptTask::Analyze, insufficient(&["Q", " q "]));
        let config = config(3, ExecutionMode::Sequential);

        let state = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap();

        assert_eq!(state.iterations, 1);
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_follow_ups_in_one_judgment_searched_once() {
        let search = ScriptedSearch::new();
        let model = ScriptedModel::new()
            .respond(PromptTask::Analyze, insufficient(&["detail", "DETAIL"]))
            .respond(PromptTask::Analyze, SUFFICIENT);
        let config = config(5, ExecutionMode::Concurrent);

        ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap();

        assert_eq!(search.queries(), vec!["q", "detail"]);
    }

    #[tokio::test]
    async fn test_whitespace_variants_in_one_judgment_searched_once() {
        let search = ScriptedSearch::new();
        let model = ScriptedModel::new()
            .respond(PromptTask::Analyze, insufficient(&["a  b", "A b", "c"]))
            .respond(PromptTask::Analyze, SUFFICIENT);
        let config = config(5, ExecutionMode::Sequential);

        ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap();

        assert_eq!(search.queries(), vec!["q", "a  b", "c"]);
    }

    #[tokio::test]
    async fn test_zero_iteration_bound_rejected_before_searching() {
        let search = ScriptedSearch::new();
        let model = ScriptedModel::new().respond(PromptTask::Analyze, SUFFICIENT);
        let config = config(0, ExecutionMode::Sequential);

        let err = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::Configuration(_)));
        assert_eq!(search.calls(), 0);
        assert!(model.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_judgment_ends_research() {
        let search = ScriptedSearch::new();
        let model =
            ScriptedModel::new().respond(PromptTask::Analyze, "needs more research, maybe");
        let config = config(3, ExecutionMode::Sequential);

        let state = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap();

        assert_eq!(state.iterations, 1);
        assert_eq!(model.calls_for(PromptTask::Analyze), 1);
    }

    #[tokio::test]
    async fn test_concurrent_records_in_follow_up_order() {
        let search = ScriptedSearch::new()
            .with_hits("a", vec![SearchHit::new("A", "https://a.com", "alpha")])
            .with_hits("b", vec![SearchHit::new("B", "https://b.com", "beta")]);
        let model = ScriptedModel::new()
            .respond(PromptTask::Analyze, insufficient(&["a", "b"]))
            .respond(PromptTask::Analyze, SUFFICIENT);
        let config = config(3, ExecutionMode::Concurrent);

        let state = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap();

        let urls: Vec<_> = state.results.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/q", "https://a.com", "https://b.com"]);
        assert_eq!(state.results[2].follow_up_query.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_follow_up_failure_aborts() {
        let search = ScriptedSearch::new().fail_on("b");
        let model =
            ScriptedModel::new().respond(PromptTask::Analyze, insufficient(&["a", "b"]));
        let config = config(3, ExecutionMode::Concurrent);

        let err = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::SearchUnavailable(_)));
    }

    #[tokio::test]
    async fn test_model_failure_aborts() {
        let search = ScriptedSearch::new();
        let model = ScriptedModel::new().fail(
            PromptTask::Analyze,
            ResearchError::ModelUnavailable("503".to_string()),
        );
        let config = config(3, ExecutionMode::Sequential);

        let err = ResearchStep::new(&search, &model, &config)
            .run("q")
            .await
            .unwrap_err();

        assert_eq!(err, ResearchError::ModelUnavailable("503".to_string()));
    }
}
