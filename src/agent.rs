//! # Agent Module
//!
//! The orchestrator: Research → Draft → Review, one run per query.
//!
//! `ResearchAgent` owns the clients behind trait objects, so the same
//! pipeline runs against Tavily + OpenAI in production and against scripted
//! clients in tests.

use std::future::Future;
use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::draft::DraftStep;
use crate::error::{Phase, ResearchError, Result, RunError};
use crate::llm::{LanguageModel, RigLanguageModel};
use crate::research::ResearchStep;
use crate::review::{FinalAnswer, ReviewStep};
use crate::search::{format_hits, SearchClient, TavilySearch};

// =============================================================================
// RESEARCH AGENT STRUCT
// =============================================================================
/// The main research agent that sequences the search and model calls.
///
/// # Rust Concept: Trait Objects Behind `Arc`
///
/// `Arc<dyn SearchClient>` lets the agent hold *any* search implementation
/// and share it cheaply. The concrete type is chosen at construction time.
pub struct ResearchAgent {
    /// Configuration for the agent
    config: Config,

    /// Web search provider
    search: Arc<dyn SearchClient>,

    /// Language model provider
    model: Arc<dyn LanguageModel>,
}

impl ResearchAgent {
    /// Create an agent backed by Tavily and OpenAI.
    ///
    /// Fails with [`ResearchError::Configuration`] before any network call
    /// when the configuration is incomplete.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let search = Arc::new(TavilySearch::new(&config)?);
        let model = Arc::new(RigLanguageModel::new(&config)?);

        Ok(Self {
            config,
            search,
            model,
        })
    }

    /// Create an agent with explicit clients.
    pub fn with_clients(
        config: Config,
        search: Arc<dyn SearchClient>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        config.validate_limits()?;

        Ok(Self {
            config,
            search,
            model,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Research a query and return the final cited answer.
    ///
    /// The first unrecovered error ends the run; the returned [`RunError`]
    /// names the phase it happened in. No partial answer is produced.
    pub async fn run(&self, query: &str) -> std::result::Result<FinalAnswer, RunError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RunError::new(
                Phase::Research,
                ResearchError::Configuration("research query must not be empty".to_string()),
            ));
        }

        info!(
            query = %query,
            search = self.search.name(),
            model = self.model.name(),
            mode = %self.config.execution_mode,
            "Starting research task"
        );

        let deadline = self.config.run_timeout().map(|budget| Instant::now() + budget);

        let research = ResearchStep::new(self.search.as_ref(), self.model.as_ref(), &self.config);
        let state = self.within(deadline, Phase::Research, research.run(query)).await?;

        let drafting = DraftStep::new(self.model.as_ref());
        let draft = self.within(deadline, Phase::Draft, drafting.run(query, &state)).await?;

        let review = ReviewStep::new(self.model.as_ref(), &self.config);
        let answer = self.within(deadline, Phase::Review, review.run(query, draft)).await?;

        info!(
            searches = state.iterations,
            citations = answer.citations.len(),
            "Research completed successfully"
        );
        Ok(answer)
    }

    /// Perform a quick search without any model calls.
    ///
    /// This is useful when you just want search results without
    /// the agent synthesizing them.
    pub async fn quick_search(&self, query: &str) -> Result<String> {
        info!(query = %query, "Performing quick search");

        let hits = self.search.search(query).await?;
        Ok(format_hits(query, &hits))
    }

    /// Await one phase, bounded by the run deadline, tagging errors with it.
    async fn within<T>(
        &self,
        deadline: Option<Instant>,
        phase: Phase,
        step: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, RunError> {
        let outcome = match deadline {
            Some(deadline) => match timeout_at(deadline, step).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let budget = self.config.run_timeout_secs.unwrap_or_default();
                    warn!(%phase, budget_secs = budget, "Run time budget exhausted");
                    Err(ResearchError::TimedOut(budget))
                }
            },
            None => step.await,
        };

        outcome.map_err(|source| RunError::new(phase, source))
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptTask;
    use crate::testing::{ScriptedModel, ScriptedSearch};

    fn agent_with(
        search: ScriptedSearch,
        model: ScriptedModel,
    ) -> (ResearchAgent, Arc<ScriptedSearch>, Arc<ScriptedModel>) {
        let search = Arc::new(search);
        let model = Arc::new(model);
        let agent = ResearchAgent::with_clients(
            Config::with_keys("sk-test", "tvly-test"),
            search.clone(),
            model.clone(),
        )
        .unwrap();
        (agent, search, model)
    }

    #[test]
    fn test_new_requires_keys() {
        let result = ResearchAgent::new(Config::default());
        assert!(matches!(result, Err(ResearchError::Configuration(_))));
    }

    #[test]
    fn test_new_with_keys() {
        let agent = ResearchAgent::new(Config::with_keys("sk-test", "tvly-test")).unwrap();
        assert_eq!(agent.config().max_research_iterations, 3);
    }

    #[test]
    fn test_with_clients_rejects_bad_limits() {
        let mut config = Config::with_keys("sk-test", "tvly-test");
        config.max_research_iterations = 0;

        let result = ResearchAgent::with_clients(
            config,
            Arc::new(ScriptedSearch::new()),
            Arc::new(ScriptedModel::new()),
        );
        assert!(matches!(result, Err(ResearchError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_any_call() {
        let (agent, search, model) = agent_with(ScriptedSearch::new(), ScriptedModel::new());

        let err = agent.run("   ").await.unwrap_err();

        assert_eq!(err.phase, Phase::Research);
        assert!(matches!(err.source, ResearchError::Configuration(_)));
        assert_eq!(search.calls(), 0);
        assert!(model.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_draft_failure_is_tagged_with_draft_phase() {
        let model = ScriptedModel::new()
            .respond(PromptTask::Analyze, r#"{"sufficient": true}"#)
            .fail(PromptTask::Draft, ResearchError::ModelUnavailable("down".to_string()));
        let (agent, _, model) = agent_with(ScriptedSearch::new(), model);

        let err = agent.run("q").await.unwrap_err();

        assert_eq!(err.phase, Phase::Draft);
        assert_eq!(model.calls_for(PromptTask::Evaluate), 0);
    }

    #[tokio::test]
    async fn test_quick_search_skips_the_model() {
        let (agent, search, model) = agent_with(ScriptedSearch::new(), ScriptedModel::new());

        let output = agent.quick_search("Rust").await.unwrap();

        assert!(output.contains("https://example.com/rust"));
        assert_eq!(search.calls(), 1);
        assert!(model.tasks().is_empty());
    }
}
