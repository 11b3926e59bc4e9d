//! # Deep Research Agent
//!
//! A bounded research pipeline over a web-search API and an LLM:
//!
//! 1. **Research**: search, ask the model whether the results answer the
//!    query, search its follow-up queries, repeat up to a fixed bound
//! 2. **Draft**: synthesize a cited answer from the numbered sources
//! 3. **Review**: evaluate the draft, revise it if needed, then finalize it
//!    into the answer with a References section
//!
//! ```no_run
//! use deep_research_agent::{Config, ResearchAgent};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let agent = ResearchAgent::new(Config::from_env()?)?;
//! let answer = agent.run("How does quantum computing threaten RSA?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================
/// Configuration management
pub mod config;

/// Error taxonomy and phase-tagged run errors
pub mod error;

/// Web search client
pub mod search;

/// Language model client
pub mod llm;

/// Accumulated research and numbered sources
pub mod state;

/// Sufficiency and completeness judgments
pub mod judgment;

/// Prompt templates
pub mod prompts;

/// Search/analyze loop
pub mod research;

/// Draft synthesis
pub mod draft;

/// Evaluation, revision and finalization
pub mod review;

/// Orchestrator
pub mod agent;

/// Scripted clients for offline runs
pub mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================
pub use agent::ResearchAgent;
pub use config::{Config, ExecutionMode};
pub use draft::Draft;
pub use error::{Phase, ResearchError, Result, RunError};
pub use llm::{CompletionRequest, LanguageModel, PromptTask, RigLanguageModel};
pub use review::FinalAnswer;
pub use search::{SearchClient, SearchHit, TavilySearch};
pub use state::{ResearchState, Source};
