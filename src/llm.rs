//! # Language Model Module
//!
//! The [`LanguageModel`] trait is the only way the pipeline talks to an LLM:
//! one prompt in, one completion out, no retries. [`RigLanguageModel`] is
//! the production implementation on top of Rig's OpenAI provider.
//!
//! Each request names the [`PromptTask`] it serves. The task decides which
//! model role handles it: judgments (analyze, evaluate) go to the
//! deterministic *researcher* settings, writing (draft, revise, finalize)
//! goes to the *drafter* settings.

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai::Client;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ResearchError, Result};

// =============================================================================
// REQUEST TYPES
// =============================================================================
/// The pipeline step a completion is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTask {
    /// Judge whether research is sufficient, propose follow-ups
    Analyze,
    /// Synthesize the first draft
    Draft,
    /// Judge whether the draft answers the query
    Evaluate,
    /// Rewrite the draft to close identified gaps
    Revise,
    /// Polish the draft into the cited final answer
    Finalize,
}

impl PromptTask {
    /// Which model role serves this task.
    pub fn role(&self) -> ModelRole {
        match self {
            PromptTask::Analyze | PromptTask::Evaluate => ModelRole::Researcher,
            PromptTask::Draft | PromptTask::Revise | PromptTask::Finalize => ModelRole::Drafter,
        }
    }
}

impl fmt::Display for PromptTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PromptTask::Analyze => "analyze",
            PromptTask::Draft => "draft",
            PromptTask::Evaluate => "evaluate",
            PromptTask::Revise => "revise",
            PromptTask::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Model settings group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Researcher,
    Drafter,
}

/// A single completion request: system instructions plus one user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub task: PromptTask,
    pub preamble: String,
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(task: PromptTask, preamble: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            task,
            preamble: preamble.into(),
            prompt: prompt.into(),
        }
    }
}

// =============================================================================
// LANGUAGE MODEL TRAIT
// =============================================================================
/// A text-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion.
    ///
    /// Fails with [`ResearchError::ModelUnavailable`] on provider errors and
    /// [`ResearchError::ModelRefused`] when the provider declines to answer.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Provider name, for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// RIG / OPENAI IMPLEMENTATION
// =============================================================================
/// OpenAI-backed model built on rig-core.
pub struct RigLanguageModel {
    client: Client,
    research_model: String,
    draft_model: String,
    research_temperature: f64,
    draft_temperature: f64,
}

impl RigLanguageModel {
    /// Create the client from the configured API key.
    pub fn new(config: &Config) -> Result<Self> {
        if config.openai_api_key.is_empty() {
            return Err(ResearchError::Configuration(
                "LLM API key is required to build the model client".to_string(),
            ));
        }

        let client: Client = Client::new(config.openai_api_key.as_str()).map_err(|e| {
            ResearchError::Configuration(format!("Failed to build OpenAI client: {e}"))
        })?;

        Ok(Self {
            client,
            research_model: config.research_model.clone(),
            draft_model: config.draft_model.clone(),
            research_temperature: config.research_temperature,
            draft_temperature: config.draft_temperature,
        })
    }

    fn settings_for(&self, role: ModelRole) -> (&str, f64) {
        match role {
            ModelRole::Researcher => (self.research_model.as_str(), self.research_temperature),
            ModelRole::Drafter => (self.draft_model.as_str(), self.draft_temperature),
        }
    }
}

#[async_trait]
impl LanguageModel for RigLanguageModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let (model, temperature) = self.settings_for(request.task.role());

        debug!(task = %request.task, model = %model, temperature, "Calling language model");
        let started = Instant::now();

        let agent = self
            .client
            .agent(model)
            .preamble(&request.preamble)
            .temperature(temperature)
            .build();

        let response = agent
            .prompt(&request.prompt)
            .await
            .map_err(|e| classify_provider_error(e.to_string()))?;

        debug!(
            task = %request.task,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = response.len(),
            "Language model responded"
        );

        if response.trim().is_empty() {
            warn!(task = %request.task, "Language model returned an empty completion");
            return Err(ResearchError::ModelRefused(format!(
                "empty completion for {} step",
                request.task
            )));
        }

        Ok(response)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Map a provider error message onto the error taxonomy.
///
/// Content-policy blocks are refusals; everything else means the provider
/// could not serve the request.
pub fn classify_provider_error(message: String) -> ResearchError {
    let lowered = message.to_lowercase();
    if ["content_policy", "content_filter", "content policy", "refus"]
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        ResearchError::ModelRefused(message)
    } else {
        ResearchError::ModelUnavailable(message)
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_roles() {
        assert_eq!(PromptTask::Analyze.role(), ModelRole::Researcher);
        assert_eq!(PromptTask::Evaluate.role(), ModelRole::Researcher);
        assert_eq!(PromptTask::Draft.role(), ModelRole::Drafter);
        assert_eq!(PromptTask::Revise.role(), ModelRole::Drafter);
        assert_eq!(PromptTask::Finalize.role(), ModelRole::Drafter);
    }

    #[test]
    fn test_classify_content_policy_as_refusal() {
        let err = classify_provider_error(
            "ProviderError: Invalid request: content_policy_violation".to_string(),
        );
        assert!(matches!(err, ResearchError::ModelRefused(_)));
    }

    #[test]
    fn test_classify_other_errors_as_unavailable() {
        let err = classify_provider_error("HttpError: connection reset by peer".to_string());
        assert!(matches!(err, ResearchError::ModelUnavailable(_)));
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = Config::with_keys("", "tvly");
        assert!(matches!(
            RigLanguageModel::new(&config),
            Err(ResearchError::Configuration(_))
        ));
    }

    #[test]
    fn test_settings_follow_role() {
        let mut config = Config::with_keys("sk-test", "tvly");
        config.research_model = "judge-model".to_string();
        config.draft_model = "writer-model".to_string();
        let model = RigLanguageModel::new(&config).unwrap();

        assert_eq!(model.settings_for(ModelRole::Researcher), ("judge-model", 0.0));
        assert_eq!(model.settings_for(ModelRole::Drafter), ("writer-model", 0.2));
    }

    #[test]
    fn test_client_uses_configured_key_without_touching_env() {
        let config = Config::with_keys("sk-explicit-config-key", "tvly");
        let model = RigLanguageModel::new(&config).unwrap();

        let auth = model
            .client
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok());
        assert_eq!(auth, Some("Bearer sk-explicit-config-key"));
        assert_ne!(
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
            Some("sk-explicit-config-key")
        );
    }

    #[test]
    fn test_unusable_key_is_a_configuration_error() {
        let config = Config::with_keys("sk-bad\nkey", "tvly");
        assert!(matches!(
            RigLanguageModel::new(&config),
            Err(ResearchError::Configuration(_))
        ));
    }
}
