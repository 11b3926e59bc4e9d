//! Draft synthesis: one model call over the numbered sources.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::llm::{CompletionRequest, LanguageModel, PromptTask};
use crate::prompts::ResearchPrompts;
use crate::state::{ResearchState, Source};

/// A synthesized answer and the sources it was written from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,

    /// The numbered source list the draft may cite
    pub sources: Vec<Source>,

    /// Revision rounds applied so far
    pub revisions: usize,
}

pub struct DraftStep<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> DraftStep<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    /// Synthesize the first draft from everything researched.
    pub async fn run(&self, query: &str, state: &ResearchState) -> Result<Draft> {
        let sources = state.sources();
        info!(sources = sources.len(), "Drafting answer...");

        let request = CompletionRequest::new(
            PromptTask::Draft,
            ResearchPrompts::drafter(),
            ResearchPrompts::draft(query, &sources),
        );
        let text = self.model.complete(&request).await?;

        Ok(Draft {
            text,
            sources,
            revisions: 0,
        })
    }
}
