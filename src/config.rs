//! # Configuration Module
//!
//! Loads the run configuration from the environment (and a `.env` file, if
//! present) into one explicit [`Config`] value. Clients are built from that
//! value; nothing else in the crate reads environment variables.
//!
//! Two secrets are required: the LLM key (`OPENAI_API` / `OPENAI_API_KEY`)
//! and the search key (`TAVILY_API` / `TAVILY_API_KEY`). [`Config::validate`]
//! fails fast when either is missing.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ResearchError, Result};

/// Default search endpoint.
pub const DEFAULT_TAVILY_API_BASE: &str = "https://api.tavily.com";

/// Default model for both the researcher and the drafter role.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// =============================================================================
// EXECUTION MODE
// =============================================================================
/// How follow-up searches within one analysis round are issued.
///
/// Both modes go through the same client traits; only the scheduling of the
/// follow-up batch differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExecutionMode {
    /// Await each search before starting the next.
    Sequential,
    /// Issue the whole follow-up batch at once and join before analyzing.
    #[default]
    Concurrent,
}

impl FromStr for ExecutionMode {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "sync" => Ok(Self::Sequential),
            "concurrent" | "async" => Ok(Self::Concurrent),
            other => Err(ResearchError::Configuration(format!(
                "EXECUTION_MODE must be 'sequential' or 'concurrent', got: {other}"
            ))),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the research agent.
///
/// # Rust Concept: Explicit Configuration
/// Instead of every component reading `std::env` on its own, the values are
/// collected once at startup and handed to constructors. Tests can then build
/// a `Config` directly with [`Config::with_keys`].
#[derive(Clone)]
pub struct Config {
    /// API key for the language model provider
    pub openai_api_key: String,

    /// API key for the Tavily search provider
    pub tavily_api_key: String,

    /// Base URL of the search API (overridable for proxies and tests)
    pub tavily_api_base: String,

    /// Model used to analyze research and evaluate drafts
    pub research_model: String,

    /// Model used to draft, revise and finalize answers
    pub draft_model: String,

    /// Temperature for the researcher role (0.0 = deterministic judgments)
    pub research_temperature: f64,

    /// Temperature for the drafter role
    pub draft_temperature: f64,

    /// Maximum number of results requested per search
    pub max_search_results: usize,

    /// Search result content is truncated to this many characters
    pub max_content_chars: usize,

    /// Per-request timeout for the search provider
    pub request_timeout_secs: u64,

    /// Upper bound on searches per run (the initial search counts as one)
    pub max_research_iterations: usize,

    /// Maximum follow-up queries accepted from a single analysis
    pub max_follow_up_queries: usize,

    /// Evaluation/revision rounds before finalizing
    pub max_revision_rounds: usize,

    /// Scheduling of follow-up searches
    pub execution_mode: ExecutionMode,

    /// Optional wall-clock budget for a whole run
    pub run_timeout_secs: Option<u64>,

    /// Log filter for the application
    pub log_level: String,
}

// Secrets stay out of Debug output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("tavily_api_key", &redact(&self.tavily_api_key))
            .field("tavily_api_base", &self.tavily_api_base)
            .field("research_model", &self.research_model)
            .field("draft_model", &self.draft_model)
            .field("research_temperature", &self.research_temperature)
            .field("draft_temperature", &self.draft_temperature)
            .field("max_search_results", &self.max_search_results)
            .field("max_content_chars", &self.max_content_chars)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_research_iterations", &self.max_research_iterations)
            .field("max_follow_up_queries", &self.max_follow_up_queries)
            .field("max_revision_rounds", &self.max_revision_rounds)
            .field("execution_mode", &self.execution_mode)
            .field("run_timeout_secs", &self.run_timeout_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

// =============================================================================
// DEFAULT IMPLEMENTATION
// =============================================================================
impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            tavily_api_key: String::new(),
            tavily_api_base: DEFAULT_TAVILY_API_BASE.to_string(),
            research_model: DEFAULT_MODEL.to_string(),
            draft_model: DEFAULT_MODEL.to_string(),

            // Judgments should be reproducible; drafting gets a little room
            research_temperature: 0.0,
            draft_temperature: 0.2,

            max_search_results: 8,
            max_content_chars: 2000,
            request_timeout_secs: 30,

            max_research_iterations: 3,
            max_follow_up_queries: 3,
            max_revision_rounds: 1,

            execution_mode: ExecutionMode::default(),
            run_timeout_secs: None,
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if it exists.
    /// Secrets are not checked here; call [`Config::validate`] once CLI
    /// overrides have been applied.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// # Rust Concept: Closures as Parameters
    /// `impl Fn(&str) -> Option<String>` accepts any closure with that shape,
    /// so [`Config::from_env`] passes `env::var` while tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        let first_of = |keys: &[&str]| keys.iter().find_map(|key| lookup(key));

        if let Some(val) = first_of(&["OPENAI_API", "OPENAI_API_KEY"]) {
            config.openai_api_key = val.trim().to_string();
        }

        if let Some(val) = first_of(&["TAVILY_API", "TAVILY_API_KEY"]) {
            config.tavily_api_key = val.trim().to_string();
        }

        if let Some(val) = lookup("TAVILY_API_BASE") {
            config.tavily_api_base = val;
        }

        if let Some(val) = lookup("RESEARCH_MODEL") {
            config.research_model = val;
        }

        if let Some(val) = lookup("DRAFT_MODEL") {
            config.draft_model = val;
        }

        if let Some(val) = lookup("MAX_SEARCH_RESULTS") {
            config.max_search_results = parse_var("MAX_SEARCH_RESULTS", &val)?;
        }

        if let Some(val) = lookup("MAX_RESEARCH_ITERATIONS") {
            config.max_research_iterations = parse_var("MAX_RESEARCH_ITERATIONS", &val)?;
        }

        if let Some(val) = lookup("MAX_FOLLOW_UP_QUERIES") {
            config.max_follow_up_queries = parse_var("MAX_FOLLOW_UP_QUERIES", &val)?;
        }

        if let Some(val) = lookup("MAX_REVISION_ROUNDS") {
            config.max_revision_rounds = parse_var("MAX_REVISION_ROUNDS", &val)?;
        }

        if let Some(val) = lookup("EXECUTION_MODE") {
            config.execution_mode = val.parse()?;
        }

        if let Some(val) = lookup("RUN_TIMEOUT_SECS") {
            config.run_timeout_secs = Some(parse_var("RUN_TIMEOUT_SECS", &val)?);
        }

        if let Some(val) = lookup("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Create a config from explicit keys (useful for testing).
    pub fn with_keys(openai_api_key: impl Into<String>, tavily_api_key: impl Into<String>) -> Self {
        Self {
            openai_api_key: openai_api_key.into(),
            tavily_api_key: tavily_api_key.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    ///
    /// Runs before any client is constructed, so a missing secret aborts the
    /// process before the first network call.
    pub fn validate(&self) -> Result<()> {
        if self.openai_api_key.is_empty() {
            return Err(ResearchError::Configuration(
                "LLM API key is required. Set OPENAI_API (or OPENAI_API_KEY) \
                 in the environment or .env file."
                    .to_string(),
            ));
        }

        if self.tavily_api_key.is_empty() {
            return Err(ResearchError::Configuration(
                "Search API key is required. Set TAVILY_API (or TAVILY_API_KEY) \
                 in the environment or .env file."
                    .to_string(),
            ));
        }

        self.validate_limits()
    }

    /// Validate everything except the secrets.
    ///
    /// Injected clients (stubs, alternative providers) carry their own
    /// credentials, so only the loop bounds matter for them.
    pub fn validate_limits(&self) -> Result<()> {
        for (name, temperature) in [
            ("research_temperature", self.research_temperature),
            ("draft_temperature", self.draft_temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ResearchError::Configuration(format!(
                    "{name} must be between 0.0 and 2.0, got: {temperature}"
                )));
            }
        }

        if self.research_model.is_empty() || self.draft_model.is_empty() {
            return Err(ResearchError::Configuration(
                "Model names cannot be empty".to_string(),
            ));
        }

        if self.max_search_results == 0 {
            return Err(ResearchError::Configuration(
                "MAX_SEARCH_RESULTS must be at least 1".to_string(),
            ));
        }

        if self.max_research_iterations == 0 {
            return Err(ResearchError::Configuration(
                "MAX_RESEARCH_ITERATIONS must be at least 1 (the initial search)".to_string(),
            ));
        }

        if self.max_content_chars == 0 {
            return Err(ResearchError::Configuration(
                "max_content_chars must be at least 1".to_string(),
            ));
        }

        if self.run_timeout_secs == Some(0) {
            return Err(ResearchError::Configuration(
                "RUN_TIMEOUT_SECS must be positive when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Per-request timeout for the search client.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Overall run budget, if one is configured.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ResearchError::Configuration(format!(
            "{name} must be a valid non-negative integer, got: {value}"
        ))
    })
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.max_research_iterations, 3);
        assert_eq!(config.max_follow_up_queries, 3);
        assert_eq!(config.max_revision_rounds, 1);
        assert_eq!(config.max_search_results, 8);
        assert_eq!(config.max_content_chars, 2000);
        assert_eq!(config.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(config.tavily_api_base, DEFAULT_TAVILY_API_BASE);
        assert!(config.run_timeout().is_none());
    }

    #[test]
    fn test_validate_requires_llm_key() {
        let config = Config::with_keys("", "tvly-key");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ResearchError::Configuration(ref m) if m.contains("OPENAI_API")));
    }

    #[test]
    fn test_validate_requires_search_key() {
        let config = Config::with_keys("sk-key", "");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ResearchError::Configuration(ref m) if m.contains("TAVILY_API")));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(Config::with_keys("sk-key", "tvly-key").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = Config::with_keys("sk", "tvly");
        config.max_research_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_temperature() {
        let mut config = Config::with_keys("sk", "tvly");
        config.draft_temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup_reads_original_key_names() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API", "sk-original"),
            ("TAVILY_API", "tvly-original"),
        ]))
        .unwrap();

        assert_eq!(config.openai_api_key, "sk-original");
        assert_eq!(config.tavily_api_key, "tvly-original");
    }

    #[test]
    fn test_from_lookup_falls_back_to_conventional_key_names() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-conventional"),
            ("TAVILY_API_KEY", "tvly-conventional"),
        ]))
        .unwrap();

        assert_eq!(config.openai_api_key, "sk-conventional");
        assert_eq!(config.tavily_api_key, "tvly-conventional");
    }

    #[test]
    fn test_from_lookup_overrides_limits() {
        let config = Config::from_lookup(lookup_from(&[
            ("MAX_RESEARCH_ITERATIONS", "5"),
            ("MAX_REVISION_ROUNDS", "0"),
            ("EXECUTION_MODE", "sequential"),
            ("RUN_TIMEOUT_SECS", "90"),
        ]))
        .unwrap();

        assert_eq!(config.max_research_iterations, 5);
        assert_eq!(config.max_revision_rounds, 0);
        assert_eq!(config.execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_from_lookup_rejects_garbage_numbers() {
        let result = Config::from_lookup(lookup_from(&[("MAX_SEARCH_RESULTS", "lots")]));
        assert!(matches!(result, Err(ResearchError::Configuration(_))));
    }

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!("Concurrent".parse::<ExecutionMode>().unwrap(), ExecutionMode::Concurrent);
        assert_eq!("sync".parse::<ExecutionMode>().unwrap(), ExecutionMode::Sequential);
        assert!("parallel-ish".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::with_keys("sk-secret", "");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("<unset>"));
    }
}
