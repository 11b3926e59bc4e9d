//! # Deep Research CLI
//!
//! Answers one research question from the command line:
//! search the web, judge the results, follow up where they fall short,
//! then draft, review and print a cited answer.
//!
//! ## Quick Start
//! ```bash
//! export OPENAI_API=sk-...
//! export TAVILY_API=tvly-...
//! cargo run -- "How close are quantum computers to breaking RSA-2048?"
//! ```

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deep_research_agent::{Config, ExecutionMode, ResearchAgent, ResearchError};

/// Question researched when none is given.
const DEFAULT_QUERY: &str =
    "What are the latest advancements in quantum computing and their potential impact on \
     cryptography?";

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
/// # Rust Concept: Derive Macros with Clap
///
/// Every field becomes a flag or positional argument. `env = ...` lets an
/// environment variable stand in for the flag.
#[derive(Parser, Debug)]
#[command(
    name = "deep-research",
    version,
    about = "Researches a question on the web and writes a cited answer",
    long_about = r#"
Deep Research - bounded web research with cited answers.

The agent will:
  1. Search the web (Tavily) for the question
  2. Ask the model whether the results are enough, and search its follow-ups
  3. Draft an answer citing the numbered sources
  4. Evaluate the draft, revise it if it misses something
  5. Print the final answer with a References section

PREREQUISITES:
  OPENAI_API (or OPENAI_API_KEY) and TAVILY_API (or TAVILY_API_KEY)
  set in the environment or in a .env file.

EXAMPLES:
  # Full research run
  deep-research "What are the security implications of post-quantum TLS?"

  # Search only, no model calls
  deep-research --quick "NIST post-quantum standards"

  # Deeper research, one search at a time
  deep-research --max-iterations 5 --mode sequential "History of Shor's algorithm"
"#
)]
struct Args {
    /// The research topic or question to investigate
    #[arg(value_name = "QUERY", default_value = DEFAULT_QUERY)]
    query: String,

    /// Model for both the researcher and drafter roles
    #[arg(short = 'm', long = "model", env = "RESEARCH_MODEL")]
    model: Option<String>,

    /// How follow-up searches are issued
    #[arg(long = "mode", value_enum)]
    mode: Option<ExecutionMode>,

    /// Maximum number of searches (the first one included)
    #[arg(long = "max-iterations", value_name = "N")]
    max_iterations: Option<usize>,

    /// Maximum evaluation/revision rounds
    #[arg(long = "max-revisions", value_name = "N")]
    max_revisions: Option<usize>,

    /// Overall time budget for the run, in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    timeout: Option<u64>,

    /// Quick search mode - just search, don't synthesize
    #[arg(short = 'q', long = "quick")]
    quick: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

impl Args {
    /// Apply command-line overrides on top of the environment.
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.research_model = model.clone();
            config.draft_model = model.clone();
        }
        if let Some(mode) = self.mode {
            config.execution_mode = mode;
        }
        if let Some(n) = self.max_iterations {
            config.max_research_iterations = n;
        }
        if let Some(n) = self.max_revisions {
            config.max_revision_rounds = n;
        }
        if let Some(secs) = self.timeout {
            config.run_timeout_secs = Some(secs);
        }
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration from environment/.env file
    let mut config = Config::from_env().context("Failed to load configuration")?;
    args.apply(&mut config);

    init_logging(args.verbose, &config.log_level)?;
    info!("Deep research agent starting up...");

    config.validate()?;
    info!(
        research_model = %config.research_model,
        draft_model = %config.draft_model,
        mode = %config.execution_mode,
        max_iterations = config.max_research_iterations,
        max_revisions = config.max_revision_rounds,
        "Configuration loaded"
    );

    let agent = ResearchAgent::new(config)?;

    if args.quick {
        info!("Running in quick search mode");
        let results = agent.quick_search(&args.query).await?;
        print_banner("SEARCH RESULTS", &results);
        return Ok(());
    }

    match agent.run(&args.query).await {
        Ok(answer) => {
            print_banner("FINAL ANSWER", &answer.text);
            Ok(())
        }
        Err(e) => {
            error!(phase = %e.phase, error = %e.source, "Research failed");
            eprintln!("\nResearch failed: {e}");

            match &e.source {
                ResearchError::SearchUnavailable(_) => {
                    eprintln!("\nTip: check TAVILY_API and your Tavily quota.");
                }
                ResearchError::ModelUnavailable(_) => {
                    eprintln!("\nTip: check OPENAI_API and that the model name exists.");
                }
                ResearchError::TimedOut(_) => {
                    eprintln!("\nTip: raise --timeout or lower --max-iterations.");
                }
                _ => {}
            }

            // Return the error to set non-zero exit code
            Err(e.into())
        }
    }
}

fn print_banner(title: &str, body: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}\n", "=".repeat(60));
    println!("{body}");
    println!("\n{}", "=".repeat(60));
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber for structured logging.
///
/// `--verbose` forces debug output; otherwise `RUST_LOG` (or `info`) decides.
fn init_logging(verbose: bool, default_filter: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(default_filter).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

// =============================================================================
// CLI TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_query() {
        let args = Args::parse_from(["test"]);
        assert_eq!(args.query, DEFAULT_QUERY);
        assert!(!args.quick);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_with_flags() {
        let args = Args::parse_from([
            "test",
            "--quick",
            "--verbose",
            "--mode",
            "sequential",
            "--max-iterations",
            "5",
            "--max-revisions",
            "0",
            "--timeout",
            "90",
            "Test query",
        ]);

        assert_eq!(args.query, "Test query");
        assert!(args.quick);
        assert!(args.verbose);
        assert_eq!(args.mode, Some(ExecutionMode::Sequential));
        assert_eq!(args.max_iterations, Some(5));
        assert_eq!(args.max_revisions, Some(0));
        assert_eq!(args.timeout, Some(90));
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from(["test", "-m", "gpt-4o", "--max-iterations", "2", "q"]);
        let mut config = Config::with_keys("sk", "tvly");
        args.apply(&mut config);

        assert_eq!(config.research_model, "gpt-4o");
        assert_eq!(config.draft_model, "gpt-4o");
        assert_eq!(config.max_research_iterations, 2);
        assert_eq!(config.execution_mode, ExecutionMode::Concurrent);
    }
}
