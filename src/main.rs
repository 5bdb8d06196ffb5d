//! # Repo Insights CLI (`insights`)
//!
//! ## Usage
//!
//! ```bash
//! insights --config ./config/insights.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `insights init` | Create the vector collection schema |
//! | `insights index <url>` | Index commits and PRs for retrieval |
//! | `insights ask <url> "<question>"` | Answer a question about recent activity |
//! | `insights summary <url>` | Executive summary of recent activity |
//! | `insights activity <url> <user>` | One developer's recent contributions |
//! | `insights metrics <url> daily\|weekly\|top` | Commit metrics |
//! | `insights serve` | Start the HTTP API |
//!
//! Results are printed as pretty JSON. Secrets come from the environment:
//! `GITHUB_TOKEN` (optional), `HF_API_KEY` (needed by `ask`, `summary`,
//! `activity`, and `serve`), `OPENAI_API_KEY` (openai embeddings only).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use repo_insights::answer::{index_repo_activity, InsightsEngine};
use repo_insights::config::{self, Config, Secrets};
use repo_insights::github::{parse_repo_url, GitHubClient};
use repo_insights::index::VectorIndex;
use repo_insights::{db, metrics, migrate, server};

const DEFAULT_CONFIG_PATH: &str = "./config/insights.toml";

/// Repo Insights: ask questions about a GitHub repository's recent activity.
#[derive(Parser)]
#[command(name = "insights", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/insights.toml`; built-in defaults apply when
    /// that default file does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite vector collection. Idempotent.
    Init,

    /// Fetch commits and pull requests and upsert them into the vector index.
    Index {
        /// Repository URL, e.g. `https://github.com/owner/repo`.
        url: String,

        /// Maximum number of commits to index.
        #[arg(long)]
        max_commits: Option<usize>,

        /// Maximum number of pull requests to index.
        #[arg(long)]
        max_prs: Option<usize>,
    },

    /// Answer a natural-language question.
    Ask {
        url: String,
        question: String,

        /// Lookback window in days; inferred from the question when omitted.
        #[arg(long)]
        window_days: Option<u32>,

        /// Number of documents to retrieve.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Executive summary of recent activity.
    Summary {
        url: String,

        #[arg(long, default_value_t = 7)]
        window_days: u32,
    },

    /// Summarize one developer's recent contributions.
    Activity {
        url: String,

        /// GitHub login or git author name.
        user: String,

        #[arg(long, default_value_t = 1)]
        window_days: u32,
    },

    /// Commit metrics over the full cached history.
    Metrics {
        url: String,

        #[arg(value_enum)]
        kind: MetricsKind,

        /// Number of contributors for `top`.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricsKind {
    Daily,
    Weekly,
    Top,
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    config::load_config(path)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load(&cli.config)?;
    let secrets = Secrets::from_env();

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.index.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Vector index initialized at {}", cfg.index.path.display());
        }
        Commands::Index {
            url,
            max_commits,
            max_prs,
        } => {
            let github = GitHubClient::from_config(&cfg, &secrets)?;
            let index = VectorIndex::open(&cfg.embedding, &cfg.index).await?;
            let report = index_repo_activity(
                &github,
                &index,
                &url,
                max_commits.unwrap_or(cfg.retrieval.max_commits_indexed),
                max_prs.unwrap_or(cfg.retrieval.max_prs_indexed),
            )
            .await?;
            print_json(&report)?;
        }
        Commands::Ask {
            url,
            question,
            window_days,
            k,
        } => {
            let engine = InsightsEngine::from_config(&cfg, &secrets).await?;
            let result = engine
                .answer_question(&url, &question, window_days, k)
                .await?;
            print_json(&result)?;
        }
        Commands::Summary { url, window_days } => {
            let engine = InsightsEngine::from_config(&cfg, &secrets).await?;
            print_json(&engine.summarize(&url, window_days, None).await?)?;
        }
        Commands::Activity {
            url,
            user,
            window_days,
        } => {
            let engine = InsightsEngine::from_config(&cfg, &secrets).await?;
            print_json(&engine.user_activity(&url, &user, window_days).await?)?;
        }
        Commands::Metrics { url, kind, limit } => {
            let repo = parse_repo_url(&url)?;
            let github = GitHubClient::from_config(&cfg, &secrets)?;
            let commits = github
                .commits(&repo)
                .await
                .with_context(|| format!("failed to fetch commits for {}", repo))?;
            match kind {
                MetricsKind::Daily => print_json(&metrics::commits_per_day(&commits))?,
                MetricsKind::Weekly => print_json(&metrics::commits_per_week(&commits))?,
                MetricsKind::Top => print_json(&metrics::top_contributors(&commits, limit))?,
            }
        }
        Commands::Serve => {
            let engine = InsightsEngine::from_config(&cfg, &secrets)
                .await
                .context("failed to start server")?;
            server::run_server(&cfg, Arc::new(engine)).await?;
        }
    }

    Ok(())
}
