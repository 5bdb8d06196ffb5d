//! Retrieval-augmented answering over repository activity.
//!
//! [`InsightsEngine`] is the composition root for a request: it owns the
//! upstream client, the vector index, and the generator, and drives each
//! operation as a strictly sequential chain:
//!
//! ```text
//! parse url → resolve window → fetch commits (cache-aware) → filter
//!   → metrics snapshot → [zero commits? → canned answer]
//!   → retrieve top-k (repo-scoped) → prompt → generate once
//! ```
//!
//! Nothing is retried and nothing is shared between requests except the
//! components themselves.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::config::{Config, RetrievalConfig, Secrets};
use crate::documents::{build_commit_documents, build_pr_documents};
use crate::error::Result;
use crate::generation::{ChatCompletionsClient, ChatMessage, Generator};
use crate::github::{parse_repo_url, GitHubClient};
use crate::index::VectorIndex;
use crate::metrics::{snapshot, MetricsSnapshot};
use crate::window::{commits_within, infer_window};

/// Answer returned when the window holds no commits.
pub const NO_ACTIVITY_ANSWER: &str = "No activity in this period.";

/// Fixed retrieval query for executive summaries.
pub const SUMMARY_QUERY: &str = "recent activity";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const ANSWER_SYSTEM_PROMPT: &str = "You are an AI assistant analyzing GitHub repository activity.\n\
You are given commit texts, pull request texts, and repository metrics.\n\
Base your answer ONLY on the information provided. If something is unclear or missing, say so.\n\
Never invent dates, contributors, or events, and never mention any that fall outside the metrics and context given.\n";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a senior engineering analyst.";

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub repo: String,
    pub question: String,
    /// Days of history considered; `null` for the full history.
    pub time_window_used: Option<u32>,
    pub answer: String,
    pub metrics: MetricsSnapshot,
    pub used_context: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub repo: String,
    pub time_window_days: u32,
    pub summary: String,
    pub metrics: MetricsSnapshot,
    pub used_context: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub repo: String,
    pub commits_indexed: usize,
    pub prs_indexed: usize,
}

pub struct InsightsEngine {
    pub(crate) github: GitHubClient,
    pub(crate) index: VectorIndex,
    pub(crate) generator: Arc<dyn Generator>,
    pub(crate) retrieval: RetrievalConfig,
}

impl InsightsEngine {
    pub fn new(
        github: GitHubClient,
        index: VectorIndex,
        generator: Arc<dyn Generator>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            github,
            index,
            generator,
            retrieval,
        }
    }

    /// Wire up production components: file cache, GitHub client, the
    /// configured embedder, the SQLite collection, and the chat client.
    ///
    /// Fails when `HF_API_KEY` is missing.
    pub async fn from_config(config: &Config, secrets: &Secrets) -> anyhow::Result<Self> {
        let generator = Arc::new(ChatCompletionsClient::from_secrets(
            &config.generation,
            secrets,
        )?);
        let github = GitHubClient::from_config(config, secrets)?;
        let index = VectorIndex::open(&config.embedding, &config.index).await?;

        Ok(Self::new(
            github,
            index,
            generator,
            config.retrieval.clone(),
        ))
    }

    pub fn github(&self) -> &GitHubClient {
        &self.github
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Answer a free-form question about a repository.
    ///
    /// `window_days` of `None` infers the window from the question; `k` of
    /// `None` uses `retrieval.query_k`.
    pub async fn answer_question(
        &self,
        repo_url: &str,
        question: &str,
        window_days: Option<u32>,
        k: Option<usize>,
    ) -> Result<AnswerResult> {
        let repo = parse_repo_url(repo_url)?;
        let repo_full_name = repo.full_name();
        let window = match window_days {
            Some(days) => Some(days),
            None => infer_window(question),
        };
        let k = k.unwrap_or(self.retrieval.query_k);
        info!(repo = %repo_full_name, window = ?window, k, "answering question");

        let commits = self.github.commits(&repo).await?;
        let recent = commits_within(&commits, window, Utc::now());
        let metrics = snapshot(&recent, self.retrieval.top_contributors);

        if recent.is_empty() {
            info!(repo = %repo_full_name, "no commits in window, skipping generation");
            return Ok(AnswerResult {
                repo: repo_full_name,
                question: question.to_string(),
                time_window_used: window,
                answer: NO_ACTIVITY_ANSWER.to_string(),
                metrics,
                used_context: Vec::new(),
            });
        }

        let used_context = self.retrieve(&repo_full_name, question, k).await?;
        let messages = vec![
            ChatMessage::system(ANSWER_SYSTEM_PROMPT),
            ChatMessage::user(answer_prompt(
                &repo_full_name,
                question,
                window,
                &metrics,
                &used_context,
            )),
        ];
        let answer = self.generator.generate(&messages).await?;

        Ok(AnswerResult {
            repo: repo_full_name,
            question: question.to_string(),
            time_window_used: window,
            answer,
            metrics,
            used_context,
        })
    }

    /// Executive summary of the last `window_days` days. Always calls the
    /// generator, even for a quiet repository.
    pub async fn summarize(
        &self,
        repo_url: &str,
        window_days: u32,
        k: Option<usize>,
    ) -> Result<SummaryResult> {
        let repo = parse_repo_url(repo_url)?;
        let repo_full_name = repo.full_name();
        let k = k.unwrap_or(self.retrieval.summary_k);
        info!(repo = %repo_full_name, window_days, k, "summarizing");

        let commits = self.github.commits(&repo).await?;
        let recent = commits_within(&commits, Some(window_days), Utc::now());
        let metrics = snapshot(&recent, self.retrieval.top_contributors);

        let used_context = self.retrieve(&repo_full_name, SUMMARY_QUERY, k).await?;
        let messages = vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(summary_prompt(
                &repo_full_name,
                window_days,
                &metrics,
                &used_context,
            )),
        ];
        let summary = self.generator.generate(&messages).await?;

        Ok(SummaryResult {
            repo: repo_full_name,
            time_window_days: window_days,
            summary,
            metrics,
            used_context,
        })
    }

    /// [`index_repo_activity`] with limits of `None` falling back to
    /// `retrieval.max_commits_indexed` and `retrieval.max_prs_indexed`.
    pub async fn index_repo_activity(
        &self,
        repo_url: &str,
        max_commits: Option<usize>,
        max_prs: Option<usize>,
    ) -> Result<IndexReport> {
        index_repo_activity(
            &self.github,
            &self.index,
            repo_url,
            max_commits.unwrap_or(self.retrieval.max_commits_indexed),
            max_prs.unwrap_or(self.retrieval.max_prs_indexed),
        )
        .await
    }

    async fn retrieve(&self, repo_full_name: &str, query: &str, k: usize) -> Result<Vec<String>> {
        let hits = self.index.query_similar(repo_full_name, query, k).await?;
        Ok(hits.into_iter().take(k).map(|h| h.text).collect())
    }
}

/// Fetch commits and pull requests (state `all`), keep the first
/// `max_commits` / `max_prs`, and upsert them into the index.
pub async fn index_repo_activity(
    github: &GitHubClient,
    index: &VectorIndex,
    repo_url: &str,
    max_commits: usize,
    max_prs: usize,
) -> Result<IndexReport> {
    let repo = parse_repo_url(repo_url)?;
    let repo_full_name = repo.full_name();

    let mut commits = github.commits(&repo).await?;
    let mut prs = github.pull_requests(&repo, "all").await?;
    commits.truncate(max_commits);
    prs.truncate(max_prs);

    let commit_docs = build_commit_documents(&commits, &repo_full_name);
    let pr_docs = build_pr_documents(&prs, &repo_full_name);

    let commits_indexed = index.upsert_batch(&commit_docs).await?;
    let prs_indexed = index.upsert_batch(&pr_docs).await?;
    info!(
        repo = %repo_full_name,
        commits = commits_indexed,
        prs = prs_indexed,
        "indexed repository activity"
    );

    Ok(IndexReport {
        repo: repo_full_name,
        commits_indexed,
        prs_indexed,
    })
}

fn describe_window(window: Option<u32>) -> String {
    match window {
        Some(days) => format!("last {} days", days),
        None => "full history".to_string(),
    }
}

pub(crate) fn metrics_block(metrics: &MetricsSnapshot, window: Option<u32>) -> String {
    let contributors: Vec<String> = metrics
        .top_contributors
        .iter()
        .map(|c| format!("{} ({})", c.author, c.commits))
        .collect();
    format!(
        "- Total commits ({}): {}\n- Commits per day: {}\n- Commits per week: {}\n- Top contributors: {}\n",
        describe_window(window),
        metrics.total_commits_recent,
        serde_json::to_string(&metrics.commits_per_day).unwrap_or_default(),
        serde_json::to_string(&metrics.commits_per_week).unwrap_or_default(),
        if contributors.is_empty() {
            "(none)".to_string()
        } else {
            contributors.join(", ")
        }
    )
}

fn answer_prompt(
    repo_full_name: &str,
    question: &str,
    window: Option<u32>,
    metrics: &MetricsSnapshot,
    context: &[String],
) -> String {
    let window_text = describe_window(window);
    format!(
        "Repository: {repo}\n\n\
         Question:\n{question}\n\n\
         Time window: {window_text}\n\n\
         [METRICS]\n{metrics}\n\
         [CONTEXT - COMMITS & PRs]\n{context}\n\n\
         Using ONLY the context and metrics above, answer the question clearly.\n\
         If the question implies recent changes, focus on the {window_text}.\n",
        repo = repo_full_name,
        question = question,
        window_text = window_text,
        metrics = metrics_block(metrics, window),
        context = context.join(CONTEXT_SEPARATOR),
    )
}

fn summary_prompt(
    repo_full_name: &str,
    window_days: u32,
    metrics: &MetricsSnapshot,
    context: &[String],
) -> String {
    format!(
        "You are an AI that summarizes GitHub repository activity for engineering managers.\n\n\
         Repository: {repo}\n\
         Time Window: last {days} days\n\n\
         [METRICS]\n{metrics}\n\
         [CONTEXT - COMMITS & PULL REQUESTS]\n{context}\n\n\
         Write a short, clear executive summary including:\n\
         1. Main changes\n\
         2. Improvements or refactors\n\
         3. Notable discussions or PRs\n\
         4. Risks or important blockers\n\
         5. Momentum level (low / medium / high)\n\n\
         Keep it concise and factual. Do NOT invent data.\n",
        repo = repo_full_name,
        days = window_days,
        metrics = metrics_block(metrics, Some(window_days)),
        context = context.join(CONTEXT_SEPARATOR),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BucketCounts, ContributorCount};

    #[test]
    fn test_metrics_block_full_history() {
        let metrics = MetricsSnapshot {
            total_commits_recent: 3,
            commits_per_day: BucketCounts::default(),
            commits_per_week: BucketCounts::default(),
            top_contributors: vec![ContributorCount {
                author: "ada".to_string(),
                commits: 3,
            }],
        };
        let block = metrics_block(&metrics, None);
        assert!(block.starts_with("- Total commits (full history): 3\n"));
        assert!(block.contains("Top contributors: ada (3)"));
    }

    #[test]
    fn test_answer_prompt_joins_context() {
        let prompt = answer_prompt(
            "o/r",
            "what changed?",
            Some(7),
            &MetricsSnapshot::default(),
            &["one".to_string(), "two".to_string()],
        );
        assert!(prompt.contains("Repository: o/r"));
        assert!(prompt.contains("Time window: last 7 days"));
        assert!(prompt.contains("one\n\n---\n\ntwo"));
        assert!(prompt.contains("Top contributors: (none)"));
    }

    #[test]
    fn test_summary_prompt_sections() {
        let prompt = summary_prompt("o/r", 7, &MetricsSnapshot::default(), &[]);
        for section in [
            "Main changes",
            "Improvements or refactors",
            "Notable discussions or PRs",
            "Risks or important blockers",
            "Momentum level",
        ] {
            assert!(prompt.contains(section), "missing {}", section);
        }
    }
}
