//! Per-developer activity report.
//!
//! Commits are matched on GitHub login or git author name, pull requests on
//! login only; both case-insensitively and within the window. Each matching
//! commit costs one extra detail request for its file list and stats.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::answer::InsightsEngine;
use crate::error::Result;
use crate::generation::ChatMessage;
use crate::github::parse_repo_url;
use crate::models::{ChangedFile, Commit, PullRequest};
use crate::window::cutoff;

/// Commits and pull requests listed in the prompt, each.
const PROMPT_ITEM_LIMIT: usize = 20;

const ROOT_FOLDER: &str = "(root)";

const ACTIVITY_SYSTEM_PROMPT: &str = "You are an assistant that summarizes the activity of a single developer in a GitHub repository.\n\
ONLY use the provided commits, PRs and stats.\n\
Be concise and focus on what this person actually did: features, fixes, refactors, folders they touched, and overall impact.\n";

#[derive(Debug, Clone, Serialize)]
pub struct CommitActivity {
    pub sha: String,
    pub message: String,
    pub date: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub files: Vec<ChangedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullRequestActivity {
    pub number: u64,
    pub title: Option<String>,
    pub state: String,
    pub created_at: Option<String>,
    pub merged_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityStats {
    pub commit_count: usize,
    pub prs_opened: usize,
    pub total_additions: u64,
    pub total_deletions: u64,
    /// Top-level path segment → lines added plus deleted.
    pub folders_touched: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserActivityReport {
    pub repo: String,
    pub user: String,
    pub time_window_days: u32,
    pub summary: String,
    pub stats: ActivityStats,
    pub commits: Vec<CommitActivity>,
    pub pull_requests: Vec<PullRequestActivity>,
}

impl InsightsEngine {
    /// Summarize what `username` did in the last `window_days` days.
    pub async fn user_activity(
        &self,
        repo_url: &str,
        username: &str,
        window_days: u32,
    ) -> Result<UserActivityReport> {
        let repo = parse_repo_url(repo_url)?;
        let repo_full_name = repo.full_name();
        let since = cutoff(Utc::now(), window_days);

        let commits = self.github.commits(&repo).await?;
        let matching = commits_by_user(&commits, username, since);
        info!(
            repo = %repo_full_name,
            user = username,
            commits = matching.len(),
            "fetching commit details"
        );

        let mut detailed = Vec::with_capacity(matching.len());
        for commit in matching {
            let detail = self.github.commit_detail(&repo, &commit.sha).await?;
            let stats = detail.stats.unwrap_or_default();
            detailed.push(CommitActivity {
                sha: commit.sha.clone(),
                message: commit.commit.message.clone(),
                date: commit.date().map(str::to_string),
                additions: stats.additions,
                deletions: stats.deletions,
                files: detail.files,
            });
        }

        let prs = self.github.pull_requests(&repo, "all").await?;
        let pull_requests: Vec<PullRequestActivity> = prs_by_user(&prs, username, since)
            .into_iter()
            .map(|pr| PullRequestActivity {
                number: pr.number,
                title: pr.title.clone(),
                state: pr.effective_state().to_string(),
                created_at: pr.created_at.clone(),
                merged_at: pr.merged_at.clone(),
            })
            .collect();

        let stats = aggregate(&detailed, pull_requests.len());
        let messages = vec![
            ChatMessage::system(ACTIVITY_SYSTEM_PROMPT),
            ChatMessage::user(activity_prompt(
                &repo_full_name,
                username,
                window_days,
                &stats,
                &detailed,
                &pull_requests,
            )),
        ];
        let summary = self.generator.generate(&messages).await?;

        Ok(UserActivityReport {
            repo: repo_full_name,
            user: username.to_string(),
            time_window_days: window_days,
            summary,
            stats,
            commits: detailed,
            pull_requests,
        })
    }
}

/// Commits at or after `since` by `username`. An empty username matches
/// every author.
fn commits_by_user<'a>(commits: &'a [Commit], username: &str, since: DateTime<Utc>) -> Vec<&'a Commit> {
    let wanted = username.to_lowercase();
    commits
        .iter()
        .filter(|c| c.authored_at().is_some_and(|dt| dt >= since))
        .filter(|c| {
            wanted.is_empty()
                || c.author_login().is_some_and(|l| l.to_lowercase() == wanted)
                || c.author_name().is_some_and(|n| n.to_lowercase() == wanted)
        })
        .collect()
}

fn prs_by_user<'a>(prs: &'a [PullRequest], username: &str, since: DateTime<Utc>) -> Vec<&'a PullRequest> {
    let wanted = username.to_lowercase();
    prs.iter()
        .filter(|pr| pr.author_login().unwrap_or("").to_lowercase() == wanted)
        .filter(|pr| pr.created().is_some_and(|dt| dt >= since))
        .collect()
}

fn top_level_folder(path: &str) -> &str {
    match path.split_once('/') {
        Some((folder, _)) => folder,
        None => ROOT_FOLDER,
    }
}

fn aggregate(commits: &[CommitActivity], prs_opened: usize) -> ActivityStats {
    let mut stats = ActivityStats {
        commit_count: commits.len(),
        prs_opened,
        ..Default::default()
    };
    for c in commits {
        stats.total_additions += c.additions;
        stats.total_deletions += c.deletions;
        for f in &c.files {
            *stats
                .folders_touched
                .entry(top_level_folder(&f.filename).to_string())
                .or_insert(0) += f.additions + f.deletions;
        }
    }
    stats
}

fn activity_prompt(
    repo_full_name: &str,
    username: &str,
    window_days: u32,
    stats: &ActivityStats,
    commits: &[CommitActivity],
    prs: &[PullRequestActivity],
) -> String {
    let mut commit_lines: Vec<String> = commits
        .iter()
        .take(PROMPT_ITEM_LIMIT)
        .map(|c| {
            let short_sha: String = c.sha.chars().take(7).collect();
            format!(
                "- [{}] {} (files: {}, +{}/-{})",
                short_sha,
                c.message,
                c.files.len(),
                c.additions,
                c.deletions
            )
        })
        .collect();
    if commit_lines.is_empty() {
        commit_lines.push("(no commits)".to_string());
    }

    let mut pr_lines: Vec<String> = prs
        .iter()
        .take(PROMPT_ITEM_LIMIT)
        .map(|pr| {
            format!(
                "- PR #{} [{}]: {}",
                pr.number,
                pr.state,
                pr.title.as_deref().unwrap_or("")
            )
        })
        .collect();
    if pr_lines.is_empty() {
        pr_lines.push("(no PRs)".to_string());
    }

    let folders = if stats.folders_touched.is_empty() {
        "(none)".to_string()
    } else {
        stats
            .folders_touched
            .iter()
            .map(|(folder, lines)| format!("{} ({})", folder, lines))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Repository: {repo}\n\
         Developer: {user}\n\
         Time Window: last {days} days\n\n\
         [STATS]\n\
         - Commits: {commits}\n\
         - PRs opened: {prs}\n\
         - Total additions: {adds}\n\
         - Total deletions: {dels}\n\
         - Folders touched: {folders}\n\n\
         [RAW ACTIVITY]\n\
         Commits:\n{commit_lines}\n\n\
         Pull Requests:\n{pr_lines}\n\n\
         Write a short summary (3-6 bullet points) of what this developer worked on in this period.\n",
        repo = repo_full_name,
        user = username,
        days = window_days,
        commits = stats.commit_count,
        prs = stats.prs_opened,
        adds = stats.total_additions,
        dels = stats.total_deletions,
        folders = folders,
        commit_lines = commit_lines.join("\n"),
        pr_lines = pr_lines.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitInfo, GitHubUser, GitSignature};
    use chrono::Duration;

    fn commit(login: Option<&str>, name: &str, date: DateTime<Utc>) -> Commit {
        Commit {
            sha: format!("{}-{}", name, date.timestamp()),
            commit: CommitInfo {
                message: "msg".to_string(),
                author: Some(GitSignature {
                    name: Some(name.to_string()),
                    email: None,
                    date: Some(date.to_rfc3339()),
                }),
            },
            author: login.map(|l| GitHubUser {
                login: Some(l.to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_commit_matching_login_or_name() {
        let now = Utc::now();
        let since = cutoff(now, 1);
        let commits = vec![
            commit(Some("Octocat"), "Mona", now),
            commit(None, "octocat", now),
            commit(Some("someone"), "Else", now),
            commit(Some("octocat"), "Mona", now - Duration::days(3)),
        ];
        let hits = commits_by_user(&commits, "OCTOCAT", since);
        assert_eq!(hits.len(), 2);
        assert_eq!(commits_by_user(&commits, "", since).len(), 3);
    }

    #[test]
    fn test_pr_matching_requires_login() {
        let now = Utc::now();
        let prs = vec![
            PullRequest {
                number: 1,
                user: Some(GitHubUser {
                    login: Some("Octocat".to_string()),
                }),
                created_at: Some(now.to_rfc3339()),
                ..Default::default()
            },
            PullRequest {
                number: 2,
                user: None,
                created_at: Some(now.to_rfc3339()),
                ..Default::default()
            },
        ];
        let hits = prs_by_user(&prs, "octocat", cutoff(now, 1));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].number, 1);
    }

    #[test]
    fn test_folder_aggregation() {
        let file = |name: &str, a, d| ChangedFile {
            filename: name.to_string(),
            status: "modified".to_string(),
            additions: a,
            deletions: d,
        };
        let commits = vec![CommitActivity {
            sha: "abc".to_string(),
            message: "m".to_string(),
            date: None,
            additions: 13,
            deletions: 4,
            files: vec![
                file("src/lib.rs", 5, 1),
                file("src/deep/mod.rs", 2, 2),
                file("README.md", 6, 1),
            ],
        }];
        let stats = aggregate(&commits, 0);
        assert_eq!(stats.folders_touched.get("src"), Some(&10));
        assert_eq!(stats.folders_touched.get("(root)"), Some(&7));
        assert_eq!(stats.total_additions, 13);
    }

    #[test]
    fn test_prompt_placeholders_and_cap() {
        let prompt = activity_prompt("o/r", "u", 1, &ActivityStats::default(), &[], &[]);
        assert!(prompt.contains("(no commits)"));
        assert!(prompt.contains("(no PRs)"));

        let commits: Vec<CommitActivity> = (0..30)
            .map(|i| CommitActivity {
                sha: format!("{:040}", i),
                message: format!("change {}", i),
                date: None,
                additions: 1,
                deletions: 0,
                files: vec![],
            })
            .collect();
        let prompt = activity_prompt("o/r", "u", 1, &ActivityStats::default(), &commits, &[]);
        assert_eq!(prompt.matches("- [").count(), PROMPT_ITEM_LIMIT);
        assert!(prompt.contains("- [0000000] change 0 (files: 0, +1/-0)"));
    }
}
