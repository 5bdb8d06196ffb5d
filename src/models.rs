//! GitHub wire types used throughout the pipeline.
//!
//! Only the fields the pipeline reads are modelled; everything is
//! tolerant of `null` and missing values because the REST API omits
//! fields freely (unlinked commit authors, empty PR bodies, list vs.
//! detail responses).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit as returned by `GET /repos/{owner}/{repo}/commits` or, with
/// `files` and `stats` populated, by `GET /repos/{owner}/{repo}/commits/{sha}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    #[serde(default)]
    pub commit: CommitInfo,
    /// Linked GitHub account, absent when the author email is not tied to one.
    #[serde(default)]
    pub author: Option<GitHubUser>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
    #[serde(default)]
    pub stats: Option<CommitStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitInfo {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<GitSignature>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitSignature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// ISO-8601 author timestamp.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubUser {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl Commit {
    /// Git author display name, if present and non-empty.
    pub fn author_name(&self) -> Option<&str> {
        self.commit
            .author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    /// GitHub login of the linked account, if any.
    pub fn author_login(&self) -> Option<&str> {
        self.author
            .as_ref()
            .and_then(|u| u.login.as_deref())
            .filter(|l| !l.is_empty())
    }

    /// Raw author timestamp string.
    pub fn date(&self) -> Option<&str> {
        self.commit.author.as_ref().and_then(|a| a.date.as_deref())
    }

    /// Author timestamp normalized to UTC; `None` when missing or unparseable.
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        self.date().and_then(parse_timestamp)
    }
}

/// A pull request from `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    /// GitHub reports only `open` or `closed`; see [`PullRequest::effective_state`].
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub merged_at: Option<String>,
    #[serde(default)]
    pub closed_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    pub fn as_str(self) -> &'static str {
        match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
            PrState::Merged => "merged",
        }
    }
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PullRequest {
    pub fn author_login(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.login.as_deref())
            .filter(|l| !l.is_empty())
    }

    /// `merged` when a merge timestamp exists, otherwise GitHub's own state.
    pub fn effective_state(&self) -> PrState {
        if self.merged_at.is_some() {
            PrState::Merged
        } else if self.state == "closed" {
            PrState::Closed
        } else {
            PrState::Open
        }
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parse an RFC 3339 / ISO-8601 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_from_list_payload() {
        let c: Commit = serde_json::from_value(json!({
            "sha": "abc123",
            "commit": {
                "message": "Fix tokenizer",
                "author": {"name": "Ada", "email": "ada@example.com", "date": "2025-01-28T19:52:34Z"}
            },
            "author": null,
            "html_url": "https://github.com/o/r/commit/abc123"
        }))
        .unwrap();

        assert_eq!(c.author_name(), Some("Ada"));
        assert_eq!(c.author_login(), None);
        assert!(c.files.is_empty());
        assert_eq!(
            c.authored_at().unwrap().to_rfc3339(),
            "2025-01-28T19:52:34+00:00"
        );
    }

    #[test]
    fn test_timestamp_offset_normalized_to_utc() {
        let dt = parse_timestamp("2025-01-01T01:30:00+03:00").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-12-31 22:30");
    }

    #[test]
    fn test_pr_effective_state() {
        let mut pr = PullRequest {
            number: 1,
            state: "closed".to_string(),
            ..Default::default()
        };
        assert_eq!(pr.effective_state(), PrState::Closed);
        pr.merged_at = Some("2025-01-02T00:00:00Z".to_string());
        assert_eq!(pr.effective_state(), PrState::Merged);
        pr.state = "open".to_string();
        pr.merged_at = None;
        assert_eq!(pr.effective_state(), PrState::Open);
    }
}
