//! Commit and pull request documents for the vector index.
//!
//! Each source record becomes one embeddable text plus structured metadata,
//! under a stable id so re-indexing overwrites instead of duplicating:
//!
//! | Source | Id |
//! |--------|----|
//! | commit | `commit:{owner/repo}:{sha}` |
//! | pull request | `pr:{owner/repo}:{number}` |
//!
//! PR bodies longer than [`PR_BODY_LIMIT`] characters are cut and suffixed
//! with [`TRUNCATION_MARKER`]; the full body never reaches the index.

use serde::{Deserialize, Serialize};

use crate::models::{Commit, PullRequest};

pub const PR_BODY_LIMIT: usize = 2000;
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Commit,
    Pr,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Commit => "commit",
            DocumentKind::Pr => "pr",
        }
    }
}

/// Metadata stored alongside each document. `repo` is the mandatory
/// retrieval filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub repo: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Parallel id / text / metadata sequences ready for upsert.
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    pub metadatas: Vec<DocumentMetadata>,
}

impl DocumentBatch {
    fn push(&mut self, id: String, text: String, metadata: DocumentMetadata) {
        self.ids.push(id);
        self.texts.push(text);
        self.metadatas.push(metadata);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub fn build_commit_documents(commits: &[Commit], repo_full_name: &str) -> DocumentBatch {
    let mut batch = DocumentBatch::default();

    for c in commits {
        let author = c.author_name().unwrap_or("Unknown");
        let date = c.date();
        let text = format!(
            "[COMMIT] {} on {}:\n{}",
            author,
            date.unwrap_or("unknown date"),
            c.commit.message
        );

        let metadata = DocumentMetadata {
            repo: repo_full_name.to_string(),
            kind: DocumentKind::Commit,
            author: author.to_string(),
            sha: Some(c.sha.clone()),
            number: None,
            date: date.map(str::to_string),
            state: None,
            created_at: None,
            merged_at: None,
            closed_at: None,
            url: c.html_url.clone(),
        };

        batch.push(format!("commit:{}:{}", repo_full_name, c.sha), text, metadata);
    }

    batch
}

pub fn build_pr_documents(prs: &[PullRequest], repo_full_name: &str) -> DocumentBatch {
    let mut batch = DocumentBatch::default();

    for pr in prs {
        let author = pr.author_login().unwrap_or("Unknown");
        let state = pr.effective_state();
        let body = truncate_body(pr.body.as_deref().unwrap_or(""));
        let text = format!(
            "[PR #{}] {}\n\nAuthor: {}\nState: {}\n\n{}",
            pr.number,
            pr.title.as_deref().unwrap_or(""),
            author,
            state,
            body
        );

        let metadata = DocumentMetadata {
            repo: repo_full_name.to_string(),
            kind: DocumentKind::Pr,
            author: author.to_string(),
            sha: None,
            number: Some(pr.number),
            date: None,
            state: Some(state.to_string()),
            created_at: pr.created_at.clone(),
            merged_at: pr.merged_at.clone(),
            closed_at: pr.closed_at.clone(),
            url: pr.html_url.clone(),
        };

        batch.push(format!("pr:{}:{}", repo_full_name, pr.number), text, metadata);
    }

    batch
}

/// Cut `body` to [`PR_BODY_LIMIT`] characters plus [`TRUNCATION_MARKER`].
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(PR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}{}", &body[..cut], TRUNCATION_MARKER),
        None => body.to_string(),
    }
}
