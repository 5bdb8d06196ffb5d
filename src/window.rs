//! Lookback window inference and time filtering.
//!
//! [`infer_window`] maps question phrasing to a number of days using a
//! fixed keyword table, first match wins:
//!
//! | Keywords | Window |
//! |----------|--------|
//! | `today` | 1 |
//! | `yesterday` | 2 |
//! | `this week`, `past week`, `last week`, `recent`, `recently` | 7 |
//! | `this month`, `last month`, `past month` | 30 |
//! | `this year`, `last year`, `past year` | 365 |
//! | `why`, `how`, `architecture`, `tokenizer`, `design`, `model` | full history |
//! | anything else | 30 |
//!
//! Matching is a case-insensitive substring search. Negation and compound
//! phrasing are not understood: "not today" still yields 1.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Commit, PullRequest};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;

const RULES: &[(&[&str], Option<u32>)] = &[
    (&["today"], Some(1)),
    (&["yesterday"], Some(2)),
    (
        &["this week", "past week", "last week", "recent", "recently"],
        Some(7),
    ),
    (&["this month", "last month", "past month"], Some(30)),
    (&["this year", "last year", "past year"], Some(365)),
    (
        &["why", "how", "architecture", "tokenizer", "design", "model"],
        None,
    ),
];

/// Lookback window in days for `question`; `None` means full history.
pub fn infer_window(question: &str) -> Option<u32> {
    let q = question.to_lowercase();
    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| q.contains(k)))
        .map_or(Some(DEFAULT_WINDOW_DAYS), |(_, window)| *window)
}

/// Start of the window ending at `now`. Windows reaching past the earliest
/// representable instant clamp to it, so every dated item is kept.
pub fn cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Copy of the commits authored at or after `now - days`.
///
/// With no window every commit is kept, including those with unparseable
/// timestamps; with a window such commits are dropped.
pub fn commits_within(commits: &[Commit], days: Option<u32>, now: DateTime<Utc>) -> Vec<Commit> {
    let Some(days) = days else {
        return commits.to_vec();
    };
    let since = cutoff(now, days);
    commits
        .iter()
        .filter(|c| c.authored_at().is_some_and(|dt| dt >= since))
        .cloned()
        .collect()
}

/// Copy of the pull requests created at or after `since`.
pub fn prs_created_since(prs: &[PullRequest], since: DateTime<Utc>) -> Vec<PullRequest> {
    prs.iter()
        .filter(|pr| pr.created().is_some_and(|dt| dt >= since))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitInfo, GitSignature};

    fn commit_at(date: Option<String>) -> Commit {
        Commit {
            sha: "s".to_string(),
            commit: CommitInfo {
                message: String::new(),
                author: Some(GitSignature {
                    name: Some("a".to_string()),
                    email: None,
                    date,
                }),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_keyword_table() {
        assert_eq!(infer_window("what changed today?"), Some(1));
        assert_eq!(infer_window("Who pushed YESTERDAY"), Some(2));
        assert_eq!(infer_window("anything recent?"), Some(7));
        assert_eq!(infer_window("summarize last month"), Some(30));
        assert_eq!(infer_window("progress this year"), Some(365));
        assert_eq!(infer_window("explain the tokenizer design"), None);
        assert_eq!(infer_window("list the commits"), Some(30));
        assert_eq!(infer_window(""), Some(30));
    }

    #[test]
    fn test_first_match_wins() {
        // Week keywords outrank the conceptual ones.
        assert_eq!(infer_window("why did things change this week"), Some(7));
        // No negation handling.
        assert_eq!(infer_window("not today"), Some(1));
        // Compound phrasing takes the earliest rule in the table.
        assert_eq!(infer_window("last week and this month"), Some(7));
    }

    #[test]
    fn test_filter_keeps_boundary_and_drops_old() {
        let now = Utc::now();
        let commits = vec![
            commit_at(Some((now - Duration::days(1)).to_rfc3339())),
            commit_at(Some((now - Duration::days(10)).to_rfc3339())),
            commit_at(Some(cutoff(now, 7).to_rfc3339())),
            commit_at(None),
        ];
        let kept = commits_within(&commits, Some(7), now);
        assert_eq!(kept.len(), 2);
        // Source list untouched.
        assert_eq!(commits.len(), 4);
    }

    #[test]
    fn test_huge_window_clamps_instead_of_overflowing() {
        let now = Utc::now();
        assert_eq!(cutoff(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(cutoff(now, 100_000_000), DateTime::<Utc>::MIN_UTC);

        let commits = vec![
            commit_at(Some("1970-01-01T00:00:00Z".to_string())),
            commit_at(Some(now.to_rfc3339())),
            commit_at(None),
        ];
        assert_eq!(commits_within(&commits, Some(u32::MAX), now).len(), 2);
    }

    #[test]
    fn test_no_window_keeps_everything() {
        let now = Utc::now();
        let commits = vec![commit_at(None), commit_at(Some("garbage".to_string()))];
        assert_eq!(commits_within(&commits, None, now).len(), 2);
    }

    #[test]
    fn test_prs_created_since() {
        let now = Utc::now();
        let prs = vec![
            PullRequest {
                number: 1,
                created_at: Some((now - Duration::hours(2)).to_rfc3339()),
                ..Default::default()
            },
            PullRequest {
                number: 2,
                created_at: Some((now - Duration::days(3)).to_rfc3339()),
                ..Default::default()
            },
            PullRequest {
                number: 3,
                created_at: None,
                ..Default::default()
            },
        ];
        let kept = prs_created_since(&prs, cutoff(now, 1));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].number, 1);
    }
}
