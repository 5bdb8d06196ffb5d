//! Commit activity metrics.
//!
//! Pure, deterministic aggregation over a commit list; no I/O.
//!
//! - [`commits_per_day`]: UTC calendar day (`2025-01-28`) → count
//! - [`commits_per_week`]: ISO week (`2025-W5`) → count
//! - [`top_contributors`]: author name → count, descending, stable on ties
//!
//! Commits without a parseable author timestamp contribute to the total and
//! to contributor rankings but have no day or week to land in.

use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::models::Commit;

/// Ordered `key → count` buckets that serialize as a JSON object in
/// chronological key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketCounts(Vec<(String, usize)>);

impl BucketCounts {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, v)| v).sum()
    }
}

impl Serialize for BucketCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContributorCount {
    pub author: String,
    pub commits: usize,
}

/// Metrics recomputed for every request over an already-filtered commit set.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub total_commits_recent: usize,
    pub commits_per_day: BucketCounts,
    pub commits_per_week: BucketCounts,
    pub top_contributors: Vec<ContributorCount>,
}

pub fn snapshot(commits: &[Commit], top_n: usize) -> MetricsSnapshot {
    MetricsSnapshot {
        total_commits_recent: commits.len(),
        commits_per_day: commits_per_day(commits),
        commits_per_week: commits_per_week(commits),
        top_contributors: top_contributors(commits, top_n),
    }
}

pub fn commits_per_day(commits: &[Commit]) -> BucketCounts {
    let mut days: BTreeMap<String, usize> = BTreeMap::new();
    for dt in commits.iter().filter_map(Commit::authored_at) {
        *days.entry(dt.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
    }
    BucketCounts(days.into_iter().collect())
}

pub fn commits_per_week(commits: &[Commit]) -> BucketCounts {
    // Keyed numerically so W10 sorts after W9.
    let mut weeks: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for dt in commits.iter().filter_map(Commit::authored_at) {
        let iso = dt.iso_week();
        *weeks.entry((iso.year(), iso.week())).or_insert(0) += 1;
    }
    BucketCounts(
        weeks
            .into_iter()
            .map(|((year, week), n)| (format!("{}-W{}", year, week), n))
            .collect(),
    )
}

pub fn top_contributors(commits: &[Commit], limit: usize) -> Vec<ContributorCount> {
    let mut order: Vec<ContributorCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for c in commits {
        let name = c.author_name().unwrap_or("Unknown");
        match index.get(name) {
            Some(&i) => order[i].commits += 1,
            None => {
                index.insert(name, order.len());
                order.push(ContributorCount {
                    author: name.to_string(),
                    commits: 1,
                });
            }
        }
    }

    // Stable: equal counts keep first-seen order.
    order.sort_by(|a, b| b.commits.cmp(&a.commits));
    order.truncate(limit);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitInfo, GitSignature};

    fn commit(name: Option<&str>, date: Option<&str>) -> Commit {
        Commit {
            sha: "x".to_string(),
            commit: CommitInfo {
                message: String::new(),
                author: Some(GitSignature {
                    name: name.map(str::to_string),
                    email: None,
                    date: date.map(str::to_string),
                }),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_per_day_sums_and_order() {
        let commits = vec![
            commit(Some("a"), Some("2025-01-03T10:00:00Z")),
            commit(Some("b"), Some("2025-01-01T09:00:00Z")),
            commit(Some("a"), Some("2025-01-03T23:59:59Z")),
            commit(Some("c"), Some("2024-12-31T12:00:00Z")),
        ];
        let days = commits_per_day(&commits);
        assert_eq!(days.total(), commits.len());
        let keys: Vec<&str> = days.keys().collect();
        assert_eq!(keys, vec!["2024-12-31", "2025-01-01", "2025-01-03"]);
        assert_eq!(days.get("2025-01-03"), Some(2));
    }

    #[test]
    fn test_per_day_uses_utc_calendar_day() {
        let commits = vec![commit(Some("a"), Some("2025-01-02T01:00:00+05:00"))];
        let days = commits_per_day(&commits);
        assert_eq!(days.get("2025-01-01"), Some(1));
    }

    #[test]
    fn test_per_week_iso_rules() {
        let commits = vec![
            // Wednesday of ISO week 1, 2025
            commit(Some("a"), Some("2025-01-01T12:00:00Z")),
            // Sunday 2024-12-29 is still ISO 2024-W52
            commit(Some("a"), Some("2024-12-29T12:00:00Z")),
            // Monday 2024-12-30 belongs to ISO 2025-W1
            commit(Some("a"), Some("2024-12-30T12:00:00Z")),
        ];
        let weeks = commits_per_week(&commits);
        assert_eq!(weeks.get("2025-W1"), Some(2));
        assert_eq!(weeks.get("2024-W52"), Some(1));
        let keys: Vec<&str> = weeks.keys().collect();
        assert_eq!(keys, vec!["2024-W52", "2025-W1"]);
    }

    #[test]
    fn test_per_week_numeric_order() {
        let commits = vec![
            commit(Some("a"), Some("2025-03-05T00:00:00Z")), // W10
            commit(Some("a"), Some("2025-02-26T00:00:00Z")), // W9
        ];
        let keys: Vec<String> = commits_per_week(&commits)
            .keys()
            .map(str::to_string)
            .collect();
        assert_eq!(keys, vec!["2025-W9", "2025-W10"]);
    }

    #[test]
    fn test_week_key_format() {
        let commits = vec![commit(Some("a"), Some("2023-06-15T00:00:00Z"))];
        let weeks = commits_per_week(&commits);
        for key in weeks.keys() {
            let (year, week) = key.split_once("-W").unwrap();
            assert_eq!(year.len(), 4);
            assert!(week.parse::<u32>().unwrap() >= 1);
        }
    }

    #[test]
    fn test_unparseable_dates_skipped_in_buckets() {
        let commits = vec![
            commit(Some("a"), Some("not-a-date")),
            commit(Some("a"), None),
            commit(Some("a"), Some("2025-01-01T00:00:00Z")),
        ];
        assert_eq!(commits_per_day(&commits).total(), 1);
        let snap = snapshot(&commits, 5);
        assert_eq!(snap.total_commits_recent, 3);
        assert_eq!(snap.top_contributors[0].commits, 3);
    }

    #[test]
    fn test_top_contributors_ranking_and_ties() {
        let commits = vec![
            commit(Some("carol"), None),
            commit(Some("bob"), None),
            commit(Some("alice"), None),
            commit(Some("alice"), None),
            commit(Some("bob"), None),
            commit(Some("dave"), None),
        ];
        let top = top_contributors(&commits, 10);
        let names: Vec<&str> = top.iter().map(|c| c.author.as_str()).collect();
        // bob and alice tie at 2; bob appeared first. carol and dave tie at 1.
        assert_eq!(names, vec!["bob", "alice", "carol", "dave"]);
    }

    #[test]
    fn test_top_contributors_limit_and_unknown() {
        let commits = vec![
            commit(None, None),
            commit(Some(""), None),
            commit(Some("x"), None),
        ];
        let top = top_contributors(&commits, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(
            top[0],
            ContributorCount {
                author: "Unknown".to_string(),
                commits: 2
            }
        );
        assert!(top_contributors(&commits, 0).is_empty());
    }

    #[test]
    fn test_buckets_serialize_as_ordered_object() {
        let commits = vec![
            commit(Some("a"), Some("2025-03-05T00:00:00Z")),
            commit(Some("a"), Some("2025-02-26T00:00:00Z")),
        ];
        let json = serde_json::to_string(&commits_per_week(&commits)).unwrap();
        assert_eq!(json, r#"{"2025-W9":1,"2025-W10":1}"#);
    }
}
