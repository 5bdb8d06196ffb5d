//! Upstream data client for the GitHub REST API.
//!
//! Resolves repository URLs to [`RepoRef`]s and fetches repository
//! metadata, commits, commit details, pull requests, contributors, and
//! branches.
//!
//! # Pagination
//!
//! List endpoints are requested page by page (`?page=N&per_page=M`) until
//! an empty page comes back; results are concatenated. A non-success status
//! on any page aborts the whole fetch with [`InsightsError::Upstream`]; no
//! partial result is returned and nothing is retried.
//!
//! # Caching
//!
//! | Operation | Cached | Namespace | Key |
//! |-----------|--------|-----------|-----|
//! | [`commits`](GitHubClient::commits) | yes | `commits` | `{owner}_{repo}_commits` |
//! | [`pull_requests`](GitHubClient::pull_requests) | yes | `prs` | `{owner}_{repo}_prs` |
//! | [`contributors`](GitHubClient::contributors) | yes | `contributors` | `{owner}_{repo}_contributors` |
//! | [`repo_info`](GitHubClient::repo_info), [`commit_detail`](GitHubClient::commit_detail), [`branches`](GitHubClient::branches) | no | | |
//!
//! A usable cache hit short-circuits pagination entirely. A failed cache
//! write is logged and the freshly fetched list is still returned.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{is_usable, CacheStore, FileCache};
use crate::config::{Config, GitHubConfig, Secrets};
use crate::error::{check_status, InsightsError, Result};
use crate::models::{Commit, PullRequest};

/// An `owner/repo` pair extracted from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// `owner/repo`, the form used in document ids and index metadata.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn cache_key(&self, kind: &str) -> String {
        format!("{}_{}_{}", self.owner, self.repo, kind)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Extract `(owner, repo)` from a `host/owner/repo` URL.
///
/// The scheme is optional (`github.com/o/r` is accepted), anything after the
/// repository segment is ignored (`.../tree/main`), and a trailing `.git`
/// is stripped.
pub fn parse_repo_url(input: &str) -> Result<RepoRef> {
    let invalid = || InsightsError::InvalidReference(input.to_string());
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed)
    } else {
        Url::parse(&format!("https://{}", trimmed))
    }
    .map_err(|_| invalid())?;

    match parsed.host_str() {
        Some(host) if host.contains('.') || host == "localhost" => {}
        _ => return Err(invalid()),
    }

    let mut segments = parsed
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|s| !s.is_empty());
    let owner = segments.next().ok_or_else(invalid)?;
    let repo = segments.next().ok_or_else(invalid)?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return Err(invalid());
    }

    Ok(RepoRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

/// Paginated, cache-aware GitHub REST client.
///
/// Every request carries a bounded timeout from [`GitHubConfig::timeout_secs`].
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    per_page: u32,
    cache: Arc<dyn CacheStore>,
}

impl GitHubClient {
    /// Build a client. Without a token, requests go out anonymously and are
    /// subject to much lower rate limits.
    pub fn new(
        config: &GitHubConfig,
        token: Option<&str>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| anyhow::anyhow!("invalid github.user_agent: {}", e))?;
        headers.insert(USER_AGENT, agent);

        match token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| anyhow::anyhow!("invalid GITHUB_TOKEN: {}", e))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            None => warn!("GITHUB_TOKEN not set; using anonymous GitHub access with low rate limits"),
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            per_page: config.per_page,
            cache,
        })
    }

    /// Client over the on-disk cache at `cache.dir`, authenticated with
    /// `GITHUB_TOKEN` when set.
    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        let cache: Arc<dyn CacheStore> = Arc::new(FileCache::new(&config.cache.dir));
        Self::new(&config.github, secrets.github_token.as_deref(), cache)
    }

    fn repo_url(&self, repo: &RepoRef, suffix: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_base, repo.owner, repo.repo, suffix)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.http.get(url).query(query).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn fetch_all_pages(&self, url: &str, extra: &[(&str, String)]) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("per_page", self.per_page.to_string()),
            ];
            query.extend(extra.iter().cloned());

            let batch: Vec<Value> = self.get_json(url, &query).await?;
            if batch.is_empty() {
                break;
            }
            debug!(url, page, items = batch.len(), "fetched page");
            items.extend(batch);
            page += 1;
        }

        info!(url, pages = page - 1, items = items.len(), "pagination complete");
        Ok(items)
    }

    async fn cached_list(
        &self,
        repo: &RepoRef,
        kind: &str,
        namespace: &str,
        url: String,
        extra: &[(&str, String)],
    ) -> Result<Vec<Value>> {
        let key = repo.cache_key(kind);

        if let Some(Value::Array(items)) = self.cache.get(&key, namespace).filter(is_usable) {
            debug!(key = %key, namespace, items = items.len(), "cache hit");
            return Ok(items);
        }
        debug!(key = %key, namespace, "cache miss");

        let items = self.fetch_all_pages(&url, extra).await?;
        if let Err(e) = self.cache.put(&key, namespace, &Value::Array(items.clone())) {
            warn!(key = %key, namespace, error = %e, "cache write failed; serving fetched data uncached");
        }
        Ok(items)
    }

    /// Repository metadata, always fresh.
    pub async fn repo_info(&self, repo: &RepoRef) -> Result<Value> {
        self.get_json(&self.repo_url(repo, ""), &[]).await
    }

    /// Raw commit list as returned by GitHub (cache-aware).
    pub async fn commits_raw(&self, repo: &RepoRef) -> Result<Vec<Value>> {
        let url = self.repo_url(repo, "/commits");
        self.cached_list(repo, "commits", "commits", url, &[]).await
    }

    /// Typed commit list (cache-aware).
    pub async fn commits(&self, repo: &RepoRef) -> Result<Vec<Commit>> {
        decode_all(self.commits_raw(repo).await?)
    }

    /// Full commit including per-file changes and stats. Never cached.
    pub async fn commit_detail(&self, repo: &RepoRef, sha: &str) -> Result<Commit> {
        self.get_json(&self.repo_url(repo, &format!("/commits/{}", sha)), &[])
            .await
    }

    /// Raw pull request list for `state` (`open`, `closed`, or `all`; cache-aware).
    pub async fn pull_requests_raw(&self, repo: &RepoRef, state: &str) -> Result<Vec<Value>> {
        let kind = if state == "all" {
            "prs".to_string()
        } else {
            format!("prs_{}", state)
        };
        let url = self.repo_url(repo, "/pulls");
        self.cached_list(repo, &kind, "prs", url, &[("state", state.to_string())])
            .await
    }

    pub async fn pull_requests(&self, repo: &RepoRef, state: &str) -> Result<Vec<PullRequest>> {
        decode_all(self.pull_requests_raw(repo, state).await?)
    }

    /// Contributor list (cache-aware).
    pub async fn contributors(&self, repo: &RepoRef) -> Result<Vec<Value>> {
        let url = self.repo_url(repo, "/contributors");
        self.cached_list(repo, "contributors", "contributors", url, &[])
            .await
    }

    /// Branch list, always fresh.
    pub async fn branches(&self, repo: &RepoRef) -> Result<Vec<Value>> {
        self.fetch_all_pages(&self.repo_url(repo, "/branches"), &[])
            .await
    }
}

fn decode_all<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>> {
    items
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(InsightsError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_url() {
        let r = parse_repo_url("https://github.com/karpathy/nanoGPT").unwrap();
        assert_eq!(r.owner, "karpathy");
        assert_eq!(r.repo, "nanoGPT");
        assert_eq!(r.full_name(), "karpathy/nanoGPT");
    }

    #[test]
    fn test_parse_without_scheme() {
        let r = parse_repo_url("github.com/rust-lang/rust").unwrap();
        assert_eq!(r.full_name(), "rust-lang/rust");
    }

    #[test]
    fn test_parse_ignores_trailing_path_and_git_suffix() {
        let r = parse_repo_url("https://github.com/o/r.git").unwrap();
        assert_eq!(r.full_name(), "o/r");
        let r = parse_repo_url("https://github.com/o/r/tree/main/src").unwrap();
        assert_eq!(r.full_name(), "o/r");
        let r = parse_repo_url("https://github.com/o/r/").unwrap();
        assert_eq!(r.full_name(), "o/r");
    }

    #[test]
    fn test_parse_rejects_missing_repo() {
        for bad in [
            "",
            "   ",
            "https://github.com/",
            "https://github.com/only-owner",
            "not a url",
            "nohost/o/r",
        ] {
            let err = parse_repo_url(bad).unwrap_err();
            assert!(
                matches!(err, InsightsError::InvalidReference(_)),
                "expected InvalidReference for {:?}, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_cache_key_format() {
        let r = RepoRef {
            owner: "o".to_string(),
            repo: "r".to_string(),
        };
        assert_eq!(r.cache_key("commits"), "o_r_commits");
    }
}
