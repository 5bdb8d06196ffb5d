//! Shared fakes and fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use repo_insights::answer::InsightsEngine;
use repo_insights::cache::CacheStore;
use repo_insights::config::{GitHubConfig, RetrievalConfig};
use repo_insights::embedding::Embedder;
use repo_insights::error::Result;
use repo_insights::generation::{ChatMessage, Generator};
use repo_insights::github::GitHubClient;
use repo_insights::index::{InMemoryVectorStore, VectorIndex};
use serde_json::{json, Value};

pub const DIMS: usize = 64;

/// Bag-of-words hashing embedder: deterministic, no network.
pub struct HashEmbedder {
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; DIMS];
                for word in text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let mut h = DefaultHasher::new();
                    word.hash(&mut h);
                    v[(h.finish() % DIMS as u64) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Generator that records every prompt and replies with a fixed string.
pub struct RecordingGenerator {
    pub reply: String,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_user_prompt(&self) -> String {
        let prompts = self.prompts.lock().unwrap();
        prompts
            .last()
            .and_then(|m| m.iter().find(|msg| msg.role == "user"))
            .map(|msg| msg.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

pub fn github_config(api_base: &str) -> GitHubConfig {
    GitHubConfig {
        api_base: api_base.to_string(),
        per_page: 2,
        timeout_secs: 5,
        ..Default::default()
    }
}

/// Engine over in-memory components. `api_base` is only contacted on a
/// cache miss.
pub fn engine(
    api_base: &str,
    cache: Arc<dyn CacheStore>,
    generator: Arc<RecordingGenerator>,
) -> (InsightsEngine, Arc<HashEmbedder>) {
    let github = GitHubClient::new(&github_config(api_base), None, cache).unwrap();
    let embedder = Arc::new(HashEmbedder::new());
    let index = VectorIndex::new(embedder.clone(), Arc::new(InMemoryVectorStore::new()));
    let engine = InsightsEngine::new(github, index, generator, RetrievalConfig::default());
    (engine, embedder)
}

/// An address nothing listens on.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

pub fn hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours)).to_rfc3339()
}

pub fn commit_json(sha: &str, login: &str, name: &str, date: &str, message: &str) -> Value {
    json!({
        "sha": sha,
        "html_url": format!("https://github.com/o/r/commit/{}", sha),
        "author": { "login": login },
        "commit": {
            "message": message,
            "author": { "name": name, "email": format!("{}@example.com", login), "date": date }
        }
    })
}

pub fn pr_json(number: u64, login: &str, title: &str, body: &str, created_at: &str) -> Value {
    json!({
        "number": number,
        "title": title,
        "body": body,
        "user": { "login": login },
        "state": "open",
        "created_at": created_at,
        "merged_at": null,
        "closed_at": null,
        "html_url": format!("https://github.com/o/r/pull/{}", number)
    })
}
