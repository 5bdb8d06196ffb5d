//! # Repo Insights
//!
//! Natural-language questions about a GitHub repository's recent activity,
//! answered by a hosted language model from retrieved commits, pull
//! requests, and computed metrics.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │  GitHub  │──▶│  Cache   │──▶│ Documents  │──▶│  Vector  │
//! │ REST API │   │ (files)  │   │  + Embed   │   │  Index   │
//! └──────────┘   └────┬─────┘   └────────────┘   └────┬─────┘
//!                     │                               │
//!                     ▼                               ▼
//!               ┌──────────┐                   ┌────────────┐
//!               │ Metrics  │──────────────────▶│  Answer    │──▶ LLM
//!               │ + Window │                   │  Pipeline  │
//!               └──────────┘                   └─────┬──────┘
//!                                                    ▼
//!                                            CLI  /  HTTP API
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! insights init
//! insights index https://github.com/karpathy/nanoGPT
//! insights ask https://github.com/karpathy/nanoGPT "what changed this week?"
//! insights serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`error`] | Error taxonomy |
//! | [`cache`] | Flat key/value cache for upstream lists |
//! | [`github`] | Paginated, cache-aware GitHub client |
//! | [`models`] | Commit and pull request wire types |
//! | [`metrics`] | Per-day, per-week, and contributor counts |
//! | [`window`] | Lookback window inference and filtering |
//! | [`documents`] | Commit / PR → embeddable documents |
//! | [`embedding`] | Embedding providers and vector helpers |
//! | [`index`] | Repository-scoped vector index |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Vector table schema |
//! | [`generation`] | Chat-completions client |
//! | [`answer`] | Question answering, summaries, indexing |
//! | [`activity`] | Per-developer activity report |
//! | [`server`] | HTTP API |

pub mod activity;
pub mod answer;
pub mod cache;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod github;
pub mod index;
pub mod metrics;
pub mod migrate;
pub mod models;
pub mod server;
pub mod window;
