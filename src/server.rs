//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/ai/query` | Answer a question about a repository |
//! | `POST` | `/api/ai/summary` | Executive summary of recent activity |
//! | `POST` | `/api/ai/user-activity` | One developer's recent contributions |
//! | `POST` | `/api/ai/index` | Index commits and PRs for retrieval |
//! | `GET`  | `/api/github/{info,commits,pulls,contributors,branches}` | Raw upstream data |
//! | `GET`  | `/api/metrics/activity/{daily,weekly}` | Commit counts per day / ISO week |
//! | `GET`  | `/api/metrics/contributors/top` | Top committers |
//!
//! The `/api/github/*` and `/api/metrics/*` endpoints take an optional `url`
//! query parameter and fall back to `github.default_repo`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid repository reference: nope" } }
//! ```
//!
//! | Error | Status | Code |
//! |-------|--------|------|
//! | malformed repository URL, missing `url`, malformed query string | 400 | `bad_request` |
//! | unparseable JSON body | 400 / 415 / 422 | `bad_request` |
//! | embedding provider disabled | 400 | `embeddings_disabled` |
//! | upstream non-success | 502 | `upstream_error` |
//! | anything else | 500 | `internal` |

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::activity::UserActivityReport;
use crate::answer::{AnswerResult, IndexReport, InsightsEngine, SummaryResult};
use crate::config::Config;
use crate::error::InsightsError;
use crate::github::{parse_repo_url, RepoRef};
use crate::metrics::{commits_per_day, commits_per_week, top_contributors, BucketCounts, ContributorCount};

const DEFAULT_SUMMARY_WINDOW_DAYS: u32 = 7;
const DEFAULT_ACTIVITY_WINDOW_DAYS: u32 = 1;
const DEFAULT_TOP_LIMIT: usize = 10;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<InsightsEngine>,
    default_repo: Option<String>,
}

impl AppState {
    pub fn new(engine: Arc<InsightsEngine>, default_repo: Option<String>) -> Self {
        Self {
            engine,
            default_repo,
        }
    }
}

/// All routes with CORS and request tracing applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/ai/query", post(handle_query))
        .route("/api/ai/summary", post(handle_summary))
        .route("/api/ai/user-activity", post(handle_user_activity))
        .route("/api/ai/index", post(handle_index))
        .route("/api/github/info", get(handle_repo_info))
        .route("/api/github/commits", get(handle_commits))
        .route("/api/github/pulls", get(handle_pulls))
        .route("/api/github/contributors", get(handle_contributors))
        .route("/api/github/branches", get(handle_branches))
        .route("/api/metrics/activity/daily", get(handle_daily))
        .route("/api/metrics/activity/weekly", get(handle_weekly))
        .route("/api/metrics/contributors/top", get(handle_top))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, engine: Arc<InsightsEngine>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(AppState::new(engine, config.github.default_repo.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "insights server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: rejection.status(),
            code: "bad_request".to_string(),
            message: rejection.body_text(),
        }
    }
}

impl From<InsightsError> for AppError {
    fn from(err: InsightsError) -> Self {
        let message = err.to_string();
        let (status, code) = match &err {
            InsightsError::InvalidReference(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            InsightsError::EmbeddingsDisabled => (StatusCode::BAD_REQUEST, "embeddings_disabled"),
            InsightsError::Upstream { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            _ => {
                error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code: code.to_string(),
            message,
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ Response envelopes ============

/// `{ "status": "success", "data": ... }`
#[derive(Serialize)]
struct Wrapped<T> {
    status: &'static str,
    data: T,
}

fn wrapped<T>(data: T) -> Json<Wrapped<T>> {
    Json(Wrapped {
        status: "success",
        data,
    })
}

/// `{ "status": "success", ...fields }`
#[derive(Serialize)]
struct Flat<T> {
    status: &'static str,
    #[serde(flatten)]
    body: T,
}

fn flat<T>(body: T) -> Json<Flat<T>> {
    Json(Flat {
        status: "success",
        body,
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/ai/* ============

#[derive(Deserialize)]
struct QueryRequest {
    url: String,
    question: String,
    #[serde(default)]
    time_window_days: Option<u32>,
    #[serde(default)]
    k: Option<usize>,
}

async fn handle_query(
    State(state): State<AppState>,
    req: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Wrapped<AnswerResult>> {
    let Json(req) = req?;
    let result = state
        .engine
        .answer_question(&req.url, &req.question, req.time_window_days, req.k)
        .await?;
    Ok(wrapped(result))
}

#[derive(Deserialize)]
struct SummaryRequest {
    url: String,
    #[serde(default = "default_summary_window")]
    time_window_days: u32,
}

fn default_summary_window() -> u32 {
    DEFAULT_SUMMARY_WINDOW_DAYS
}

async fn handle_summary(
    State(state): State<AppState>,
    req: Result<Json<SummaryRequest>, JsonRejection>,
) -> ApiResult<Flat<SummaryResult>> {
    let Json(req) = req?;
    let result = state
        .engine
        .summarize(&req.url, req.time_window_days, None)
        .await?;
    Ok(flat(result))
}

#[derive(Deserialize)]
struct UserActivityRequest {
    url: String,
    user: String,
    #[serde(default = "default_activity_window")]
    time_window_days: u32,
}

fn default_activity_window() -> u32 {
    DEFAULT_ACTIVITY_WINDOW_DAYS
}

async fn handle_user_activity(
    State(state): State<AppState>,
    req: Result<Json<UserActivityRequest>, JsonRejection>,
) -> ApiResult<Flat<UserActivityReport>> {
    let Json(req) = req?;
    let report = state
        .engine
        .user_activity(&req.url, &req.user, req.time_window_days)
        .await?;
    Ok(flat(report))
}

#[derive(Deserialize)]
struct IndexRequest {
    url: String,
    #[serde(default)]
    max_commits: Option<usize>,
    #[serde(default)]
    max_prs: Option<usize>,
}

async fn handle_index(
    State(state): State<AppState>,
    req: Result<Json<IndexRequest>, JsonRejection>,
) -> ApiResult<Wrapped<IndexReport>> {
    let Json(req) = req?;
    let report = state
        .engine
        .index_repo_activity(&req.url, req.max_commits, req.max_prs)
        .await?;
    Ok(wrapped(report))
}

// ============ GET /api/github/* ============

#[derive(Deserialize)]
struct RepoParams {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct PullsParams {
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_pr_state")]
    state: String,
}

fn default_pr_state() -> String {
    "all".to_string()
}

fn resolve_repo(state: &AppState, url: Option<&str>) -> Result<RepoRef, AppError> {
    let url = url
        .or(state.default_repo.as_deref())
        .ok_or_else(|| bad_request("url is required (no github.default_repo configured)"))?;
    Ok(parse_repo_url(url)?)
}

async fn handle_repo_info(
    State(state): State<AppState>,
    params: Result<Query<RepoParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    let repo = resolve_repo(&state, params.url.as_deref())?;
    Ok(Json(state.engine.github().repo_info(&repo).await?))
}

async fn handle_commits(
    State(state): State<AppState>,
    params: Result<Query<RepoParams>, QueryRejection>,
) -> ApiResult<Vec<Value>> {
    let Query(params) = params?;
    let repo = resolve_repo(&state, params.url.as_deref())?;
    Ok(Json(state.engine.github().commits_raw(&repo).await?))
}

async fn handle_pulls(
    State(state): State<AppState>,
    params: Result<Query<PullsParams>, QueryRejection>,
) -> ApiResult<Vec<Value>> {
    let Query(params) = params?;
    let repo = resolve_repo(&state, params.url.as_deref())?;
    let prs = state
        .engine
        .github()
        .pull_requests_raw(&repo, &params.state)
        .await?;
    Ok(Json(prs))
}

async fn handle_contributors(
    State(state): State<AppState>,
    params: Result<Query<RepoParams>, QueryRejection>,
) -> ApiResult<Vec<Value>> {
    let Query(params) = params?;
    let repo = resolve_repo(&state, params.url.as_deref())?;
    Ok(Json(state.engine.github().contributors(&repo).await?))
}

async fn handle_branches(
    State(state): State<AppState>,
    params: Result<Query<RepoParams>, QueryRejection>,
) -> ApiResult<Vec<Value>> {
    let Query(params) = params?;
    let repo = resolve_repo(&state, params.url.as_deref())?;
    Ok(Json(state.engine.github().branches(&repo).await?))
}

// ============ GET /api/metrics/* ============

#[derive(Deserialize)]
struct TopParams {
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_top_limit")]
    limit: usize,
}

fn default_top_limit() -> usize {
    DEFAULT_TOP_LIMIT
}

async fn handle_daily(
    State(state): State<AppState>,
    params: Result<Query<RepoParams>, QueryRejection>,
) -> ApiResult<Wrapped<BucketCounts>> {
    let Query(params) = params?;
    let repo = resolve_repo(&state, params.url.as_deref())?;
    let commits = state.engine.github().commits(&repo).await?;
    Ok(wrapped(commits_per_day(&commits)))
}

async fn handle_weekly(
    State(state): State<AppState>,
    params: Result<Query<RepoParams>, QueryRejection>,
) -> ApiResult<Wrapped<BucketCounts>> {
    let Query(params) = params?;
    let repo = resolve_repo(&state, params.url.as_deref())?;
    let commits = state.engine.github().commits(&repo).await?;
    Ok(wrapped(commits_per_week(&commits)))
}

async fn handle_top(
    State(state): State<AppState>,
    params: Result<Query<TopParams>, QueryRejection>,
) -> ApiResult<Wrapped<Vec<ContributorCount>>> {
    let Query(params) = params?;
    let repo = resolve_repo(&state, params.url.as_deref())?;
    let commits = state.engine.github().commits(&repo).await?;
    Ok(wrapped(top_contributors(&commits, params.limit)))
}
