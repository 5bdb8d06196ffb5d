//! Error taxonomy shared by every pipeline stage.
//!
//! | Variant | Meaning | HTTP |
//! |---------|---------|------|
//! | [`InvalidReference`](InsightsError::InvalidReference) | Malformed repository URL | 400 |
//! | [`Upstream`](InsightsError::Upstream) | Non-success response from GitHub, the embedding service, or the generation service | 502 |
//! | [`ShapeMismatch`](InsightsError::ShapeMismatch) | Parallel id/text/metadata sequences differ in length | 500 |
//! | [`EmbeddingsDisabled`](InsightsError::EmbeddingsDisabled) | Retrieval requested with no embedding provider configured | 400 |
//!
//! Cache read failures are absent here: they are a separate type
//! ([`CacheReadFailure`](crate::cache::CacheReadFailure)) that never leaves
//! the cache module.

use reqwest::Response;

#[derive(Debug, thiserror::Error)]
pub enum InsightsError {
    /// The repository reference does not look like `host/owner/repo`.
    #[error("invalid repository reference: {0}")]
    InvalidReference(String),

    /// An external service answered with a non-success status.
    #[error("upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Parallel document sequences handed to the index differ in length.
    #[error("shape mismatch: {ids} ids, {texts} texts, {metadatas} metadatas")]
    ShapeMismatch {
        ids: usize,
        texts: usize,
        metadatas: usize,
    },

    #[error("embedding provider is disabled")]
    EmbeddingsDisabled,

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, InsightsError>;

/// Pass successful responses through; turn anything else into
/// [`InsightsError::Upstream`] carrying the status and response body.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(InsightsError::Upstream {
        status: status.as_u16(),
        body,
    })
}
