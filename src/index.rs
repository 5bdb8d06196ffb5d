//! Repository-scoped vector index.
//!
//! [`VectorIndex`] pairs an [`Embedder`] with a [`VectorStore`]. Documents
//! are upserted by id (same id overwrites) and every similarity query is
//! filtered on the `repo` metadata field, so results from one repository
//! never surface in another's answers.
//!
//! Two backends implement [`VectorStore`]:
//! - **[`SqliteVectorStore`]**: vectors as little-endian BLOBs in a SQLite
//!   table, brute-force cosine ranking in process.
//! - **[`InMemoryVectorStore`]**: a `Vec` behind a `RwLock`, for tests.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::{EmbeddingConfig, IndexConfig};
use crate::db;
use crate::documents::{DocumentBatch, DocumentMetadata};
use crate::embedding::{
    blob_to_vec, cosine_similarity, create_embedder, embed_query, vec_to_blob, Embedder,
};
use crate::error::{InsightsError, Result};
use crate::migrate;

/// A document with its embedding, ready to store.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub embedding: Vec<f32>,
    pub model: String,
}

/// A retrieved document and its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records by id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Up to `k` documents of `repo`, most similar first.
    async fn query(&self, repo: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;

    /// Number of documents stored for `repo`.
    async fn count(&self, repo: &str) -> Result<usize>;
}

fn rank(mut scored: Vec<ScoredDocument>, k: usize) -> Vec<ScoredDocument> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

// ============ In-memory backend ============

#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self.records.write().unwrap_or_else(|e| e.into_inner());
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(&self, repo: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let stored = self.records.read().unwrap_or_else(|e| e.into_inner());
        let scored = stored
            .iter()
            .filter(|r| r.metadata.repo == repo)
            .map(|r| ScoredDocument {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(vector, &r.embedding),
            })
            .collect();
        Ok(rank(scored, k))
    }

    async fn count(&self, repo: &str) -> Result<usize> {
        let stored = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(stored.iter().filter(|r| r.metadata.repo == repo).count())
    }
}

// ============ SQLite backend ============

/// Persistent store: one row per `(collection, id)` in the `vectors` table.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorStore {
    /// Open the configured database, creating the file and schema as needed.
    pub async fn open(config: &IndexConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, &config.collection))
    }

    pub fn new(pool: SqlitePool, collection: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO vectors
                    (collection, id, repo, kind, text, metadata_json, embedding, model, dims, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    repo = excluded.repo,
                    kind = excluded.kind,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(&record.metadata.repo)
            .bind(record.metadata.kind.as_str())
            .bind(&record.text)
            .bind(metadata_json)
            .bind(vec_to_blob(&record.embedding))
            .bind(&record.model)
            .bind(record.embedding.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, repo: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT id, text, metadata_json, embedding
            FROM vectors
            WHERE collection = ? AND repo = ?
            "#,
        )
        .bind(&self.collection)
        .bind(repo)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            scored.push(ScoredDocument {
                id: row.get("id"),
                text: row.get("text"),
                metadata: serde_json::from_str(&metadata_json)?,
                score: cosine_similarity(vector, &blob_to_vec(&blob)),
            });
        }

        Ok(rank(scored, k))
    }

    async fn count(&self, repo: &str) -> Result<usize> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE collection = ? AND repo = ?")
                .bind(&self.collection)
                .bind(repo)
                .fetch_one(&self.pool)
                .await?;
        Ok(n as usize)
    }
}

// ============ Index adapter ============

/// Embeds documents and queries on behalf of the pipeline.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Configured embedder over the on-disk SQLite collection.
    pub async fn open(embedding: &EmbeddingConfig, index: &IndexConfig) -> anyhow::Result<Self> {
        let embedder = create_embedder(embedding)?;
        let store = Arc::new(SqliteVectorStore::open(index).await?);
        Ok(Self::new(embedder, store))
    }

    /// Embed `texts` in one batch and upsert them under `ids`.
    ///
    /// Empty `ids` is a no-op and never reaches the embedder, whatever the
    /// other two sequences hold. Returns the
    /// number of documents written.
    pub async fn upsert(
        &self,
        ids: &[String],
        texts: &[String],
        metadatas: &[DocumentMetadata],
    ) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        if ids.len() != texts.len() || ids.len() != metadatas.len() {
            return Err(InsightsError::ShapeMismatch {
                ids: ids.len(),
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }

        let vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )
            .into());
        }

        let model = self.embedder.model_name().to_string();
        let records: Vec<VectorRecord> = ids
            .iter()
            .zip(texts)
            .zip(metadatas)
            .zip(vectors)
            .map(|(((id, text), metadata), embedding)| VectorRecord {
                id: id.clone(),
                text: text.clone(),
                metadata: metadata.clone(),
                embedding,
                model: model.clone(),
            })
            .collect();

        self.store.upsert(&records).await?;
        debug!(count = records.len(), model = %model, "upserted documents");
        Ok(records.len())
    }

    pub async fn upsert_batch(&self, batch: &DocumentBatch) -> Result<usize> {
        self.upsert(&batch.ids, &batch.texts, &batch.metadatas).await
    }

    /// Up to `k` documents of `repo_full_name` most similar to `query_text`.
    pub async fn query_similar(
        &self,
        repo_full_name: &str,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let vector = embed_query(self.embedder.as_ref(), query_text).await?;
        self.store.query(repo_full_name, &vector, k).await
    }
}
