//! Vector index boundary — bulk replace-all ingestion of the reference set
//! and cosine similarity search over it.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::reference::{DocType, ReferenceDocument, ScoredDocument};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    BadResponse(String),
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replaces the whole reference set. Idempotent: each run recreates the
    /// collection from scratch. Returns the number of documents ingested.
    async fn recreate(&self, docs: &[ReferenceDocument]) -> Result<usize, IndexError>;

    /// Top-k documents by descending cosine similarity to `vector`, ties
    /// broken by insertion order. An empty index yields an empty Vec, not an
    /// error.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>, IndexError>;

    /// Number of documents currently in the index.
    async fn count(&self) -> Result<usize, IndexError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Qdrant REST implementation
// ────────────────────────────────────────────────────────────────────────────

/// Qdrant-backed index over its REST API. The collection name is fixed by
/// configuration.
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dimension: usize,
}

impl QdrantIndex {
    pub fn new(base_url: String, collection: String, dimension: usize) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection,
            dimension,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn check(response: reqwest::Response) -> Result<serde_json::Value, IndexError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn recreate(&self, docs: &[ReferenceDocument]) -> Result<usize, IndexError> {
        // Delete-then-create; a 404 on delete just means a first run.
        let delete = self.client.delete(self.collection_url()).send().await?;
        if !delete.status().is_success() && delete.status().as_u16() != 404 {
            let status = delete.status().as_u16();
            let body = delete.text().await.unwrap_or_default();
            return Err(IndexError::Api {
                status,
                message: body,
            });
        }

        let create = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": self.dimension, "distance": "Cosine" }
            }))
            .send()
            .await?;
        Self::check(create).await?;

        let points: Vec<serde_json::Value> = docs
            .iter()
            .map(|doc| {
                json!({
                    "id": Uuid::new_v4(),
                    "vector": doc.embedding,
                    "payload": { "content": doc.content, "type": doc.doc_type }
                })
            })
            .collect();

        let upsert = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        Self::check(upsert).await?;

        info!(
            "Recreated collection '{}' with {} documents",
            self.collection,
            docs.len()
        );
        Ok(docs.len())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>, IndexError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": vector,
                "limit": k,
                "with_payload": true
            }))
            .send()
            .await?;
        let body = Self::check(response).await?;

        let hits = body
            .get("result")
            .and_then(|r| r.as_array())
            .ok_or_else(|| IndexError::BadResponse("missing result array".to_string()))?;

        hits.iter()
            .map(|hit| {
                let score = hit
                    .get("score")
                    .and_then(|s| s.as_f64())
                    .ok_or_else(|| IndexError::BadResponse("hit missing score".to_string()))?
                    as f32;
                let payload = hit
                    .get("payload")
                    .ok_or_else(|| IndexError::BadResponse("hit missing payload".to_string()))?;
                let content = payload
                    .get("content")
                    .and_then(|c| c.as_str())
                    .ok_or_else(|| IndexError::BadResponse("payload missing content".to_string()))?
                    .to_string();
                let doc_type: DocType = payload
                    .get("type")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| IndexError::BadResponse(format!("bad payload type: {e}")))?
                    .ok_or_else(|| IndexError::BadResponse("payload missing type".to_string()))?;
                Ok(ScoredDocument {
                    content,
                    doc_type,
                    score,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<usize, IndexError> {
        let response = self.client.get(self.collection_url()).send().await?;
        let body = Self::check(response).await?;
        body.get("result")
            .and_then(|r| r.get("points_count"))
            .and_then(|c| c.as_u64())
            .map(|c| c as usize)
            .ok_or_else(|| IndexError::BadResponse("missing points_count".to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory implementation
// ────────────────────────────────────────────────────────────────────────────

/// In-process cosine-similarity index. Used by tests and as a reference for
/// the search contract (ordering, tie-breaking, k-bound).
#[derive(Default)]
pub struct InMemoryIndex {
    docs: RwLock<Vec<ReferenceDocument>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn recreate(&self, docs: &[ReferenceDocument]) -> Result<usize, IndexError> {
        let mut guard = self.docs.write().await;
        *guard = docs.to_vec();
        Ok(guard.len())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>, IndexError> {
        let docs = self.docs.read().await;
        let mut scored: Vec<ScoredDocument> = docs
            .iter()
            .map(|doc| ScoredDocument {
                content: doc.content.clone(),
                doc_type: doc.doc_type,
                score: cosine_similarity(vector, &doc.embedding),
            })
            .collect();
        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.docs.read().await.len())
    }
}
