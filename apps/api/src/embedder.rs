//! Embedding model boundary — text in, fixed-dimension vector out.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("provider returned no embedding")]
    Empty,

    #[error("expected dimension {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Deterministic per model: the same text yields the same vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Output dimensionality D, fixed at configuration time.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint. Retries rate
/// limits and server errors with exponential backoff; validates that the
/// returned vector is non-empty and of the configured dimension before the
/// caller can proceed to retrieval.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, model: String, dimension: usize) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let request_body = EmbeddingsRequest {
            model: &self.model,
            input: [text],
        };

        let mut last_error: Option<EmbedError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&self.endpoint).json(&request_body).send().await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EmbedError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(EmbedError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EmbedError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let payload: EmbeddingsResponse = response.json().await?;
            let vector = payload
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or(EmbedError::Empty)?;

            if vector.is_empty() {
                return Err(EmbedError::Empty);
            }
            if vector.len() != self.dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.dimension,
                    got: vector.len(),
                });
            }
            return Ok(vector);
        }

        Err(last_error.unwrap_or(EmbedError::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parses_first_embedding() {
        let json = r#"{"data": [{"embedding": [0.1, 0.2, 0.3]}]}"#;
        let payload: EmbeddingsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(payload.data[0].embedding.len(), 3);
    }

    #[test]
    fn test_empty_response_has_no_data() {
        let payload: EmbeddingsResponse = serde_json::from_str("{}").unwrap();
        assert!(payload.data.is_empty());
    }
}
