use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub qdrant_url: String,
    /// Reference collection. Fixed by configuration, never chosen per request.
    pub qdrant_collection: String,
    pub gemini_api_key: String,
    /// OpenAI-compatible embeddings endpoint.
    pub embeddings_url: String,
    pub embeddings_model: String,
    /// Output dimensionality D of the embedding model. All vectors in one
    /// deployment share this.
    pub embedding_dim: usize,
    pub upload_dir: String,
    /// Number of concurrent queue-consumer slots.
    pub worker_slots: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            redis_url: require_env("REDIS_URL")?,
            qdrant_url: require_env("QDRANT_URL")?,
            qdrant_collection: std::env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "candidate_screening_references".to_string()),
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            embeddings_url: require_env("EMBEDDINGS_URL")?,
            embeddings_model: std::env::var("EMBEDDINGS_MODEL")
                .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string()),
            embedding_dim: std::env::var("EMBEDDING_DIM")
                .unwrap_or_else(|_| "384".to_string())
                .parse::<usize>()
                .context("EMBEDDING_DIM must be a positive integer")?,
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            worker_slots: std::env::var("WORKER_SLOTS")
                .unwrap_or_else(|_| "2".to_string())
                .parse::<usize>()
                .context("WORKER_SLOTS must be a positive integer")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
