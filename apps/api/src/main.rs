use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::config::Config;
use api::documents::FsDocumentStore;
use api::embedder::HttpEmbedder;
use api::evaluation::extract::PdfExtractor;
use api::evaluation::pipeline::EvaluationPipeline;
use api::job_store::InMemoryJobStore;
use api::llm_client::{self, GeminiClient};
use api::queue::consumer::spawn_workers;
use api::queue::RedisTransport;
use api::routes::build_router;
use api::state::AppState;
use api::vector_index::QdrantIndex;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting candidate screening API v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Upload directory for candidate documents
    let uploads = Arc::new(FsDocumentStore::new(&config.upload_dir));
    uploads
        .ensure_root()
        .await
        .map_err(|e| anyhow::anyhow!("cannot prepare upload dir: {e}"))?;
    info!("Upload directory ready at {}", config.upload_dir);

    // Queue transport over Redis; reclaim anything a previous process left
    // in flight before the workers start.
    let redis = redis::Client::open(config.redis_url.clone())?;
    let transport = Arc::new(RedisTransport::new(redis, "evaluation-queue"));
    transport.recover().await?;
    info!("Redis queue transport initialized");

    // External model providers
    let embedder = Arc::new(HttpEmbedder::new(
        config.embeddings_url.clone(),
        config.embeddings_model.clone(),
        config.embedding_dim,
    )?);
    let index = Arc::new(QdrantIndex::new(
        config.qdrant_url.clone(),
        config.qdrant_collection.clone(),
        config.embedding_dim,
    )?);
    let llm = Arc::new(GeminiClient::new(config.gemini_api_key.clone())?);
    info!("Provider clients initialized (model: {})", llm_client::MODEL);

    // Job store and pipeline
    let jobs = Arc::new(InMemoryJobStore::new());
    let pipeline = Arc::new(EvaluationPipeline::new(
        Arc::new(PdfExtractor::new(uploads.clone())),
        embedder,
        index,
        llm,
        jobs.clone(),
    ));

    // Queue consumer worker slots
    let _workers = spawn_workers(config.worker_slots, transport.clone(), pipeline);

    // Build app state and router
    let state = AppState {
        jobs,
        uploads,
        transport,
        config: config.clone(),
    };
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
