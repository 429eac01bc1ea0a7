//! Reference-set ingestion: embeds the ground-truth documents and replaces
//! the whole vector collection with them. Safe to re-run; every run
//! recreates the collection from scratch.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::config::Config;
use api::embedder::{Embedder, HttpEmbedder};
use api::models::reference::{DocType, ReferenceDocument};
use api::vector_index::{QdrantIndex, VectorIndex};

const JOB_DESCRIPTION: &str = "\
Position: Backend Developer.
Required Skills: Node.js, Express, Python, Django, SQL (PostgreSQL), NoSQL (MongoDB, Redis), Docker, CI/CD.
Experience: 3-5 years in backend development.
Responsibilities: Design and implement scalable APIs, manage databases, write clean and testable code, collaborate with frontend teams.";

const CASE_STUDY_BRIEF: &str = "\
Task: Build a backend service for a simple URL shortener.
Requirements:
1. An endpoint to accept a long URL and return a short code.
2. An endpoint to redirect a short code to the original long URL.
3. Must handle high traffic and potential invalid inputs gracefully.
4. The solution should be containerized using Docker.";

const CV_RUBRIC: &str = "\
CV Evaluation Rubric:
- Technical Skills Match (40%): Compare candidate's skills with required skills (Node.js, Python, SQL, etc.).
- Experience Level (25%): Check if years of experience match the 3-5 year requirement.
- Relevant Achievements (20%): Look for quantifiable achievements like \"improved API response time by 30%\".
- Cultural Fit (15%): Assess clarity and professionalism in descriptions.";

const PROJECT_RUBRIC: &str = "\
Project Report Evaluation Rubric:
- Correctness (30%): Does the solution meet all functional requirements of the URL shortener brief?
- Code Quality (25%): Is the code clean, modular, and well-structured?
- Resilience (20%): How does the system handle errors, edge cases, and high loads?
- Documentation (15%): Is the setup and API usage clearly documented?
- Creativity (10%): Are there any innovative solutions or extra features?";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Ingesting reference set into collection '{}'",
        config.qdrant_collection
    );

    let embedder = HttpEmbedder::new(
        config.embeddings_url.clone(),
        config.embeddings_model.clone(),
        config.embedding_dim,
    )?;
    let index = QdrantIndex::new(
        config.qdrant_url.clone(),
        config.qdrant_collection.clone(),
        config.embedding_dim,
    )?;

    let sources = [
        (DocType::JobDescription, JOB_DESCRIPTION),
        (DocType::CaseStudyBrief, CASE_STUDY_BRIEF),
        (DocType::ScoringRubric, CV_RUBRIC),
        (DocType::ScoringRubric, PROJECT_RUBRIC),
    ];

    let mut docs = Vec::with_capacity(sources.len());
    for (doc_type, content) in sources {
        info!("Embedding {doc_type} document ({} chars)", content.len());
        let embedding = embedder
            .embed(content)
            .await
            .with_context(|| format!("failed to embed {doc_type} document"))?;
        docs.push(ReferenceDocument {
            content: content.to_string(),
            doc_type,
            embedding,
        });
    }

    let ingested = index
        .recreate(&docs)
        .await
        .context("failed to recreate reference collection")?;

    let count = index
        .count()
        .await
        .context("failed to verify collection count")?;
    anyhow::ensure!(
        count == ingested,
        "collection reports {count} documents after ingesting {ingested}"
    );

    info!("Ingestion complete: collection now contains {count} documents");
    Ok(())
}
