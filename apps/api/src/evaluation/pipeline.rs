//! Pipeline Orchestrator — drives a single job through the five evaluation
//! stages and records the terminal outcome in the job store.
//!
//! Flow: extract cv/report → embed CV prefix → retrieve top-K context →
//!       build prompt → generate + parse structured result.
//!
//! The first stage failure short-circuits the run; the job transitions to
//! `failed` with the stage identity attached and no partial result is ever
//! persisted. A run has no external side effects beyond the job store
//! write, so a redelivered descriptor can safely re-run from stage 1.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::evaluation::evaluator::evaluate;
use crate::evaluation::extract::DocumentExtractor;
use crate::evaluation::prompts::build_evaluation_prompt;
use crate::embedder::Embedder;
use crate::job_store::{JobStore, StoreError};
use crate::llm_client::GenerativeModel;
use crate::models::evaluation::EvaluationResult;
use crate::models::job::{JobDescriptor, JobError, Stage};
use crate::vector_index::VectorIndex;

/// Number of reference documents retrieved per job.
pub const TOP_K: usize = 4;
/// Only this many leading characters of the CV feed the embedding call, so a
/// pathologically large CV cannot skew or break it.
pub const CV_EMBED_PREFIX_CHARS: usize = 500;

/// Stage-local failure taxonomy.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("malformed evaluation: {reason}")]
    MalformedEvaluation { reason: String, raw_text: String },
}

impl StageError {
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::NotFound(_) => "NotFound",
            StageError::Parse(_) => "ParseError",
            StageError::Embedding(_) => "EmbeddingError",
            StageError::Retrieval(_) => "RetrievalError",
            StageError::Generation(_) => "GenerationError",
            StageError::MalformedEvaluation { .. } => "MalformedEvaluationError",
        }
    }
}

/// A stage failure tagged with the stage that produced it.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub error: StageError,
}

impl PipelineError {
    fn new(stage: Stage, error: StageError) -> Self {
        Self { stage, error }
    }

    pub fn to_job_error(&self) -> JobError {
        JobError {
            stage: Some(self.stage),
            kind: self.error.kind().to_string(),
            message: self.error.to_string(),
        }
    }
}

/// Orchestrates one job at a time; holds no state of its own beyond the
/// collaborator handles, so any number of worker slots can share it.
pub struct EvaluationPipeline {
    extractor: Arc<dyn DocumentExtractor>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn GenerativeModel>,
    store: Arc<dyn JobStore>,
}

impl EvaluationPipeline {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn GenerativeModel>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            llm,
            store,
        }
    }

    /// Runs the full pipeline for one descriptor and records the terminal
    /// state. Never panics the worker: every failure lands in the store.
    pub async fn run(&self, descriptor: &JobDescriptor) {
        let job_id = descriptor.job_id;

        match self.store.mark_processing(job_id).await {
            Ok(()) => {}
            Err(StoreError::TransitionRejected { from, .. }) => {
                // Redelivery of a job that already reached a terminal state.
                warn!("Job {job_id} redelivered while {from:?}; skipping");
                return;
            }
            Err(e) => {
                warn!("Job {job_id} could not enter processing: {e}");
                return;
            }
        }

        info!("Processing job {job_id} for: {}", descriptor.job_title);

        match self.execute(descriptor).await {
            Ok(result) => {
                if let Err(e) = self.store.complete(job_id, result).await {
                    error!("Job {job_id} completed but could not be recorded: {e}");
                } else {
                    info!("Job {job_id} completed successfully");
                }
            }
            Err(failure) => {
                error!("Job {job_id} failed: {failure}");
                if let Err(e) = self.store.fail(job_id, failure.to_job_error()).await {
                    error!("Job {job_id} failure could not be recorded: {e}");
                }
            }
        }
    }

    async fn execute(&self, descriptor: &JobDescriptor) -> Result<EvaluationResult, PipelineError> {
        // Stage 1: extraction. Both documents are required before stage 2,
        // and the two extractions are independent.
        let (cv_text, report_text) = tokio::try_join!(
            self.extract_stage(&descriptor.cv_ref),
            self.extract_stage(&descriptor.report_ref),
        )?;

        // Stage 2: embed a bounded prefix of the CV text.
        let query_vector = self
            .embedder
            .embed(embedding_prefix(&cv_text))
            .await
            .map_err(|e| PipelineError::new(Stage::Embed, StageError::Embedding(e.to_string())))?;

        // Stage 3: retrieve reference context. An empty index is a valid
        // degenerate case, not a failure.
        let context = self
            .index
            .search(&query_vector, TOP_K)
            .await
            .map_err(|e| PipelineError::new(Stage::Retrieve, StageError::Retrieval(e.to_string())))?;
        if context.is_empty() {
            warn!(
                "Job {}: reference index returned no context; evaluating without it",
                descriptor.job_id
            );
        } else {
            info!(
                "Job {}: retrieved {} reference documents",
                descriptor.job_id,
                context.len()
            );
        }

        // Stage 4: prompt assembly (pure).
        let prompt = build_evaluation_prompt(&context, &cv_text, &report_text);

        // Stage 5: generation + structured parsing.
        evaluate(self.llm.as_ref(), &prompt)
            .await
            .map_err(|e| PipelineError::new(Stage::Generate, e))
    }

    async fn extract_stage(&self, doc_ref: &str) -> Result<String, PipelineError> {
        self.extractor
            .extract(doc_ref)
            .await
            .map_err(|e| PipelineError::new(Stage::Extract, e))
    }
}

/// First `CV_EMBED_PREFIX_CHARS` characters of the text, char-boundary safe.
fn embedding_prefix(text: &str) -> &str {
    match text.char_indices().nth(CV_EMBED_PREFIX_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::embedder::EmbedError;
    use crate::job_store::InMemoryJobStore;
    use crate::llm_client::LlmError;
    use crate::models::job::{Job, JobInput, JobStatus};
    use crate::models::reference::{DocType, ReferenceDocument};
    use crate::vector_index::InMemoryIndex;

    struct MapExtractor(HashMap<String, String>);

    #[async_trait]
    impl DocumentExtractor for MapExtractor {
        async fn extract(&self, doc_ref: &str) -> Result<String, StageError> {
            self.0
                .get(doc_ref)
                .cloned()
                .ok_or_else(|| StageError::NotFound(format!("document {doc_ref}")))
        }
    }

    struct FixedEmbedder {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    impl FixedEmbedder {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn dimension(&self) -> usize {
            self.vector.len()
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }
    }

    struct ScriptedModel {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    const MODEL_JSON: &str = r#"{
        "cv_match_rate": 0.82,
        "cv_feedback": "Solid backend experience.",
        "project_score": 4.5,
        "project_feedback": "Meets the brief.",
        "overall_summary": "Recommended for interview."
    }"#;

    fn reference_docs() -> Vec<ReferenceDocument> {
        vec![
            ReferenceDocument {
                content: "Position: Backend Developer.".to_string(),
                doc_type: DocType::JobDescription,
                embedding: vec![1.0, 0.0],
            },
            ReferenceDocument {
                content: "Task: build a URL shortener.".to_string(),
                doc_type: DocType::CaseStudyBrief,
                embedding: vec![0.9, 0.1],
            },
            ReferenceDocument {
                content: "CV rubric.".to_string(),
                doc_type: DocType::ScoringRubric,
                embedding: vec![0.8, 0.2],
            },
            ReferenceDocument {
                content: "Project rubric.".to_string(),
                doc_type: DocType::ScoringRubric,
                embedding: vec![0.7, 0.3],
            },
        ]
    }

    struct Fixture {
        pipeline: EvaluationPipeline,
        store: Arc<InMemoryJobStore>,
        embedder: Arc<FixedEmbedder>,
        model: Arc<ScriptedModel>,
        descriptor: JobDescriptor,
    }

    async fn fixture(model_response: &str, index_docs: &[ReferenceDocument]) -> Fixture {
        let mut files = HashMap::new();
        files.insert("cv-1.pdf".to_string(), "Rust and SQL experience.".to_string());
        files.insert("report-1.pdf".to_string(), "Built the shortener.".to_string());

        let store = Arc::new(InMemoryJobStore::new());
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0]));
        let model = Arc::new(ScriptedModel::new(model_response));
        let index = Arc::new(InMemoryIndex::new());
        index.recreate(index_docs).await.unwrap();

        let job_id = Uuid::new_v4();
        let input = JobInput {
            job_title: "Backend Developer".to_string(),
            cv_ref: "cv-1.pdf".to_string(),
            report_ref: "report-1.pdf".to_string(),
        };
        store.create(Job::queued(job_id, input.clone())).await.unwrap();

        let pipeline = EvaluationPipeline::new(
            Arc::new(MapExtractor(files)),
            embedder.clone(),
            index,
            model.clone(),
            store.clone(),
        );

        Fixture {
            pipeline,
            store,
            embedder,
            model,
            descriptor: JobDescriptor::from_input(job_id, &input),
        }
    }

    #[tokio::test]
    async fn test_scenario_a_happy_path_completes() {
        let f = fixture(MODEL_JSON, &reference_docs()).await;
        f.pipeline.run(&f.descriptor).await;

        let job = f.store.get(f.descriptor.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());

        let result = job.result.unwrap();
        assert!((0.0..=1.0).contains(&result.cv_match_rate));
        assert!((1.0..=5.0).contains(&result.project_score));
        assert!(!result.cv_feedback.is_empty());
        assert!(!result.project_feedback.is_empty());
        assert!(!result.overall_summary.is_empty());

        // All four reference documents reached the prompt.
        let prompt = f.model.last_prompt();
        assert!(prompt.contains("Position: Backend Developer."));
        assert!(prompt.contains("Project rubric."));
    }

    #[tokio::test]
    async fn test_scenario_b_missing_cv_fails_before_embedding() {
        let f = fixture(MODEL_JSON, &reference_docs()).await;
        let mut descriptor = f.descriptor.clone();
        descriptor.cv_ref = "cv-missing.pdf".to_string();

        f.pipeline.run(&descriptor).await;

        let job = f.store.get(descriptor.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());

        let error = job.error.unwrap();
        assert_eq!(error.kind, "NotFound");
        assert_eq!(error.stage, Some(Stage::Extract));
        assert_eq!(
            f.embedder.calls.load(Ordering::SeqCst),
            0,
            "embedding stage must never run"
        );
    }

    #[tokio::test]
    async fn test_scenario_c_fenced_model_output_completes() {
        let fenced = format!("```json\n{MODEL_JSON}\n```");
        let f = fixture(&fenced, &reference_docs()).await;
        f.pipeline.run(&f.descriptor).await;

        let job = f.store.get(f.descriptor.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_scenario_d_empty_index_still_completes() {
        let f = fixture(MODEL_JSON, &[]).await;
        f.pipeline.run(&f.descriptor).await;

        let job = f.store.get(f.descriptor.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        // Context section is present but empty, with no fabricated documents.
        let prompt = f.model.last_prompt();
        assert!(prompt.contains("--- CONTEXT DOCUMENTS ---\n\n--- CANDIDATE CV ---"));
        assert!(!prompt.contains("--- DOCUMENT:"));
    }

    #[tokio::test]
    async fn test_malformed_model_output_fails_at_generate_stage() {
        let f = fixture("not json at all", &reference_docs()).await;
        f.pipeline.run(&f.descriptor).await;

        let job = f.store.get(f.descriptor.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);

        let error = job.error.unwrap();
        assert_eq!(error.kind, "MalformedEvaluationError");
        assert_eq!(error.stage, Some(Stage::Generate));
    }

    #[tokio::test]
    async fn test_redelivery_after_completion_is_skipped() {
        let f = fixture(MODEL_JSON, &reference_docs()).await;
        f.pipeline.run(&f.descriptor).await;
        assert_eq!(f.model.prompts.lock().unwrap().len(), 1);

        // Transport redelivers the same descriptor after completion.
        f.pipeline.run(&f.descriptor).await;
        assert_eq!(
            f.model.prompts.lock().unwrap().len(),
            1,
            "terminal job must not be re-evaluated"
        );
        let job = f.store.get(f.descriptor.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn test_embedding_prefix_bounds_input() {
        let long = "x".repeat(CV_EMBED_PREFIX_CHARS * 2);
        assert_eq!(embedding_prefix(&long).chars().count(), CV_EMBED_PREFIX_CHARS);

        let short = "short cv";
        assert_eq!(embedding_prefix(short), short);
    }

    #[test]
    fn test_embedding_prefix_respects_char_boundaries() {
        let text = "é".repeat(CV_EMBED_PREFIX_CHARS + 10);
        let prefix = embedding_prefix(&text);
        assert_eq!(prefix.chars().count(), CV_EMBED_PREFIX_CHARS);
    }
}
