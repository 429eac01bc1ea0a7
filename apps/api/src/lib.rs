//! Candidate screening service: evaluates a candidate's CV and project
//! report against a reference set (job description, case-study brief,
//! scoring rubrics) through an asynchronous retrieval-augmented pipeline.

pub mod config;
pub mod documents;
pub mod embedder;
pub mod errors;
pub mod evaluation;
pub mod job_store;
pub mod llm_client;
pub mod models;
pub mod queue;
pub mod routes;
pub mod state;
pub mod vector_index;
