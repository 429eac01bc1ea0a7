//! The asynchronous evaluation feature: extraction, retrieval context,
//! prompt assembly, generation, and the orchestrator that sequences them.

pub mod evaluator;
pub mod extract;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
