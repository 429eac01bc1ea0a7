//! Job Store — owns every job record for its full lifecycle.
//!
//! The store is the only shared resource the worker slots mutate. Updates
//! replace the whole record under the write lock, so a concurrent reader
//! never observes a half-written job. Out-of-order status transitions are
//! rejected: a stale `processing` write can never land on a terminal job.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::evaluation::EvaluationResult;
use crate::models::job::{Job, JobError, JobStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} already exists")]
    Conflict(Uuid),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id}: illegal transition {from:?} -> {to:?}")]
    TransitionRejected {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Key-value store of job records, abstracted so the in-memory map can be
/// swapped for a durable engine without touching pipeline logic.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Seeds a new `queued` job. Rejects an id that already exists —
    /// re-submission with a colliding id is a conflict, never a silent
    /// duplicate execution.
    async fn create(&self, job: Job) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Option<Job>;

    /// `queued → processing`. Re-entry while already `processing` is a no-op
    /// so a redelivered descriptor can safely re-run the pipeline.
    async fn mark_processing(&self, id: Uuid) -> Result<(), StoreError>;

    /// `processing → completed`, attaching the validated result.
    async fn complete(&self, id: Uuid, result: EvaluationResult) -> Result<(), StoreError>;

    /// `processing → failed`, attaching the failure description. Also
    /// accepted from `queued` so a job that could not be enqueued is never
    /// stuck pending forever.
    async fn fail(&self, id: Uuid, error: JobError) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition(
        &self,
        id: Uuid,
        to: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let current = jobs.get(&id).ok_or(StoreError::NotFound(id))?;

        if !current.status.can_transition_to(to) {
            return Err(StoreError::TransitionRejected {
                id,
                from: current.status,
                to,
            });
        }

        // Replace-on-write: mutate a clone, then swap the whole record in.
        let mut updated = current.clone();
        updated.status = to;
        apply(&mut updated);
        jobs.insert(id, updated);
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(job.id));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), StoreError> {
        {
            let jobs = self.jobs.read().await;
            if let Some(job) = jobs.get(&id) {
                if job.status == JobStatus::Processing {
                    return Ok(());
                }
            }
        }
        self.transition(id, JobStatus::Processing, |_| {}).await
    }

    async fn complete(&self, id: Uuid, result: EvaluationResult) -> Result<(), StoreError> {
        self.transition(id, JobStatus::Completed, |job| {
            job.result = Some(result);
            job.error = None;
        })
        .await
    }

    async fn fail(&self, id: Uuid, error: JobError) -> Result<(), StoreError> {
        let from_queued = {
            let jobs = self.jobs.read().await;
            matches!(jobs.get(&id).map(|j| j.status), Some(JobStatus::Queued))
        };
        if from_queued {
            // Enqueue failure path: move straight to failed.
            self.mark_processing(id).await?;
        }
        self.transition(id, JobStatus::Failed, |job| {
            job.error = Some(error);
            job.result = None;
        })
        .await
    }
}
