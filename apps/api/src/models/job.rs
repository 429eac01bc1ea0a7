use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::evaluation::EvaluationResult;

/// Lifecycle state of an evaluation job.
///
/// Transitions are monotonic: `Queued → Processing → {Completed | Failed}`.
/// A job never re-enters an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self → next` is a legal lifecycle transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// One ordered step of the evaluation pipeline. Carried on failures so the
/// status API can attribute an error to the stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Embed,
    Retrieve,
    BuildPrompt,
    Generate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Embed => "embed",
            Stage::Retrieve => "retrieve",
            Stage::BuildPrompt => "build_prompt",
            Stage::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// Failure description recorded on a job. `kind` is the error taxonomy name
/// (e.g. "NotFound", "GenerationError"); `message` is the verbatim cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub kind: String,
    pub message: String,
}

/// References to the candidate documents a job evaluates. The bytes
/// themselves live in the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInput {
    pub job_title: String,
    pub cv_ref: String,
    pub report_ref: String,
}

/// The unit of work. Owned by the job store for its full lifecycle.
///
/// Invariant: `result` and `error` are mutually exclusive and both absent
/// while the status is non-terminal.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub input: JobInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<EvaluationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn queued(id: Uuid, input: JobInput) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            input,
            result: None,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// Queue payload handed to the consumer. Mirrors `JobInput` plus the id so a
/// delivery is self-contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: Uuid,
    pub job_title: String,
    pub cv_ref: String,
    pub report_ref: String,
}

impl JobDescriptor {
    pub fn from_input(job_id: Uuid, input: &JobInput) -> Self {
        Self {
            job_id,
            job_title: input.job_title.clone(),
            cv_ref: input.cv_ref.clone(),
            report_ref: input.report_ref.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_no_backwards_transitions() {
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_queued_job_has_no_outcome() {
        let job = Job::queued(
            Uuid::new_v4(),
            JobInput {
                job_title: "Backend Developer".to_string(),
                cv_ref: "cv-1.pdf".to_string(),
                report_ref: "report-1.pdf".to_string(),
            },
        );
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_descriptor_roundtrips_through_json() {
        let descriptor = JobDescriptor {
            job_id: Uuid::new_v4(),
            job_title: "Backend Developer".to_string(),
            cv_ref: "cv-1.pdf".to_string(),
            report_ref: "report-1.pdf".to_string(),
        };
        let json = serde_json::to_string(&descriptor).unwrap();
        let recovered: JobDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered.job_id, descriptor.job_id);
        assert_eq!(recovered.cv_ref, descriptor.cv_ref);
    }
}
