//! Job error types.

use crate::job::{JobId, JobStatus};
use reel_core::ReelError;
use thiserror::Error;

/// Result type for scheduler operations.
pub type JobResult<T> = Result<T, JobError>;

/// Scheduler errors.
///
/// Every variant is local to the request that produced it; none of them
/// leaves the scheduler state modified.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job type is not part of the enumeration or has no configuration.
    #[error("Invalid job type: {0}")]
    InvalidJobType(String),

    /// Job not found.
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Worker not found.
    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    /// The requested action is not allowed from the job's current status.
    #[error("Invalid transition for job {job_id}: cannot {action} a job that is {from}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        action: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The scheduler actor is no longer accepting commands.
    #[error("Scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
}

impl JobError {
    /// Creates an invalid transition error.
    pub fn invalid_transition(job_id: &JobId, from: JobStatus, action: &'static str) -> Self {
        JobError::InvalidTransition {
            job_id: job_id.clone(),
            from,
            action,
        }
    }
}

impl From<JobError> for ReelError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::JobNotFound(id) => ReelError::not_found("Job", id),
            JobError::WorkerNotFound(id) => ReelError::not_found("Worker", id),
            JobError::InvalidJobType(_) => ReelError::Validation(err.to_string()),
            JobError::InvalidTransition { .. } => ReelError::Conflict(err.to_string()),
            JobError::Configuration(msg) => ReelError::Configuration(msg),
            JobError::SchedulerUnavailable(msg) => ReelError::Unavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_transition() {
        let id = JobId::from("job-xyz");
        let err = JobError::invalid_transition(&id, JobStatus::Completed, "complete");
        let msg = err.to_string();
        assert!(msg.contains("job-xyz"));
        assert!(msg.contains("completed"));
        assert!(msg.contains("complete"));
    }

    #[test]
    fn test_into_reel_error() {
        let err: ReelError = JobError::WorkerNotFound("gpu-1".into()).into();
        assert_eq!(err.error_code(), "NOT_FOUND");

        let err: ReelError = JobError::InvalidJobType("karaoke".into()).into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let id = JobId::new();
        let err: ReelError =
            JobError::invalid_transition(&id, JobStatus::Cancelled, "fail").into();
        assert_eq!(err.error_code(), "CONFLICT");

        let err: ReelError = JobError::SchedulerUnavailable("stopped".into()).into();
        assert_eq!(err.error_code(), "SERVICE_UNAVAILABLE");
    }
}
