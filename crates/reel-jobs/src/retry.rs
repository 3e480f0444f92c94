//! Retry policy for failed jobs.

use crate::job::Job;
use serde::{Deserialize, Serialize};

/// Outcome of a failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryDecision {
    /// Put the job back at the tail of its lane as attempt `attempt`.
    Requeue { attempt: u32 },
    /// The worker asked for a retry but the job has none left.
    Exhausted,
    /// The worker reported a permanent failure.
    NotRequested,
}

/// Decides whether a failed job is retried.
///
/// Retries are immediate; the ceiling is the job's own `max_retries`, which
/// never changes after submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    /// Decide what happens to `job` after a failure.
    pub fn decide(&self, job: &Job, should_retry: bool) -> RetryDecision {
        if !should_retry {
            RetryDecision::NotRequested
        } else if job.can_retry() {
            RetryDecision::Requeue {
                attempt: job.retry_count + 1,
            }
        } else {
            RetryDecision::Exhausted
        }
    }
}
