//! Read-only views returned by scheduler queries.

use crate::job::{Job, JobId, JobStatus, JobType};
use crate::queue::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default page size for job listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Snapshot of one job as seen by its submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub job_type: JobType,
    pub priority: Priority,
    pub status: JobStatus,
    pub progress: u8,
    pub user_id: String,
    pub worker_id: Option<String>,
    pub gpu_instance_class: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<Value>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            job_type: job.job_type,
            priority: job.priority,
            status: job.status,
            progress: job.progress,
            user_id: job.user_id.clone(),
            worker_id: job.worker_id.clone(),
            gpu_instance_class: job.gpu_instance_class.clone(),
            retry_count: job.retry_count,
            max_retries: job.max_retries,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error: job.error.clone(),
            result: job.result.clone(),
        }
    }
}

/// Filters for listing jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

impl Default for JobListQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            status: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl JobListQuery {
    /// Only jobs submitted by `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Only jobs currently in `status`.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Cap the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Aggregate queue and fleet figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total_jobs: usize,
    pub queued_by_priority: BTreeMap<Priority, usize>,
    pub total_workers: usize,
    /// Workers that are not offline.
    pub active_workers: usize,
    pub idle_workers: usize,
    pub busy_workers: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl QueueStats {
    /// Jobs waiting across all lanes.
    pub fn total_queued(&self) -> usize {
        self.queued_by_priority.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let query: JobListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, DEFAULT_LIST_LIMIT);
        assert!(query.user_id.is_none());

        let query = JobListQuery::for_user("u1")
            .with_status(JobStatus::Failed)
            .with_limit(5);
        assert_eq!(query.user_id.as_deref(), Some("u1"));
        assert_eq!(query.status, Some(JobStatus::Failed));
        assert_eq!(query.limit, 5);
    }

    #[test]
    fn test_queue_stats_serialization() {
        let mut stats = QueueStats::default();
        stats.queued_by_priority.insert(Priority::Critical, 2);
        stats.queued_by_priority.insert(Priority::Low, 1);

        assert_eq!(stats.total_queued(), 3);

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["queuedByPriority"]["critical"], 2);
        assert_eq!(value["busyWorkers"], 0);
    }
}
