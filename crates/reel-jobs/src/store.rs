//! Authoritative store of job records.

use crate::job::{Job, JobId, JobStatus};
use std::collections::HashMap;

/// In-memory job records.
///
/// Records are never removed; terminal jobs stay queryable.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: HashMap<JobId, Job>,
    /// Submission order, oldest first.
    order: Vec<JobId>,
}

impl JobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new record.
    pub fn insert(&mut self, job: Job) {
        if !self.jobs.contains_key(&job.id) {
            self.order.push(job.id.clone());
        }
        self.jobs.insert(job.id.clone(), job);
    }

    pub fn get(&self, job_id: &JobId) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    pub fn get_mut(&mut self, job_id: &JobId) -> Option<&mut Job> {
        self.jobs.get_mut(job_id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if no job was ever submitted.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs matching the filters, newest first.
    pub fn list(
        &self,
        user_id: Option<&str>,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Vec<&Job> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.jobs.get(id))
            .filter(|job| user_id.map_or(true, |user| job.user_id == user))
            .filter(|job| status.map_or(true, |s| job.status == s))
            .take(limit)
            .collect()
    }

    /// Number of jobs currently in `status`.
    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|job| job.status == status).count()
    }
}
