//! Per-job-type settings and the GPU instance catalog.

use crate::job::JobType;
use crate::queue::Priority;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Settings applied to every job of one type at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTypeConfig {
    /// Priority used when the submission does not name one.
    pub priority: Priority,
    /// Advisory execution timeout forwarded to the worker.
    pub timeout_secs: u64,
    /// Retry ceiling used when the submission does not override it.
    pub max_retries: u32,
    /// GPU memory a worker needs to run this job type.
    pub required_gpu_memory_gb: u32,
}

/// Job-type configuration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobTypeTable(HashMap<JobType, JobTypeConfig>);

impl JobTypeTable {
    /// Creates a table from explicit entries.
    pub fn new(entries: impl IntoIterator<Item = (JobType, JobTypeConfig)>) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Looks up the settings for a job type.
    pub fn get(&self, job_type: JobType) -> Option<&JobTypeConfig> {
        self.0.get(&job_type)
    }

    /// Job types that have no entry.
    pub fn missing(&self) -> Vec<JobType> {
        JobType::ALL
            .into_iter()
            .filter(|t| !self.0.contains_key(t))
            .collect()
    }

    /// Iterates over configured job types.
    pub fn iter(&self) -> impl Iterator<Item = (&JobType, &JobTypeConfig)> {
        self.0.iter()
    }
}

impl Default for JobTypeTable {
    fn default() -> Self {
        let entry = |priority, timeout_secs, max_retries, required_gpu_memory_gb| JobTypeConfig {
            priority,
            timeout_secs,
            max_retries,
            required_gpu_memory_gb,
        };

        Self::new([
            (JobType::VideoGeneration, entry(Priority::High, 1800, 3, 24)),
            (JobType::VoiceSynthesis, entry(Priority::Medium, 300, 3, 8)),
            (JobType::LipsyncAnimation, entry(Priority::High, 900, 2, 16)),
            (JobType::MusicGeneration, entry(Priority::Medium, 600, 3, 16)),
            (JobType::PodcastVideo, entry(Priority::Medium, 2400, 2, 24)),
            (JobType::SubtitleGeneration, entry(Priority::Low, 300, 3, 8)),
        ])
    }
}

/// A hardware class the fleet manager can provision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInstanceClass {
    /// Provider instance name, e.g. `g5.xlarge`.
    pub name: String,
    pub gpu_model: String,
    pub gpu_memory_gb: u32,
    pub hourly_cost_usd: f64,
}

/// Available GPU instance classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GpuCatalog(Vec<GpuInstanceClass>);

impl GpuCatalog {
    /// Creates a catalog from explicit classes.
    pub fn new(classes: Vec<GpuInstanceClass>) -> Self {
        Self(classes)
    }

    /// Cheapest class with at least `required_gpu_memory_gb` of GPU memory.
    pub fn recommend(&self, required_gpu_memory_gb: u32) -> Option<&GpuInstanceClass> {
        self.0
            .iter()
            .filter(|class| class.gpu_memory_gb >= required_gpu_memory_gb)
            .min_by(|a, b| a.hourly_cost_usd.total_cmp(&b.hourly_cost_usd))
    }

    /// Recommended class for a job type, via its configured memory requirement.
    pub fn recommend_for(
        &self,
        table: &JobTypeTable,
        job_type: JobType,
    ) -> Option<&GpuInstanceClass> {
        table
            .get(job_type)
            .and_then(|config| self.recommend(config.required_gpu_memory_gb))
    }

    /// All classes.
    pub fn classes(&self) -> &[GpuInstanceClass] {
        &self.0
    }

    /// Returns true if the catalog lists no classes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for GpuCatalog {
    fn default() -> Self {
        let class = |name: &str, gpu_model: &str, gpu_memory_gb, hourly_cost_usd| GpuInstanceClass {
            name: name.to_string(),
            gpu_model: gpu_model.to_string(),
            gpu_memory_gb,
            hourly_cost_usd,
        };

        Self::new(vec![
            class("g4dn.xlarge", "T4", 16, 0.526),
            class("g5.xlarge", "A10G", 24, 1.006),
            class("g6e.xlarge", "L40S", 48, 1.861),
            class("p4d.24xlarge", "A100", 320, 32.773),
        ])
    }
}
