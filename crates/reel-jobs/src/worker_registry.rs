//! Worker registry for tracking GPU worker nodes.
//!
//! Owns the worker records and the FIFO pool of idle workers the assignment
//! engine draws from. A worker ID is in the pool only while its status is
//! idle and it has no bound job.

use crate::error::{JobError, JobResult};
use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default heartbeat timeout.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);

/// Worker availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Offline,
}

impl WorkerStatus {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status report sent by a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusUpdate {
    pub worker_id: String,
    pub status: WorkerStatus,
    /// GPU utilization in percent, if the worker measured it.
    #[serde(default)]
    pub gpu_utilization: Option<f32>,
    #[serde(default)]
    pub memory_used_gb: Option<f32>,
}

impl WorkerStatusUpdate {
    /// Creates a report without utilization figures.
    pub fn new(worker_id: impl Into<String>, status: WorkerStatus) -> Self {
        Self {
            worker_id: worker_id.into(),
            status,
            gpu_utilization: None,
            memory_used_gb: None,
        }
    }

    /// Attach utilization figures.
    pub fn with_utilization(mut self, gpu_utilization: f32, memory_used_gb: f32) -> Self {
        self.gpu_utilization = Some(gpu_utilization);
        self.memory_used_gb = Some(memory_used_gb);
        self
    }
}

/// Information about a registered worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    /// Worker ID, chosen by the worker.
    pub id: String,
    pub gpu_instance_class: String,
    pub status: WorkerStatus,
    /// Job the worker is running.
    pub current_job: Option<JobId>,
    /// Total jobs completed by this worker.
    pub jobs_processed: u64,
    /// Total jobs failed on this worker.
    pub jobs_failed: u64,
    pub gpu_utilization: Option<f32>,
    pub memory_used_gb: Option<f32>,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(skip)]
    last_seen_at: Instant,
}

impl WorkerInfo {
    fn new(id: String, gpu_instance_class: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            gpu_instance_class,
            status: WorkerStatus::Idle,
            current_job: None,
            jobs_processed: 0,
            jobs_failed: 0,
            gpu_utilization: None,
            memory_used_gb: None,
            registered_at: now,
            last_seen: now,
            last_seen_at: Instant::now(),
        }
    }

    /// Check if the worker reported within `timeout` of `now`.
    pub fn is_alive_at(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen_at) < timeout
    }

    fn touch(&mut self) {
        self.last_seen = Utc::now();
        self.last_seen_at = Instant::now();
    }
}

/// Registry of GPU workers.
#[derive(Debug)]
pub struct WorkerRegistry {
    workers: HashMap<String, WorkerInfo>,
    /// Idle workers, longest idle first.
    idle_pool: VecDeque<String>,
    heartbeat_timeout: Duration,
}

impl WorkerRegistry {
    /// Create a new worker registry.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HEARTBEAT_TIMEOUT)
    }

    /// Create a new worker registry with custom heartbeat timeout.
    pub fn with_timeout(heartbeat_timeout: Duration) -> Self {
        Self {
            workers: HashMap::new(),
            idle_pool: VecDeque::new(),
            heartbeat_timeout,
        }
    }

    /// Register a worker, or refresh a known one.
    ///
    /// A new worker joins the pool idle. A known offline worker without a
    /// bound job comes back idle; any other known worker keeps its status.
    pub fn register(&mut self, worker_id: &str, gpu_instance_class: &str) -> &WorkerInfo {
        let returning = match self.workers.get_mut(worker_id) {
            Some(worker) => {
                worker.gpu_instance_class = gpu_instance_class.to_string();
                worker.touch();
                if worker.status == WorkerStatus::Offline && worker.current_job.is_none() {
                    worker.status = WorkerStatus::Idle;
                }
                info!(
                    worker_id = %worker_id,
                    gpu_instance_class = %gpu_instance_class,
                    status = %worker.status,
                    "Worker re-registered"
                );
                true
            }
            None => {
                self.workers.insert(
                    worker_id.to_string(),
                    WorkerInfo::new(worker_id.to_string(), gpu_instance_class.to_string()),
                );
                info!(
                    worker_id = %worker_id,
                    gpu_instance_class = %gpu_instance_class,
                    "Worker registered"
                );
                false
            }
        };

        if !returning || self.status(worker_id) == Some(WorkerStatus::Idle) {
            self.pool(worker_id);
        }

        &self.workers[worker_id]
    }

    /// Refresh `last_seen` and record utilization figures.
    pub fn touch(&mut self, update: &WorkerStatusUpdate) -> JobResult<()> {
        let worker = self.worker_mut(&update.worker_id)?;
        worker.touch();
        if update.gpu_utilization.is_some() {
            worker.gpu_utilization = update.gpu_utilization;
        }
        if update.memory_used_gb.is_some() {
            worker.memory_used_gb = update.memory_used_gb;
        }
        debug!(
            worker_id = %update.worker_id,
            status = %update.status,
            gpu_utilization = ?update.gpu_utilization,
            "Worker report received"
        );
        Ok(())
    }

    /// Refresh `last_seen` for a worker that reported on its bound job.
    ///
    /// Offline and unknown workers are left alone.
    pub fn touch_id(&mut self, worker_id: &str) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            if worker.status != WorkerStatus::Offline {
                worker.touch();
            }
        }
    }

    /// Mark a worker idle and return it to the pool.
    pub fn mark_idle(&mut self, worker_id: &str) -> JobResult<()> {
        let worker = self.worker_mut(worker_id)?;
        worker.status = WorkerStatus::Idle;
        worker.current_job = None;
        self.pool(worker_id);
        Ok(())
    }

    /// Mark a worker busy and take it out of the pool.
    pub fn mark_busy(&mut self, worker_id: &str) -> JobResult<()> {
        self.worker_mut(worker_id)?.status = WorkerStatus::Busy;
        self.unpool(worker_id);
        Ok(())
    }

    /// Mark a worker offline. Returns the job it was bound to, if any.
    pub fn mark_offline(&mut self, worker_id: &str) -> JobResult<Option<JobId>> {
        let worker = self.worker_mut(worker_id)?;
        let was = worker.status;
        worker.status = WorkerStatus::Offline;
        let job = worker.current_job.take();
        self.unpool(worker_id);

        if was != WorkerStatus::Offline {
            warn!(worker_id = %worker_id, bound_job = ?job.as_ref().map(JobId::as_str), "Worker offline");
        }
        Ok(job)
    }

    /// Take the longest-idle worker out of the pool.
    pub fn pop_idle(&mut self) -> Option<String> {
        while let Some(id) = self.idle_pool.pop_front() {
            if self.status(&id) == Some(WorkerStatus::Idle) {
                return Some(id);
            }
        }
        None
    }

    /// Bind a job to a worker already taken from the pool.
    pub fn bind(&mut self, worker_id: &str, job_id: JobId) -> JobResult<()> {
        let worker = self.worker_mut(worker_id)?;
        worker.status = WorkerStatus::Busy;
        worker.current_job = Some(job_id);
        Ok(())
    }

    /// Clear a worker's binding after its job left Processing.
    ///
    /// The worker returns to the pool unless it went offline. Returns true if
    /// it was pooled.
    pub fn release(&mut self, worker_id: &str) -> bool {
        let Some(worker) = self.workers.get_mut(worker_id) else {
            return false;
        };
        worker.current_job = None;
        if worker.status == WorkerStatus::Offline {
            return false;
        }
        worker.status = WorkerStatus::Idle;
        self.pool(worker_id);
        true
    }

    /// Increment job processed count for a worker.
    pub fn record_job_processed(&mut self, worker_id: &str) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.jobs_processed += 1;
        }
    }

    /// Increment job failed count for a worker.
    pub fn record_job_failed(&mut self, worker_id: &str) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.jobs_failed += 1;
        }
    }

    /// Workers that are not offline and have not reported within the
    /// heartbeat timeout as of `now`.
    pub fn stale_workers(&self, now: Instant) -> Vec<String> {
        let mut stale: Vec<String> = self
            .workers
            .values()
            .filter(|w| w.status != WorkerStatus::Offline)
            .filter(|w| !w.is_alive_at(now, self.heartbeat_timeout))
            .map(|w| w.id.clone())
            .collect();
        stale.sort();
        stale
    }

    /// Get information about a specific worker.
    pub fn get(&self, worker_id: &str) -> Option<&WorkerInfo> {
        self.workers.get(worker_id)
    }

    /// Current status of a worker.
    pub fn status(&self, worker_id: &str) -> Option<WorkerStatus> {
        self.workers.get(worker_id).map(|w| w.status)
    }

    /// All workers, ordered by ID.
    pub fn list(&self) -> Vec<&WorkerInfo> {
        let mut workers: Vec<&WorkerInfo> = self.workers.values().collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        workers
    }

    /// Number of registered workers, offline ones included.
    pub fn total(&self) -> usize {
        self.workers.len()
    }

    /// Number of workers in `status`.
    pub fn count(&self, status: WorkerStatus) -> usize {
        self.workers.values().filter(|w| w.status == status).count()
    }

    /// Number of workers that are not offline.
    pub fn active_count(&self) -> usize {
        self.total() - self.count(WorkerStatus::Offline)
    }

    /// Number of workers waiting for a job.
    pub fn idle_count(&self) -> usize {
        self.idle_pool.len()
    }

    fn worker_mut(&mut self, worker_id: &str) -> JobResult<&mut WorkerInfo> {
        self.workers
            .get_mut(worker_id)
            .ok_or_else(|| JobError::WorkerNotFound(worker_id.to_string()))
    }

    fn pool(&mut self, worker_id: &str) {
        if !self.idle_pool.iter().any(|id| id == worker_id) {
            self.idle_pool.push_back(worker_id.to_string());
        }
    }

    fn unpool(&mut self, worker_id: &str) {
        self.idle_pool.retain(|id| id != worker_id);
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_registration() {
        let mut registry = WorkerRegistry::new();

        let info = registry.register("gpu-1", "g5.xlarge");
        assert_eq!(info.status, WorkerStatus::Idle);
        assert_eq!(info.gpu_instance_class, "g5.xlarge");

        registry.register("gpu-2", "g4dn.xlarge");
        assert_eq!(registry.total(), 2);
        assert_eq!(registry.idle_count(), 2);
    }

    #[test]
    fn test_idle_pool_is_fifo() {
        let mut registry = WorkerRegistry::new();
        registry.register("gpu-1", "g5.xlarge");
        registry.register("gpu-2", "g5.xlarge");

        assert_eq!(registry.pop_idle().as_deref(), Some("gpu-1"));
        registry.bind("gpu-1", JobId::from("job-1")).unwrap();
        assert!(registry.release("gpu-1"));

        assert_eq!(registry.pop_idle().as_deref(), Some("gpu-2"));
        assert_eq!(registry.pop_idle().as_deref(), Some("gpu-1"));
        assert_eq!(registry.pop_idle(), None);
    }

    #[test]
    fn test_mark_idle_pools_once() {
        let mut registry = WorkerRegistry::new();
        registry.register("gpu-1", "g5.xlarge");
        registry.mark_idle("gpu-1").unwrap();
        registry.mark_idle("gpu-1").unwrap();
        assert_eq!(registry.idle_count(), 1);
    }

    #[test]
    fn test_busy_leaves_pool() {
        let mut registry = WorkerRegistry::new();
        registry.register("gpu-1", "g5.xlarge");
        registry.mark_busy("gpu-1").unwrap();

        assert_eq!(registry.idle_count(), 0);
        assert_eq!(registry.pop_idle(), None);
        assert_eq!(registry.count(WorkerStatus::Busy), 1);
    }

    #[test]
    fn test_offline_returns_bound_job() {
        let mut registry = WorkerRegistry::new();
        registry.register("gpu-1", "g5.xlarge");
        let id = registry.pop_idle().unwrap();
        registry.bind(&id, JobId::from("job-1")).unwrap();

        let job = registry.mark_offline("gpu-1").unwrap();
        assert_eq!(job, Some(JobId::from("job-1")));
        assert_eq!(registry.active_count(), 0);
        assert!(!registry.release("gpu-1"));
    }

    #[test]
    fn test_reregister_offline_worker() {
        let mut registry = WorkerRegistry::new();
        registry.register("gpu-1", "g4dn.xlarge");
        registry.mark_offline("gpu-1").unwrap();
        assert_eq!(registry.idle_count(), 0);

        let info = registry.register("gpu-1", "g5.xlarge");
        assert_eq!(info.status, WorkerStatus::Idle);
        assert_eq!(info.gpu_instance_class, "g5.xlarge");
        assert_eq!(registry.idle_count(), 1);
        assert_eq!(registry.total(), 1);
    }

    #[test]
    fn test_reregister_busy_worker_keeps_binding() {
        let mut registry = WorkerRegistry::new();
        registry.register("gpu-1", "g5.xlarge");
        let id = registry.pop_idle().unwrap();
        registry.bind(&id, JobId::from("job-1")).unwrap();

        let info = registry.register("gpu-1", "g5.xlarge");
        assert_eq!(info.status, WorkerStatus::Busy);
        assert_eq!(info.current_job, Some(JobId::from("job-1")));
        assert_eq!(registry.idle_count(), 0);
    }

    #[test]
    fn test_unknown_worker() {
        let mut registry = WorkerRegistry::new();
        assert!(matches!(
            registry.mark_idle("ghost"),
            Err(JobError::WorkerNotFound(id)) if id == "ghost"
        ));
        assert!(registry
            .touch(&WorkerStatusUpdate::new("ghost", WorkerStatus::Busy))
            .is_err());
    }

    #[test]
    fn test_touch_records_utilization() {
        let mut registry = WorkerRegistry::new();
        registry.register("gpu-1", "g5.xlarge");
        registry
            .touch(&WorkerStatusUpdate::new("gpu-1", WorkerStatus::Busy).with_utilization(87.5, 20.0))
            .unwrap();

        let info = registry.get("gpu-1").unwrap();
        assert_eq!(info.gpu_utilization, Some(87.5));
        assert_eq!(info.memory_used_gb, Some(20.0));
    }

    #[test]
    fn test_stale_workers() {
        let mut registry = WorkerRegistry::with_timeout(Duration::from_secs(90));
        registry.register("gpu-1", "g5.xlarge");
        registry.register("gpu-2", "g5.xlarge");
        registry.mark_offline("gpu-2").unwrap();

        assert!(registry.stale_workers(Instant::now()).is_empty());

        let later = Instant::now() + Duration::from_secs(120);
        assert_eq!(registry.stale_workers(later), vec!["gpu-1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_report_keeps_worker_alive() {
        let mut registry = WorkerRegistry::with_timeout(Duration::from_secs(90));
        registry.register("gpu-1", "g5.xlarge");
        registry.register("gpu-2", "g5.xlarge");

        tokio::time::advance(Duration::from_secs(60)).await;
        registry.touch_id("gpu-1");
        tokio::time::advance(Duration::from_secs(60)).await;

        assert_eq!(registry.stale_workers(Instant::now()), vec!["gpu-2".to_string()]);
    }

    #[test]
    fn test_touch_id_ignores_offline_worker() {
        let mut registry = WorkerRegistry::with_timeout(Duration::from_secs(90));
        registry.register("gpu-1", "g5.xlarge");
        registry.mark_offline("gpu-1").unwrap();

        registry.touch_id("gpu-1");
        registry.touch_id("ghost");
        assert_eq!(registry.status("gpu-1"), Some(WorkerStatus::Offline));
        assert!(registry.stale_workers(Instant::now()).is_empty());
    }

    #[test]
    fn test_job_counters() {
        let mut registry = WorkerRegistry::new();
        registry.register("gpu-1", "g5.xlarge");
        registry.record_job_processed("gpu-1");
        registry.record_job_processed("gpu-1");
        registry.record_job_failed("gpu-1");

        let info = registry.get("gpu-1").unwrap();
        assert_eq!(info.jobs_processed, 2);
        assert_eq!(info.jobs_failed, 1);
    }
}
