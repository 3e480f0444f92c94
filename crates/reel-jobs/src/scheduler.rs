//! The scheduler state machine.
//!
//! `Scheduler` owns every job record, lane and worker record. All operations
//! take `&mut self` and run to completion, so there is never more than one
//! writer. Messages for workers and the fleet manager are collected in an
//! [`Outbox`] and delivered by the caller once the operation has returned.

use crate::assigner::JobAssigner;
use crate::catalog::{GpuCatalog, JobTypeTable};
use crate::config::JobsConfig;
use crate::dispatch::{WorkerAction, WorkerCommand};
use crate::error::{JobError, JobResult};
use crate::job::{Job, JobId, JobParameters, JobStatus, JobSubmission};
use crate::metrics::{JobMetrics, ScalingMetrics, WorkerMetrics};
use crate::queue::{Priority, PriorityLanes};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::scaler::{AutoScaler, FleetSnapshot, ScaleIntent};
use crate::status::{JobListQuery, JobStatusView, QueueStats};
use crate::store::JobStore;
use crate::worker_registry::{WorkerInfo, WorkerRegistry, WorkerStatus, WorkerStatusUpdate};
use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Error recorded on a job whose worker went offline mid-run.
pub const WORKER_OFFLINE_ERROR: &str = "worker went offline";

/// Outbound messages produced by scheduler operations.
#[derive(Debug, Default)]
pub struct Outbox {
    pub commands: Vec<WorkerCommand>,
    pub intents: Vec<ScaleIntent>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.intents.is_empty()
    }
}

/// Job scheduler and GPU worker assigner.
#[derive(Debug)]
pub struct Scheduler {
    store: JobStore,
    lanes: PriorityLanes,
    workers: WorkerRegistry,
    assigner: JobAssigner,
    retry: RetryPolicy,
    scaler: AutoScaler,
    job_types: JobTypeTable,
    catalog: GpuCatalog,
    outbox: Outbox,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new(config: &JobsConfig) -> Self {
        Self {
            store: JobStore::new(),
            lanes: PriorityLanes::new(),
            workers: WorkerRegistry::with_timeout(config.scheduler.heartbeat_timeout()),
            assigner: JobAssigner,
            retry: RetryPolicy,
            scaler: AutoScaler::new(config.scaling.clone()),
            job_types: config.job_types.clone(),
            catalog: config.gpu_catalog.clone(),
            outbox: Outbox::default(),
        }
    }

    /// Accept a job, queue it and try to place it right away.
    pub fn submit(&mut self, submission: JobSubmission) -> JobResult<JobId> {
        let job_type = submission.job_type;
        let settings = self
            .job_types
            .get(job_type)
            .ok_or_else(|| JobError::InvalidJobType(job_type.to_string()))?;

        let mut job = Job {
            id: JobId::new(),
            job_type,
            priority: submission.priority.unwrap_or(settings.priority),
            status: JobStatus::Submitted,
            progress: 0,
            user_id: submission.user_id,
            parameters: JobParameters::new(job_type, submission.parameters),
            callback_url: submission.callback_url,
            retry_count: 0,
            max_retries: submission.max_retries.unwrap_or(settings.max_retries),
            timeout_secs: settings.timeout_secs,
            required_gpu_memory_gb: settings.required_gpu_memory_gb,
            worker_id: None,
            gpu_instance_class: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
        };

        let job_id = job.id.clone();
        let priority = job.priority;
        job.status = JobStatus::Queued;
        self.store.insert(job);
        self.lanes.push_back(priority, job_id.clone());

        JobMetrics::job_submitted(job_type.as_str(), priority.as_str());
        info!(
            job_id = %job_id,
            job_type = %job_type,
            priority = %priority,
            "Job submitted"
        );

        self.assign();
        self.auto_scale();
        Ok(job_id)
    }

    /// Register a worker, or refresh a known one, and hand it work.
    pub fn register_worker(
        &mut self,
        worker_id: &str,
        gpu_instance_class: &str,
    ) -> JobResult<WorkerInfo> {
        self.workers.register(worker_id, gpu_instance_class);
        self.assign();
        self.get_worker(worker_id)
    }

    /// Apply a status report from a worker.
    pub fn update_worker_status(&mut self, update: WorkerStatusUpdate) -> JobResult<()> {
        self.workers.touch(&update)?;
        let worker_id = update.worker_id.as_str();

        match update.status {
            WorkerStatus::Idle => {
                let bound = self
                    .workers
                    .get(worker_id)
                    .and_then(|w| w.current_job.clone())
                    .filter(|job_id| self.is_running_on(job_id, worker_id));
                match bound {
                    Some(job_id) => warn!(
                        worker_id = %worker_id,
                        job_id = %job_id,
                        "Worker reported idle while bound to a running job"
                    ),
                    None => {
                        self.workers.mark_idle(worker_id)?;
                        self.assign();
                    }
                }
            }
            WorkerStatus::Busy => self.workers.mark_busy(worker_id)?,
            WorkerStatus::Offline => self.take_offline(worker_id)?,
        }

        self.auto_scale();
        Ok(())
    }

    /// Record progress for a running job.
    ///
    /// Progress is clamped to `[0, 100]` and never moves backwards. A
    /// terminal `status` finishes the job as the dedicated calls would. The
    /// report counts as a heartbeat from the job's worker.
    pub fn report_progress(
        &mut self,
        job_id: &JobId,
        percent: f64,
        status: Option<JobStatus>,
    ) -> JobResult<()> {
        self.touch_bound_worker(job_id);
        let job = self.processing_job_mut(job_id, "report progress on")?;

        if matches!(status, Some(JobStatus::Submitted | JobStatus::Queued)) {
            return Err(JobError::invalid_transition(
                job_id,
                JobStatus::Processing,
                "report progress on",
            ));
        }

        let reported = percent.clamp(0.0, 100.0).round() as u8;
        if reported < job.progress {
            debug!(
                job_id = %job_id,
                current = job.progress,
                reported = reported,
                "Ignoring lower progress report"
            );
        }
        job.progress = job.progress.max(reported);
        debug!(job_id = %job_id, progress = job.progress, "Progress updated");

        match status {
            Some(JobStatus::Completed) => self.complete_job(job_id, None),
            Some(JobStatus::Failed) => self
                .fail_job(job_id, "reported failed by worker".to_string(), false)
                .map(|_| ()),
            Some(JobStatus::Cancelled) => self.cancel_job(job_id).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Mark a running job completed and free its worker.
    pub fn complete_job(&mut self, job_id: &JobId, result: Option<Value>) -> JobResult<()> {
        self.touch_bound_worker(job_id);
        let job = self.processing_job_mut(job_id, "complete")?;
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.result = result;
        job.completed_at = Some(Utc::now());
        let job_type = job.job_type;
        let worker_id = job.unbind();

        if let Some(worker_id) = &worker_id {
            self.workers.record_job_processed(worker_id);
            self.workers.release(worker_id);
        }

        JobMetrics::job_completed(job_type.as_str());
        info!(
            job_id = %job_id,
            worker_id = ?worker_id,
            "Job completed"
        );

        self.assign();
        Ok(())
    }

    /// Record a failure for a running job and apply the retry policy.
    pub fn fail_job(
        &mut self,
        job_id: &JobId,
        error: String,
        should_retry: bool,
    ) -> JobResult<RetryDecision> {
        self.touch_bound_worker(job_id);
        let decision = self.fail_processing(job_id, error, should_retry)?;
        self.assign();
        Ok(decision)
    }

    /// Cancel a queued or running job.
    ///
    /// Returns false if the job already finished. A running job's worker is
    /// sent a cancel message and returned to the pool without waiting for an
    /// acknowledgement.
    pub fn cancel_job(&mut self, job_id: &JobId) -> JobResult<bool> {
        let job = self
            .store
            .get_mut(job_id)
            .ok_or_else(|| JobError::JobNotFound(job_id.clone()))?;

        let freed_worker = match job.status {
            JobStatus::Queued => {
                self.lanes.remove(job.priority, job_id);
                None
            }
            JobStatus::Processing => job.unbind(),
            status => {
                debug!(job_id = %job_id, status = %status, "Cancel ignored");
                return Ok(false);
            }
        };

        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        JobMetrics::job_cancelled(job.job_type.as_str());

        if let Some(worker_id) = &freed_worker {
            self.outbox.commands.push(WorkerCommand {
                job_id: job_id.clone(),
                worker_id: worker_id.clone(),
                action: WorkerAction::Cancel,
            });
            self.workers.release(worker_id);
        }

        info!(job_id = %job_id, worker_id = ?freed_worker, "Job cancelled");

        self.assign();
        Ok(true)
    }

    /// Evaluate fleet size against queue pressure.
    ///
    /// Always runs, regardless of whether automatic scaling is enabled.
    pub fn evaluate_scaling(&mut self) -> Option<ScaleIntent> {
        let head_instance_class = self
            .lanes
            .peek_next()
            .and_then(|(_, job_id)| self.store.get(job_id))
            .and_then(|job| self.catalog.recommend_for(&self.job_types, job.job_type))
            .map(|class| class.name.clone());

        let snapshot = FleetSnapshot {
            total_queued: self.lanes.total(),
            active_workers: self.workers.active_count(),
            idle_workers: self.workers.idle_count(),
            head_instance_class,
        };

        let intent = self.scaler.evaluate(&snapshot)?;
        ScalingMetrics::intent_issued(intent.direction.as_str());
        info!(
            direction = %intent.direction,
            count = intent.count,
            instance_class = ?intent.instance_class,
            total_queued = snapshot.total_queued,
            active_workers = snapshot.active_workers,
            "Scale intent issued"
        );
        self.outbox.intents.push(intent.clone());
        Some(intent)
    }

    /// Evaluate scaling if automatic scaling is enabled.
    ///
    /// Runs after submissions and worker status changes, offline sweeps
    /// included. Job completion, failure and cancellation do not trigger it.
    fn auto_scale(&mut self) -> Option<ScaleIntent> {
        if self.scaler.is_enabled() {
            self.evaluate_scaling()
        } else {
            None
        }
    }

    /// Take workers that stopped reporting offline.
    ///
    /// Returns the IDs of the workers that were marked offline.
    pub fn sweep_stale_workers(&mut self, now: Instant) -> Vec<String> {
        let stale = self.workers.stale_workers(now);
        for worker_id in &stale {
            warn!(worker_id = %worker_id, "Worker missed heartbeat deadline");
            if let Err(e) = self.take_offline(worker_id) {
                warn!(worker_id = %worker_id, error = %e, "Failed to take stale worker offline");
            }
        }
        if !stale.is_empty() {
            self.auto_scale();
        }
        stale
    }

    /// Current view of one job.
    pub fn get_status(&self, job_id: &JobId) -> JobResult<JobStatusView> {
        self.store
            .get(job_id)
            .map(JobStatusView::from)
            .ok_or_else(|| JobError::JobNotFound(job_id.clone()))
    }

    /// Jobs matching `query`, newest first.
    pub fn list_jobs(&self, query: &JobListQuery) -> Vec<JobStatusView> {
        self.store
            .list(query.user_id.as_deref(), query.status, query.limit)
            .into_iter()
            .map(JobStatusView::from)
            .collect()
    }

    /// Current record of one worker.
    pub fn get_worker(&self, worker_id: &str) -> JobResult<WorkerInfo> {
        self.workers
            .get(worker_id)
            .cloned()
            .ok_or_else(|| JobError::WorkerNotFound(worker_id.to_string()))
    }

    /// All workers, ordered by ID.
    pub fn list_workers(&self) -> Vec<WorkerInfo> {
        self.workers.list().into_iter().cloned().collect()
    }

    /// Aggregate queue and fleet figures.
    pub fn queue_stats(&self) -> QueueStats {
        QueueStats {
            total_jobs: self.store.len(),
            queued_by_priority: self.lanes.depth_by_priority(),
            total_workers: self.workers.total(),
            active_workers: self.workers.active_count(),
            idle_workers: self.workers.idle_count(),
            busy_workers: self.workers.count(WorkerStatus::Busy),
            queued: self.store.count_by_status(JobStatus::Queued),
            processing: self.store.count_by_status(JobStatus::Processing),
            completed: self.store.count_by_status(JobStatus::Completed),
            failed: self.store.count_by_status(JobStatus::Failed),
            cancelled: self.store.count_by_status(JobStatus::Cancelled),
        }
    }

    /// Publish lane depths and worker counts as gauges.
    pub fn publish_gauges(&self) {
        for priority in Priority::DRAIN_ORDER {
            JobMetrics::update_queue_depth(priority.as_str(), self.lanes.lane_len(priority));
        }
        WorkerMetrics::update_workers(
            self.workers.count(WorkerStatus::Idle),
            self.workers.count(WorkerStatus::Busy),
            self.workers.count(WorkerStatus::Offline),
        );
    }

    /// Hand over the messages produced since the last call.
    pub fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.outbox)
    }

    fn assign(&mut self) {
        let commands =
            self.assigner
                .assign_pending(&mut self.lanes, &mut self.store, &mut self.workers);
        self.outbox.commands.extend(commands);
    }

    fn touch_bound_worker(&mut self, job_id: &JobId) {
        if let Some(worker_id) = self.store.get(job_id).and_then(|job| job.worker_id.clone()) {
            self.workers.touch_id(&worker_id);
        }
    }

    fn take_offline(&mut self, worker_id: &str) -> JobResult<()> {
        if let Some(job_id) = self.workers.mark_offline(worker_id)? {
            if self.is_running_on(&job_id, worker_id) {
                self.fail_processing(&job_id, WORKER_OFFLINE_ERROR.to_string(), true)?;
                self.assign();
            }
        }
        Ok(())
    }

    fn fail_processing(
        &mut self,
        job_id: &JobId,
        error: String,
        should_retry: bool,
    ) -> JobResult<RetryDecision> {
        let retry = self.retry;
        let job = self.processing_job_mut(job_id, "fail")?;
        let decision = retry.decide(job, should_retry);
        let worker_id = job.unbind();
        let job_type = job.job_type;

        match decision {
            RetryDecision::Requeue { attempt } => {
                job.retry_count = attempt;
                job.status = JobStatus::Queued;
                job.progress = 0;
                job.gpu_instance_class = None;
                job.error = Some(error);
                let priority = job.priority;
                self.lanes.push_back(priority, job_id.clone());

                JobMetrics::job_retried(job_type.as_str(), attempt);
                info!(
                    job_id = %job_id,
                    attempt = attempt,
                    priority = %priority,
                    "Job re-queued for retry"
                );
            }
            RetryDecision::Exhausted | RetryDecision::NotRequested => {
                job.status = JobStatus::Failed;
                job.completed_at = Some(Utc::now());
                job.error = Some(error);

                JobMetrics::job_failed(job_type.as_str());
                if decision == RetryDecision::Exhausted {
                    info!(
                        job_id = %job_id,
                        retry_count = job.retry_count,
                        "Retries exhausted; job failed"
                    );
                } else {
                    info!(job_id = %job_id, "Job failed");
                }
            }
        }

        if let Some(worker_id) = &worker_id {
            self.workers.record_job_failed(worker_id);
            self.workers.release(worker_id);
        }

        Ok(decision)
    }

    fn processing_job_mut(&mut self, job_id: &JobId, action: &'static str) -> JobResult<&mut Job> {
        let job = self
            .store
            .get_mut(job_id)
            .ok_or_else(|| JobError::JobNotFound(job_id.clone()))?;
        if job.status != JobStatus::Processing {
            return Err(JobError::invalid_transition(job_id, job.status, action));
        }
        Ok(job)
    }

    fn is_running_on(&self, job_id: &JobId, worker_id: &str) -> bool {
        self.store.get(job_id).is_some_and(|job| {
            job.status == JobStatus::Processing && job.worker_id.as_deref() == Some(worker_id)
        })
    }
}
