//! Scheduler actor and the handle callers use to reach it.
//!
//! One tokio task owns the [`Scheduler`]. Every request travels over a
//! bounded command channel and is answered on a oneshot, so operations are
//! applied strictly one after another. After each operation the actor
//! drains the scheduler's outbox into the worker notifier and the fleet
//! manager.

use crate::config::JobsConfig;
use crate::dispatch::{FleetManager, WorkerNotifier};
use crate::error::{JobError, JobResult};
use crate::job::{JobId, JobStatus, JobSubmission};
use crate::retry::RetryDecision;
use crate::scaler::ScaleIntent;
use crate::scheduler::Scheduler;
use crate::status::{JobListQuery, JobStatusView, QueueStats};
use crate::worker_registry::{WorkerInfo, WorkerStatusUpdate};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

type Reply<T> = oneshot::Sender<T>;

/// Shortest period accepted for the actor's timers.
const MIN_TICK: Duration = Duration::from_secs(1);

/// Requests served by the actor.
#[derive(Debug)]
enum Command {
    Submit {
        submission: JobSubmission,
        reply: Reply<JobResult<JobId>>,
    },
    GetStatus {
        job_id: JobId,
        reply: Reply<JobResult<JobStatusView>>,
    },
    CancelJob {
        job_id: JobId,
        reply: Reply<JobResult<bool>>,
    },
    ListJobs {
        query: JobListQuery,
        reply: Reply<Vec<JobStatusView>>,
    },
    RegisterWorker {
        worker_id: String,
        gpu_instance_class: String,
        reply: Reply<JobResult<WorkerInfo>>,
    },
    UpdateWorkerStatus {
        update: WorkerStatusUpdate,
        reply: Reply<JobResult<()>>,
    },
    ReportProgress {
        job_id: JobId,
        percent: f64,
        status: Option<JobStatus>,
        reply: Reply<JobResult<()>>,
    },
    CompleteJob {
        job_id: JobId,
        result: Option<Value>,
        reply: Reply<JobResult<()>>,
    },
    FailJob {
        job_id: JobId,
        error: String,
        should_retry: bool,
        reply: Reply<JobResult<RetryDecision>>,
    },
    EvaluateScaling {
        reply: Reply<Option<ScaleIntent>>,
    },
    QueueStats {
        reply: Reply<QueueStats>,
    },
    GetWorker {
        worker_id: String,
        reply: Reply<JobResult<WorkerInfo>>,
    },
    ListWorkers {
        reply: Reply<Vec<WorkerInfo>>,
    },
}

/// Actor that owns the scheduler state.
pub struct SchedulerService {
    scheduler: Scheduler,
    commands: mpsc::Receiver<Command>,
    shutdown_rx: broadcast::Receiver<()>,
    notifier: Arc<dyn WorkerNotifier>,
    fleet: Arc<dyn FleetManager>,
    scaling_enabled: bool,
    evaluation_interval: Duration,
    sweep_interval: Duration,
}

impl SchedulerService {
    /// Start the actor on the current tokio runtime.
    pub fn spawn(
        config: &JobsConfig,
        notifier: Arc<dyn WorkerNotifier>,
        fleet: Arc<dyn FleetManager>,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(config.scheduler.command_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let service = Self {
            scheduler: Scheduler::new(config),
            commands,
            shutdown_rx,
            notifier,
            fleet,
            scaling_enabled: config.scaling.enabled,
            evaluation_interval: config.scaling.evaluation_interval().max(MIN_TICK),
            sweep_interval: config.scheduler.sweep_interval().max(MIN_TICK),
        };

        let task = tokio::spawn(service.run());
        (SchedulerHandle { tx, shutdown_tx }, task)
    }

    async fn run(mut self) {
        info!(
            scaling_enabled = self.scaling_enabled,
            evaluation_interval_secs = self.evaluation_interval.as_secs(),
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "Scheduler started"
        );

        let mut scaling_tick = interval_at(
            Instant::now() + self.evaluation_interval,
            self.evaluation_interval,
        );
        scaling_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep_tick = interval_at(Instant::now() + self.sweep_interval, self.sweep_interval);
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        debug!("All scheduler handles dropped");
                        break;
                    }
                },

                _ = sweep_tick.tick() => {
                    let stale = self.scheduler.sweep_stale_workers(Instant::now());
                    if !stale.is_empty() {
                        info!(count = stale.len(), "Stale workers taken offline");
                    }
                }

                _ = scaling_tick.tick(), if self.scaling_enabled => {
                    self.scheduler.evaluate_scaling();
                }
            }

            self.flush();
        }

        info!("Scheduler stopped");
    }

    fn handle(&mut self, command: Command) {
        let scheduler = &mut self.scheduler;
        // A dropped reply receiver means the caller gave up; the operation
        // has already been applied either way.
        match command {
            Command::Submit { submission, reply } => {
                let _ = reply.send(scheduler.submit(submission));
            }
            Command::GetStatus { job_id, reply } => {
                let _ = reply.send(scheduler.get_status(&job_id));
            }
            Command::CancelJob { job_id, reply } => {
                let _ = reply.send(scheduler.cancel_job(&job_id));
            }
            Command::ListJobs { query, reply } => {
                let _ = reply.send(scheduler.list_jobs(&query));
            }
            Command::RegisterWorker {
                worker_id,
                gpu_instance_class,
                reply,
            } => {
                let _ = reply.send(scheduler.register_worker(&worker_id, &gpu_instance_class));
            }
            Command::UpdateWorkerStatus { update, reply } => {
                let _ = reply.send(scheduler.update_worker_status(update));
            }
            Command::ReportProgress {
                job_id,
                percent,
                status,
                reply,
            } => {
                let _ = reply.send(scheduler.report_progress(&job_id, percent, status));
            }
            Command::CompleteJob {
                job_id,
                result,
                reply,
            } => {
                let _ = reply.send(scheduler.complete_job(&job_id, result));
            }
            Command::FailJob {
                job_id,
                error,
                should_retry,
                reply,
            } => {
                let _ = reply.send(scheduler.fail_job(&job_id, error, should_retry));
            }
            Command::EvaluateScaling { reply } => {
                let _ = reply.send(scheduler.evaluate_scaling());
            }
            Command::QueueStats { reply } => {
                let _ = reply.send(scheduler.queue_stats());
            }
            Command::GetWorker { worker_id, reply } => {
                let _ = reply.send(scheduler.get_worker(&worker_id));
            }
            Command::ListWorkers { reply } => {
                let _ = reply.send(scheduler.list_workers());
            }
        }
    }

    fn flush(&mut self) {
        let outbox = self.scheduler.take_outbox();
        if !outbox.is_empty() {
            debug!(
                commands = outbox.commands.len(),
                intents = outbox.intents.len(),
                "Flushing outbox"
            );
        }
        for command in outbox.commands {
            self.notifier.notify(command);
        }
        for intent in outbox.intents {
            self.fleet.request_scale(intent);
        }
        self.scheduler.publish_gauges();
    }
}

/// Cloneable handle to the scheduler actor.
///
/// Every method fails with [`JobError::SchedulerUnavailable`] once the actor
/// has stopped.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SchedulerHandle {
    /// Submit a job. Returns its ID.
    pub async fn submit(&self, submission: JobSubmission) -> JobResult<JobId> {
        self.request(|reply| Command::Submit { submission, reply })
            .await?
    }

    /// Current view of a job.
    pub async fn get_status(&self, job_id: &JobId) -> JobResult<JobStatusView> {
        let job_id = job_id.clone();
        self.request(|reply| Command::GetStatus { job_id, reply })
            .await?
    }

    /// Cancel a job. Returns false if it had already finished.
    pub async fn cancel_job(&self, job_id: &JobId) -> JobResult<bool> {
        let job_id = job_id.clone();
        self.request(|reply| Command::CancelJob { job_id, reply })
            .await?
    }

    /// Jobs matching `query`, newest first.
    pub async fn list_jobs(&self, query: JobListQuery) -> JobResult<Vec<JobStatusView>> {
        self.request(|reply| Command::ListJobs { query, reply }).await
    }

    /// Register or refresh a worker.
    pub async fn register_worker(
        &self,
        worker_id: impl Into<String>,
        gpu_instance_class: impl Into<String>,
    ) -> JobResult<WorkerInfo> {
        let worker_id = worker_id.into();
        let gpu_instance_class = gpu_instance_class.into();
        self.request(|reply| Command::RegisterWorker {
            worker_id,
            gpu_instance_class,
            reply,
        })
        .await?
    }

    /// Apply a worker status report.
    pub async fn update_worker_status(&self, update: WorkerStatusUpdate) -> JobResult<()> {
        self.request(|reply| Command::UpdateWorkerStatus { update, reply })
            .await?
    }

    /// Record progress for a running job.
    pub async fn report_progress(
        &self,
        job_id: &JobId,
        percent: f64,
        status: Option<JobStatus>,
    ) -> JobResult<()> {
        let job_id = job_id.clone();
        self.request(|reply| Command::ReportProgress {
            job_id,
            percent,
            status,
            reply,
        })
        .await?
    }

    /// Mark a running job completed.
    pub async fn complete_job(&self, job_id: &JobId, result: Option<Value>) -> JobResult<()> {
        let job_id = job_id.clone();
        self.request(|reply| Command::CompleteJob {
            job_id,
            result,
            reply,
        })
        .await?
    }

    /// Record a failure for a running job.
    pub async fn fail_job(
        &self,
        job_id: &JobId,
        error: impl Into<String>,
        should_retry: bool,
    ) -> JobResult<RetryDecision> {
        let job_id = job_id.clone();
        let error = error.into();
        self.request(|reply| Command::FailJob {
            job_id,
            error,
            should_retry,
            reply,
        })
        .await?
    }

    /// Run a scaling evaluation now, whether or not auto-scaling is enabled.
    pub async fn evaluate_scaling(&self) -> JobResult<Option<ScaleIntent>> {
        self.request(|reply| Command::EvaluateScaling { reply }).await
    }

    /// Aggregate queue and fleet figures.
    pub async fn queue_stats(&self) -> JobResult<QueueStats> {
        self.request(|reply| Command::QueueStats { reply }).await
    }

    /// Current record of a worker.
    pub async fn get_worker(&self, worker_id: impl Into<String>) -> JobResult<WorkerInfo> {
        let worker_id = worker_id.into();
        self.request(|reply| Command::GetWorker { worker_id, reply })
            .await?
    }

    /// All workers, ordered by ID.
    pub async fn list_workers(&self) -> JobResult<Vec<WorkerInfo>> {
        self.request(|reply| Command::ListWorkers { reply }).await
    }

    /// Ask the actor to stop after the command it is handling.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("Scheduler already stopped");
        }
    }

    /// Returns true once the actor no longer accepts commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> JobResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_| {
            JobError::SchedulerUnavailable("scheduler is not accepting commands".to_string())
        })?;
        response.await.map_err(|_| {
            JobError::SchedulerUnavailable("scheduler stopped before replying".to_string())
        })
    }
}
