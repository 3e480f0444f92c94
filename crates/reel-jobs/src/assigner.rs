//! Assignment engine binding queued jobs to idle workers.

use crate::dispatch::{WorkerAction, WorkerCommand};
use crate::job::JobStatus;
use crate::metrics::JobMetrics;
use crate::queue::PriorityLanes;
use crate::store::JobStore;
use crate::worker_registry::WorkerRegistry;
use chrono::Utc;
use tracing::{info, warn};

/// Drains the lanes into the idle pool.
///
/// Lanes are visited Critical first, FIFO within a lane; workers are taken
/// longest-idle first. For a fixed sequence of submissions and idle reports
/// the resulting bindings are always the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobAssigner;

impl JobAssigner {
    /// Bind as many jobs as there are idle workers.
    ///
    /// Returns one `Start` command per binding, in binding order.
    pub fn assign_pending(
        &self,
        lanes: &mut PriorityLanes,
        store: &mut JobStore,
        workers: &mut WorkerRegistry,
    ) -> Vec<WorkerCommand> {
        let mut commands = Vec::new();

        while workers.idle_count() > 0 {
            let Some((priority, job_id)) = lanes.pop_next() else {
                break;
            };

            let Some(job) = store.get_mut(&job_id) else {
                warn!(job_id = %job_id, "Dropping unknown job from lane");
                continue;
            };
            if job.status != JobStatus::Queued {
                warn!(job_id = %job_id, status = %job.status, "Dropping non-queued job from lane");
                continue;
            }

            let Some(worker_id) = workers.pop_idle() else {
                lanes.push_front(priority, job_id);
                break;
            };
            let gpu_instance_class = workers
                .get(&worker_id)
                .map(|w| w.gpu_instance_class.clone())
                .unwrap_or_default();
            if let Err(e) = workers.bind(&worker_id, job_id.clone()) {
                warn!(worker_id = %worker_id, error = %e, "Idle worker vanished");
                lanes.push_front(priority, job_id);
                continue;
            }

            let now = Utc::now();
            if job.retry_count == 0 {
                if let Ok(wait) = (now - job.created_at).to_std() {
                    JobMetrics::job_wait_time(job.job_type.as_str(), wait);
                }
            }
            job.status = JobStatus::Processing;
            job.worker_id = Some(worker_id.clone());
            job.gpu_instance_class = Some(gpu_instance_class.clone());
            job.started_at = Some(now);

            JobMetrics::job_assigned(job.job_type.as_str(), &gpu_instance_class);
            info!(
                job_id = %job_id,
                worker_id = %worker_id,
                priority = %priority,
                job_type = %job.job_type,
                attempt = job.retry_count,
                "Job assigned"
            );

            commands.push(WorkerCommand {
                job_id,
                worker_id,
                action: WorkerAction::Start {
                    job_type: job.parameters.job_type(),
                    parameters: job.parameters.body().clone(),
                    timeout_secs: job.timeout_secs,
                    required_gpu_memory_gb: job.required_gpu_memory_gb,
                },
            });
        }

        commands
    }
}
