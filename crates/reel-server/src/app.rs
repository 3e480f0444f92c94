//! Application assembly.

use reel_config::AppConfig;
use reel_jobs::{
    ChannelNotifier, DesiredCapacity, SchedulerHandle, SchedulerService, WorkerAction,
    WorkerCommand,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A running scheduler with its worker gateway and fleet tracker.
pub struct Application {
    handle: SchedulerHandle,
    fleet: Arc<DesiredCapacity>,
    scheduler_task: JoinHandle<()>,
    gateway_task: JoinHandle<usize>,
}

impl Application {
    /// Spawns the scheduler actor on the current runtime.
    pub fn start(config: &AppConfig) -> Self {
        let (notifier, commands) = ChannelNotifier::new();
        let fleet = Arc::new(DesiredCapacity::new(config.app.initial_fleet_size));

        let (handle, scheduler_task) =
            SchedulerService::spawn(&config.jobs, Arc::new(notifier), fleet.clone());
        let gateway_task = tokio::spawn(run_gateway(commands));

        info!(
            initial_fleet_size = config.app.initial_fleet_size,
            job_types = config.jobs.job_types.iter().count(),
            gpu_classes = config.jobs.gpu_catalog.classes().len(),
            "Scheduler assembled"
        );

        Self {
            handle,
            fleet,
            scheduler_task,
            gateway_task,
        }
    }

    /// Handle for submitting jobs and relaying worker reports.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Desired fleet capacity as driven by scale intents.
    pub fn fleet(&self) -> Arc<DesiredCapacity> {
        self.fleet.clone()
    }

    /// Stops the scheduler and waits for queued worker commands to drain.
    ///
    /// Returns the number of commands the gateway forwarded.
    pub async fn shutdown(self) -> usize {
        self.handle.shutdown();
        if let Err(e) = self.scheduler_task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
        // The gateway exits once the stopped actor has dropped its notifier.
        match self.gateway_task.await {
            Ok(forwarded) => {
                info!(forwarded, desired_capacity = self.fleet.desired(), "Scheduler stopped");
                forwarded
            }
            Err(e) => {
                warn!("Worker gateway ended abnormally: {}", e);
                0
            }
        }
    }
}

/// Delivers worker commands until every notifier is dropped.
async fn run_gateway(mut commands: mpsc::UnboundedReceiver<WorkerCommand>) -> usize {
    let mut forwarded = 0;
    while let Some(command) = commands.recv().await {
        match &command.action {
            WorkerAction::Start {
                job_type,
                timeout_secs,
                ..
            } => info!(
                job_id = %command.job_id,
                worker_id = %command.worker_id,
                job_type = %job_type,
                timeout_secs,
                "Start job on worker"
            ),
            WorkerAction::Cancel => info!(
                job_id = %command.job_id,
                worker_id = %command.worker_id,
                "Cancel job on worker"
            ),
        }
        if let Ok(payload) = serde_json::to_string(&command) {
            debug!(payload = %payload, "Worker command");
        }
        forwarded += 1;
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_jobs::{JobStatus, JobSubmission, JobType};
    use serde_json::json;

    #[tokio::test]
    async fn test_start_and_shutdown_counts_commands() {
        let app = Application::start(&AppConfig::default());
        let handle = app.handle();

        handle.register_worker("gpu-1", "g5.xlarge").await.unwrap();
        let job_id = handle
            .submit(JobSubmission::new(
                JobType::VideoGeneration,
                "user-1",
                json!({"script": "a lighthouse at dusk"}),
            ))
            .await
            .unwrap();
        assert!(handle.cancel_job(&job_id).await.unwrap());
        drop(handle);

        // One start and one cancel.
        assert_eq!(app.shutdown().await, 2);
    }

    #[tokio::test]
    async fn test_initial_fleet_size() {
        let mut config = AppConfig::default();
        config.app.initial_fleet_size = 3;

        let app = Application::start(&config);
        assert_eq!(app.fleet().desired(), 3);

        let job_id = app
            .handle()
            .submit(JobSubmission::new(JobType::VoiceSynthesis, "user-2", json!({})))
            .await
            .unwrap();
        let view = app.handle().get_status(&job_id).await.unwrap();
        assert_eq!(view.status, JobStatus::Queued);

        assert_eq!(app.shutdown().await, 0);
    }
}
