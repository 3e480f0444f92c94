//! Common test infrastructure for scheduler integration tests.

use reel_jobs::{
    ChannelNotifier, DesiredCapacity, JobId, JobSubmission, JobType, JobsConfig, Priority,
    SchedulerHandle, SchedulerService, WorkerCommand,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A running scheduler actor with in-process collaborators.
pub struct TestScheduler {
    pub handle: SchedulerHandle,
    pub commands: mpsc::UnboundedReceiver<WorkerCommand>,
    pub fleet: Arc<DesiredCapacity>,
    task: JoinHandle<()>,
}

impl TestScheduler {
    /// Starts a scheduler with the default configuration.
    pub fn new() -> Self {
        Self::with_config(JobsConfig::default())
    }

    /// Starts a scheduler with a custom configuration.
    pub fn with_config(config: JobsConfig) -> Self {
        let (notifier, commands) = ChannelNotifier::new();
        let fleet = Arc::new(DesiredCapacity::new(0));
        let (handle, task) = SchedulerService::spawn(&config, Arc::new(notifier), fleet.clone());
        Self {
            handle,
            commands,
            fleet,
            task,
        }
    }

    /// Submits a job with an explicit priority.
    pub async fn submit(&self, job_type: JobType, priority: Priority) -> JobId {
        self.handle
            .submit(JobSubmission::new(job_type, "user-1", json!({})).priority(priority))
            .await
            .expect("submission rejected")
    }

    /// Drains every worker command produced by earlier requests.
    pub async fn drain_commands(&mut self) -> Vec<WorkerCommand> {
        // The outbox of a request is flushed before the next one is served.
        self.handle.queue_stats().await.expect("scheduler stopped");
        std::iter::from_fn(|| self.commands.try_recv().ok()).collect()
    }

    /// Stops the actor and waits for it to exit.
    pub async fn stop(self) {
        self.handle.shutdown();
        self.task.await.expect("scheduler task panicked");
    }
}
