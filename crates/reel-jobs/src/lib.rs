//! Reel Jobs - GPU Job Scheduler
//!
//! Accepts AI processing requests, queues them by priority and hands them
//! to GPU worker nodes:
//! - Four strict-priority FIFO lanes (critical, high, medium, low)
//! - Worker registry with a FIFO idle pool and stale-worker sweeps
//! - Progress tracking with monotonic percentages
//! - Immediate retries bounded by each job's `max_retries`
//! - Threshold auto-scaler emitting fleet scale intents
//! - Best-effort cancellation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Reel Scheduler Architecture                  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  SchedulerHandle (clone per caller)                              │
//! │     │  Command + oneshot reply                                   │
//! │     ▼                                                            │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                SchedulerService (one task)                 │  │
//! │  │                                                            │  │
//! │  │  JobStore ──► PriorityLanes ──► JobAssigner ◄── Registry   │  │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │  │
//! │  │  │Critical │ │  High   │ │ Medium  │ │   Low   │           │  │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │  │
//! │  │                                                            │  │
//! │  │  RetryPolicy        AutoScaler        stale sweep          │  │
//! │  │                                                            │  │
//! │  │                 Outbox (after each command)                │  │
//! │  └───────────────────────┬──────────────────┬─────────────────┘  │
//! │                          ▼                  ▼                    │
//! │                  WorkerNotifier        FleetManager              │
//! │                  (start / cancel)      (scale up / down)         │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use reel_jobs::prelude::*;
//! use std::sync::Arc;
//!
//! let (notifier, mut commands) = ChannelNotifier::new();
//! let fleet = Arc::new(DesiredCapacity::new(0));
//! let (scheduler, _task) =
//!     SchedulerService::spawn(&JobsConfig::default(), Arc::new(notifier), fleet);
//!
//! scheduler.register_worker("gpu-1", "g5.xlarge").await?;
//! let job_id = scheduler
//!     .submit(JobSubmission::new(JobType::VideoGeneration, "user-42", params))
//!     .await?;
//! ```

pub mod assigner;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod retry;
pub mod scaler;
pub mod scheduler;
pub mod service;
pub mod status;
pub mod store;
pub mod worker_registry;

pub use assigner::JobAssigner;
pub use catalog::{GpuCatalog, GpuInstanceClass, JobTypeConfig, JobTypeTable};
pub use config::{JobsConfig, ScalingConfig, SchedulerConfig};
pub use dispatch::{
    ChannelNotifier, DesiredCapacity, FleetManager, WorkerAction, WorkerCommand, WorkerNotifier,
    HISTORY_CAPACITY,
};
pub use error::{JobError, JobResult};
pub use job::{Job, JobId, JobParameters, JobStatus, JobSubmission, JobType};
pub use metrics::{register_metrics, JobMetrics, ScalingMetrics, WorkerMetrics};
pub use queue::{Priority, PriorityLanes};
pub use retry::{RetryDecision, RetryPolicy};
pub use scaler::{AutoScaler, FleetSnapshot, ScaleDirection, ScaleIntent};
pub use scheduler::{Outbox, Scheduler, WORKER_OFFLINE_ERROR};
pub use service::{SchedulerHandle, SchedulerService};
pub use status::{JobListQuery, JobStatusView, QueueStats, DEFAULT_LIST_LIMIT};
pub use store::JobStore;
pub use worker_registry::{
    WorkerInfo, WorkerRegistry, WorkerStatus, WorkerStatusUpdate, DEFAULT_HEARTBEAT_TIMEOUT,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::dispatch::{ChannelNotifier, DesiredCapacity};
    pub use crate::job::{JobId, JobStatus, JobSubmission, JobType};
    pub use crate::queue::Priority;
    pub use crate::service::{SchedulerHandle, SchedulerService};
    pub use crate::worker_registry::{WorkerStatus, WorkerStatusUpdate};
    pub use crate::{JobError, JobResult, JobsConfig};
}
