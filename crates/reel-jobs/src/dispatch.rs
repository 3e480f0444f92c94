//! Outbound collaborators: worker notifications and fleet scale requests.
//!
//! Both traits are fire-and-forget. The scheduler calls them after a state
//! change has been applied and never waits for, or depends on, delivery.

use crate::job::{JobId, JobType};
use crate::scaler::{ScaleDirection, ScaleIntent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// What a worker is told to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkerAction {
    /// Start running a job.
    Start {
        job_type: JobType,
        parameters: Value,
        /// Advisory; the worker enforces it.
        timeout_secs: u64,
        required_gpu_memory_gb: u32,
    },
    /// Stop running a job.
    Cancel,
}

/// A message for one worker about one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub job_id: JobId,
    pub worker_id: String,
    #[serde(flatten)]
    pub action: WorkerAction,
}

/// Delivers commands to workers.
pub trait WorkerNotifier: Send + Sync {
    /// Hand a command to the worker transport. Must not block.
    fn notify(&self, command: WorkerCommand);
}

/// Receives fleet scale intents.
pub trait FleetManager: Send + Sync {
    /// Hand an intent to the fleet manager. Must not block.
    fn request_scale(&self, intent: ScaleIntent);
}

/// Notifier that forwards commands over an unbounded channel.
///
/// The receiver belongs to whatever gateway talks to the workers.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<WorkerCommand>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver its commands arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl WorkerNotifier for ChannelNotifier {
    fn notify(&self, command: WorkerCommand) {
        if let Err(e) = self.tx.send(command) {
            warn!(
                job_id = %e.0.job_id,
                worker_id = %e.0.worker_id,
                "Worker gateway closed; command dropped"
            );
        }
    }
}

/// Intents kept by [`DesiredCapacity::history`].
pub const HISTORY_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct CapacityState {
    desired: u32,
    history: VecDeque<ScaleIntent>,
}

/// In-process tracker of the desired fleet size.
///
/// Applies every intent to a running total, never going below zero. Only the
/// latest [`HISTORY_CAPACITY`] intents are remembered.
#[derive(Debug, Default)]
pub struct DesiredCapacity {
    state: Mutex<CapacityState>,
}

impl DesiredCapacity {
    /// Start tracking from `initial` instances.
    pub fn new(initial: u32) -> Self {
        Self {
            state: Mutex::new(CapacityState {
                desired: initial,
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
            }),
        }
    }

    /// Current desired instance count.
    pub fn desired(&self) -> u32 {
        self.state.lock().desired
    }

    /// Most recent intents, oldest first.
    pub fn history(&self) -> Vec<ScaleIntent> {
        self.state.lock().history.iter().cloned().collect()
    }
}

impl FleetManager for DesiredCapacity {
    fn request_scale(&self, intent: ScaleIntent) {
        let mut state = self.state.lock();
        state.desired = match intent.direction {
            ScaleDirection::Up => state.desired.saturating_add(intent.count),
            ScaleDirection::Down => state.desired.saturating_sub(intent.count),
        };
        info!(
            direction = %intent.direction,
            count = intent.count,
            instance_class = ?intent.instance_class,
            desired = state.desired,
            "Desired fleet size updated"
        );
        if state.history.len() == HISTORY_CAPACITY {
            state.history.pop_front();
        }
        state.history.push_back(intent);
    }
}
