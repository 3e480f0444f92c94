//! Auto-scaler that turns queue pressure into fleet scale intents.

use crate::config::ScalingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Direction of a scale intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDirection {
    Up,
    Down,
}

impl ScaleDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleDirection::Up => "up",
            ScaleDirection::Down => "down",
        }
    }
}

impl fmt::Display for ScaleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for the fleet manager to grow or shrink the worker fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleIntent {
    pub direction: ScaleDirection,
    /// Number of instances to add or release.
    pub count: u32,
    /// Instance class to provision. Only set when scaling up.
    pub instance_class: Option<String>,
}

impl ScaleIntent {
    /// Scale-up intent for `count` instances of `instance_class`.
    pub fn up(count: u32, instance_class: Option<String>) -> Self {
        Self {
            direction: ScaleDirection::Up,
            count,
            instance_class,
        }
    }

    /// Scale-down intent for `count` instances.
    pub fn down(count: u32) -> Self {
        Self {
            direction: ScaleDirection::Down,
            count,
            instance_class: None,
        }
    }
}

/// Load figures an evaluation is based on.
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    /// Jobs waiting across all lanes.
    pub total_queued: usize,
    /// Workers that are not offline.
    pub active_workers: usize,
    pub idle_workers: usize,
    /// Catalog recommendation for the next job in line.
    pub head_instance_class: Option<String>,
}

/// Threshold-based auto-scaler.
///
/// Stateless: every evaluation looks only at the snapshot it is given.
/// Debouncing repeated intents is up to the fleet manager.
#[derive(Debug, Clone)]
pub struct AutoScaler {
    config: ScalingConfig,
}

impl AutoScaler {
    pub fn new(config: ScalingConfig) -> Self {
        Self { config }
    }

    /// Whether event-driven and periodic evaluations are enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Decide whether the fleet should change size.
    pub fn evaluate(&self, snapshot: &FleetSnapshot) -> Option<ScaleIntent> {
        let capacity = snapshot
            .active_workers
            .saturating_mul(self.config.scale_up_factor);

        let intent = if snapshot.total_queued > capacity {
            Some(ScaleIntent::up(
                self.config.scale_up_step,
                snapshot.head_instance_class.clone(),
            ))
        } else if snapshot.total_queued == 0
            && snapshot.idle_workers > self.config.scale_down_idle_threshold
        {
            Some(ScaleIntent::down(self.config.scale_down_step))
        } else {
            None
        };

        debug!(
            total_queued = snapshot.total_queued,
            active_workers = snapshot.active_workers,
            idle_workers = snapshot.idle_workers,
            decision = ?intent.as_ref().map(|i| i.direction),
            "Scaling evaluated"
        );

        intent
    }
}

impl Default for AutoScaler {
    fn default() -> Self {
        Self::new(ScalingConfig::default())
    }
}
