//! Priority lanes holding jobs that wait for a worker.

use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Job priority levels.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority (background work).
    Low,
    /// Medium priority (default).
    #[default]
    Medium,
    /// High priority (user is waiting).
    High,
    /// Critical priority (time-sensitive).
    Critical,
}

impl Priority {
    /// Lanes in the order the assignment engine drains them.
    pub const DRAIN_ORDER: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    fn lane_index(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four FIFO lanes of job IDs, one per priority.
///
/// An ID leaves its lane exactly once: when it is popped for assignment or
/// removed on cancellation.
#[derive(Debug, Default)]
pub struct PriorityLanes {
    lanes: [VecDeque<JobId>; 4],
}

impl PriorityLanes {
    /// Creates empty lanes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job to the tail of its lane.
    pub fn push_back(&mut self, priority: Priority, job_id: JobId) {
        self.lanes[priority.lane_index()].push_back(job_id);
    }

    /// Puts a popped job back at the head of its lane.
    pub(crate) fn push_front(&mut self, priority: Priority, job_id: JobId) {
        self.lanes[priority.lane_index()].push_front(job_id);
    }

    /// Head of the highest-priority non-empty lane, without removing it.
    pub fn peek_next(&self) -> Option<(Priority, &JobId)> {
        Priority::DRAIN_ORDER.into_iter().find_map(|priority| {
            self.lanes[priority.lane_index()]
                .front()
                .map(|id| (priority, id))
        })
    }

    /// Removes and returns the head of the highest-priority non-empty lane.
    pub fn pop_next(&mut self) -> Option<(Priority, JobId)> {
        Priority::DRAIN_ORDER.into_iter().find_map(|priority| {
            self.lanes[priority.lane_index()]
                .pop_front()
                .map(|id| (priority, id))
        })
    }

    /// Removes a job from its lane. Returns false if it was not queued there.
    pub fn remove(&mut self, priority: Priority, job_id: &JobId) -> bool {
        let lane = &mut self.lanes[priority.lane_index()];
        match lane.iter().position(|id| id == job_id) {
            Some(pos) => {
                lane.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of jobs waiting in one lane.
    pub fn lane_len(&self, priority: Priority) -> usize {
        self.lanes[priority.lane_index()].len()
    }

    /// Number of jobs waiting across all lanes.
    pub fn total(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    /// Returns true if every lane is empty.
    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }

    /// Per-lane depth keyed by priority.
    pub fn depth_by_priority(&self) -> BTreeMap<Priority, usize> {
        Priority::DRAIN_ORDER
            .into_iter()
            .map(|priority| (priority, self.lane_len(priority)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_default_priority_is_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_pop_follows_drain_order() {
        let mut lanes = PriorityLanes::new();
        lanes.push_back(Priority::Low, JobId::from("low"));
        lanes.push_back(Priority::High, JobId::from("high"));
        lanes.push_back(Priority::Critical, JobId::from("critical"));
        lanes.push_back(Priority::Medium, JobId::from("medium"));

        let order: Vec<String> = std::iter::from_fn(|| lanes.pop_next())
            .map(|(_, id)| id.to_string())
            .collect();
        assert_eq!(order, vec!["critical", "high", "medium", "low"]);
        assert!(lanes.is_empty());
    }

    #[test]
    fn test_fifo_within_lane() {
        let mut lanes = PriorityLanes::new();
        lanes.push_back(Priority::High, JobId::from("first"));
        lanes.push_back(Priority::High, JobId::from("second"));

        assert_eq!(lanes.peek_next().map(|(_, id)| id.as_str()), Some("first"));
        assert_eq!(lanes.pop_next().unwrap().1.as_str(), "first");
        assert_eq!(lanes.pop_next().unwrap().1.as_str(), "second");
    }

    #[test]
    fn test_remove() {
        let mut lanes = PriorityLanes::new();
        let keep = JobId::from("keep");
        let gone = JobId::from("gone");
        lanes.push_back(Priority::Low, keep.clone());
        lanes.push_back(Priority::Low, gone.clone());

        assert!(lanes.remove(Priority::Low, &gone));
        assert!(!lanes.remove(Priority::Low, &gone));
        assert!(!lanes.remove(Priority::High, &keep));
        assert_eq!(lanes.total(), 1);
    }

    #[test]
    fn test_depth_by_priority() {
        let mut lanes = PriorityLanes::new();
        lanes.push_back(Priority::Critical, JobId::new());
        lanes.push_back(Priority::Low, JobId::new());
        lanes.push_back(Priority::Low, JobId::new());

        let depth = lanes.depth_by_priority();
        assert_eq!(depth[&Priority::Critical], 1);
        assert_eq!(depth[&Priority::High], 0);
        assert_eq!(depth[&Priority::Low], 2);
        assert_eq!(lanes.total(), 3);
    }
}
