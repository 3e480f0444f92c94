//! Scheduler metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the binary.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names.
pub mod names {
    /// Total jobs accepted.
    pub const JOBS_SUBMITTED_TOTAL: &str = "reel_jobs_submitted_total";
    /// Total job-to-worker bindings.
    pub const JOBS_ASSIGNED_TOTAL: &str = "reel_jobs_assigned_total";
    /// Total jobs completed.
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    /// Total jobs failed permanently.
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    /// Total retries granted.
    pub const JOBS_RETRIED_TOTAL: &str = "reel_jobs_retried_total";
    /// Total jobs cancelled.
    pub const JOBS_CANCELLED_TOTAL: &str = "reel_jobs_cancelled_total";

    /// Jobs waiting per priority lane.
    pub const JOBS_QUEUED: &str = "reel_jobs_queued";
    /// Workers per status.
    pub const WORKERS: &str = "reel_workers";

    /// Total scale intents issued.
    pub const SCALE_INTENTS_TOTAL: &str = "reel_scale_intents_total";

    /// Time from submission to first assignment.
    pub const JOB_WAIT_TIME_SECONDS: &str = "reel_job_wait_time_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::JOBS_SUBMITTED_TOTAL, "Total number of jobs submitted");
    describe_counter!(
        names::JOBS_ASSIGNED_TOTAL,
        "Total number of jobs bound to a GPU worker"
    );
    describe_counter!(
        names::JOBS_COMPLETED_TOTAL,
        "Total number of jobs completed successfully"
    );
    describe_counter!(
        names::JOBS_FAILED_TOTAL,
        "Total number of jobs that failed permanently"
    );
    describe_counter!(names::JOBS_RETRIED_TOTAL, "Total number of job retries");
    describe_counter!(names::JOBS_CANCELLED_TOTAL, "Total number of jobs cancelled");

    describe_gauge!(names::JOBS_QUEUED, "Current number of queued jobs per priority");
    describe_gauge!(names::WORKERS, "Current number of workers per status");

    describe_counter!(
        names::SCALE_INTENTS_TOTAL,
        "Total number of scale intents sent to the fleet manager"
    );

    describe_histogram!(
        names::JOB_WAIT_TIME_SECONDS,
        "Job wait time (submission to assignment) in seconds"
    );
}

/// Job metrics recorder.
#[derive(Clone)]
pub struct JobMetrics;

impl JobMetrics {
    /// Record a job submitted.
    pub fn job_submitted(job_type: &str, priority: &str) {
        counter!(
            names::JOBS_SUBMITTED_TOTAL,
            "job_type" => job_type.to_string(),
            "priority" => priority.to_string()
        )
        .increment(1);
    }

    /// Record a job bound to a worker.
    pub fn job_assigned(job_type: &str, gpu_instance_class: &str) {
        counter!(
            names::JOBS_ASSIGNED_TOTAL,
            "job_type" => job_type.to_string(),
            "gpu_instance_class" => gpu_instance_class.to_string()
        )
        .increment(1);
    }

    /// Record a job completed.
    pub fn job_completed(job_type: &str) {
        counter!(names::JOBS_COMPLETED_TOTAL, "job_type" => job_type.to_string()).increment(1);
    }

    /// Record a permanent failure.
    pub fn job_failed(job_type: &str) {
        counter!(names::JOBS_FAILED_TOTAL, "job_type" => job_type.to_string()).increment(1);
    }

    /// Record a retry.
    pub fn job_retried(job_type: &str, attempt: u32) {
        counter!(
            names::JOBS_RETRIED_TOTAL,
            "job_type" => job_type.to_string(),
            "attempt" => attempt.to_string()
        )
        .increment(1);
    }

    /// Record a job cancelled.
    pub fn job_cancelled(job_type: &str) {
        counter!(names::JOBS_CANCELLED_TOTAL, "job_type" => job_type.to_string()).increment(1);
    }

    /// Record job wait time.
    pub fn job_wait_time(job_type: &str, wait_time: Duration) {
        histogram!(
            names::JOB_WAIT_TIME_SECONDS,
            "job_type" => job_type.to_string()
        )
        .record(wait_time.as_secs_f64());
    }

    /// Update the depth of one lane.
    pub fn update_queue_depth(priority: &str, depth: usize) {
        gauge!(names::JOBS_QUEUED, "priority" => priority.to_string()).set(depth as f64);
    }
}

/// Worker metrics recorder.
#[derive(Clone)]
pub struct WorkerMetrics;

impl WorkerMetrics {
    /// Update worker counts.
    pub fn update_workers(idle: usize, busy: usize, offline: usize) {
        gauge!(names::WORKERS, "status" => "idle").set(idle as f64);
        gauge!(names::WORKERS, "status" => "busy").set(busy as f64);
        gauge!(names::WORKERS, "status" => "offline").set(offline as f64);
    }
}

/// Scaling metrics recorder.
#[derive(Clone)]
pub struct ScalingMetrics;

impl ScalingMetrics {
    /// Record a scale intent.
    pub fn intent_issued(direction: &str) {
        counter!(
            names::SCALE_INTENTS_TOTAL,
            "direction" => direction.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // No recorder installed; calls must be no-ops.
        register_metrics();
    }

    #[test]
    fn test_recorders() {
        JobMetrics::job_submitted("video-generation", "high");
        JobMetrics::job_assigned("video-generation", "g5.xlarge");
        JobMetrics::job_wait_time("video-generation", Duration::from_millis(250));
        JobMetrics::update_queue_depth("high", 3);
        WorkerMetrics::update_workers(1, 2, 0);
        ScalingMetrics::intent_issued("up");
    }
}
