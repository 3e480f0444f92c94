//! Job records and the types that describe them.

use crate::error::JobError;
use crate::queue::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the job ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of AI processing a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    VideoGeneration,
    VoiceSynthesis,
    LipsyncAnimation,
    MusicGeneration,
    PodcastVideo,
    SubtitleGeneration,
}

impl JobType {
    /// Every job type, in declaration order.
    pub const ALL: [JobType; 6] = [
        JobType::VideoGeneration,
        JobType::VoiceSynthesis,
        JobType::LipsyncAnimation,
        JobType::MusicGeneration,
        JobType::PodcastVideo,
        JobType::SubtitleGeneration,
    ];

    /// Wire name of the job type.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::VideoGeneration => "video-generation",
            JobType::VoiceSynthesis => "voice-synthesis",
            JobType::LipsyncAnimation => "lipsync-animation",
            JobType::MusicGeneration => "music-generation",
            JobType::PodcastVideo => "podcast-video",
            JobType::SubtitleGeneration => "subtitle-generation",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| JobError::InvalidJobType(s.to_string()))
    }
}

/// Job status.
///
/// ```text
/// Submitted -> Queued -> Processing -> Completed | Failed | Cancelled
///                ^            |
///                +-- retry ---+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted but not yet placed in a lane.
    Submitted,
    /// Waiting in a priority lane.
    Queued,
    /// Bound to a worker.
    Processing,
    /// Finished successfully.
    Completed,
    /// Failed with no retries left, or failed without retry.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Submitted => write!(f, "submitted"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Type-specific job input, opaque to the scheduler.
///
/// The payload travels unchanged to the worker together with the tag it was
/// submitted under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    job_type: JobType,
    body: Value,
}

impl JobParameters {
    /// Tags a payload with its job type.
    pub fn new(job_type: JobType, body: Value) -> Self {
        Self { job_type, body }
    }

    /// Job type the payload belongs to.
    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    /// Raw payload.
    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// A request to run a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    pub job_type: JobType,
    /// Falls back to the job type's configured priority.
    #[serde(default)]
    pub priority: Option<Priority>,
    pub user_id: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Falls back to the job type's configured retry ceiling.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl JobSubmission {
    /// Creates a submission with configured defaults for everything optional.
    pub fn new(job_type: JobType, user_id: impl Into<String>, parameters: Value) -> Self {
        Self {
            job_type,
            priority: None,
            user_id: user_id.into(),
            parameters,
            callback_url: None,
            max_retries: None,
        }
    }

    /// Creates a submission from an untyped job type name.
    pub fn parse(
        job_type: &str,
        user_id: impl Into<String>,
        parameters: Value,
    ) -> Result<Self, JobError> {
        Ok(Self::new(job_type.parse()?, user_id, parameters))
    }

    /// Set the priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the callback target.
    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    /// Override the retry ceiling.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Authoritative record of a submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub priority: Priority,
    pub status: JobStatus,
    /// Percentage in `[0, 100]`.
    pub progress: u8,
    pub user_id: String,
    pub parameters: JobParameters,
    pub callback_url: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Advisory; enforced by the worker layer.
    pub timeout_secs: u64,
    pub required_gpu_memory_gb: u32,
    pub worker_id: Option<String>,
    pub gpu_instance_class: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<Value>,
}

impl Job {
    /// Returns true while another retry may be granted.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Clears the worker binding, returning the worker it was bound to.
    pub(crate) fn unbind(&mut self) -> Option<String> {
        self.worker_id.take()
    }
}
