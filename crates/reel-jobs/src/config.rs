//! Scheduler configuration.

use crate::catalog::{GpuCatalog, JobTypeTable};
use crate::error::{JobError, JobResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the job scheduling subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Actor and worker liveness settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Auto-scaler thresholds.
    #[serde(default)]
    pub scaling: ScalingConfig,

    /// Per-job-type defaults, keyed by job type name.
    #[serde(default)]
    pub job_types: JobTypeTable,

    /// Instance classes the fleet can provision.
    #[serde(default)]
    pub gpu_catalog: GpuCatalog,
}

impl JobsConfig {
    /// Checks the configuration for values the scheduler cannot run with.
    pub fn validate(&self) -> JobResult<()> {
        self.scheduler.validate()?;
        self.scaling.validate()?;

        if self.gpu_catalog.is_empty() {
            return Err(JobError::Configuration(
                "gpu_catalog must list at least one instance class".to_string(),
            ));
        }

        let missing = self.job_types.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|t| t.as_str()).collect();
            return Err(JobError::Configuration(format!(
                "job_types is missing entries for: {}",
                names.join(", ")
            )));
        }

        for (job_type, entry) in self.job_types.iter() {
            if entry.timeout_secs == 0 {
                return Err(JobError::Configuration(format!(
                    "job_types.{job_type}.timeout_secs must be greater than zero"
                )));
            }
            if self.gpu_catalog.recommend(entry.required_gpu_memory_gb).is_none() {
                return Err(JobError::Configuration(format!(
                    "no GPU instance class offers {} GB for {job_type}",
                    entry.required_gpu_memory_gb
                )));
            }
        }

        Ok(())
    }
}

/// Scheduler actor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Capacity of the command channel in front of the actor.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Seconds without a report after which a worker is considered offline.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Interval between stale worker sweeps in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl SchedulerConfig {
    /// Get heartbeat timeout as Duration.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Get sweep interval as Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    fn validate(&self) -> JobResult<()> {
        if self.command_buffer == 0 {
            return Err(JobError::Configuration(
                "scheduler.command_buffer must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_timeout_secs == 0 {
            return Err(JobError::Configuration(
                "scheduler.heartbeat_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(JobError::Configuration(
                "scheduler.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_command_buffer() -> usize {
    1024
}

fn default_heartbeat_timeout() -> u64 {
    90
}

fn default_sweep_interval() -> u64 {
    30
}

/// Auto-scaler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Run evaluations after events and on a timer.
    ///
    /// Explicit evaluation requests are served either way.
    #[serde(default)]
    pub enabled: bool,

    /// Scale up once queued jobs exceed active workers times this factor.
    #[serde(default = "default_scale_up_factor")]
    pub scale_up_factor: usize,

    /// Instances requested per scale-up intent.
    #[serde(default = "default_step")]
    pub scale_up_step: u32,

    /// Scale down once idle workers exceed this count with nothing queued.
    #[serde(default = "default_idle_threshold")]
    pub scale_down_idle_threshold: usize,

    /// Instances released per scale-down intent.
    #[serde(default = "default_step")]
    pub scale_down_step: u32,

    /// Interval between periodic evaluations in seconds.
    #[serde(default = "default_evaluation_interval")]
    pub evaluation_interval_secs: u64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scale_up_factor: default_scale_up_factor(),
            scale_up_step: default_step(),
            scale_down_idle_threshold: default_idle_threshold(),
            scale_down_step: default_step(),
            evaluation_interval_secs: default_evaluation_interval(),
        }
    }
}

impl ScalingConfig {
    /// Get evaluation interval as Duration.
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_secs)
    }

    fn validate(&self) -> JobResult<()> {
        if self.scale_up_factor == 0 {
            return Err(JobError::Configuration(
                "scaling.scale_up_factor must be greater than zero".to_string(),
            ));
        }
        if self.scale_up_step == 0 || self.scale_down_step == 0 {
            return Err(JobError::Configuration(
                "scaling steps must be greater than zero".to_string(),
            ));
        }
        if self.evaluation_interval_secs == 0 {
            return Err(JobError::Configuration(
                "scaling.evaluation_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_scale_up_factor() -> usize {
    2
}

fn default_step() -> u32 {
    1
}

fn default_idle_threshold() -> usize {
    3
}

fn default_evaluation_interval() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{GpuInstanceClass, JobTypeConfig};
    use crate::job::JobType;
    use crate::queue::Priority;

    #[test]
    fn test_default_config_is_valid() {
        let config = JobsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.command_buffer, 1024);
        assert_eq!(config.scheduler.heartbeat_timeout(), Duration::from_secs(90));
        assert_eq!(config.scaling.scale_up_factor, 2);
        assert_eq!(config.scaling.scale_down_idle_threshold, 3);
        assert!(!config.scaling.enabled);
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let mut config = JobsConfig::default();
        config.scheduler.command_buffer = 0;
        assert!(matches!(config.validate(), Err(JobError::Configuration(_))));
    }

    #[test]
    fn test_zero_factor_rejected() {
        let mut config = JobsConfig::default();
        config.scaling.scale_up_factor = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_job_type_rejected() {
        let config = JobsConfig {
            job_types: JobTypeTable::new([(
                JobType::VoiceSynthesis,
                JobTypeConfig {
                    priority: Priority::Medium,
                    timeout_secs: 300,
                    max_retries: 3,
                    required_gpu_memory_gb: 8,
                },
            )]),
            ..JobsConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("video-generation"));
    }

    #[test]
    fn test_catalog_must_host_every_type() {
        let config = JobsConfig {
            gpu_catalog: GpuCatalog::new(vec![GpuInstanceClass {
                name: "g4dn.xlarge".to_string(),
                gpu_model: "T4".to_string(),
                gpu_memory_gb: 16,
                hourly_cost_usd: 0.526,
            }]),
            ..JobsConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("24 GB"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let config = JobsConfig {
            gpu_catalog: GpuCatalog::new(Vec::new()),
            ..JobsConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("gpu_catalog"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: JobsConfig = toml::from_str(
            r#"
            [scaling]
            enabled = true
            scale_up_factor = 4
            "#,
        )
        .unwrap();
        assert!(config.scaling.enabled);
        assert_eq!(config.scaling.scale_up_factor, 4);
        assert_eq!(config.scaling.scale_up_step, 1);
        assert_eq!(config.scheduler.sweep_interval_secs, 30);
        assert!(config.job_types.missing().is_empty());
    }
}
