//! Orchestrator configuration types.
//!
//! Deserialized from `config.toml` in the data directory (see
//! `orchestry-infra::config`) or constructed programmatically. All fields
//! carry serde defaults so partial files work.

use serde::{Deserialize, Serialize};

use crate::mission::Priority;

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for the orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Execution trigger settings.
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// Handoff validation settings.
    #[serde(default)]
    pub handoff: HandoffConfig,
    /// Checkpoint store settings.
    #[serde(default)]
    pub checkpoints: CheckpointStoreConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerConfig::default(),
            handoff: HandoffConfig::default(),
            checkpoints: CheckpointStoreConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TriggerConfig
// ---------------------------------------------------------------------------

/// Settings for the execution trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Maximum simultaneously running executions.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Seconds an execution may wait in the queue before failing.
    #[serde(default = "default_queue_timeout")]
    pub queue_timeout_seconds: u64,
    /// Wall-clock budget per execution in seconds.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_seconds: u64,
    /// Default admission priority when the mission does not set one.
    #[serde(default)]
    pub priority: Priority,
    /// Whether a failed execution re-enters Starting instead of failing.
    #[serde(default)]
    pub retry_on_failure: bool,
    /// Maximum retry attempts when `retry_on_failure` is set.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_queue_timeout() -> u64 {
    300
}

fn default_execution_timeout() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            queue_timeout_seconds: default_queue_timeout(),
            execution_timeout_seconds: default_execution_timeout(),
            priority: Priority::Normal,
            retry_on_failure: false,
            max_retries: default_max_retries(),
        }
    }
}

// ---------------------------------------------------------------------------
// HandoffConfig
// ---------------------------------------------------------------------------

/// Settings for handoff validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// When false, validation is bypassed entirely and any context is
    /// forwarded. Deliberate escape hatch for trusted contexts.
    #[serde(default = "default_true")]
    pub enable_validation: bool,
    /// Durations above this many hours raise a warning (never an error).
    #[serde(default = "default_long_mission_hours")]
    pub long_mission_warning_hours: f64,
}

fn default_true() -> bool {
    true
}

fn default_long_mission_hours() -> f64 {
    24.0
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            enable_validation: true,
            long_mission_warning_hours: default_long_mission_hours(),
        }
    }
}

// ---------------------------------------------------------------------------
// CheckpointStoreConfig
// ---------------------------------------------------------------------------

/// Settings for checkpoint retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointStoreConfig {
    /// Checkpoints retained per workflow after rotation.
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints_per_workflow: usize,
    /// Checkpoints older than this many days are eligible for cleanup.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

fn default_max_checkpoints() -> usize {
    5
}

fn default_max_age_days() -> u32 {
    7
}

impl Default for CheckpointStoreConfig {
    fn default() -> Self {
        Self {
            max_checkpoints_per_workflow: default_max_checkpoints(),
            max_age_days: default_max_age_days(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
