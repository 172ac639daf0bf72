//! Checkpoint snapshot types.
//!
//! A `Checkpoint` is an immutable, versioned snapshot of workflow progress
//! for one SDLC phase. Checkpoints are created after every step transition
//! to a terminal state and are deleted only through rotation, age-based
//! cleanup, or explicit workflow deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// A durable snapshot of workflow progress for one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Workflow this snapshot belongs to.
    pub workflow_id: String,
    /// SDLC phase the snapshot covers.
    pub phase: crate::workflow::SdlcPhase,
    /// Monotonically increasing version per (workflow, phase).
    pub version: u64,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Serialized step/result state.
    pub payload: serde_json::Value,
    /// True when system-generated (e.g. baseline anchor) rather than a real
    /// execution result.
    #[serde(default)]
    pub is_synthetic: bool,
}

impl Checkpoint {
    /// Create a checkpoint timestamped now.
    pub fn new(
        workflow_id: impl Into<String>,
        phase: crate::workflow::SdlcPhase,
        version: u64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            phase,
            version,
            created_at: Utc::now(),
            payload,
            is_synthetic: false,
        }
    }

    /// Mark the checkpoint as system-generated.
    pub fn synthetic(mut self) -> Self {
        self.is_synthetic = true;
        self
    }

    /// Extract the completed step IDs recorded in the payload, if present.
    ///
    /// The trigger writes `{"completed_steps": [...]}` into every payload;
    /// resume logic reads it back through this accessor. Missing or malformed
    /// fields yield an empty list rather than an error.
    pub fn completed_steps(&self) -> Vec<String> {
        self.payload
            .get("completed_steps")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// StorageStats
// ---------------------------------------------------------------------------

/// Aggregate statistics over a checkpoint store, for operational tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    /// Number of workflows with at least one checkpoint.
    pub workflow_count: usize,
    /// Total checkpoint files tracked.
    pub checkpoint_count: usize,
    /// Total bytes on disk across checkpoint files.
    pub total_bytes: u64,
    /// Oldest checkpoint timestamp, if any exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DateTime<Utc>>,
    /// Newest checkpoint timestamp, if any exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
