//! Execution tracking types.
//!
//! `ExecutionHandle` is the externally visible record of one admitted mission
//! execution; `ExecutionUpdate` is the unit emitted to monitor subscribers;
//! `ExecutionResult` is the terminal summary; `StepOutcome` is what a step
//! runner reports back to the trigger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mission::Priority;
use crate::workflow::SdlcPhase;

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

/// Overall status of a mission execution.
///
/// State machine:
/// `Queued -> Starting -> Running -> {Paused <-> Running} -> {Completed, Failed, Aborted}`.
/// `Aborted` is reachable only from non-terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Queued,
    Starting,
    Running,
    Paused,
    Completed,
    Failed,
    Aborted,
}

impl ExecutionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

// ---------------------------------------------------------------------------
// ExecutionHandle
// ---------------------------------------------------------------------------

/// The externally visible record of one admitted execution.
///
/// Created at trigger time and updated in place by the trigger's status
/// machine; never deleted, only superseded by a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// UUIDv7 execution ID.
    pub execution_id: Uuid,
    /// Mission this execution belongs to.
    pub mission_id: String,
    /// Current status.
    pub status: ExecutionStatus,
    /// Admission priority.
    pub priority: Priority,
    /// When the execution was admitted (entered the queue).
    pub created_at: DateTime<Utc>,
    /// Error message once the execution fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionHandle {
    /// Create a freshly queued handle.
    pub fn queued(mission_id: impl Into<String>, priority: Priority) -> Self {
        Self {
            execution_id: Uuid::now_v7(),
            mission_id: mission_id.into(),
            status: ExecutionStatus::Queued,
            priority,
            created_at: Utc::now(),
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionUpdate
// ---------------------------------------------------------------------------

/// A progress update emitted to monitor subscribers.
///
/// The update stream for one subscriber is finite: it ends at the first
/// terminal-status update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionUpdate {
    /// Execution this update describes.
    pub execution_id: Uuid,
    /// Status at the time of the update.
    pub status: ExecutionStatus,
    /// Workflow progress percentage (0.0 - 100.0).
    pub progress_pct: f64,
    /// Phase of the most recently completed or active step, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<SdlcPhase>,
    /// When the update was emitted.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// Terminal summary of a finished execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Execution ID.
    pub execution_id: Uuid,
    /// Final status (always terminal).
    pub status: ExecutionStatus,
    /// IDs of steps that completed.
    pub completed_steps: Vec<String>,
    /// IDs of steps that failed.
    pub failed_steps: Vec<String>,
    /// Final workflow progress percentage.
    pub progress_pct: f64,
    /// Error message if the execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Total wall-clock duration in seconds.
    pub duration_seconds: f64,
}

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// What a step runner reports back for one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Whether the step succeeded.
    pub success: bool,
    /// Result payload produced by the step (runner-defined shape).
    pub output: serde_json::Value,
    /// Error message when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    /// A successful outcome carrying a payload.
    pub fn ok(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    /// A failed outcome carrying an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
