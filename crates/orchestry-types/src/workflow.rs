//! Workflow domain types.
//!
//! Defines the step-level building blocks of a mission workflow: the SDLC
//! phase enum, step status state machine, `WorkflowStep`, and the `Workflow`
//! collection. Graph semantics (readiness, cycle detection, critical path)
//! live in `orchestry-core`; this module is pure data.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SdlcPhase
// ---------------------------------------------------------------------------

/// The SDLC phase a workflow step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdlcPhase {
    Requirements,
    Design,
    Development,
    Testing,
    Deployment,
    Maintenance,
}

impl SdlcPhase {
    /// Stable lowercase name, used for checkpoint file naming.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::Design => "design",
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Deployment => "deployment",
            Self::Maintenance => "maintenance",
        }
    }
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

/// Status of an individual workflow step.
///
/// Forward-only state machine:
/// `Pending -> Ready -> InProgress -> {Completed, Failed, Skipped}`.
/// `BlockedByFailedDependency` tags non-terminal dependents of a failed step;
/// it is a deliberate parking state, not a terminal one, so that an explicit
/// resume can revisit those steps. Terminal states never transition backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Ready,
    InProgress,
    Completed,
    Failed,
    Skipped,
    BlockedByFailedDependency,
}

impl StepStatus {
    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// A single unit of work in a mission workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// User-visible step ID (e.g. "design-billing"). Unique within a workflow.
    pub step_id: String,
    /// Human-readable step name.
    pub name: String,
    /// SDLC phase this step belongs to.
    pub phase: SdlcPhase,
    /// Current step status.
    pub status: StepStatus,
    /// Step IDs this step depends on (DAG edges). BTreeSet for deterministic
    /// iteration order.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
    /// Estimated duration in hours (used for critical-path weighting).
    pub estimated_duration: f64,
    /// When step execution started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When step execution reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Opaque agent identifier this step is assigned to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl WorkflowStep {
    /// Create a pending step with no dependencies or assignment.
    pub fn new(step_id: impl Into<String>, name: impl Into<String>, phase: SdlcPhase) -> Self {
        Self {
            step_id: step_id.into(),
            name: name.into(),
            phase,
            status: StepStatus::Pending,
            depends_on: BTreeSet::new(),
            estimated_duration: 1.0,
            started_at: None,
            completed_at: None,
            assigned_to: None,
        }
    }

    /// Builder-style dependency addition.
    pub fn with_dependency(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.insert(step_id.into());
        self
    }

    /// Builder-style duration override.
    pub fn with_duration(mut self, hours: f64) -> Self {
        self.estimated_duration = hours;
        self
    }

    /// Builder-style agent assignment.
    pub fn with_assignee(mut self, agent: impl Into<String>) -> Self {
        self.assigned_to = Some(agent.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// An ordered, acyclic collection of workflow steps sharing a `workflow_id`.
///
/// Acyclicity is an invariant enforced by `orchestry-core` graph validation
/// before any critical-path computation; this struct only carries the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow identifier (matches the mission_id it was built from).
    pub workflow_id: String,
    /// Steps in insertion order.
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    /// Create an empty workflow.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            steps: Vec::new(),
        }
    }

    /// Look up a step by ID.
    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Mutable lookup by ID.
    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut WorkflowStep> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
