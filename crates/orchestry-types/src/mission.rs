//! Mission specification types.
//!
//! A `MissionContext` is the caller-owned description of a unit of work
//! submitted for execution. It is consumed once by the handoff validator and
//! the execution trigger, and never mutated afterward. YAML files and
//! programmatic construction both converge on this struct.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MissionContext
// ---------------------------------------------------------------------------

/// The specification handed to the orchestrator.
///
/// Ownership stays with the caller until handoff; once validation passes the
/// orchestrator takes over and the context is treated as immutable input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionContext {
    /// Unique mission identifier (caller-assigned).
    pub mission_id: String,
    /// Human-readable mission name.
    pub mission_name: String,
    /// Ordered, non-empty list of objectives to accomplish.
    pub objectives: Vec<String>,
    /// Role -> agent identifier assignments.
    #[serde(default)]
    pub team_composition: HashMap<String, String>,
    /// Resource and policy constraints.
    pub constraints: MissionConstraints,
    /// Named input artifacts (documents, repos, prior results).
    #[serde(default)]
    pub artifacts: HashMap<String, serde_json::Value>,
    /// Specification version string (e.g. "1.0").
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl MissionContext {
    /// A minimal mission with default constraints; callers fill in
    /// objectives and team assignments afterwards.
    pub fn new(mission_id: impl Into<String>, mission_name: impl Into<String>) -> Self {
        Self {
            mission_id: mission_id.into(),
            mission_name: mission_name.into(),
            objectives: Vec::new(),
            team_composition: HashMap::new(),
            constraints: MissionConstraints::default(),
            artifacts: HashMap::new(),
            version: default_version(),
        }
    }

    /// Parse a mission specification from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml_ng::Error> {
        serde_yaml_ng::from_str(yaml)
    }

    /// Serialize the mission specification to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml_ng::Error> {
        serde_yaml_ng::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// MissionConstraints
// ---------------------------------------------------------------------------

/// Resource and policy constraints for a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionConstraints {
    /// Maximum wall-clock budget in hours. Must be > 0 to pass validation.
    pub max_duration_hours: f64,
    /// Maximum number of personas/agents that may participate. Must be > 0.
    pub max_personas: u32,
    /// Optional cost ceiling in account currency units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<f64>,
    /// Whether a human must review results before completion.
    #[serde(default)]
    pub require_human_review: bool,
}

impl Default for MissionConstraints {
    fn default() -> Self {
        Self {
            max_duration_hours: 8.0,
            max_personas: 5,
            max_cost: None,
            require_human_review: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Admission priority for a mission execution.
///
/// Ordering is highest-first for queue purposes: `Critical` beats `High`
/// beats `Normal`, and so on. The derived `Ord` follows declaration order,
/// so `Critical < High` numerically; the admission queue inverts this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Background,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
