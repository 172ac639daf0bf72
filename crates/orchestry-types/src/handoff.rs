//! Handoff and validation result types.
//!
//! A handoff is the validated transfer of a `MissionContext` from the caller
//! into the execution engine. Validation failures are recovered into
//! `ValidationResult` values, never raised as errors across the boundary;
//! callers check `is_valid` / `state` instead of catching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Machine-readable codes for blocking validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    EmptyMissionId,
    EmptyMissionName,
    NoObjectives,
    InvalidDuration,
    InvalidPersonaLimit,
}

/// One validation finding: a code plus a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: ValidationCode,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Outcome of mission readiness validation.
///
/// `is_valid` is true iff `errors` is empty; warnings never affect validity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Build a result from collected findings; validity is derived.
    pub fn from_findings(errors: Vec<ValidationIssue>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Whether a specific error code was raised.
    pub fn has_error(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

// ---------------------------------------------------------------------------
// HandoffState / HandoffResult
// ---------------------------------------------------------------------------

/// State of a mission handoff.
///
/// `Pending -> Validating -> (Failed stop) | Triggering -> Completed`.
/// `Cancelled` applies when the caller withdraws the handoff before
/// triggering completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffState {
    Pending,
    Validating,
    Triggering,
    Completed,
    Failed,
    Cancelled,
}

/// Result of a `coordinate_handoff` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffResult {
    /// UUIDv7 handoff ID, independent per call.
    pub handoff_id: Uuid,
    /// Mission being handed off.
    pub mission_id: String,
    /// Final handoff state.
    pub state: HandoffState,
    /// Execution ID, set once triggering succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    /// Error message for Failed/Cancelled handoffs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration of the handoff itself.
    pub duration_seconds: f64,
    /// When the handoff was initiated.
    pub started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_derived_from_errors() {
        let ok = ValidationResult::from_findings(vec![], vec!["minor".to_string()]);
        assert!(ok.is_valid);

        let bad = ValidationResult::from_findings(
            vec![ValidationIssue::new(
                ValidationCode::EmptyMissionId,
                "mission_id must not be empty",
            )],
            vec![],
        );
        assert!(!bad.is_valid);
        assert!(bad.has_error(ValidationCode::EmptyMissionId));
        assert!(!bad.has_error(ValidationCode::NoObjectives));
    }

    #[test]
    fn test_validation_code_serde_screaming() {
        let json = serde_json::to_string(&ValidationCode::InvalidDuration).unwrap();
        assert_eq!(json, "\"INVALID_DURATION\"");
        let parsed: ValidationCode = serde_json::from_str("\"NO_OBJECTIVES\"").unwrap();
        assert_eq!(parsed, ValidationCode::NoObjectives);
    }

    #[test]
    fn test_handoff_result_json_roundtrip() {
        let result = HandoffResult {
            handoff_id: Uuid::now_v7(),
            mission_id: "m-1".to_string(),
            state: HandoffState::Completed,
            execution_id: Some(Uuid::now_v7()),
            error: None,
            duration_seconds: 0.02,
            started_at: Utc::now(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: HandoffResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.state, HandoffState::Completed);
        assert!(parsed.execution_id.is_some());
    }
}
