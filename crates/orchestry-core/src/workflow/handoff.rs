//! Mission readiness validation and handoff coordination.
//!
//! `validate_readiness` is a pure function over the mission context; it
//! performs no I/O and recovers every finding into a [`ValidationResult`]
//! instead of returning an error. `coordinate_handoff` wraps validation and,
//! on success, delegates to the execution trigger.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use orchestry_types::config::HandoffConfig;
use orchestry_types::handoff::{
    HandoffResult, HandoffState, ValidationCode, ValidationIssue, ValidationResult,
};
use orchestry_types::mission::MissionContext;

use crate::repository::CheckpointRepository;
use crate::workflow::trigger::ExecutionTrigger;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check whether a mission is ready to enter execution.
///
/// Errors block handoff; warnings are advisory and never affect validity.
pub fn validate_readiness(
    mission: &MissionContext,
    config: &HandoffConfig,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if mission.mission_id.trim().is_empty() {
        errors.push(ValidationIssue::new(
            ValidationCode::EmptyMissionId,
            "mission_id must not be empty",
        ));
    }
    if mission.mission_name.trim().is_empty() {
        errors.push(ValidationIssue::new(
            ValidationCode::EmptyMissionName,
            "mission_name must not be empty",
        ));
    }
    if mission.objectives.is_empty() {
        errors.push(ValidationIssue::new(
            ValidationCode::NoObjectives,
            "mission must declare at least one objective",
        ));
    }
    if mission.constraints.max_duration_hours <= 0.0 {
        errors.push(ValidationIssue::new(
            ValidationCode::InvalidDuration,
            format!(
                "max_duration_hours must be positive, got {}",
                mission.constraints.max_duration_hours
            ),
        ));
    }
    if mission.constraints.max_personas == 0 {
        errors.push(ValidationIssue::new(
            ValidationCode::InvalidPersonaLimit,
            "max_personas must be positive",
        ));
    }

    if mission.team_composition.is_empty() {
        warnings.push("team_composition is empty; default role assignments will be used".to_string());
    }
    if mission.constraints.max_duration_hours > config.long_mission_warning_hours {
        warnings.push(format!(
            "max_duration_hours {} exceeds {}h; long missions are harder to resume",
            mission.constraints.max_duration_hours, config.long_mission_warning_hours
        ));
    }

    ValidationResult::from_findings(errors, warnings)
}

// ---------------------------------------------------------------------------
// Coordination
// ---------------------------------------------------------------------------

/// Validate a mission and, on success, hand it to the execution trigger.
///
/// The handoff moves `Pending -> Validating -> (Failed, stop)` or
/// `-> Triggering -> Completed`. Validation can be bypassed through
/// `config.enable_validation` for trusted contexts; a bypassed handoff
/// forwards the context unchecked.
pub async fn coordinate_handoff<R>(
    trigger: &ExecutionTrigger<R>,
    mission: MissionContext,
    config: &HandoffConfig,
) -> HandoffResult
where
    R: CheckpointRepository + 'static,
{
    let handoff_id = Uuid::now_v7();
    let mission_id = mission.mission_id.clone();
    let started_at = Utc::now();
    let started = std::time::Instant::now();

    info!(handoff_id = %handoff_id, mission_id = %mission_id, "handoff started");

    if config.enable_validation {
        let validation = validate_readiness(&mission, config);
        for warning in &validation.warnings {
            warn!(handoff_id = %handoff_id, mission_id = %mission_id, %warning, "handoff warning");
        }
        if !validation.is_valid {
            let detail = validation
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            warn!(handoff_id = %handoff_id, mission_id = %mission_id, error = %detail, "handoff rejected");
            return HandoffResult {
                handoff_id,
                mission_id,
                state: HandoffState::Failed,
                execution_id: None,
                error: Some(detail),
                duration_seconds: started.elapsed().as_secs_f64(),
                started_at,
            };
        }
    } else {
        warn!(handoff_id = %handoff_id, mission_id = %mission_id, "validation bypassed");
    }

    match trigger.trigger_execution(mission).await {
        Ok(handle) => {
            info!(
                handoff_id = %handoff_id,
                mission_id = %mission_id,
                execution_id = %handle.execution_id,
                "handoff completed"
            );
            HandoffResult {
                handoff_id,
                mission_id,
                state: HandoffState::Completed,
                execution_id: Some(handle.execution_id),
                error: None,
                duration_seconds: started.elapsed().as_secs_f64(),
                started_at,
            }
        }
        Err(err) => HandoffResult {
            handoff_id,
            mission_id,
            state: HandoffState::Failed,
            execution_id: None,
            error: Some(err.to_string()),
            duration_seconds: started.elapsed().as_secs_f64(),
            started_at,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
