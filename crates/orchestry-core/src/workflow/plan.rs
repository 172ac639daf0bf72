//! Builds the standard SDLC workflow for a mission.
//!
//! One development step per objective, fanned out between a linear
//! requirements/design prefix and a testing/deployment suffix. A human
//! review step is inserted before deployment when the mission's
//! constraints ask for it.

use orchestry_types::mission::MissionContext;
use orchestry_types::workflow::{SdlcPhase, Workflow, WorkflowStep};

const REQUIREMENTS_HOURS: f64 = 1.0;
const DESIGN_HOURS: f64 = 2.0;
const DEVELOP_HOURS: f64 = 4.0;
const TESTING_HOURS: f64 = 2.0;
const REVIEW_HOURS: f64 = 1.0;
const DEPLOY_HOURS: f64 = 1.0;

/// Derive a workflow from a mission specification. The workflow id is the
/// mission id, so checkpoints from a prior run of the same mission are
/// found on resume.
pub fn build_workflow(mission: &MissionContext) -> Workflow {
    let mut steps = Vec::new();

    steps.push(
        WorkflowStep::new("requirements", "Gather requirements", SdlcPhase::Requirements)
            .with_duration(REQUIREMENTS_HOURS)
            .with_assignee(assignee_for(mission, "analyst")),
    );
    steps.push(
        WorkflowStep::new("design", "Design solution", SdlcPhase::Design)
            .with_duration(DESIGN_HOURS)
            .with_dependency("requirements")
            .with_assignee(assignee_for(mission, "architect")),
    );

    let mut develop_ids = Vec::new();
    for (i, objective) in mission.objectives.iter().enumerate() {
        let step_id = format!("develop-{i}");
        steps.push(
            WorkflowStep::new(step_id.as_str(), objective.as_str(), SdlcPhase::Development)
                .with_duration(DEVELOP_HOURS)
                .with_dependency("design")
                .with_assignee(assignee_for(mission, "developer")),
        );
        develop_ids.push(step_id);
    }

    let mut testing =
        WorkflowStep::new("testing", "Integration testing", SdlcPhase::Testing)
            .with_duration(TESTING_HOURS)
            .with_assignee(assignee_for(mission, "tester"));
    for id in &develop_ids {
        testing = testing.with_dependency(id.as_str());
    }
    if develop_ids.is_empty() {
        testing = testing.with_dependency("design");
    }
    steps.push(testing);

    let deploy_dep = if mission.constraints.require_human_review {
        steps.push(
            WorkflowStep::new("review", "Human review", SdlcPhase::Testing)
                .with_duration(REVIEW_HOURS)
                .with_dependency("testing"),
        );
        "review"
    } else {
        "testing"
    };

    steps.push(
        WorkflowStep::new("deploy", "Deploy", SdlcPhase::Deployment)
            .with_duration(DEPLOY_HOURS)
            .with_dependency(deploy_dep)
            .with_assignee(assignee_for(mission, "operator")),
    );

    Workflow {
        workflow_id: mission.mission_id.clone(),
        steps,
    }
}

fn assignee_for(mission: &MissionContext, role: &str) -> String {
    mission
        .team_composition
        .get(role)
        .cloned()
        .unwrap_or_else(|| role.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
