//! Step execution port.
//!
//! The trigger drives the workflow state machine but does not know how to
//! perform a step; the embedding application supplies a [`StepRunner`].
//! The trait is object-safe so runners can be stored as `Arc<dyn StepRunner>`
//! inside the trigger.

use std::pin::Pin;

use orchestry_types::execution::StepOutcome;
use orchestry_types::mission::MissionContext;
use orchestry_types::workflow::WorkflowStep;

/// Executes a single workflow step on behalf of the trigger.
///
/// Runners report failure through [`StepOutcome::failed`], never by
/// panicking; a panic inside a runner poisons the execution task.
pub trait StepRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        step: &'a WorkflowStep,
        mission: &'a MissionContext,
    ) -> Pin<Box<dyn Future<Output = StepOutcome> + Send + 'a>>;
}

/// Runner that completes every step immediately with a summary payload.
///
/// Useful for dry runs and as the default when no real agent backend is
/// wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStepRunner;

impl StepRunner for NoopStepRunner {
    fn run<'a>(
        &'a self,
        step: &'a WorkflowStep,
        mission: &'a MissionContext,
    ) -> Pin<Box<dyn Future<Output = StepOutcome> + Send + 'a>> {
        Box::pin(async move {
            StepOutcome::ok(serde_json::json!({
                "step_id": step.step_id,
                "phase": step.phase.as_str(),
                "mission_id": mission.mission_id,
                "simulated": true,
            }))
        })
    }
}
