//! Checkpoint repository trait definition.
//!
//! Defines the persistence interface the execution trigger needs: writing a
//! progress snapshot after every terminal step transition and reading the
//! newest valid snapshot back on resume. The infrastructure layer
//! (orchestry-infra) implements this trait with filesystem persistence,
//! including rotation, age cleanup, and archival on top.

use orchestry_types::checkpoint::Checkpoint;
use orchestry_types::error::StoreError;
use orchestry_types::workflow::SdlcPhase;

/// Repository trait for checkpoint persistence.
///
/// Uses native async fn in traits via return-position `impl Trait`
/// (Rust 2024 edition, no async_trait macro). Version assignment is the
/// store's responsibility: `save` returns the checkpoint it actually wrote,
/// including the assigned monotonic version.
pub trait CheckpointRepository: Send + Sync {
    /// Persist a new checkpoint for `(workflow_id, phase)`.
    ///
    /// The store assigns the next version for that pair and timestamps the
    /// snapshot; retention (rotation) is applied after the write.
    fn save(
        &self,
        workflow_id: &str,
        phase: SdlcPhase,
        payload: serde_json::Value,
        is_synthetic: bool,
    ) -> impl std::future::Future<Output = Result<Checkpoint, StoreError>> + Send;

    /// Get the newest valid checkpoint for a workflow, if any.
    ///
    /// Corrupt checkpoints are excluded from candidates; they never surface
    /// here and never fail the call.
    fn latest(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, StoreError>> + Send;

    /// Get the newest valid checkpoint for a specific phase of a workflow.
    fn for_phase(
        &self,
        workflow_id: &str,
        phase: SdlcPhase,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, StoreError>> + Send;
}
