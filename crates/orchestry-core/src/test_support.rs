//! In-memory checkpoint repository for core tests.

use std::sync::Mutex;

use std::collections::HashMap;

use orchestry_types::checkpoint::Checkpoint;
use orchestry_types::error::StoreError;
use orchestry_types::workflow::SdlcPhase;

use crate::repository::CheckpointRepository;

/// Map-backed store with the same versioning contract as the filesystem
/// implementation: versions are monotonic per `(workflow_id, phase)`.
pub(crate) struct MemoryCheckpointRepository {
    checkpoints: Mutex<HashMap<String, Vec<Checkpoint>>>,
}

impl MemoryCheckpointRepository {
    pub(crate) fn new() -> Self {
        Self {
            checkpoints: Mutex::new(HashMap::new()),
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Checkpoint>>> {
        self.checkpoints.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CheckpointRepository for MemoryCheckpointRepository {
    async fn save(
        &self,
        workflow_id: &str,
        phase: SdlcPhase,
        payload: serde_json::Value,
        is_synthetic: bool,
    ) -> Result<Checkpoint, StoreError> {
        let mut map = self.guard();
        let list = map.entry(workflow_id.to_string()).or_default();
        let version = list
            .iter()
            .filter(|c| c.phase == phase)
            .map(|c| c.version)
            .max()
            .unwrap_or(0)
            + 1;
        let mut checkpoint = Checkpoint::new(workflow_id, phase, version, payload);
        checkpoint.is_synthetic = is_synthetic;
        list.push(checkpoint.clone());
        Ok(checkpoint)
    }

    async fn latest(&self, workflow_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.guard().get(workflow_id).and_then(|list| {
            list.iter()
                .max_by_key(|c| (c.created_at, c.version))
                .cloned()
        }))
    }

    async fn for_phase(
        &self,
        workflow_id: &str,
        phase: SdlcPhase,
    ) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.guard().get(workflow_id).and_then(|list| {
            list.iter()
                .filter(|c| c.phase == phase)
                .max_by_key(|c| (c.created_at, c.version))
                .cloned()
        }))
    }
}
