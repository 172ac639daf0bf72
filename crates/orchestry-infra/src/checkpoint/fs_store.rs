//! Filesystem-backed checkpoint store.
//!
//! Implements the `CheckpointRepository` trait from `orchestry-core` with
//! checkpoints stored at `{root}/{workflow_id}/{phase}_{version}.json`, plus
//! the retention and operational surface on top: rotation, age-based
//! cleanup, validation, archival, and storage statistics.
//!
//! Directory layout:
//! ```text
//! {root}/
//!   index.json                     # workflow -> checkpoint files
//!   archives/
//!     {workflow_id}.json.gz        # compressed checkpoint bundles
//!   {workflow_id}/
//!     requirements_00001.json
//!     development_00003.json
//! ```
//!
//! The directory tree is the source of truth; `index.json` mirrors it and is
//! rewritten atomically (temp file + rename) after every mutating operation,
//! so a crash between operations cannot leave the index referencing deleted
//! files or omitting existing ones.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use orchestry_core::repository::CheckpointRepository;
use orchestry_types::checkpoint::{Checkpoint, StorageStats};
use orchestry_types::config::CheckpointStoreConfig;
use orchestry_types::error::StoreError;
use orchestry_types::workflow::SdlcPhase;

const INDEX_FILE: &str = "index.json";
const ARCHIVE_DIR: &str = "archives";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointIndex {
    workflows: BTreeMap<String, IndexEntry>,
}

/// Per-workflow index record: the files on disk plus the phase and timestamp
/// of the newest checkpoint, so ops tooling can read progress without
/// touching the checkpoint files themselves.
///
/// `versions` is the per-phase high-water mark. Version assignment reads it
/// instead of the surviving files, so rotating or cleaning up every
/// checkpoint of a phase never restarts that phase's counter.
#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    files: Vec<String>,
    latest_phase: Option<SdlcPhase>,
    updated_at: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    versions: BTreeMap<SdlcPhase, u64>,
}

/// Filesystem-backed checkpoint store with rotation and archival.
pub struct FsCheckpointStore {
    root: PathBuf,
    config: CheckpointStoreConfig,
    // Serializes mutating operations: version assignment, rotation, cleanup,
    // deletion, and the index rewrite that follows each of them.
    write_lock: tokio::sync::Mutex<()>,
}

impl FsCheckpointStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(
        root: impl Into<PathBuf>,
        config: CheckpointStoreConfig,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tokio::fs::create_dir_all(root.join(ARCHIVE_DIR)).await?;
        Ok(Self {
            root,
            config,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn workflow_dir(&self, workflow_id: &str) -> PathBuf {
        self.root.join(workflow_id)
    }

    fn checkpoint_path(&self, workflow_id: &str, phase: SdlcPhase, version: u64) -> PathBuf {
        self.workflow_dir(workflow_id)
            .join(format!("{}_{version:05}.json", phase.as_str()))
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    /// Workflow ids that currently have a checkpoint directory, sorted.
    pub async fn list_workflows(&self) -> Result<Vec<String>, StoreError> {
        let mut workflows = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == ARCHIVE_DIR {
                continue;
            }
            workflows.push(name);
        }
        workflows.sort();
        Ok(workflows)
    }

    /// All valid checkpoints for a workflow, newest first.
    ///
    /// Corrupt files are skipped with a warning; they never fail the call
    /// and never surface as candidates.
    pub async fn list_checkpoints(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<Checkpoint>, StoreError> {
        let mut checkpoints: Vec<Checkpoint> = self
            .load_valid(workflow_id)
            .await?
            .into_iter()
            .map(|(_, cp)| cp)
            .collect();
        checkpoints.sort_by(|a, b| {
            (b.created_at, b.version).cmp(&(a.created_at, a.version))
        });
        Ok(checkpoints)
    }

    /// Newest valid checkpoint for a workflow, if any.
    pub async fn get_latest_checkpoint(
        &self,
        workflow_id: &str,
    ) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.list_checkpoints(workflow_id).await?.into_iter().next())
    }

    /// Newest valid checkpoint for a specific phase, if any.
    pub async fn get_checkpoint_for_phase(
        &self,
        workflow_id: &str,
        phase: SdlcPhase,
    ) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self
            .list_checkpoints(workflow_id)
            .await?
            .into_iter()
            .find(|cp| cp.phase == phase))
    }

    // -----------------------------------------------------------------------
    // Writing / retention
    // -----------------------------------------------------------------------

    /// Persist a checkpoint, assigning the next version for
    /// `(workflow_id, phase)`, then apply rotation.
    pub async fn save_checkpoint(
        &self,
        workflow_id: &str,
        phase: SdlcPhase,
        payload: serde_json::Value,
        is_synthetic: bool,
    ) -> Result<Checkpoint, StoreError> {
        let _guard = self.write_lock.lock().await;

        let dir = self.workflow_dir(workflow_id);
        tokio::fs::create_dir_all(&dir).await?;

        // The high-water mark in the index outlives rotated-out files, so a
        // phase whose checkpoints were all deleted still gets the next
        // version rather than restarting at 1.
        let on_disk = self
            .load_valid(workflow_id)
            .await?
            .iter()
            .filter(|(_, cp)| cp.phase == phase)
            .map(|(_, cp)| cp.version)
            .max()
            .unwrap_or(0);
        let high_water = self
            .load_index()
            .await
            .workflows
            .get(workflow_id)
            .and_then(|entry| entry.versions.get(&phase))
            .copied()
            .unwrap_or(0);
        let version = on_disk.max(high_water) + 1;

        let mut checkpoint = Checkpoint::new(workflow_id, phase, version, payload);
        if is_synthetic {
            checkpoint = checkpoint.synthetic();
        }

        let path = self.checkpoint_path(workflow_id, phase, version);
        let bytes = serde_json::to_vec_pretty(&checkpoint)?;
        write_atomic(&path, &bytes).await?;

        debug!(
            workflow_id,
            phase = phase.as_str(),
            version,
            is_synthetic,
            "checkpoint written"
        );

        let rotated = self.rotate_locked(workflow_id).await?;
        if rotated > 0 {
            debug!(workflow_id, rotated, "rotation after write");
        }
        self.rewrite_index().await?;
        Ok(checkpoint)
    }

    /// Delete the oldest checkpoints of a workflow until at most
    /// `max_checkpoints_per_workflow` remain; returns the number deleted.
    /// Idempotent: a second call deletes nothing.
    pub async fn rotate_checkpoints(&self, workflow_id: &str) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let deleted = self.rotate_locked(workflow_id).await?;
        self.rewrite_index().await?;
        Ok(deleted)
    }

    async fn rotate_locked(&self, workflow_id: &str) -> Result<usize, StoreError> {
        let mut entries = self.load_valid(workflow_id).await?;
        let limit = self.config.max_checkpoints_per_workflow;
        if entries.len() <= limit {
            return Ok(0);
        }

        // Oldest first; retention keeps the most recent `limit`.
        entries.sort_by(|(_, a), (_, b)| (a.created_at, a.version).cmp(&(b.created_at, b.version)));
        let excess = entries.len() - limit;
        let mut deleted = 0;
        for (path, cp) in entries.into_iter().take(excess) {
            tokio::fs::remove_file(&path).await?;
            deleted += 1;
            debug!(
                workflow_id,
                phase = cp.phase.as_str(),
                version = cp.version,
                "rotated out checkpoint"
            );
        }
        Ok(deleted)
    }

    /// Delete checkpoints older than `max_age_days` across all workflows in
    /// a single pass. Returns the affected workflow ids and the total number
    /// of deletions.
    pub async fn cleanup_old_checkpoints(
        &self,
    ) -> Result<(Vec<String>, usize), StoreError> {
        let _guard = self.write_lock.lock().await;
        let cutoff = Utc::now() - Duration::days(i64::from(self.config.max_age_days));

        let mut affected = Vec::new();
        let mut total_deleted = 0;
        for workflow_id in self.list_workflows().await? {
            let mut deleted_here = 0;
            for (path, cp) in self.load_valid(&workflow_id).await? {
                if cp.created_at < cutoff {
                    tokio::fs::remove_file(&path).await?;
                    deleted_here += 1;
                }
            }
            if deleted_here > 0 {
                affected.push(workflow_id);
                total_deleted += deleted_here;
            }
        }

        if total_deleted > 0 {
            info!(
                workflows = affected.len(),
                deleted = total_deleted,
                max_age_days = self.config.max_age_days,
                "age-based checkpoint cleanup"
            );
        }
        self.rewrite_index().await?;
        Ok((affected, total_deleted))
    }

    /// Remove every checkpoint for a workflow. Returns `false` when the
    /// workflow has no checkpoint directory.
    pub async fn delete_workflow_checkpoints(
        &self,
        workflow_id: &str,
    ) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let dir = self.workflow_dir(workflow_id);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&dir).await?;
        self.rewrite_index().await?;
        info!(workflow_id, "workflow checkpoints deleted");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Validation / archival / stats
    // -----------------------------------------------------------------------

    /// Check a single checkpoint file. Returns `(is_valid, reason)` where
    /// the reason explains the first problem found. Never errors: an
    /// unreadable file is simply invalid.
    pub async fn validate_checkpoint(&self, path: &Path) -> (bool, Option<String>) {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return (false, Some("file does not exist".to_string()));
            }
            Err(err) => return (false, Some(format!("unreadable: {err}"))),
        };
        let checkpoint: Checkpoint = match serde_json::from_slice(&bytes) {
            Ok(cp) => cp,
            Err(err) => return (false, Some(format!("malformed checkpoint: {err}"))),
        };
        if checkpoint.workflow_id.is_empty() {
            return (false, Some("missing workflow_id".to_string()));
        }
        if checkpoint.version == 0 {
            return (false, Some("version must be positive".to_string()));
        }
        (true, None)
    }

    /// Bundle all checkpoints of a workflow into a single gzip-compressed
    /// JSON file under `{root}/archives/` and return its path. A workflow
    /// with no checkpoints yields `Ok(None)`, not an error.
    pub async fn archive_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Option<PathBuf>, StoreError> {
        let checkpoints = self.list_checkpoints(workflow_id).await?;
        if checkpoints.is_empty() {
            return Ok(None);
        }

        let json = serde_json::to_vec_pretty(&checkpoints)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;

        let path = self
            .root
            .join(ARCHIVE_DIR)
            .join(format!("{workflow_id}.json.gz"));
        write_atomic(&path, &compressed).await?;

        info!(
            workflow_id,
            checkpoints = checkpoints.len(),
            bytes = compressed.len(),
            "workflow archived"
        );
        Ok(Some(path))
    }

    /// Aggregate counts and sizes across the whole store.
    pub async fn storage_stats(&self) -> Result<StorageStats, StoreError> {
        let mut stats = StorageStats::default();
        for workflow_id in self.list_workflows().await? {
            let entries = self.load_valid(&workflow_id).await?;
            if entries.is_empty() {
                continue;
            }
            stats.workflow_count += 1;
            for (path, cp) in entries {
                stats.checkpoint_count += 1;
                stats.total_bytes += tokio::fs::metadata(&path).await?.len();
                stats.oldest = Some(match stats.oldest {
                    Some(t) if t <= cp.created_at => t,
                    _ => cp.created_at,
                });
                stats.newest = Some(match stats.newest {
                    Some(t) if t >= cp.created_at => t,
                    _ => cp.created_at,
                });
            }
        }
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Load every parseable checkpoint file for a workflow with its path.
    /// Corrupt files are skipped with a warning.
    async fn load_valid(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<(PathBuf, Checkpoint)>, StoreError> {
        let dir = self.workflow_dir(workflow_id);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let (valid, reason) = self.validate_checkpoint(&path).await;
            if !valid {
                warn!(
                    workflow_id,
                    path = %path.display(),
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "skipping corrupt checkpoint"
                );
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
            results.push((path, checkpoint));
        }
        Ok(results)
    }

    /// Read `index.json`, falling back to an empty index when the file is
    /// missing or unreadable. The directory tree is the source of truth for
    /// everything except the version high-water marks.
    async fn load_index(&self) -> CheckpointIndex {
        match tokio::fs::read(self.root.join(INDEX_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(error = %err, "index unreadable, rebuilding from scratch");
                CheckpointIndex::default()
            }),
            Err(_) => CheckpointIndex::default(),
        }
    }

    /// Rebuild `index.json` from the directory tree and swap it in place.
    /// Version high-water marks are carried over from the previous index and
    /// only ever raised, so they survive rotation and cleanup.
    async fn rewrite_index(&self) -> Result<(), StoreError> {
        let previous = self.load_index().await;
        let mut index = CheckpointIndex::default();
        for workflow_id in self.list_workflows().await? {
            let entries = self.load_valid(&workflow_id).await?;
            let newest = entries
                .iter()
                .map(|(_, cp)| cp)
                .max_by_key(|cp| (cp.created_at, cp.version));
            let latest_phase = newest.map(|cp| cp.phase);
            let updated_at = newest.map(|cp| cp.created_at);

            let mut versions = previous
                .workflows
                .get(&workflow_id)
                .map(|entry| entry.versions.clone())
                .unwrap_or_default();
            for (_, cp) in &entries {
                let mark = versions.entry(cp.phase).or_insert(0);
                *mark = (*mark).max(cp.version);
            }

            let files = entries
                .into_iter()
                .filter_map(|(path, _)| {
                    path.file_name()
                        .map(|n| format!("{workflow_id}/{}", n.to_string_lossy()))
                })
                .collect::<Vec<_>>();
            index.workflows.insert(
                workflow_id,
                IndexEntry {
                    files,
                    latest_phase,
                    updated_at,
                    versions,
                },
            );
        }
        let bytes = serde_json::to_vec_pretty(&index)?;
        write_atomic(&self.root.join(INDEX_FILE), &bytes).await
    }
}

/// Write through a temp file in the same directory, then rename over the
/// destination. Rename within one directory is atomic on POSIX filesystems.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CheckpointRepository
// ---------------------------------------------------------------------------

impl CheckpointRepository for FsCheckpointStore {
    async fn save(
        &self,
        workflow_id: &str,
        phase: SdlcPhase,
        payload: serde_json::Value,
        is_synthetic: bool,
    ) -> Result<Checkpoint, StoreError> {
        self.save_checkpoint(workflow_id, phase, payload, is_synthetic)
            .await
    }

    async fn latest(&self, workflow_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        self.get_latest_checkpoint(workflow_id).await
    }

    async fn for_phase(
        &self,
        workflow_id: &str,
        phase: SdlcPhase,
    ) -> Result<Option<Checkpoint>, StoreError> {
        self.get_checkpoint_for_phase(workflow_id, phase).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn store(tmp: &TempDir) -> FsCheckpointStore {
        FsCheckpointStore::open(tmp.path(), CheckpointStoreConfig::default())
            .await
            .unwrap()
    }

    async fn store_with(tmp: &TempDir, config: CheckpointStoreConfig) -> FsCheckpointStore {
        FsCheckpointStore::open(tmp.path(), config).await.unwrap()
    }

    fn payload(steps: &[&str]) -> serde_json::Value {
        json!({ "completed_steps": steps, "failed_steps": [], "step_outputs": {} })
    }

    // -- save / read --------------------------------------------------------

    #[tokio::test]
    async fn save_assigns_monotonic_versions_per_phase() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        let a = store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&["a"]), false)
            .await
            .unwrap();
        let b = store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&["a", "b"]), false)
            .await
            .unwrap();
        let other_phase = store
            .save_checkpoint("wf", SdlcPhase::Testing, payload(&["a"]), false)
            .await
            .unwrap();

        assert_eq!(a.version, 1);
        assert_eq!(b.version, 2);
        // Versions are per (workflow, phase).
        assert_eq!(other_phase.version, 1);
    }

    #[tokio::test]
    async fn latest_is_the_most_recent_write() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        store
            .save_checkpoint("wf", SdlcPhase::Requirements, payload(&[]), true)
            .await
            .unwrap();
        store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&["req"]), false)
            .await
            .unwrap();

        let latest = store.get_latest_checkpoint("wf").await.unwrap().unwrap();
        assert_eq!(latest.phase, SdlcPhase::Design);
        assert!(!latest.is_synthetic);
        assert_eq!(latest.completed_steps(), vec!["req".to_string()]);
    }

    #[tokio::test]
    async fn saved_payload_reads_back_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        let written = json!({
            "completed_steps": ["requirements", "design"],
            "failed_steps": [],
            "step_outputs": { "design": { "doc": "v2", "pages": 14 } },
        });
        let saved = store
            .save_checkpoint("wf", SdlcPhase::Design, written.clone(), false)
            .await
            .unwrap();

        let read = store
            .get_checkpoint_for_phase("wf", SdlcPhase::Design)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.payload, written);
        assert_eq!(read.version, saved.version);
    }

    #[tokio::test]
    async fn latest_on_empty_store_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        assert!(store.get_latest_checkpoint("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn for_phase_filters_correctly() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&["a"]), false)
            .await
            .unwrap();
        store
            .save_checkpoint("wf", SdlcPhase::Testing, payload(&["a", "b"]), false)
            .await
            .unwrap();

        let design = store
            .get_checkpoint_for_phase("wf", SdlcPhase::Design)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(design.phase, SdlcPhase::Design);
        assert!(store
            .get_checkpoint_for_phase("wf", SdlcPhase::Deployment)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_checkpoints_is_newest_first() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        for i in 0..3 {
            store
                .save_checkpoint("wf", SdlcPhase::Development, payload(&[]), false)
                .await
                .unwrap();
            let _ = i;
        }
        let list = store.list_checkpoints("wf").await.unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.windows(2).all(|w| (w[0].created_at, w[0].version)
            >= (w[1].created_at, w[1].version)));
    }

    #[tokio::test]
    async fn list_workflows_excludes_internals() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .save_checkpoint("wf-b", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();
        store
            .save_checkpoint("wf-a", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();
        store.archive_workflow("wf-a").await.unwrap();

        assert_eq!(
            store.list_workflows().await.unwrap(),
            vec!["wf-a".to_string(), "wf-b".to_string()]
        );
    }

    // -- rotation -----------------------------------------------------------

    #[tokio::test]
    async fn rotation_keeps_most_recent_checkpoints() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(
            &tmp,
            CheckpointStoreConfig {
                max_checkpoints_per_workflow: 3,
                ..CheckpointStoreConfig::default()
            },
        )
        .await;

        // Rotation runs inside save, so the count never exceeds the limit.
        for i in 0..5u64 {
            store
                .save_checkpoint(
                    "wf",
                    SdlcPhase::Development,
                    json!({ "completed_steps": [], "marker": i }),
                    false,
                )
                .await
                .unwrap();
        }

        let list = store.list_checkpoints("wf").await.unwrap();
        assert_eq!(list.len(), 3);
        // Versions 3, 4, 5 survive.
        let mut versions: Vec<u64> = list.iter().map(|c| c.version).collect();
        versions.sort();
        assert_eq!(versions, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn versions_never_restart_after_rotation_deletes_a_phase() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(
            &tmp,
            CheckpointStoreConfig {
                max_checkpoints_per_workflow: 2,
                ..CheckpointStoreConfig::default()
            },
        )
        .await;

        let first = store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();
        assert_eq!(first.version, 1);

        // Two saves in other phases rotate every Design checkpoint out.
        store
            .save_checkpoint("wf", SdlcPhase::Testing, payload(&[]), false)
            .await
            .unwrap();
        store
            .save_checkpoint("wf", SdlcPhase::Deployment, payload(&[]), false)
            .await
            .unwrap();
        assert!(store
            .get_checkpoint_for_phase("wf", SdlcPhase::Design)
            .await
            .unwrap()
            .is_none());

        // The counter survives in the index; the next Design save continues.
        let second = store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();
        assert_eq!(second.version, first.version + 1);
    }

    #[tokio::test]
    async fn rotation_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(
            &tmp,
            CheckpointStoreConfig {
                max_checkpoints_per_workflow: 2,
                ..CheckpointStoreConfig::default()
            },
        )
        .await;
        for _ in 0..4 {
            store
                .save_checkpoint("wf", SdlcPhase::Design, payload(&[]), false)
                .await
                .unwrap();
        }
        // Saves already rotated; an explicit call finds nothing to do.
        assert_eq!(store.rotate_checkpoints("wf").await.unwrap(), 0);
        assert_eq!(store.rotate_checkpoints("wf").await.unwrap(), 0);
        assert_eq!(store.list_checkpoints("wf").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rotation_under_limit_deletes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();
        assert_eq!(store.rotate_checkpoints("wf").await.unwrap(), 0);
    }

    // -- cleanup ------------------------------------------------------------

    #[tokio::test]
    async fn cleanup_deletes_old_checkpoints_across_workflows() {
        let tmp = TempDir::new().unwrap();
        let store = store_with(
            &tmp,
            CheckpointStoreConfig {
                max_age_days: 7,
                ..CheckpointStoreConfig::default()
            },
        )
        .await;

        store
            .save_checkpoint("fresh", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();

        // Write an old checkpoint by hand; `save` always stamps now.
        let old = {
            let mut cp = Checkpoint::new("stale", SdlcPhase::Design, 1, payload(&[]));
            cp.created_at = Utc::now() - Duration::days(30);
            cp
        };
        let dir = tmp.path().join("stale");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join("design_00001.json"),
            serde_json::to_vec_pretty(&old).unwrap(),
        )
        .await
        .unwrap();

        let (affected, deleted) = store.cleanup_old_checkpoints().await.unwrap();
        assert_eq!(affected, vec!["stale".to_string()]);
        assert_eq!(deleted, 1);
        assert!(store.get_latest_checkpoint("stale").await.unwrap().is_none());
        assert!(store.get_latest_checkpoint("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_on_fresh_store_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        let (affected, deleted) = store.cleanup_old_checkpoints().await.unwrap();
        assert!(affected.is_empty());
        assert_eq!(deleted, 0);
    }

    // -- validation ---------------------------------------------------------

    #[tokio::test]
    async fn validate_rejects_missing_file() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        let (valid, reason) = store
            .validate_checkpoint(&tmp.path().join("nope.json"))
            .await;
        assert!(!valid);
        assert!(reason.unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn validate_rejects_malformed_json() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        let path = tmp.path().join("bad.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        let (valid, reason) = store.validate_checkpoint(&path).await;
        assert!(!valid);
        assert!(reason.unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn validate_accepts_real_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        let cp = store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&["a"]), false)
            .await
            .unwrap();
        let path = store.checkpoint_path("wf", cp.phase, cp.version);
        let (valid, reason) = store.validate_checkpoint(&path).await;
        assert!(valid, "{reason:?}");
    }

    #[tokio::test]
    async fn corrupt_checkpoint_is_excluded_from_latest() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&["real"]), false)
            .await
            .unwrap();

        // Newer mtime but unparseable: must not shadow the good checkpoint
        // and must not fail the read.
        tokio::fs::write(tmp.path().join("wf").join("testing_00009.json"), b"garbage")
            .await
            .unwrap();

        let latest = store.get_latest_checkpoint("wf").await.unwrap().unwrap();
        assert_eq!(latest.completed_steps(), vec!["real".to_string()]);
    }

    // -- archival / deletion / stats ---------------------------------------

    #[tokio::test]
    async fn archive_bundles_checkpoints_into_gzip() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&["a"]), false)
            .await
            .unwrap();
        store
            .save_checkpoint("wf", SdlcPhase::Testing, payload(&["a", "b"]), false)
            .await
            .unwrap();

        let path = store.archive_workflow("wf").await.unwrap().unwrap();
        assert!(path.ends_with("archives/wf.json.gz"));

        // Decompress and check content integrity.
        let compressed = tokio::fs::read(&path).await.unwrap();
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut json = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut json).unwrap();
        let bundle: Vec<Checkpoint> = serde_json::from_slice(&json).unwrap();
        assert_eq!(bundle.len(), 2);
        assert!(bundle.iter().all(|c| c.workflow_id == "wf"));
    }

    #[tokio::test]
    async fn archive_of_empty_workflow_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        assert!(store.archive_workflow("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_workflow_checkpoints_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();

        assert!(store.delete_workflow_checkpoints("wf").await.unwrap());
        assert!(store.get_latest_checkpoint("wf").await.unwrap().is_none());
        // Second delete: nothing there anymore.
        assert!(!store.delete_workflow_checkpoints("wf").await.unwrap());
    }

    #[tokio::test]
    async fn storage_stats_aggregate() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .save_checkpoint("wf-1", SdlcPhase::Design, payload(&["a"]), false)
            .await
            .unwrap();
        store
            .save_checkpoint("wf-1", SdlcPhase::Testing, payload(&["a"]), false)
            .await
            .unwrap();
        store
            .save_checkpoint("wf-2", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();

        let stats = store.storage_stats().await.unwrap();
        assert_eq!(stats.workflow_count, 2);
        assert_eq!(stats.checkpoint_count, 3);
        assert!(stats.total_bytes > 0);
        assert!(stats.oldest.is_some());
        assert!(stats.newest.unwrap() >= stats.oldest.unwrap());
    }

    #[tokio::test]
    async fn stats_on_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        let stats = store.storage_stats().await.unwrap();
        assert_eq!(stats.workflow_count, 0);
        assert_eq!(stats.checkpoint_count, 0);
        assert!(stats.oldest.is_none());
    }

    // -- index --------------------------------------------------------------

    #[tokio::test]
    async fn index_mirrors_directory_after_mutations() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        store
            .save_checkpoint("wf", SdlcPhase::Design, payload(&[]), false)
            .await
            .unwrap();

        let index: CheckpointIndex = serde_json::from_slice(
            &tokio::fs::read(tmp.path().join(INDEX_FILE)).await.unwrap(),
        )
        .unwrap();
        let entry = &index.workflows["wf"];
        assert_eq!(entry.files, vec!["wf/design_00001.json"]);
        assert_eq!(entry.latest_phase, Some(SdlcPhase::Design));
        assert!(entry.updated_at.is_some());

        store.delete_workflow_checkpoints("wf").await.unwrap();
        let index: CheckpointIndex = serde_json::from_slice(
            &tokio::fs::read(tmp.path().join(INDEX_FILE)).await.unwrap(),
        )
        .unwrap();
        assert!(!index.workflows.contains_key("wf"));
    }
}
