//! Infrastructure layer for Orchestry.
//!
//! Implements the persistence ports declared in `orchestry-core` with
//! filesystem storage, and loads orchestrator configuration from disk.
//! Nothing in this crate contains orchestration logic; it is I/O glue.

pub mod checkpoint;
pub mod config;

pub use checkpoint::FsCheckpointStore;
