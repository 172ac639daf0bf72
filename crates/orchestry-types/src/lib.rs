//! Shared domain types for Orchestry.
//!
//! This crate contains the core domain types used across the orchestration
//! engine: missions, workflow steps, checkpoints, execution handles, and
//! their associated error and configuration types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod execution;
pub mod handoff;
pub mod mission;
pub mod workflow;
