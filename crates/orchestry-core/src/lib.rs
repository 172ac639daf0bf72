//! Orchestration core for Orchestry.
//!
//! This crate contains the engine that turns validated mission
//! specifications into executed workflows:
//! - `workflow::graph` -- step DAG with readiness, cycle detection, and
//!   critical-path computation
//! - `workflow::plan` -- builds the SDLC workflow for a mission
//! - `workflow::handoff` -- readiness validation and handoff coordination
//! - `workflow::runner` -- the step-execution port supplied by the embedder
//! - `workflow::trigger` -- admission control, execution lifecycle,
//!   monitoring, and checkpoint emission
//! - `repository` -- persistence ports implemented by `orchestry-infra`
//!
//! The crate depends only on `orchestry-types` and async plumbing -- never
//! on filesystem or database crates.

pub mod repository;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
