//! Workflow engine core: DAG semantics, handoff gating, and execution.
//!
//! - `graph` -- step DAG with readiness, cycle detection, critical path
//! - `plan` -- SDLC workflow construction from a mission specification
//! - `handoff` -- readiness validation and handoff coordination
//! - `runner` -- step-execution port (supplied by the embedding application)
//! - `trigger` -- admission control and execution lifecycle

pub mod graph;
pub mod handoff;
pub mod plan;
pub mod runner;
pub mod trigger;
