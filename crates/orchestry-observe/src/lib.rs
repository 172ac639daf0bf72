//! Observability setup for Orchestry.

pub mod tracing_setup;
