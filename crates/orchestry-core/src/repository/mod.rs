//! Persistence ports ("repository" traits) implemented by the
//! infrastructure layer.

pub mod checkpoint;

pub use checkpoint::CheckpointRepository;
