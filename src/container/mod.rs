//! Containers — generic units of work executed by ships.
//!
//! - `model` — `Container` state machine (Pending → Running → Completed/Stopped/Failed)
//! - `metadata` — typed metadata with the well-known `runtime_seconds` key

pub mod metadata;
pub mod model;

pub use metadata::{ContainerMetadata, MetadataValue, RUNTIME_SECONDS};
pub use model::{Container, ContainerStatus, TaskType};
