//! Error types for fleet-warden.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Assignment error: {0}")]
    Assignment(#[from] AssignmentError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Lease ledger errors. These are surfaced to task-creation callers as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentError {
    #[error("Ship {ship_id} is already assigned to task {task_id}")]
    AlreadyAssigned { ship_id: String, task_id: String },

    #[error("No assignment found for ship {ship_id}")]
    NotFound { ship_id: String },

    #[error("Assignment for ship {ship_id} already released ({reason})")]
    AlreadyReleased { ship_id: String, reason: String },

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

/// Container lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    #[error("Container {id} is {from}, cannot transition to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("Container {id} is not running (status: {status})")]
    NotRunning { id: String, status: String },

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

/// Health supervision errors.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Recovery for ship {ship_id} could not be attempted: {reason}")]
    RecoveryUnavailable { ship_id: String, reason: String },

    #[error("Fleet snapshot unavailable: {0}")]
    Snapshot(String),

    #[error("Assignment error: {0}")]
    Assignment(#[from] AssignmentError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
