//! Error types for chat-filter.

use uuid::Uuid;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised while opening or reading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed dataset {name}: {reason}")]
    Malformed { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-record failures. Always absorbed into a `parse_error` verdict.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid messages JSON: {0}")]
    MessagesJson(#[from] serde_json::Error),

    #[error("messages must be a JSON array, found {0}")]
    MessagesNotArray(&'static str),

    #[error("rule evaluation panicked: {0}")]
    Panicked(String),
}

/// Roster (staff list) errors.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Staff member already exists: {0}")]
    Duplicate(String),

    #[error("Staff member not found: {0}")]
    NotFound(String),

    #[error("Staff name must not be blank")]
    BlankName,

    #[error("Failed to persist roster: {0}")]
    Io(#[from] std::io::Error),

    #[error("Roster document is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Analysis task errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task {id} not found")]
    NotFound { id: Uuid },

    #[error("Record {record_id} not found in task {id}")]
    RecordNotFound { id: Uuid, record_id: String },

    #[error("Task {id} is not completed (current status: {status})")]
    NotReady { id: Uuid, status: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task {id} cannot transition from {from} to {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },

    #[error("Task {id} failed: {reason}")]
    Failure { id: Uuid, reason: String },
}

impl TaskError {
    /// Stable machine-readable kind, used by the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::RecordNotFound { .. } => "not_found",
            Self::NotReady { .. } => "not_ready",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Failure { .. } => "task_failure",
        }
    }
}
