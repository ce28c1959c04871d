//! Error types for the repository, the orchestrator and configuration.

use crate::domain::ScheduleId;

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The schedule or record does not exist (or vanished concurrently).
    #[error("{entity} with id ({id}) not found")]
    NotFound { entity: &'static str, id: u64 },

    /// The store rejected or failed a write.
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn schedule_not_found(id: ScheduleId) -> Self {
        Self::NotFound {
            entity: "Schedule",
            id,
        }
    }

    pub fn assignment_not_found(id: u64) -> Self {
        Self::NotFound {
            entity: "MaintenanceJobAssignment",
            id,
        }
    }
}

/// Error type for solve orchestration requests.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("schedule ({0}) is already being solved")]
    AlreadySolving(ScheduleId),

    /// The request addresses a schedule other than the deployment's singleton.
    #[error("there is no schedule with id ({0})")]
    InvalidState(ScheduleId),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PersistenceFailure(String),

    /// The solver worker thread could not be started.
    #[error("failed to start solver worker: {0}")]
    Worker(String),
}

impl From<RepositoryError> for SolveError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. } => SolveError::NotFound(err.to_string()),
            other => SolveError::PersistenceFailure(other.to_string()),
        }
    }
}

/// Error type for loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
