/// Error types for the hazard recommendation service.

use crate::db::DbConfigError;

/// Errors surfaced to callers of the recommender and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HazardError {
    /// A data-access query failed. Never swallowed: a build that hits this
    /// is abandoned and nothing is cached.
    #[error("data access failed during {operation}: {reason}")]
    DataAccess { operation: String, reason: String },

    /// The requested region, group, or point does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Database connection or schema problem.
    #[error(transparent)]
    DbConfig(#[from] DbConfigError),

    /// A configuration file could not be read or parsed.
    #[error("configuration error in {path}: {reason}")]
    Config { path: String, reason: String },

    /// The HTTP endpoint could not start.
    #[error("endpoint error: {0}")]
    Endpoint(String),

    /// Snapshot serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HazardError {
    pub fn data_access(operation: &str, reason: impl std::fmt::Display) -> Self {
        HazardError::DataAccess {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}
