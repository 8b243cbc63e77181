//! Engine error types
//!
//! `EngineError` is the internal taxonomy. At the API boundary it is turned
//! into an `OperationError` carried inside a structured result, so callers
//! never have to match on Rust error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{IncidentId, UserId};
use crate::store::StoreError;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during assignment and escalation
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad input: missing reason, invalid target tier, non-eligible technician
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Actor role does not permit the operation
    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    #[error("Incident not found: {id}")]
    IncidentNotFound { id: IncidentId },

    #[error("User not found: {id}")]
    UserNotFound { id: UserId },

    /// Closed or Cancelled incidents accept no further mutation
    #[error("Incident {id} is terminal ({status})")]
    Terminal { id: IncidentId, status: String },

    /// A concurrent writer changed the incident first
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Persistence failure
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::IncidentNotFound { .. } | Self::UserNotFound { .. } => "NOT_FOUND",
            Self::Terminal { .. } => "INCIDENT_TERMINAL",
            Self::Conflict { .. } => "CONFLICT",
            Self::Persistence(_) => "INTERNAL",
        }
    }

    /// Conflicts (terminal or lost race) can be retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the sweep should skip this incident rather than report a failure
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Terminal { .. })
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                id,
                expected,
                actual,
            } => Self::Conflict {
                message: format!(
                    "incident {} was modified concurrently (read version {}, stored version {})",
                    id, expected, actual
                ),
            },
            StoreError::IncidentNotFound(id) => Self::IncidentNotFound { id },
            StoreError::UserNotFound(id) => Self::UserNotFound { id },
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Serializable error carried inside structured operation results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// Machine-readable code (e.g., "VALIDATION", "CONFLICT")
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Whether retrying the same call may succeed
    #[serde(default)]
    pub retryable: bool,
}

impl From<&EngineError> for OperationError {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for OperationError {}
