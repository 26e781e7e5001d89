//! Error types for the PowerMax provider
//!
//! Provides structured error types for the reconciliation core, the remote
//! array client boundary and the ambient provider surfaces.

use thiserror::Error;

/// Unified error type for the provider
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Remote Array Errors
    // =========================================================================
    #[error("{operation} failed: {reason}")]
    Remote { operation: String, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: String },

    #[error("Operation cancelled")]
    Cancelled,

    // =========================================================================
    // Reconciliation Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    Precondition(String),

    #[error(
        "Failed to update all parameters of {kind} {id}, \
         updated fields are [{}] and failed fields are [{}]: {}",
        .updated.join(", "),
        .failed.join(", "),
        .errors.join("; ")
    )]
    PartialUpdate {
        kind: String,
        id: String,
        updated: Vec<String>,
        failed: Vec<String>,
        errors: Vec<String>,
    },

    #[error("Error reading {kind} {id}: {source}")]
    ReadFailed {
        kind: String,
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Error creating {kind} {name}: {reason}")]
    CreateFailed { kind: String, name: String, reason: String },

    #[error(
        "Error creating {kind} {name}: {reason}; \
         cleanup of the partially created {kind} also failed: {cleanup}"
    )]
    CleanupFailed {
        kind: String,
        name: String,
        reason: String,
        cleanup: String,
    },

    #[error("Error deleting {kind} {id}: {}", .reasons.join("; "))]
    DeleteFailed {
        kind: String,
        id: String,
        reasons: Vec<String>,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an error sits in the reconciliation failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// One or more field groups failed to apply; other groups may have succeeded
    FieldUpdate,
    /// Re-fetch after a mutation (or a plain read) failed; no state is returned
    FatalRead,
    /// A cleanup action failed in addition to the original failure
    Compensation,
    /// Invalid combination caught before any remote call
    Precondition,
    /// A single remote call failed outside of a field group
    Remote,
    /// Configuration, parsing and IO
    Ambient,
}

impl Error {
    /// Build a remote error from an operation name and an opaque reason
    pub fn remote(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Remote {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Build a not-found error
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Wrap an error raised while fetching an entity
    pub fn read_failed(kind: impl Into<String>, id: impl Into<String>, source: Error) -> Self {
        Error::ReadFailed {
            kind: kind.into(),
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Determine where this error sits in the failure taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::PartialUpdate { .. } | Error::DeleteFailed { .. } => ErrorCategory::FieldUpdate,
            Error::ReadFailed { .. } | Error::NotFound { .. } => ErrorCategory::FatalRead,
            Error::CleanupFailed { .. } => ErrorCategory::Compensation,
            Error::Precondition(_) => ErrorCategory::Precondition,
            Error::Remote { .. } | Error::CreateFailed { .. } | Error::Cancelled => {
                ErrorCategory::Remote
            }
            Error::Internal(_)
            | Error::Configuration(_)
            | Error::JsonParse(_)
            | Error::YamlParse(_)
            | Error::Io(_) => ErrorCategory::Ambient,
        }
    }

    /// Whether the operation produced no usable state
    pub fn is_fatal(&self) -> bool {
        !matches!(self.category(), ErrorCategory::FieldUpdate)
    }

    /// Whether the remote entity is gone
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::ReadFailed { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Result type alias for the provider
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = Error::Precondition("host_id and host_group_id both set".into());
        assert_eq!(err.category(), ErrorCategory::Precondition);
        assert!(err.is_fatal());

        let err = Error::PartialUpdate {
            kind: "storage group".into(),
            id: "sg1".into(),
            updated: vec!["name".into()],
            failed: vec!["enable_compression".into()],
            errors: vec!["Failed to modify enable_compression: rejected".into()],
        };
        assert_eq!(err.category(), ErrorCategory::FieldUpdate);
        assert!(!err.is_fatal());

        let err = Error::read_failed("host", "h1", Error::not_found("host", "h1"));
        assert_eq!(err.category(), ErrorCategory::FatalRead);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_partial_update_message() {
        let err = Error::PartialUpdate {
            kind: "host".into(),
            id: "h1".into(),
            updated: vec!["initiators".into()],
            failed: vec!["host_flags".into(), "name".into()],
            errors: vec![
                "Failed to modify host_flags: boom".into(),
                "Failed to modify name: taken".into(),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("updated fields are [initiators]"));
        assert!(message.contains("failed fields are [host_flags, name]"));
        assert!(message
            .contains("Failed to modify host_flags: boom; Failed to modify name: taken"));
    }

    #[test]
    fn test_cleanup_failure_keeps_both_causes() {
        let err = Error::CleanupFailed {
            kind: "volume".into(),
            name: "vol1".into(),
            reason: "timeout".into(),
            cleanup: "volume is busy".into(),
        };
        let message = err.to_string();
        assert!(message.contains("timeout"));
        assert!(message.contains("volume is busy"));
        assert_eq!(err.category(), ErrorCategory::Compensation);
    }
}
