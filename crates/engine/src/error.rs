//! Error kinds surfaced by the upsert engine.

use revstore_storage::StorageError;
use serde::Serialize;

/// Closed set of externally visible error categories.
///
/// Each kind carries a status-code-like number and a fixed human-readable
/// template, so callers branch on the kind rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    PreconditionFailed,
    ServiceUnavailable,
    Internal,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::BadRequest,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::PreconditionFailed,
        ErrorKind::ServiceUnavailable,
        ErrorKind::Internal,
    ];

    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::PreconditionFailed => 412,
            ErrorKind::ServiceUnavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    pub const fn template(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "The request document is missing or malformed.",
            ErrorKind::NotFound => "The document to replace does not exist.",
            ErrorKind::Conflict => "The document was modified concurrently. Retry the request.",
            ErrorKind::PreconditionFailed => {
                "The supplied version does not match the stored document."
            }
            ErrorKind::ServiceUnavailable => {
                "The store could not accept the operation. Retry the request later."
            }
            ErrorKind::Internal => "The store reported an unexpected error.",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::PreconditionFailed => "PreconditionFailed",
            ErrorKind::ServiceUnavailable => "ServiceUnavailable",
            ErrorKind::Internal => "Internal",
        }
    }
}

/// Errors returned by [`UpsertEngine::upsert`](crate::UpsertEngine::upsert).
///
/// Every error aborts the invocation's snapshot, so nothing it staged is
/// committed.
#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    /// No document was supplied, or it lacks a usable `resourceId`.
    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// The document is not a single JSON object (e.g. a collection).
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Replace requested but no live record exists for the resource.
    #[error("resource not found: {resource_id}")]
    NotFound { resource_id: String },

    /// The caller's match version differs from the stored version.
    #[error("version mismatch on {resource_id}: expected {expected}, found {found}")]
    PreconditionFailed {
        resource_id: String,
        expected: String,
        found: String,
    },

    /// The store declined to queue an operation.
    #[error("store unavailable during {operation}; retry the request later")]
    ServiceUnavailable { operation: String },

    /// History archiving kept colliding with concurrent writers.
    #[error("history archive for {resource_id} still colliding after {attempts} attempts")]
    RetryExhausted { resource_id: String, attempts: u32 },

    /// Any other store-reported failure, passed through unchanged.
    #[error(transparent)]
    Store(StorageError),
}

impl UpsertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpsertError::InvalidDocument { .. } | UpsertError::InvalidInput { .. } => {
                ErrorKind::BadRequest
            }
            UpsertError::NotFound { .. } => ErrorKind::NotFound,
            UpsertError::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            UpsertError::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            UpsertError::RetryExhausted { .. } => ErrorKind::Conflict,
            UpsertError::Store(e) => match e {
                StorageError::Conflict { .. } => ErrorKind::Conflict,
                StorageError::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
                StorageError::NotFound { .. } => ErrorKind::NotFound,
                StorageError::Unavailable { .. } => ErrorKind::ServiceUnavailable,
                StorageError::Backend(_) => ErrorKind::Internal,
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

impl From<StorageError> for UpsertError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Unavailable { operation } => UpsertError::ServiceUnavailable { operation },
            other => UpsertError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_distinct_status_and_template() {
        let mut codes: Vec<u16> = ErrorKind::ALL.iter().map(|k| k.status_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
        assert!(ErrorKind::ALL.iter().all(|k| !k.template().is_empty()));
    }

    #[test]
    fn unavailable_store_error_becomes_service_unavailable() {
        let err = UpsertError::from(StorageError::Unavailable {
            operation: "create".to_string(),
        });
        assert!(matches!(
            err,
            UpsertError::ServiceUnavailable { ref operation } if operation == "create"
        ));
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn store_errors_pass_through_with_matching_kind() {
        let err = UpsertError::from(StorageError::PreconditionFailed {
            id: "abc".to_string(),
            expected_etag: "\"e1\"".to_string(),
        });
        assert!(matches!(err, UpsertError::Store(_)));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(
            err.to_string(),
            "precondition failed on document abc: expected etag \"e1\""
        );

        let err = UpsertError::from(StorageError::Backend("disk on fire".to_string()));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn retry_exhaustion_is_a_conflict() {
        let err = UpsertError::RetryExhausted {
            resource_id: "abc".to_string(),
            attempts: 5,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
