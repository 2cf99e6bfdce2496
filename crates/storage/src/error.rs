/// All errors that can be returned by a DocumentStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A record with this store id already exists, or a live record for the
    /// same resource id is already present.
    #[error("document already exists: {id}")]
    Conflict { id: String },

    /// Optimistic concurrency failure -- the stored etag no longer matches
    /// the etag the write was conditioned on.
    #[error("precondition failed on document {id}: expected etag {expected_etag}")]
    PreconditionFailed { id: String, expected_etag: String },

    /// No record with the given store id.
    #[error("document not found: {id}")]
    NotFound { id: String },

    /// The store declined to queue the operation. Nothing in the current
    /// snapshot should be committed; the caller retries later.
    #[error("store declined to accept operation: {operation}")]
    Unavailable { operation: String },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
