use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::DocumentRecord;

/// The store collaborator required by the upsert engine.
///
/// A `DocumentStore` provides atomic single-document create with id
/// uniqueness, point query by logical identifier, and replace guarded by a
/// concurrency token (etag). Persistence, indexing and replication are the
/// implementation's business.
///
/// ## Snapshot Semantics
///
/// All operations that participate in an invocation take
/// `&mut Self::Snapshot`, a type representing an in-progress transaction.
/// The lifecycle is:
///
/// 1. `begin_snapshot()` - start a transaction, returns a `Snapshot`
/// 2. Call document methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` - commit and consume the transaction
///    OR `abort_snapshot(snapshot)` - roll back and consume the transaction
///
/// Writes staged in a snapshot are invisible to other snapshots until the
/// commit succeeds, and a commit applies either every staged write or none.
/// If a `Snapshot` is dropped without committing, its writes MUST be
/// discarded.
///
/// ## Etags
///
/// Every successful create or replace assigns a fresh etag to the written
/// record. `replace_document` fails with
/// `StorageError::PreconditionFailed` when the stored etag differs from the
/// one supplied by the caller.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared across
/// async tasks and used in axum application state.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this store.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all staged writes visible atomically.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all staged writes.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Document operations (within snapshot) ────────────────────────────────

    /// Create a new record and return it with its store-assigned etag.
    ///
    /// Returns `Err(StorageError::Conflict)` if a record with the same `id`
    /// exists, or if `record` is live and a live record for the same
    /// `resource_id` already exists.
    async fn create_document(
        &self,
        snapshot: &mut Self::Snapshot,
        record: DocumentRecord,
    ) -> Result<DocumentRecord, StorageError>;

    /// Point query for the live (non-history) record of `resource_id`.
    ///
    /// Sees the snapshot's own staged writes over committed state.
    async fn query_current(
        &self,
        snapshot: &mut Self::Snapshot,
        resource_id: &str,
    ) -> Result<Option<DocumentRecord>, StorageError>;

    /// Replace the record stored under `id`, conditioned on `if_match` being
    /// its current etag.
    ///
    /// Returns `Err(StorageError::NotFound)` if no record has this id and
    /// `Err(StorageError::PreconditionFailed)` on an etag mismatch.
    async fn replace_document(
        &self,
        snapshot: &mut Self::Snapshot,
        id: &str,
        if_match: &str,
        record: DocumentRecord,
    ) -> Result<DocumentRecord, StorageError>;

    // ── Query operations (outside snapshot, committed state only) ────────────

    /// Read a record by store id.
    ///
    /// Returns `Err(StorageError::NotFound)` if the record does not exist.
    async fn read_document(&self, id: &str) -> Result<DocumentRecord, StorageError>;

    /// Read the live record of `resource_id`, if any.
    async fn get_current(&self, resource_id: &str)
        -> Result<Option<DocumentRecord>, StorageError>;

    /// List the history records of `resource_id`. Records with a numeric
    /// version come first in ascending version order; the rest follow
    /// ordered by id.
    async fn list_history(&self, resource_id: &str) -> Result<Vec<DocumentRecord>, StorageError>;
}
