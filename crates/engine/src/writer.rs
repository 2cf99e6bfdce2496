//! Writes of the primary record.

use revstore_storage::{DocumentRecord, DocumentStore, StorageError};

use crate::error::UpsertError;
use crate::version::INITIAL_VERSION;

/// Create `record` as the first revision of its resource.
///
/// Store errors are returned raw so the caller can recognise `Conflict`.
pub(crate) async fn create_primary<S: DocumentStore>(
    store: &S,
    snapshot: &mut S::Snapshot,
    mut record: DocumentRecord,
) -> Result<DocumentRecord, StorageError> {
    record.version = Some(INITIAL_VERSION.to_string());
    record.is_history = false;
    store.create_document(snapshot, record).await
}

/// Overwrite the stored record `current` with `record` at `version`,
/// conditioned on the etag read together with `current`.
pub(crate) async fn replace_primary<S: DocumentStore>(
    store: &S,
    snapshot: &mut S::Snapshot,
    current: &DocumentRecord,
    mut record: DocumentRecord,
    version: String,
) -> Result<DocumentRecord, UpsertError> {
    let etag = current.etag.as_deref().ok_or_else(|| {
        UpsertError::Store(StorageError::Backend(format!(
            "stored document {} has no etag",
            current.id
        )))
    })?;
    record.id = current.id.clone();
    record.version = Some(version);
    record.is_history = false;
    Ok(store
        .replace_document(snapshot, &current.id, etag, record)
        .await?)
}
