//! Immutable snapshots of retired primary revisions.

use revstore_storage::{DocumentRecord, StorageError};

use crate::error::UpsertError;

/// Deterministic id of the history record for one `(resource, version)`.
pub fn history_id(resource_id: &str, version: &str) -> String {
    format!("{resource_id}_{version}")
}

/// Build the history copy of `current`, leaving `current` untouched.
///
/// A record without a version is archived under its etag (quotes stripped).
pub fn archive(current: &DocumentRecord) -> Result<DocumentRecord, UpsertError> {
    let version = match (&current.version, &current.etag) {
        (Some(v), _) => v.clone(),
        (None, Some(etag)) => etag.trim_matches('"').to_string(),
        (None, None) => {
            return Err(UpsertError::Store(StorageError::Backend(format!(
                "document {} has neither a version nor an etag to archive under",
                current.id
            ))))
        }
    };

    let mut copy = current.clone();
    copy.id = history_id(&current.resource_id, &version);
    copy.version = Some(version);
    copy.etag = None;
    copy.is_history = true;
    Ok(copy)
}
