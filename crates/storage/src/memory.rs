//! In-memory `DocumentStore` with read-committed snapshots.
//!
//! Writes are staged in the snapshot and replayed against committed state at
//! commit time. Every staged create and replace is re-validated during the
//! replay, so a snapshot whose preconditions were invalidated by a
//! concurrent commit fails as a whole and applies nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StorageError;
use crate::record::DocumentRecord;
use crate::traits::DocumentStore;

/// Tunables for [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store operations a single snapshot may issue before further
    /// operations are declined with `StorageError::Unavailable`.
    /// `None` = unlimited.
    pub max_operations_per_snapshot: Option<usize>,
}

/// Shared, cloneable in-memory document collection.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    config: StoreConfig,
}

#[derive(Default)]
struct MemoryInner {
    /// Committed documents keyed by store id.
    documents: BTreeMap<String, DocumentRecord>,
}

/// An open transaction against a [`MemoryStore`].
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    /// Writes in issue order, replayed on commit.
    writes: Vec<StagedWrite>,
    /// Latest staged state per store id, layered over committed state.
    staged: BTreeMap<String, DocumentRecord>,
    operations: usize,
}

#[derive(Debug)]
enum StagedWrite {
    Create {
        record: DocumentRecord,
    },
    Replace {
        id: String,
        if_match: String,
        record: DocumentRecord,
    },
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::default(),
            config,
        }
    }

    /// Seed a store with already-committed documents. Records without an
    /// etag are given one.
    pub fn with_documents(documents: Vec<DocumentRecord>) -> Self {
        let store = Self::new();
        store.seed(documents);
        store
    }

    /// Insert documents directly into committed state, bypassing snapshot
    /// validation. Existing documents with the same id are overwritten.
    pub fn seed(&self, documents: Vec<DocumentRecord>) {
        let mut inner = self.inner.lock();
        for mut doc in documents {
            if doc.etag.is_none() {
                doc.etag = Some(new_etag());
            }
            inner.documents.insert(doc.id.clone(), doc);
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// All committed documents ordered by store id.
    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.inner.lock().documents.values().cloned().collect()
    }

    /// Number of committed history records across all resources.
    pub fn history_count(&self) -> usize {
        self.inner
            .lock()
            .documents
            .values()
            .filter(|d| d.is_history)
            .count()
    }

    fn charge(&self, snapshot: &mut MemorySnapshot, operation: &str) -> Result<(), StorageError> {
        snapshot.operations += 1;
        match self.config.max_operations_per_snapshot {
            Some(max) if snapshot.operations > max => {
                tracing::debug!(operation, max, "snapshot operation budget exhausted");
                Err(StorageError::Unavailable {
                    operation: operation.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Record `id` as seen by `snapshot`.
    fn lookup(&self, snapshot: &MemorySnapshot, id: &str) -> Option<DocumentRecord> {
        if let Some(doc) = snapshot.staged.get(id) {
            return Some(doc.clone());
        }
        self.inner.lock().documents.get(id).cloned()
    }

    /// Live record of `resource_id` as seen by `snapshot`.
    fn lookup_live(&self, snapshot: &MemorySnapshot, resource_id: &str) -> Option<DocumentRecord> {
        if let Some(doc) = snapshot
            .staged
            .values()
            .find(|d| !d.is_history && d.resource_id == resource_id)
        {
            return Some(doc.clone());
        }
        let inner = self.inner.lock();
        inner
            .documents
            .values()
            .find(|d| {
                !d.is_history && d.resource_id == resource_id && !snapshot.staged.contains_key(&d.id)
            })
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let mut working = inner.documents.clone();
        let count = snapshot.writes.len();
        for write in snapshot.writes {
            apply_write(&mut working, write)?;
        }
        inner.documents = working;
        tracing::debug!(writes = count, "snapshot committed");
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        tracing::debug!(writes = snapshot.writes.len(), "snapshot aborted");
        Ok(())
    }

    async fn create_document(
        &self,
        snapshot: &mut MemorySnapshot,
        record: DocumentRecord,
    ) -> Result<DocumentRecord, StorageError> {
        self.charge(snapshot, "create")?;
        if self.lookup(snapshot, &record.id).is_some() {
            return Err(StorageError::Conflict { id: record.id });
        }
        if !record.is_history {
            if let Some(existing) = self.lookup_live(snapshot, &record.resource_id) {
                return Err(StorageError::Conflict { id: existing.id });
            }
        }
        let record = stamp(record)?;
        snapshot.staged.insert(record.id.clone(), record.clone());
        snapshot.writes.push(StagedWrite::Create {
            record: record.clone(),
        });
        Ok(record)
    }

    async fn query_current(
        &self,
        snapshot: &mut MemorySnapshot,
        resource_id: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        self.charge(snapshot, "query")?;
        Ok(self.lookup_live(snapshot, resource_id))
    }

    async fn replace_document(
        &self,
        snapshot: &mut MemorySnapshot,
        id: &str,
        if_match: &str,
        mut record: DocumentRecord,
    ) -> Result<DocumentRecord, StorageError> {
        self.charge(snapshot, "replace")?;
        let current = self
            .lookup(snapshot, id)
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })?;
        if current.etag.as_deref() != Some(if_match) {
            return Err(StorageError::PreconditionFailed {
                id: id.to_string(),
                expected_etag: if_match.to_string(),
            });
        }
        record.id = id.to_string();
        let record = stamp(record)?;
        snapshot.staged.insert(record.id.clone(), record.clone());
        snapshot.writes.push(StagedWrite::Replace {
            id: id.to_string(),
            if_match: if_match.to_string(),
            record: record.clone(),
        });
        Ok(record)
    }

    async fn read_document(&self, id: &str) -> Result<DocumentRecord, StorageError> {
        self.inner
            .lock()
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn get_current(
        &self,
        resource_id: &str,
    ) -> Result<Option<DocumentRecord>, StorageError> {
        Ok(self
            .inner
            .lock()
            .documents
            .values()
            .find(|d| !d.is_history && d.resource_id == resource_id)
            .cloned())
    }

    async fn list_history(&self, resource_id: &str) -> Result<Vec<DocumentRecord>, StorageError> {
        let mut history: Vec<DocumentRecord> = self
            .inner
            .lock()
            .documents
            .values()
            .filter(|d| d.is_history && d.resource_id == resource_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| history_order(a).cmp(&history_order(b)));
        Ok(history)
    }
}

/// Numeric versions ascend numerically and come first; any other version
/// sorts after them by id.
fn history_order(doc: &DocumentRecord) -> (u8, u64, &str) {
    let numeric = doc
        .version
        .as_deref()
        .filter(|v| v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse::<u64>().ok());
    match numeric {
        Some(n) => (0, n, doc.id.as_str()),
        None => (1, 0, doc.id.as_str()),
    }
}

/// Replay one staged write against `working`, re-checking its precondition.
fn apply_write(
    working: &mut BTreeMap<String, DocumentRecord>,
    write: StagedWrite,
) -> Result<(), StorageError> {
    match write {
        StagedWrite::Create { record } => {
            if working.contains_key(&record.id) {
                return Err(StorageError::Conflict { id: record.id });
            }
            if !record.is_history {
                if let Some(existing) = working
                    .values()
                    .find(|d| !d.is_history && d.resource_id == record.resource_id)
                {
                    return Err(StorageError::Conflict {
                        id: existing.id.clone(),
                    });
                }
            }
            working.insert(record.id.clone(), record);
        }
        StagedWrite::Replace {
            id,
            if_match,
            record,
        } => {
            let current = working
                .get(&id)
                .ok_or_else(|| StorageError::NotFound { id: id.clone() })?;
            if current.etag.as_deref() != Some(if_match.as_str()) {
                return Err(StorageError::PreconditionFailed {
                    id,
                    expected_etag: if_match,
                });
            }
            working.insert(id, record);
        }
    }
    Ok(())
}

fn stamp(mut record: DocumentRecord) -> Result<DocumentRecord, StorageError> {
    record.etag = Some(new_etag());
    record.last_modified = Some(
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| StorageError::Backend(format!("timestamp formatting failed: {e}")))?,
    );
    Ok(record)
}

/// Quoted opaque etag, e.g. `"3f2b..."`.
fn new_etag() -> String {
    format!("\"{}\"", Uuid::new_v4())
}
