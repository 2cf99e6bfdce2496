//! The upsert transaction script.
//!
//! One invocation runs inside one store snapshot:
//!
//! 1. Validate the document and pick the create or the replace path
//! 2. Create path: write version "1"; an existing record re-routes to replace
//! 3. Replace path: query the live record, check the match version, and
//!    allocate the next version
//! 4. With history enabled, archive the stored record before replacing it.
//!    A history-id collision restarts the replace path from the query
//! 5. Replace the live record conditioned on the etag read in step 3
//!
//! The snapshot is committed only when every step succeeded; any error
//! aborts it, so an archived history record never outlives a failed replace.

use revstore_storage::{DocumentRecord, DocumentStore, StorageError};
use serde::Deserialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::UpsertError;
use crate::gate::{self, WritePath};
use crate::history;
use crate::report::{report, UpsertOutcome};
use crate::retry::RetryCoordinator;
use crate::version;
use crate::writer;

/// Inputs of one upsert invocation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    #[serde(default)]
    pub document: Option<Value>,
    /// Version the caller expects the stored record to be at.
    #[serde(default)]
    pub match_version: Option<String>,
    #[serde(default)]
    pub allow_create: bool,
    #[serde(default)]
    pub keep_history: bool,
}

impl UpsertRequest {
    pub fn new(document: Value) -> Self {
        Self {
            document: Some(document),
            ..Self::default()
        }
    }

    pub fn match_version(mut self, version: impl Into<String>) -> Self {
        self.match_version = Some(version.into());
        self
    }

    pub fn allow_create(mut self, allow: bool) -> Self {
        self.allow_create = allow;
        self
    }

    pub fn keep_history(mut self, keep: bool) -> Self {
        self.keep_history = keep;
        self
    }
}

/// Create-or-replace of versioned documents over a [`DocumentStore`].
///
/// The engine holds no state besides its configuration; all coordination
/// between concurrent invocations goes through the store's etags.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertEngine {
    config: EngineConfig,
}

impl UpsertEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one upsert invocation as a single atomic snapshot.
    pub async fn upsert<S: DocumentStore>(
        &self,
        store: &S,
        request: UpsertRequest,
    ) -> Result<UpsertOutcome, UpsertError> {
        let document = gate::validate(request.document)?;
        // An empty match version counts as not supplied.
        let match_version = request.match_version.filter(|v| !v.is_empty());
        let path = gate::route(match_version.as_deref(), request.allow_create);
        let resource_id = document.resource_id.clone();
        tracing::debug!(
            resource_id = %resource_id,
            ?path,
            keep_history = request.keep_history,
            "upsert started"
        );

        let mut snapshot = store.begin_snapshot().await?;
        let result = self
            .run(
                store,
                &mut snapshot,
                document,
                match_version.as_deref(),
                path,
                request.keep_history,
            )
            .await;

        match result {
            Ok(outcome) => {
                store.commit_snapshot(snapshot).await?;
                tracing::info!(
                    resource_id = %resource_id,
                    version = outcome.wrapper.version.as_deref().unwrap_or(""),
                    outcome = ?outcome.outcome_type,
                    "upsert committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                let _ = store.abort_snapshot(snapshot).await;
                tracing::debug!(resource_id = %resource_id, error = %e, "upsert aborted");
                Err(e)
            }
        }
    }

    async fn run<S: DocumentStore>(
        &self,
        store: &S,
        snapshot: &mut S::Snapshot,
        document: DocumentRecord,
        match_version: Option<&str>,
        path: WritePath,
        keep_history: bool,
    ) -> Result<UpsertOutcome, UpsertError> {
        if path == WritePath::Replace {
            return self
                .replace(store, snapshot, document, match_version, keep_history)
                .await;
        }

        match writer::create_primary(store, snapshot, document.clone()).await {
            Ok(created) => Ok(report(created, true)),
            Err(StorageError::Conflict { id }) => {
                tracing::debug!(
                    resource_id = %document.resource_id,
                    existing = %id,
                    "document exists, replacing instead"
                );
                self.replace(store, snapshot, document, None, keep_history)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace<S: DocumentStore>(
        &self,
        store: &S,
        snapshot: &mut S::Snapshot,
        document: DocumentRecord,
        match_version: Option<&str>,
        keep_history: bool,
    ) -> Result<UpsertOutcome, UpsertError> {
        let resource_id = document.resource_id.as_str();
        let mut retry = RetryCoordinator::new(self.config.retry);

        loop {
            let attempt = retry.begin_attempt();

            let current = store
                .query_current(snapshot, resource_id)
                .await?
                .ok_or_else(|| UpsertError::NotFound {
                    resource_id: resource_id.to_string(),
                })?;

            if let (Some(expected), Some(found)) = (match_version, current.version.as_deref()) {
                if expected != found {
                    return Err(UpsertError::PreconditionFailed {
                        resource_id: resource_id.to_string(),
                        expected: expected.to_string(),
                        found: found.to_string(),
                    });
                }
            }

            let next = version::next_version(current.version.as_deref());

            if keep_history {
                let archived = history::archive(&current)?;
                match store.create_document(snapshot, archived).await {
                    Ok(_) => {}
                    Err(StorageError::Conflict { id }) => {
                        if !is_archived_revision(store, &id, resource_id).await? {
                            return Err(UpsertError::Store(StorageError::Conflict { id }));
                        }
                        tracing::warn!(
                            resource_id,
                            attempt,
                            history_id = %id,
                            "history record already exists, re-reading document"
                        );
                        retry.after_collision(resource_id).await?;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            let written =
                writer::replace_primary(store, snapshot, &current, document.clone(), next).await?;
            return Ok(report(written, false));
        }
    }
}

/// Whether the record holding `id` is an archived revision of `resource_id`.
/// Only then did a concurrent writer retire the version being replaced; any
/// other occupant of the history id is a genuine conflict.
async fn is_archived_revision<S: DocumentStore>(
    store: &S,
    id: &str,
    resource_id: &str,
) -> Result<bool, StorageError> {
    match store.read_document(id).await {
        Ok(existing) => Ok(existing.is_history && existing.resource_id == resource_id),
        Err(StorageError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}
