//! Application state shared across request handlers.

use revstore_engine::UpsertEngine;
use revstore_storage::MemoryStore;

pub(crate) struct AppState {
    /// Backing store; the handle is shared by every request.
    pub(crate) store: MemoryStore,
    pub(crate) engine: UpsertEngine,
    /// Required API key (None = no auth).
    pub(crate) api_key: Option<String>,
}
