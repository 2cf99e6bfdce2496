//! Versioned-document upsert engine.
//!
//! Performs create-or-replace of a document inside one store snapshot,
//! enforces optimistic concurrency on a caller-supplied version, and can
//! archive the replaced revision as an immutable history record before the
//! new revision becomes visible.

mod config;
mod error;
pub mod gate;
pub mod history;
mod report;
mod retry;
mod upsert;
pub mod version;
mod writer;

pub use config::EngineConfig;
pub use error::{ErrorKind, UpsertError};
pub use report::{report, OutcomeType, UpsertOutcome};
pub use retry::RetryPolicy;
pub use upsert::{UpsertEngine, UpsertRequest};
