//! Conformance test suite for `DocumentStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `DocumentStore` implementation can run to verify the guarantees the
//! upsert engine relies on. The suite covers:
//!
//! - **Create**: etag assignment, id uniqueness, one live record per resource
//! - **Replace**: etag-guarded replace, identity preservation
//! - **Snapshot isolation**: staged writes invisible, commit all-or-nothing
//! - **Error handling**: correct error variants for invalid operations
//! - **Concurrency**: exactly one winner among racing conditional replaces
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use revstore_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn my_backend_conformance() {
//!     let report = run_conformance_suite(|| async { create_test_store().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod create;
mod error;
mod replace;
mod snapshot;

use std::fmt;
use std::future::Future;

use serde::Serialize;
use serde_json::json;

use crate::record::DocumentRecord;
use crate::DocumentStore;

/// Result of a single conformance test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    /// Test category (e.g. "create", "snapshot", "concurrent").
    pub category: String,
    /// Test name (e.g. "create_assigns_etag").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone, Serialize)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(create::run_create_tests(&factory).await);
    results.extend(replace::run_replace_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_document(resource_id: &str, value: &str) -> DocumentRecord {
    let payload = json!({ "value": value })
        .as_object()
        .cloned()
        .unwrap_or_default();
    DocumentRecord::new(resource_id, resource_id, payload)
}

fn make_history(resource_id: &str, version: &str, value: &str) -> DocumentRecord {
    let mut doc = make_document(resource_id, value);
    doc.id = format!("{resource_id}_{version}");
    doc.version = Some(version.to_string());
    doc.is_history = true;
    doc
}

/// Create and commit `doc` in its own snapshot, returning the stored record.
async fn seed<S: DocumentStore>(s: &S, doc: DocumentRecord) -> Result<DocumentRecord, String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let created = s
        .create_document(&mut snap, doc)
        .await
        .map_err(|e| format!("create: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    Ok(created)
}

fn etag_of(doc: &DocumentRecord) -> Result<String, String> {
    doc.etag
        .clone()
        .ok_or_else(|| format!("document {} has no etag", doc.id))
}
