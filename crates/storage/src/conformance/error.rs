use std::future::Future;

use super::{make_document, TestResult};
use crate::{DocumentStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "read_document_nonexistent",
            read_document_nonexistent(factory).await,
        ),
        TestResult::from_result(
            "error",
            "replace_nonexistent_returns_not_found",
            replace_nonexistent_returns_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "query_current_nonexistent_is_none",
            query_current_nonexistent_is_none(factory).await,
        ),
        TestResult::from_result(
            "error",
            "get_current_nonexistent_is_none",
            get_current_nonexistent_is_none(factory).await,
        ),
        TestResult::from_result(
            "error",
            "list_history_empty_for_nonexistent",
            list_history_empty_for_nonexistent(factory).await,
        ),
    ]
}

async fn read_document_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.read_document("missing").await {
        Err(StorageError::NotFound { id }) if id == "missing" => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn replace_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .replace_document(&mut snap, "missing", "\"etag\"", make_document("missing", "x"))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::NotFound { id }) if id == "missing" => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn query_current_nonexistent_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.query_current(&mut snap, "missing").await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

async fn get_current_nonexistent_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_current("missing").await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

async fn list_history_empty_for_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let history = s.list_history("missing").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err(format!("expected no history, got {}", history.len()));
    }
    Ok(())
}
