use std::future::Future;

use super::{make_document, make_history, seed, TestResult};
use crate::{DocumentStore, StorageError};

pub(super) async fn run_create_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "create",
            "create_assigns_etag",
            create_assigns_etag(factory).await,
        ),
        TestResult::from_result(
            "create",
            "create_preserves_payload",
            create_preserves_payload(factory).await,
        ),
        TestResult::from_result(
            "create",
            "duplicate_id_returns_conflict",
            duplicate_id_returns_conflict(factory).await,
        ),
        TestResult::from_result(
            "create",
            "second_live_record_for_resource_returns_conflict",
            second_live_record_for_resource_returns_conflict(factory).await,
        ),
        TestResult::from_result(
            "create",
            "history_records_coexist_with_live_record",
            history_records_coexist_with_live_record(factory).await,
        ),
        TestResult::from_result(
            "create",
            "duplicate_history_id_returns_conflict",
            duplicate_history_id_returns_conflict(factory).await,
        ),
    ]
}

/// A created record comes back with a store-assigned etag, and the same
/// etag is visible after commit.
async fn create_assigns_etag<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;
    if created.etag.is_none() {
        return Err("created record has no etag".to_string());
    }
    let stored = s.read_document("abc").await.map_err(|e| e.to_string())?;
    if stored.etag != created.etag {
        return Err(format!(
            "stored etag {:?} differs from returned {:?}",
            stored.etag, created.etag
        ));
    }
    Ok(())
}

async fn create_preserves_payload<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, make_document("abc", "x")).await?;
    let stored = s
        .get_current("abc")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("live record missing after commit")?;
    if stored.field("value") != Some(&serde_json::json!("x")) {
        return Err(format!("payload not preserved: {:?}", stored.payload));
    }
    if stored.is_history {
        return Err("live record stored as history".to_string());
    }
    Ok(())
}

async fn duplicate_id_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, make_document("abc", "x")).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.create_document(&mut snap, make_document("abc", "y")).await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::Conflict { .. }) => Ok(()),
        other => Err(format!("expected Conflict, got {:?}", other)),
    }
}

/// Different store id, same resource id: the store must still refuse a
/// second live record.
async fn second_live_record_for_resource_returns_conflict<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, make_document("abc", "x")).await?;

    let mut other = make_document("abc", "y");
    other.id = "abc-alias".to_string();
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.create_document(&mut snap, other).await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::Conflict { id }) if id == "abc" => Ok(()),
        other => Err(format!("expected Conflict on 'abc', got {:?}", other)),
    }
}

async fn history_records_coexist_with_live_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, make_document("abc", "z")).await?;
    seed(&s, make_history("abc", "1", "x")).await?;
    seed(&s, make_history("abc", "2", "y")).await?;

    let history = s.list_history("abc").await.map_err(|e| e.to_string())?;
    let ids: Vec<&str> = history.iter().map(|h| h.id.as_str()).collect();
    if ids != ["abc_1", "abc_2"] {
        return Err(format!("expected [abc_1, abc_2], got {:?}", ids));
    }
    let current = s.get_current("abc").await.map_err(|e| e.to_string())?;
    match current {
        Some(doc) if doc.id == "abc" => Ok(()),
        other => Err(format!("expected live record 'abc', got {:?}", other)),
    }
}

async fn duplicate_history_id_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, make_history("abc", "1", "x")).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .create_document(&mut snap, make_history("abc", "1", "other"))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::Conflict { id }) if id == "abc_1" => Ok(()),
        other => Err(format!("expected Conflict on 'abc_1', got {:?}", other)),
    }
}
