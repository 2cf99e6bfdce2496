use std::future::Future;

use super::{etag_of, make_document, seed, TestResult};
use crate::{DocumentStore, StorageError};

pub(super) async fn run_replace_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "replace",
            "replace_with_current_etag_succeeds",
            replace_with_current_etag_succeeds(factory).await,
        ),
        TestResult::from_result(
            "replace",
            "replace_changes_etag",
            replace_changes_etag(factory).await,
        ),
        TestResult::from_result(
            "replace",
            "replace_keeps_store_identity",
            replace_keeps_store_identity(factory).await,
        ),
        TestResult::from_result(
            "replace",
            "stale_etag_returns_precondition_failed",
            stale_etag_returns_precondition_failed(factory).await,
        ),
        TestResult::from_result(
            "replace",
            "precondition_failure_does_not_mutate",
            precondition_failure_does_not_mutate(factory).await,
        ),
        TestResult::from_result(
            "replace",
            "sequential_replaces_in_one_snapshot",
            sequential_replaces_in_one_snapshot(factory).await,
        ),
    ]
}

/// Replace under `etag`, commit, and return the written record.
async fn replace_and_commit<S: DocumentStore>(
    s: &S,
    id: &str,
    etag: &str,
    value: &str,
) -> Result<crate::DocumentRecord, StorageError> {
    let mut snap = s.begin_snapshot().await?;
    match s
        .replace_document(&mut snap, id, etag, make_document(id, value))
        .await
    {
        Ok(written) => {
            s.commit_snapshot(snap).await?;
            Ok(written)
        }
        Err(e) => {
            let _ = s.abort_snapshot(snap).await;
            Err(e)
        }
    }
}

async fn replace_with_current_etag_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;
    replace_and_commit(&s, "abc", &etag_of(&created)?, "y")
        .await
        .map_err(|e| format!("replace: {e}"))?;

    let stored = s.read_document("abc").await.map_err(|e| e.to_string())?;
    if stored.field("value") != Some(&serde_json::json!("y")) {
        return Err(format!("expected value 'y', got {:?}", stored.field("value")));
    }
    Ok(())
}

async fn replace_changes_etag<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;
    let written = replace_and_commit(&s, "abc", &etag_of(&created)?, "y")
        .await
        .map_err(|e| format!("replace: {e}"))?;
    if written.etag.is_none() || written.etag == created.etag {
        return Err(format!(
            "etag did not change: before {:?}, after {:?}",
            created.etag, written.etag
        ));
    }
    Ok(())
}

/// The stored id is authoritative even if the replacement carries another.
async fn replace_keeps_store_identity<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;

    let mut replacement = make_document("abc", "y");
    replacement.id = "something-else".to_string();
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let written = s
        .replace_document(&mut snap, "abc", &etag_of(&created)?, replacement)
        .await
        .map_err(|e| format!("replace: {e}"))?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if written.id != "abc" {
        return Err(format!("expected id 'abc', got '{}'", written.id));
    }
    if let Ok(doc) = s.read_document("something-else").await {
        return Err(format!("replace created a second record: {:?}", doc));
    }
    Ok(())
}

async fn stale_etag_returns_precondition_failed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;
    let stale = etag_of(&created)?;
    replace_and_commit(&s, "abc", &stale, "y")
        .await
        .map_err(|e| format!("first replace: {e}"))?;

    match replace_and_commit(&s, "abc", &stale, "z").await {
        Err(StorageError::PreconditionFailed { id, expected_etag })
            if id == "abc" && expected_etag == stale =>
        {
            Ok(())
        }
        other => Err(format!("expected PreconditionFailed, got {:?}", other)),
    }
}

async fn precondition_failure_does_not_mutate<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;

    let _ = replace_and_commit(&s, "abc", "\"not-the-etag\"", "y").await;

    let stored = s.read_document("abc").await.map_err(|e| e.to_string())?;
    if stored.etag != created.etag {
        return Err("etag changed after failed replace".to_string());
    }
    if stored.field("value") != Some(&serde_json::json!("x")) {
        return Err(format!("payload changed: {:?}", stored.payload));
    }
    Ok(())
}

/// Within one snapshot the second replace must be conditioned on the etag
/// returned by the first.
async fn sequential_replaces_in_one_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let first = s
        .replace_document(&mut snap, "abc", &etag_of(&created)?, make_document("abc", "y"))
        .await
        .map_err(|e| format!("first replace: {e}"))?;
    let second = s
        .replace_document(&mut snap, "abc", &etag_of(&first)?, make_document("abc", "z"))
        .await
        .map_err(|e| format!("second replace: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let stored = s.read_document("abc").await.map_err(|e| e.to_string())?;
    if stored.etag != second.etag {
        return Err("committed etag is not the last written one".to_string());
    }
    if stored.field("value") != Some(&serde_json::json!("z")) {
        return Err(format!("expected value 'z', got {:?}", stored.field("value")));
    }
    Ok(())
}
