use std::future::Future;
use std::sync::Arc;

use super::{etag_of, make_document, seed, TestResult};
use crate::{DocumentStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_replaces_exactly_one_wins",
            concurrent_replaces_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_creates_exactly_one_wins",
            concurrent_creates_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_replaces_different_resources_all_succeed",
            concurrent_replaces_different_resources_all_succeed(factory).await,
        ),
    ]
}

/// Whether a failed write is an ordinary lost race rather than a fault.
fn lost_race(e: &StorageError) -> bool {
    matches!(
        e,
        StorageError::PreconditionFailed { .. } | StorageError::Conflict { .. }
    )
}

/// N tasks each open a snapshot and replace the same record conditioned on
/// the same etag. Exactly one commit succeeds; the rest lose either at the
/// replace or at commit.
async fn concurrent_replaces_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let created = seed(storage.as_ref(), make_document("abc", "x")).await?;
    let etag = etag_of(&created)?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let etag = etag.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let result = s
                .replace_document(&mut snap, "abc", &etag, make_document("abc", &format!("v{i}")))
                .await;
            match result {
                Ok(_) => match s.commit_snapshot(snap).await {
                    Ok(()) => Ok(true),
                    Err(e) if lost_race(&e) => Ok(false),
                    Err(e) => Err(e),
                },
                Err(e) if lost_race(&e) => {
                    s.abort_snapshot(snap).await?;
                    Ok(false)
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

/// N tasks race to create the same resource. Exactly one commit succeeds.
async fn concurrent_creates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let result = s
                .create_document(&mut snap, make_document("abc", &format!("v{i}")))
                .await;
            match result {
                Ok(_) => match s.commit_snapshot(snap).await {
                    Ok(()) => Ok(true),
                    Err(e) if lost_race(&e) => Ok(false),
                    Err(e) => Err(e),
                },
                Err(e) if lost_race(&e) => {
                    s.abort_snapshot(snap).await?;
                    Ok(false)
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

async fn concurrent_replaces_different_resources_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let mut etags = Vec::new();
    for i in 0..N {
        let created = seed(storage.as_ref(), make_document(&format!("doc-{i}"), "x")).await?;
        etags.push(etag_of(&created)?);
    }

    let mut handles = Vec::new();
    for (i, etag) in etags.into_iter().enumerate() {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("doc-{i}");
            let mut snap = s.begin_snapshot().await?;
            s.replace_document(&mut snap, &id, &etag, make_document(&id, "y"))
                .await?;
            s.commit_snapshot(snap).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    for i in 0..N {
        let stored = storage
            .read_document(&format!("doc-{i}"))
            .await
            .map_err(|e| e.to_string())?;
        if stored.field("value") != Some(&serde_json::json!("y")) {
            return Err(format!("doc-{i} not updated"));
        }
    }
    Ok(())
}
