use std::future::Future;

use super::{etag_of, make_document, make_history, seed, TestResult};
use crate::DocumentStore;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_create_invisible",
            uncommitted_create_invisible(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "snapshot_reads_its_own_writes",
            snapshot_reads_its_own_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "abort_discards_all_writes",
            abort_discards_all_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "commit_applies_history_and_replace_together",
            commit_applies_history_and_replace_together(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "invalidated_snapshot_commits_nothing",
            invalidated_snapshot_commits_nothing(factory).await,
        ),
    ]
}

async fn uncommitted_create_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.create_document(&mut snap, make_document("abc", "x"))
        .await
        .map_err(|e| e.to_string())?;

    let visible = s.get_current("abc").await.map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    match visible {
        None => Ok(()),
        Some(doc) => Err(format!("uncommitted record visible: {:?}", doc)),
    }
}

async fn snapshot_reads_its_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let created = s
        .create_document(&mut snap, make_document("abc", "x"))
        .await
        .map_err(|e| e.to_string())?;
    let seen = s
        .query_current(&mut snap, "abc")
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.abort_snapshot(snap).await;
    match seen {
        Some(doc) if doc.etag == created.etag => Ok(()),
        other => Err(format!("expected own staged record, got {:?}", other)),
    }
}

async fn abort_discards_all_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.create_document(&mut snap, make_history("abc", "1", "x"))
        .await
        .map_err(|e| format!("create history: {e}"))?;
    s.replace_document(&mut snap, "abc", &etag_of(&created)?, make_document("abc", "y"))
        .await
        .map_err(|e| format!("replace: {e}"))?;
    s.abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    let history = s.list_history("abc").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err(format!("aborted history visible: {:?}", history));
    }
    let stored = s.read_document("abc").await.map_err(|e| e.to_string())?;
    if stored.etag != created.etag {
        return Err("aborted replace visible".to_string());
    }
    Ok(())
}

async fn commit_applies_history_and_replace_together<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.create_document(&mut snap, make_history("abc", "1", "x"))
        .await
        .map_err(|e| format!("create history: {e}"))?;
    s.replace_document(&mut snap, "abc", &etag_of(&created)?, make_document("abc", "y"))
        .await
        .map_err(|e| format!("replace: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let history = s.list_history("abc").await.map_err(|e| e.to_string())?;
    if history.len() != 1 {
        return Err(format!("expected 1 history record, got {}", history.len()));
    }
    let stored = s.read_document("abc").await.map_err(|e| e.to_string())?;
    if stored.field("value") != Some(&serde_json::json!("y")) {
        return Err("replace not committed".to_string());
    }
    Ok(())
}

/// A snapshot whose replace precondition was overtaken by another commit
/// must not leave its history record behind.
async fn invalidated_snapshot_commits_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = seed(&s, make_document("abc", "x")).await?;
    let etag = etag_of(&created)?;

    let mut loser = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let staged = async {
        s.create_document(&mut loser, make_history("abc", "1", "x"))
            .await?;
        s.replace_document(&mut loser, "abc", &etag, make_document("abc", "loser"))
            .await
    }
    .await;

    let mut winner = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.replace_document(&mut winner, "abc", &etag, make_document("abc", "winner"))
        .await
        .map_err(|e| format!("winner replace: {e}"))?;
    s.commit_snapshot(winner)
        .await
        .map_err(|e| format!("winner commit: {e}"))?;

    // The loser either failed while staging or must fail at commit.
    if staged.is_ok() && s.commit_snapshot(loser).await.is_ok() {
        return Err("stale snapshot committed".to_string());
    }

    let history = s.list_history("abc").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err(format!("orphaned history record: {:?}", history));
    }
    let stored = s.read_document("abc").await.map_err(|e| e.to_string())?;
    if stored.field("value") != Some(&serde_json::json!("winner")) {
        return Err(format!("expected winner's value, got {:?}", stored.payload));
    }
    Ok(())
}
