//! `revstore apply` -- run a script of upsert requests.
//!
//! A script is a JSON array of request objects:
//!
//! ```json
//! [
//!   {"document": {"resourceId": "abc", "title": "draft"}, "allowCreate": true},
//!   {"document": {"resourceId": "abc", "title": "final"}, "matchVersion": "1", "keepHistory": true}
//! ]
//! ```
//!
//! Steps run in order against one fresh in-memory store. A failing step is
//! reported and the script continues with the next one.

use std::path::Path;
use std::process;

use revstore_engine::{ErrorKind, UpsertEngine, UpsertError, UpsertOutcome, UpsertRequest};
use revstore_storage::{DocumentRecord, MemoryStore};
use serde::Serialize;
use serde_json::Value;

use crate::config::RevstoreConfig;
use crate::{report_error, runtime, OutputFormat};

/// Outcome of a single script step.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StepReport {
    /// 1-based position in the script.
    pub(crate) step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) outcome: Option<UpsertOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<StepError>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StepError {
    pub(crate) kind: ErrorKind,
    pub(crate) status: u16,
    pub(crate) message: String,
}

impl From<&UpsertError> for StepError {
    fn from(e: &UpsertError) -> Self {
        let kind = e.kind();
        Self {
            kind,
            status: kind.status_code(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ApplyReport {
    pub(crate) steps: Vec<StepReport>,
    pub(crate) failed: usize,
    /// Committed store contents after the last step, ordered by id.
    pub(crate) documents: Vec<DocumentRecord>,
}

pub(crate) fn cmd_apply(
    script: &Path,
    seed: Option<&Path>,
    config: &RevstoreConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let requests: Vec<UpsertRequest> = match read_json(script) {
        Ok(r) => r,
        Err(e) => {
            report_error(&e, output, quiet);
            process::exit(1);
        }
    };

    let store = MemoryStore::with_config(config.store);
    if let Some(seed) = seed {
        match read_json::<Vec<Value>>(seed).and_then(|entries| parse_seed(seed, entries)) {
            Ok(documents) => store.seed(documents),
            Err(e) => {
                report_error(&e, output, quiet);
                process::exit(1);
            }
        }
    }

    let engine = UpsertEngine::new(config.engine);
    let rt = runtime(output, quiet);
    let report = rt.block_on(run_script(&store, &engine, requests));

    match output {
        OutputFormat::Text => {
            if !quiet {
                for step in &report.steps {
                    println!("{}", describe_step(step));
                }
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                report_error(&format!("failed to serialize report: {}", e), output, quiet);
                process::exit(1);
            }
        },
    }

    if report.failed > 0 {
        process::exit(1);
    }
}

pub(crate) async fn run_script(
    store: &MemoryStore,
    engine: &UpsertEngine,
    requests: Vec<UpsertRequest>,
) -> ApplyReport {
    let mut steps = Vec::with_capacity(requests.len());
    let mut failed = 0;

    for (i, request) in requests.into_iter().enumerate() {
        let step = i + 1;
        match engine.upsert(store, request).await {
            Ok(outcome) => steps.push(StepReport {
                step,
                outcome: Some(outcome),
                error: None,
            }),
            Err(e) => {
                tracing::debug!(step, error = %e, "script step failed");
                failed += 1;
                steps.push(StepReport {
                    step,
                    outcome: None,
                    error: Some(StepError::from(&e)),
                });
            }
        }
    }

    ApplyReport {
        steps,
        failed,
        documents: store.documents(),
    }
}

fn describe_step(step: &StepReport) -> String {
    match (&step.outcome, &step.error) {
        (Some(outcome), _) => format!(
            "step {}: {:?} {} version {}",
            step.step,
            outcome.outcome_type,
            outcome.wrapper.resource_id,
            outcome.wrapper.version.as_deref().unwrap_or("-")
        ),
        (None, Some(error)) => format!(
            "step {}: {} ({}): {}",
            step.step,
            error.kind.as_str(),
            error.status,
            error.message
        ),
        (None, None) => format!("step {}: no result", step.step),
    }
}

/// Parse seed entries one by one so a bad entry is reported by position.
fn parse_seed(path: &Path, entries: Vec<Value>) -> Result<Vec<DocumentRecord>, String> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            DocumentRecord::from_json(entry).map_err(|e| {
                format!("invalid seed document {} in '{}': {}", i + 1, path.display(), e)
            })
        })
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading '{}': {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("invalid JSON in '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use revstore_engine::OutcomeType;
    use serde_json::json;

    fn requests(value: serde_json::Value) -> Vec<UpsertRequest> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn steps_run_in_order_against_one_store() {
        let store = MemoryStore::new();
        let script = requests(json!([
            {"document": {"resourceId": "abc", "v": 1}, "allowCreate": true},
            {"document": {"resourceId": "abc", "v": 2}, "matchVersion": "1", "keepHistory": true},
        ]));

        let report = run_script(&store, &UpsertEngine::default(), script).await;

        assert_eq!(report.failed, 0);
        let outcomes: Vec<_> = report
            .steps
            .iter()
            .map(|s| s.outcome.as_ref().unwrap().outcome_type)
            .collect();
        assert_eq!(outcomes, vec![OutcomeType::Created, OutcomeType::Updated]);
        let history: Vec<_> = report
            .documents
            .iter()
            .filter(|d| d.is_history)
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(history, vec!["abc_1"]);
        assert_eq!(report.documents.len(), 2);
    }

    #[tokio::test]
    async fn failed_step_is_reported_and_script_continues() {
        let store = MemoryStore::new();
        let script = requests(json!([
            {"document": {"resourceId": "abc"}, "allowCreate": true},
            {"document": {"resourceId": "abc"}, "matchVersion": "7"},
            {"document": null},
            {"document": {"resourceId": "abc"}, "matchVersion": "1"},
        ]));

        let report = run_script(&store, &UpsertEngine::default(), script).await;

        assert_eq!(report.failed, 2);
        let second = report.steps[1].error.as_ref().unwrap();
        assert_eq!(second.kind, ErrorKind::PreconditionFailed);
        assert_eq!(second.status, 412);
        assert_eq!(
            report.steps[2].error.as_ref().unwrap().kind,
            ErrorKind::BadRequest
        );
        let last = report.steps[3].outcome.as_ref().unwrap();
        assert_eq!(last.wrapper.version.as_deref(), Some("2"));
    }

    #[test]
    fn seed_entries_are_parsed_with_position_in_errors() {
        let path = Path::new("seed.json");
        let documents = parse_seed(
            path,
            vec![json!({"id": "abc", "resourceId": "abc", "version": "3", "title": "t"})],
        )
        .unwrap();
        assert_eq!(documents[0].version.as_deref(), Some("3"));
        assert_eq!(documents[0].field("title"), Some(&json!("t")));

        let err = parse_seed(path, vec![json!({"id": "abc", "resourceId": "abc"}), json!({"id": 1})])
            .unwrap_err();
        assert!(err.starts_with("invalid seed document 2 in 'seed.json'"), "{err}");
    }

    #[test]
    fn text_lines_name_outcome_or_error_kind() {
        let mut wrapper = DocumentRecord::new("abc", "abc", Default::default());
        wrapper.version = Some("1".to_string());
        let ok = StepReport {
            step: 1,
            outcome: Some(revstore_engine::report(wrapper, true)),
            error: None,
        };
        assert_eq!(describe_step(&ok), "step 1: Created abc version 1");

        let err = UpsertError::NotFound {
            resource_id: "abc".to_string(),
        };
        let failed = StepReport {
            step: 2,
            outcome: None,
            error: Some(StepError::from(&err)),
        };
        assert_eq!(
            describe_step(&failed),
            "step 2: NotFound (404): resource not found: abc"
        );
    }
}
