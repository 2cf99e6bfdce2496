use revstore_storage::DocumentRecord;
use serde::{Deserialize, Serialize};

/// Whether the invocation created the resource or replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeType {
    Created,
    Updated,
}

/// Externally visible result of a successful upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    /// The primary record as written.
    pub wrapper: DocumentRecord,
    pub outcome_type: OutcomeType,
}

pub fn report(wrapper: DocumentRecord, created: bool) -> UpsertOutcome {
    UpsertOutcome {
        wrapper,
        outcome_type: if created {
            OutcomeType::Created
        } else {
            OutcomeType::Updated
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn serializes_wrapper_and_outcome_type() {
        let mut doc = DocumentRecord::new("abc", "abc", Map::new());
        doc.version = Some("1".to_string());
        let value = serde_json::to_value(report(doc, true)).unwrap();

        assert_eq!(value["outcomeType"], json!("Created"));
        assert_eq!(value["wrapper"]["resourceId"], json!("abc"));
        assert_eq!(value["wrapper"]["version"], json!("1"));
    }

    #[test]
    fn replace_reports_updated() {
        let doc = DocumentRecord::new("abc", "abc", Map::new());
        assert_eq!(report(doc, false).outcome_type, OutcomeType::Updated);
    }
}
