//! Input validation and create/replace routing.

use revstore_storage::DocumentRecord;
use serde_json::Value;
use uuid::Uuid;

use crate::error::UpsertError;

/// Fields owned by the engine or the store; caller values are dropped.
const MANAGED_FIELDS: [&str; 6] = [
    "id",
    "resourceId",
    "version",
    "_etag",
    "_lastModified",
    "isHistory",
];

/// Which half of the upsert an invocation starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    Create,
    Replace,
}

/// Check the caller's document and turn it into a live record.
///
/// A document without an `id` gets a fresh UUID, so assigned ids never share
/// the `<resourceId>_<version>` namespace of history records.
pub fn validate(document: Option<Value>) -> Result<DocumentRecord, UpsertError> {
    let mut fields = match document {
        None | Some(Value::Null) => {
            return Err(UpsertError::InvalidDocument {
                reason: "document is required".to_string(),
            })
        }
        Some(Value::Array(_)) => {
            return Err(UpsertError::InvalidInput {
                reason: "expected a single document, got a collection".to_string(),
            })
        }
        Some(Value::Object(fields)) => fields,
        Some(_) => {
            return Err(UpsertError::InvalidInput {
                reason: "document must be a JSON object".to_string(),
            })
        }
    };

    let resource_id = match fields.get("resourceId") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) => {
            return Err(UpsertError::InvalidDocument {
                reason: "resourceId must not be empty".to_string(),
            })
        }
        Some(_) => {
            return Err(UpsertError::InvalidDocument {
                reason: "resourceId must be a string".to_string(),
            })
        }
        None => {
            return Err(UpsertError::InvalidDocument {
                reason: "resourceId is required".to_string(),
            })
        }
    };

    let id = match fields.get("id") {
        None | Some(Value::Null) => Uuid::new_v4().to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(_) => {
            return Err(UpsertError::InvalidDocument {
                reason: "id must be a non-empty string".to_string(),
            })
        }
    };

    for field in MANAGED_FIELDS {
        fields.remove(field);
    }

    Ok(DocumentRecord::new(id, resource_id, fields))
}

/// A supplied match version, or disallowed creation, forces the replace path.
pub fn route(match_version: Option<&str>, allow_create: bool) -> WritePath {
    if match_version.is_some() || !allow_create {
        WritePath::Replace
    } else {
        WritePath::Create
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_document_is_invalid_document() {
        assert!(matches!(
            validate(None),
            Err(UpsertError::InvalidDocument { .. })
        ));
        assert!(matches!(
            validate(Some(Value::Null)),
            Err(UpsertError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn collection_is_invalid_input() {
        let err = validate(Some(json!([{ "resourceId": "abc" }]))).unwrap_err();
        assert!(matches!(err, UpsertError::InvalidInput { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn scalar_is_invalid_input() {
        assert!(matches!(
            validate(Some(json!("abc"))),
            Err(UpsertError::InvalidInput { .. })
        ));
    }

    #[test]
    fn resource_id_is_required() {
        for doc in [
            json!({ "value": "x" }),
            json!({ "resourceId": "" }),
            json!({ "resourceId": 7 }),
        ] {
            assert!(
                matches!(
                    validate(Some(doc.clone())),
                    Err(UpsertError::InvalidDocument { .. })
                ),
                "{doc}"
            );
        }
    }

    #[test]
    fn managed_fields_are_stripped() {
        let record = validate(Some(json!({
            "resourceId": "abc",
            "version": "99",
            "_etag": "\"forged\"",
            "isHistory": true,
            "value": "x",
        })))
        .unwrap();

        assert_eq!(record.resource_id, "abc");
        assert_eq!(record.version, None);
        assert_eq!(record.etag, None);
        assert!(!record.is_history);
        assert_eq!(record.payload.len(), 1);
        assert_eq!(record.field("value"), Some(&json!("x")));
    }

    #[test]
    fn missing_id_is_assigned_a_uuid() {
        let first = validate(Some(json!({ "resourceId": "order" }))).unwrap();
        let second = validate(Some(json!({ "resourceId": "order" }))).unwrap();

        assert!(Uuid::parse_str(&first.id).is_ok());
        assert_ne!(first.id, "order");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn explicit_id_is_kept() {
        let record = validate(Some(json!({ "id": "row-1", "resourceId": "abc" }))).unwrap();
        assert_eq!(record.id, "row-1");
        assert_eq!(record.resource_id, "abc");
    }

    #[test]
    fn routing() {
        assert_eq!(route(None, true), WritePath::Create);
        assert_eq!(route(Some("1"), true), WritePath::Replace);
        assert_eq!(route(None, false), WritePath::Replace);
        assert_eq!(route(Some("1"), false), WritePath::Replace);
    }
}
