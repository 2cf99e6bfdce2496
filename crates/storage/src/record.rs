use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single document as held by the store: either the live primary record
/// of a resource or an immutable history snapshot of a retired revision.
///
/// Serialized form keeps the store-managed fields next to the caller's
/// payload fields, e.g.
///
/// ```json
/// {"id": "abc", "resourceId": "abc", "version": "2", "_etag": "\"...\"",
///  "_lastModified": "2026-01-01T00:00:00Z", "isHistory": false, "value": "y"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Store identity key, unique within the collection.
    pub id: String,
    /// Logical identifier, stable across versions.
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Concurrency token assigned by the store on every write.
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// RFC 3339 timestamp assigned by the store on every write.
    #[serde(
        rename = "_lastModified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub is_history: bool,
    /// Arbitrary caller-owned fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl DocumentRecord {
    /// A live record with no version or store metadata yet.
    pub fn new(
        id: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_id: resource_id.into(),
            version: None,
            etag: None,
            last_modified: None,
            is_history: false,
            payload,
        }
    }

    /// Parse a record from its JSON representation.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Look up a payload field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}
