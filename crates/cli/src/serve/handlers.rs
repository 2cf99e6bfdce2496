//! HTTP route handlers: health, upsert, current revision, history.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use revstore_engine::{ErrorKind, OutcomeType, UpsertError, UpsertRequest};
use revstore_storage::{DocumentStore, StorageError};
use serde::Deserialize;
use serde_json::Value;

use super::json_error;
use super::state::AppState;

/// Query parameters of `PUT /documents`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpsertParams {
    #[serde(default = "default_allow_create")]
    allow_create: bool,
    #[serde(default)]
    keep_history: bool,
}

fn default_allow_create() -> bool {
    true
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "revstore_version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// PUT /documents
pub(crate) async fn handle_put_document(
    State(state): State<Arc<AppState>>,
    params: Result<Query<UpsertParams>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            return kind_error(
                ErrorKind::BadRequest,
                &format!("invalid query: {}", rejection.body_text()),
            );
        }
    };

    let document = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(v) => Some(v),
            Err(e) => {
                return kind_error(ErrorKind::BadRequest, &format!("invalid JSON body: {}", e));
            }
        }
    };

    let request = UpsertRequest {
        document,
        match_version: headers
            .get(header::IF_MATCH)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_if_match),
        allow_create: params.allow_create,
        keep_history: params.keep_history,
    };

    match state.engine.upsert(&state.store, request).await {
        Ok(outcome) => {
            let status = match outcome.outcome_type {
                OutcomeType::Created => StatusCode::CREATED,
                OutcomeType::Updated => StatusCode::OK,
            };
            (status, Json(outcome)).into_response()
        }
        Err(e) => upsert_error(&e),
    }
}

/// GET /documents/{resource_id}
pub(crate) async fn handle_get_document(
    State(state): State<Arc<AppState>>,
    Path(resource_id): Path<String>,
) -> Response {
    match state.store.get_current(&resource_id).await {
        Ok(Some(doc)) => (StatusCode::OK, Json(doc)).into_response(),
        Ok(None) => upsert_error(&UpsertError::NotFound { resource_id }),
        Err(e) => storage_error(e),
    }
}

/// GET /documents/{resource_id}/history
pub(crate) async fn handle_get_history(
    State(state): State<Arc<AppState>>,
    Path(resource_id): Path<String>,
) -> Response {
    match state.store.list_history(&resource_id).await {
        Ok(history) => {
            let response = serde_json::json!({
                "resourceId": resource_id,
                "history": history,
            });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => storage_error(e),
    }
}

/// Interpret an `If-Match` value as a match version. Surrounding quotes and
/// a weak-validator prefix are dropped; `*` matches any version.
fn parse_if_match(raw: &str) -> Option<String> {
    let value = raw.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    if value.is_empty() || value == "*" {
        None
    } else {
        Some(value.to_string())
    }
}

fn kind_error(kind: ErrorKind, message: &str) -> Response {
    let status =
        StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
        "error": message,
        "kind": kind.as_str(),
    });
    (status, Json(body)).into_response()
}

fn upsert_error(e: &UpsertError) -> Response {
    kind_error(e.kind(), &e.to_string())
}

fn storage_error(e: StorageError) -> Response {
    upsert_error(&UpsertError::from(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_match_accepts_bare_quoted_and_weak_versions() {
        assert_eq!(parse_if_match("3"), Some("3".to_string()));
        assert_eq!(parse_if_match("\"3\""), Some("3".to_string()));
        assert_eq!(parse_if_match(" W/\"3\" "), Some("3".to_string()));
    }

    #[test]
    fn wildcard_or_empty_if_match_means_no_version() {
        assert_eq!(parse_if_match("*"), None);
        assert_eq!(parse_if_match("\"\""), None);
        assert_eq!(parse_if_match("  "), None);
    }

    #[test]
    fn error_status_follows_kind() {
        let response = upsert_error(&UpsertError::PreconditionFailed {
            resource_id: "abc".to_string(),
            expected: "1".to_string(),
            found: "2".to_string(),
        });
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

        let response = storage_error(StorageError::Unavailable {
            operation: "query".to_string(),
        });
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
