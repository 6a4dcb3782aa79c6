//! Shared API plumbing plus the short-id, submit and app-config handlers.

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spasm_store::{EventStore, StoreError};
use spasm_types::SubmitOutcome;
use std::sync::Arc;
use thiserror::Error;

/// Category of a failed request, reported in the `kind` field of the error
/// body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Storage,
    Conversion,
    Task,
    InvalidRequest,
}

/// Body of every error response: `{"error": "...", "kind": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("conversion failure: {0}")]
    Conversion(String),
    #[error("task failure: {0}")]
    Task(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Storage(_) => ErrorKind::Storage,
            ApiError::Conversion(_) => ErrorKind::Conversion,
            ApiError::Task(_) => ErrorKind::Task,
            ApiError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conversion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidEvent(msg) => ApiError::InvalidRequest(msg),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

/// Runs one blocking store operation off the async runtime.
///
/// Failures are logged once here, with the operation name, and surface as
/// [`ApiError`].
pub(crate) async fn run_store<T, F>(
    store: &Arc<dyn EventStore>,
    operation: &'static str,
    f: F,
) -> Result<T, ApiError>
where
    F: FnOnce(&dyn EventStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| {
            tracing::error!(operation, error = %e, "store task join error");
            ApiError::Task(format!("task join error: {}", e))
        })?
        .map_err(|e| {
            tracing::error!(operation, error = %e, "store operation failed");
            ApiError::from(e)
        })
}

/// Handler for `GET /api/short-id/{id}`.
///
/// Lists every stored full id that starts with the given prefix.
pub async fn get_full_ids_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(short_id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let ids = run_store(&state.store, "fetch_full_ids_from_short_id", move |store| {
        store.fetch_full_ids_from_short_id(&short_id)
    })
    .await?;
    Ok(Json(ids))
}

/// Clients may wrap the event as `{"unknownEvent": {...}}`; the wrapper is
/// dropped when present and non-null.
pub fn unwrap_unknown_event(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("unknownEvent") {
            Some(inner) if !inner.is_null() && inner != Value::Bool(false) => inner,
            Some(inner) => {
                map.insert("unknownEvent".to_string(), inner);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Handler for `POST /api/submit/`.
pub async fn submit_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SubmitOutcome>, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let unknown = unwrap_unknown_event(body);

    let event = spasm_convert::convert_to_spasm_event(&unknown).ok_or_else(|| {
        ApiError::Conversion("event is not in a supported format".to_string())
    })?;

    let outcome = run_store(&state.store, "submit_event", move |store| {
        store.submit_event(event)
    })
    .await?;

    match &outcome {
        SubmitOutcome::Saved { id } => tracing::info!(id = %id, "event saved"),
        SubmitOutcome::Duplicate { id } => tracing::debug!(id = %id, "duplicate event ignored"),
    }
    Ok(Json(outcome))
}

/// Handler for `GET /api/app-config`.
///
/// Returns the stored configuration object, or `{}` when nothing usable is
/// stored.
pub async fn get_app_config_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let stored = run_store(&state.store, "fetch_app_config", |store| {
        store.fetch_app_config()
    })
    .await?;

    Ok(Json(match stored {
        Some(config @ Value::Object(_)) => config,
        Some(other) => {
            tracing::warn!(stored = %other, "stored app config is not an object");
            Value::Object(Map::new())
        }
        None => Value::Object(Map::new()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrapper_is_removed() {
        let inner = json!({ "content": "hi" });
        assert_eq!(
            unwrap_unknown_event(json!({ "unknownEvent": inner.clone() })),
            inner
        );
    }

    #[test]
    fn bare_body_is_kept() {
        let body = json!({ "content": "hi", "pubkey": "abc" });
        assert_eq!(unwrap_unknown_event(body.clone()), body);
    }

    #[test]
    fn null_wrapper_is_not_unwrapped() {
        let body = json!({ "unknownEvent": null, "content": "hi" });
        assert_eq!(unwrap_unknown_event(body.clone()), body);
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(
            ApiError::InvalidRequest(String::new()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conversion(String::new()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Storage(String::new()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(StoreError::InvalidEvent("no ids".to_string())).kind(),
            ErrorKind::InvalidRequest
        );
    }
}
