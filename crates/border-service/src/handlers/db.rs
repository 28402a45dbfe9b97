//! Record tree access over HTTP.
//!
//! Writes go through the shared [`Store`](border_store::Store), so they
//! publish changes and fire the same triggers as any other writer.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use border_core::{Collection, RecordKey, RecordPath};

use crate::error::ApiError;
use crate::state::AppState;

/// Response for a pushed record.
#[derive(Debug, Serialize)]
pub struct PushResponse {
    /// Generated record key.
    pub key: RecordKey,
}

/// List a collection as `{key: record}`.
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let collection: Collection = collection.parse()?;
    let records = state
        .store
        .list(&state.version, collection)?
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    Ok(Json(records))
}

/// Store a record under a generated key.
pub async fn push_record(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(value): Json<Value>,
) -> Result<(StatusCode, Json<PushResponse>), ApiError> {
    let collection: Collection = collection.parse()?;
    let key = state.store.push(&state.version, collection, value)?;
    tracing::debug!(collection = %collection, key = %key, "Record pushed");
    Ok((StatusCode::CREATED, Json(PushResponse { key })))
}

/// Read a record.
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((collection, key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let path = record_path(&state, &collection, &key)?;
    state
        .store
        .get(&path)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{path} not found")))
}

/// Replace a record. A `null` body deletes it.
pub async fn put_record(
    State(state): State<Arc<AppState>>,
    Path((collection, key)): Path<(String, String)>,
    Json(value): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let path = record_path(&state, &collection, &key)?;
    state.store.set(&path, value)?;
    current(&state, &path)
}

/// Merge fields into a record.
pub async fn patch_record(
    State(state): State<Arc<AppState>>,
    Path((collection, key)): Path<(String, String)>,
    Json(value): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let path = record_path(&state, &collection, &key)?;
    let Value::Object(fields) = value else {
        return Err(ApiError::BadRequest("PATCH body must be an object".into()));
    };
    state.store.update(&path, fields)?;
    current(&state, &path)
}

/// Set one field of a record. A `null` body removes the field.
pub async fn put_field(
    State(state): State<Arc<AppState>>,
    Path((collection, key, field)): Path<(String, String, String)>,
    Json(value): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let path = record_path(&state, &collection, &key)?;
    state.store.set_child(&path, &field, value)?;
    current(&state, &path)
}

/// Delete a record.
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((collection, key)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let path = record_path(&state, &collection, &key)?;
    state.store.delete(&path)?;
    Ok(StatusCode::NO_CONTENT)
}

fn record_path(state: &AppState, collection: &str, key: &str) -> Result<RecordPath, ApiError> {
    let collection: Collection = collection.parse()?;
    let key = RecordKey::new(key).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(state.version.record(collection, &key))
}

fn current(state: &AppState, path: &RecordPath) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.store.get(path)?.unwrap_or(Value::Null)))
}
