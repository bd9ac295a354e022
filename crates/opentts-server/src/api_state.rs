//! Settings and history handlers.

use crate::api::{run_blocking, ApiError, LenientJson};
use crate::AppState;
use axum::{extract::Extension, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// Handler for `GET /api/settings`.
pub async fn get_settings_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let settings = run_blocking(move || Ok(store.read_settings())).await?;
    Ok(Json(json!({ "settings": settings })))
}

/// Handler for `PUT /api/settings`.
///
/// Accepts the settings object directly or wrapped as `{settings: {...}}`.
/// Every field is re-validated; the normalized document is returned.
pub async fn put_settings_handler(
    Extension(state): Extension<Arc<AppState>>,
    LenientJson(body): LenientJson,
) -> Result<Json<Value>, ApiError> {
    let incoming = match body.get("settings") {
        Some(inner @ Value::Object(_)) => inner.clone(),
        _ => body,
    };
    let store = state.store.clone();
    let settings = run_blocking(move || Ok(store.write_settings(&incoming)?)).await?;
    Ok(Json(json!({ "settings": settings })))
}

/// Handler for `GET /api/history`.
pub async fn get_history_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let history = run_blocking(move || Ok(store.read_history())).await?;
    Ok(Json(json!({ "history": history })))
}

/// Handler for `PUT /api/history`. Replaces the whole list.
pub async fn put_history_handler(
    Extension(state): Extension<Arc<AppState>>,
    LenientJson(body): LenientJson,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.clone();
    let history = run_blocking(move || Ok(store.replace_history(&body)?)).await?;
    Ok(Json(json!({ "history": history })))
}

/// Handler for `POST /api/history`. Appends one entry.
pub async fn post_history_handler(
    Extension(state): Extension<Arc<AppState>>,
    LenientJson(body): LenientJson,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let store = state.store.clone();
    let entry = run_blocking(move || Ok(store.append_history(&body)?)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "entry": entry })),
    ))
}
