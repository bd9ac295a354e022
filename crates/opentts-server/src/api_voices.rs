//! Voice catalog handlers.

use crate::api::{run_blocking, ApiError, LenientJson};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Handler for `GET /api/voices`.
///
/// Returns installed voices, the full catalog with status, and the default
/// voice id.
pub async fn list_voices_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let catalog = state.catalog.clone();
    let body = run_blocking(move || {
        Ok(json!({
            "voices": catalog.list_installed(),
            "catalog": catalog.list_catalog_with_status(),
            "default": catalog.default_voice(),
        }))
    })
    .await?;
    Ok(Json(body))
}

/// Handler for `POST /api/voices/install`.
pub async fn install_voice_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: LenientJson,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let voice = body.str_field("voice").unwrap_or_default();
    let outcome = state.catalog.install(voice).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": true,
            "voice": outcome.voice,
            "downloaded": outcome.downloaded,
        })),
    ))
}

/// Handler for `DELETE /api/voices/{voice_id}`.
pub async fn uninstall_voice_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(voice_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let catalog = state.catalog.clone();
    let outcome = run_blocking(move || Ok(catalog.uninstall(&voice_id)?)).await?;

    Ok(Json(json!({
        "ok": true,
        "removed": outcome.removed,
        "voice": outcome.voice,
    })))
}
