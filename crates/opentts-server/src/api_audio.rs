//! Generated audio playback and download handlers.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    body::Body,
    extract::{Extension, Path, Query, Request},
    http::{header, HeaderValue},
    response::Response,
};
use opentts_types::DownloadFormat;
use opentts_voice::safe_audio_filename;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

/// Resolves a client-supplied name to an existing file in the audio
/// directory. Rejects the name before touching the filesystem if it is not a
/// plain `.wav` file name.
async fn resolve_audio(state: &AppState, name: &str) -> Result<PathBuf, ApiError> {
    let file_name = safe_audio_filename(name)
        .ok_or_else(|| ApiError::BadRequest("invalid filename".to_string()))?;
    let path = state.audio_dir.join(file_name);

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(ApiError::NotFound("audio not found".to_string())),
    }
}

/// Serves `path` with range support. Successful replies get `mime` as
/// their content type.
async fn serve_file(
    path: PathBuf,
    mime: &'static str,
    attachment: Option<&str>,
    req: Request,
) -> Result<Response, ApiError> {
    let mut response = ServeFile::new(path)
        .oneshot(req)
        .await
        .unwrap_or_else(|e| match e {})
        .map(Body::new);

    // 304 and range errors keep the headers ServeFile chose.
    if !response.status().is_success() {
        return Ok(response);
    }

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    if let Some(file_name) = attachment {
        let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
            .map_err(|e| ApiError::internal(format!("invalid download name: {e}")))?;
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    Ok(response)
}

/// Handler for `GET /api/audio/{*name}`.
pub async fn audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    let path = resolve_audio(&state, &name).await?;
    serve_file(path, DownloadFormat::Wav.mime_type(), None, req).await
}

/// Handler for `GET /api/download/{*name}?format=wav|mp3|ogg`.
///
/// Unknown formats fall back to WAV. MP3 and OGG are produced by the
/// converter and cached next to the source.
pub async fn download_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<DownloadQuery>,
    req: Request,
) -> Result<Response, ApiError> {
    let source = resolve_audio(&state, &name).await?;
    let format = DownloadFormat::parse_lenient(query.format.as_deref());

    let converted = state.converter.convert(&source, format).await?;
    serve_file(
        converted.path,
        format.mime_type(),
        Some(&converted.file_name),
        req,
    )
    .await
}
