//! Speech synthesis handler.

use crate::api::{ApiError, LenientJson};
use crate::AppState;
use axum::{extract::Extension, http::StatusCode, Json};
use opentts_types::settings::MAX_PREPEND_SILENCE_MS;
use opentts_voice::SpeakRequest;
use serde_json::{json, Value};
use std::sync::Arc;

/// Handler for `POST /api/speak`.
///
/// Body: `{text, voice?, speed?, prependSilenceMs?}`. Responds `201` with
/// `{audioUrl, voice, speed}` where `voice` is the voice actually used and
/// `speed` the clamped speed.
pub async fn speak_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: LenientJson,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let silence_ms = body
        .number_field("prependSilenceMs")
        .filter(|ms| ms.is_finite())
        .map(|ms| ms.round().clamp(0.0, f64::from(MAX_PREPEND_SILENCE_MS)) as i64)
        .unwrap_or_else(|| i64::from(state.default_prepend_silence_ms));

    let request = SpeakRequest {
        text: body.str_field("text").unwrap_or_default().to_string(),
        voice: body.str_field("voice").map(str::to_string),
        speed: body.number_field("speed"),
        prepend_silence_ms: Some(silence_ms),
    };

    let output = state.tts.speak(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "audioUrl": format!("/api/audio/{}", output.file_name),
            "voice": output.voice,
            "speed": output.speed,
        })),
    ))
}
