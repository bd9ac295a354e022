//! Shared pieces of the HTTP API: the error type and the lenient JSON body
//! extractor.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use opentts_store::StoreError;
use opentts_voice::{ProviderError, VoiceError};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("timed out: {0}")]
    GatewayTimeout(String),
    /// A failure the client cannot fix. `stderr` carries the output of the
    /// external program involved, when there is one.
    #[error("internal server error: {message}")]
    Internal {
        message: String,
        stderr: Option<String>,
    },
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            stderr: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadGateway(msg)
            | ApiError::NotImplemented(msg)
            | ApiError::GatewayTimeout(msg) => json!({ "error": msg }),
            ApiError::Internal { message, stderr } => {
                tracing::error!(error = %message, "request failed");
                match stderr {
                    Some(stderr) => json!({ "error": message, "stderr": stderr }),
                    None => json!({ "error": message }),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::InvalidRequest(_)
            | VoiceError::VoiceNotFound(_)
            | VoiceError::DefaultVoice(_) => ApiError::BadRequest(err.to_string()),
            VoiceError::NotFound(_) | VoiceError::NotEnabled(_) | VoiceError::AudioNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            VoiceError::Download(_) => ApiError::BadGateway(err.to_string()),
            VoiceError::ConversionUnavailable(_) => ApiError::NotImplemented(err.to_string()),
            VoiceError::SynthesisTimeout(_)
            | VoiceError::ConversionTimeout(_)
            | VoiceError::Provider(ProviderError::Timeout(_)) => {
                ApiError::GatewayTimeout(err.to_string())
            }
            VoiceError::Synthesis { stderr } => ApiError::Internal {
                message: "piper synthesis failed".to_string(),
                stderr: Some(stderr),
            },
            VoiceError::Conversion { stderr } => ApiError::Internal {
                message: "audio conversion failed".to_string(),
                stderr: Some(stderr),
            },
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Runs blocking state or filesystem work on the blocking pool.
pub async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("task join error: {e}")))?
}

/// A request body parsed as JSON without ever rejecting the request.
///
/// A missing, empty or malformed body becomes an empty object, as does any
/// JSON value that is not an object or array.
#[derive(Debug, Clone, PartialEq)]
pub struct LenientJson(pub Value);

impl LenientJson {
    /// The trimmed string field `key`, if present and non-blank.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// The numeric field `key`. Numeric strings are accepted too.
    pub fn number_field(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl<S> FromRequest<S> for LenientJson
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(Self(parse_lenient(&bytes)))
    }
}

fn parse_lenient(bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        Ok(_) => Value::Object(Map::new()),
        Err(e) => {
            if !bytes.is_empty() {
                tracing::debug!(error = %e, "ignoring malformed request body");
            }
            Value::Object(Map::new())
        }
    }
}
