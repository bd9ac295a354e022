//! Client for the Open-TTS speak endpoint.
//!
//! Used by the `opentts-speak` command, which browser userscripts call with
//! the current selection.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:3016/api/speak";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Body of a successful `POST /api/speak`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakResponse {
    pub audio_url: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SpeakClient {
    api_url: String,
    http: reqwest::Client,
}

impl SpeakClient {
    /// `api_url` is the full speak endpoint, e.g. [`DEFAULT_API_URL`].
    pub fn new(api_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build http client, using defaults");
                reqwest::Client::new()
            });
        Self {
            api_url: api_url.into(),
            http,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// The server origin: everything before `/api/`.
    pub fn base_url(&self) -> &str {
        match self.api_url.find("/api/") {
            Some(idx) => &self.api_url[..idx],
            None => self.api_url.trim_end_matches('/'),
        }
    }

    /// Absolute URL for a response's `audioUrl`.
    pub fn audio_url(&self, response: &SpeakResponse) -> String {
        let audio = response.audio_url.as_str();
        if audio.starts_with("http://") || audio.starts_with("https://") {
            return audio.to_string();
        }
        format!("{}/{}", self.base_url(), audio.trim_start_matches('/'))
    }

    /// Requests synthesis of `text` with the server's default voice.
    ///
    /// # Errors
    ///
    /// `Server` carries the server's `error` message for non-2xx replies.
    pub async fn speak(&self, text: &str) -> Result<SpeakResponse, ClientError> {
        let response = self
            .http
            .post(&self.api_url)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body
                .get("error")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("speak failed ({status})"));
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SpeakResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        if parsed.audio_url.trim().is_empty() {
            return Err(ClientError::InvalidResponse("empty audioUrl".to_string()));
        }
        Ok(parsed)
    }

    /// Downloads the generated WAV.
    pub async fn fetch_audio(&self, response: &SpeakResponse) -> Result<Vec<u8>, ClientError> {
        let url = self.audio_url(response);
        let reply = self.http.get(&url).send().await?;

        let status = reply.status();
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                message: format!("audio fetch failed for {url}"),
            });
        }
        Ok(reply.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str) -> SpeakResponse {
        SpeakResponse {
            audio_url: url.to_string(),
            voice: None,
            speed: None,
        }
    }

    #[test]
    fn base_url_strips_api_path() {
        let client = SpeakClient::new("http://localhost:3016/api/speak");
        assert_eq!(client.base_url(), "http://localhost:3016");

        let client = SpeakClient::new("http://tts.lan/");
        assert_eq!(client.base_url(), "http://tts.lan");
    }

    #[test]
    fn relative_audio_urls_are_resolved() {
        let client = SpeakClient::new(DEFAULT_API_URL);
        assert_eq!(
            client.audio_url(&response("/api/audio/a.wav")),
            "http://localhost:3016/api/audio/a.wav"
        );
        assert_eq!(
            client.audio_url(&response("https://cdn/a.wav")),
            "https://cdn/a.wav"
        );
    }
}
