use crate::audio::prepend_silence;
use crate::catalog::VoiceCatalog;
use crate::config::VoiceConfig;
use crate::error::VoiceError;
use crate::provider::{ProviderError, ProviderHandle, ProviderRequest};
use opentts_types::settings::{MAX_PREPEND_SILENCE_MS, MAX_SPEED, MIN_SPEED};
use opentts_types::ProviderVoiceId;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One synthesis request as received from a client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeakRequest {
    pub text: String,
    /// Falls back to the default voice when absent or blank.
    pub voice: Option<String>,
    pub speed: Option<f64>,
    pub prepend_silence_ms: Option<i64>,
}

/// A WAV file written to the audio directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOutput {
    pub file_name: String,
    pub path: PathBuf,
    /// The voice actually used, after any fallback.
    pub voice: String,
    /// The clamped speed.
    pub speed: f64,
}

/// Coerces a requested speed into the supported range. Non-positive and
/// non-finite values mean normal speed.
pub fn effective_speed(speed: f64) -> f64 {
    if !speed.is_finite() || speed <= 0.0 {
        return 1.0;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// Piper's `--length_scale` for an already clamped speed, to three decimals.
pub fn length_scale(speed: f64) -> f64 {
    ((1.0 / speed) * 1000.0).round() / 1000.0
}

/// Turns text into WAV files with Piper or the secondary provider.
#[derive(Debug)]
pub struct TtsService {
    audio_dir: PathBuf,
    piper_binary: PathBuf,
    timeout: Duration,
    catalog: Arc<VoiceCatalog>,
    provider: ProviderHandle,
}

impl TtsService {
    pub fn new(config: &VoiceConfig, catalog: Arc<VoiceCatalog>, provider: ProviderHandle) -> Self {
        Self {
            audio_dir: config.audio_dir.clone(),
            piper_binary: config.piper_binary.clone(),
            timeout: config.synthesis_timeout,
            catalog,
            provider,
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn catalog(&self) -> &Arc<VoiceCatalog> {
        &self.catalog
    }

    /// Synthesizes `request.text` into a new file in the audio directory.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for blank text.
    /// - `NotEnabled` / `NotFound` for provider voices that are disabled or
    ///   unsupported.
    /// - `VoiceNotFound` when neither the requested nor the default Piper
    ///   model is installed.
    /// - `Synthesis`, `SynthesisTimeout` or `Provider` when the engine fails.
    pub async fn speak(&self, request: SpeakRequest) -> Result<SpeechOutput, VoiceError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(VoiceError::InvalidRequest("text is required".to_string()));
        }

        let voice = request
            .voice
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.catalog.default_voice())
            .to_string();
        let speed = effective_speed(request.speed.unwrap_or(1.0));

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let file_name = format!("{}.wav", uuid::Uuid::new_v4().simple());
        let path = self.audio_dir.join(&file_name);

        let voice = if ProviderVoiceId::looks_composite(&voice) {
            self.synthesize_provider(text, &voice, speed, &path).await?
        } else {
            self.synthesize_piper(text, &voice, speed, &path).await?
        };

        let silence_ms = request
            .prepend_silence_ms
            .unwrap_or(0)
            .min(i64::from(MAX_PREPEND_SILENCE_MS));
        if silence_ms > 0 {
            let target = path.clone();
            let result = tokio::task::spawn_blocking(move || prepend_silence(&target, silence_ms))
                .await
                .map_err(|e| VoiceError::Io(std::io::Error::other(e)))
                .and_then(|r| r);
            if let Err(e) = result {
                tracing::warn!(file = %file_name, error = %e, "failed to prepend silence");
            }
        }

        tracing::info!(file = %file_name, %voice, speed, chars = text.chars().count(), "speech generated");

        Ok(SpeechOutput {
            file_name,
            path,
            voice,
            speed,
        })
    }

    async fn synthesize_piper(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
        output: &Path,
    ) -> Result<String, VoiceError> {
        let catalog = self.catalog.clone();
        let requested = voice.to_string();
        let resolved = tokio::task::spawn_blocking(move || {
            if let Some(path) = catalog.installed_model(&requested) {
                return Some((requested, path));
            }
            let default = catalog.default_voice().to_string();
            let path = catalog.installed_model(&default)?;
            tracing::info!(requested = %requested, fallback = %default, "voice not installed, using default");
            Some((default, path))
        })
        .await
        .map_err(|e| VoiceError::Io(std::io::Error::other(e)))?;
        let (voice, model_path) =
            resolved.ok_or_else(|| VoiceError::VoiceNotFound(voice.to_string()))?;

        let mut child = Command::new(&self.piper_binary)
            .arg("--model")
            .arg(&model_path)
            .arg("--output_file")
            .arg(output)
            .arg("--length_scale")
            .arg(length_scale(speed).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Synthesis {
                stderr: format!("failed to spawn piper: {e}"),
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| VoiceError::Synthesis {
            stderr: "failed to open piper stdin".to_string(),
        })?;
        let text_owned = text.to_string();
        let write_task = tokio::spawn(async move { stdin.write_all(text_owned.as_bytes()).await });

        let output_status = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| VoiceError::SynthesisTimeout(self.timeout.as_secs()))??;

        if !output_status.status.success() {
            return Err(VoiceError::Synthesis {
                stderr: String::from_utf8_lossy(&output_status.stderr).into_owned(),
            });
        }

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "piper closed stdin early"),
            Err(e) => tracing::debug!(error = %e, "piper stdin task failed"),
        }

        Ok(voice)
    }

    async fn synthesize_provider(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
        output: &Path,
    ) -> Result<String, VoiceError> {
        let voice = voice
            .parse::<ProviderVoiceId>()
            .map_err(|_| VoiceError::NotFound(voice.to_string()))?;
        let canonical = voice.to_string();

        let catalog = self.catalog.clone();
        let lookup = voice.clone();
        let enabled =
            tokio::task::spawn_blocking(move || catalog.is_provider_voice_enabled(&lookup))
                .await
                .map_err(|e| VoiceError::Io(std::io::Error::other(e)))?;
        if !enabled {
            return Err(VoiceError::NotEnabled(canonical));
        }
        if !voice.is_supported() {
            return Err(VoiceError::NotFound(canonical));
        }

        let engine = self.provider.get().await?;
        let text = text.to_string();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let mut request = ProviderRequest {
                text: &text,
                language: &voice.language,
                style: &voice.style,
                speed: Some(speed as f32),
            };
            match engine.synthesize(&request, &output) {
                Err(ProviderError::SpeedUnsupported) => {
                    tracing::info!("provider rejected speed, retrying at its default pace");
                    request.speed = None;
                    engine.synthesize(&request, &output)
                }
                other => other,
            }
        })
        .await
        .map_err(|e| ProviderError::Failed(format!("provider task failed: {e}")))??;

        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_is_clamped() {
        assert_eq!(effective_speed(1.0), 1.0);
        assert_eq!(effective_speed(0.1), 0.5);
        assert_eq!(effective_speed(5.0), 2.0);
        assert_eq!(effective_speed(1.3), 1.3);
    }

    #[test]
    fn invalid_speed_means_normal() {
        assert_eq!(effective_speed(0.0), 1.0);
        assert_eq!(effective_speed(-2.0), 1.0);
        assert_eq!(effective_speed(f64::NAN), 1.0);
        assert_eq!(effective_speed(f64::INFINITY), 1.0);
    }

    #[test]
    fn length_scale_is_inverse_speed() {
        assert_eq!(length_scale(1.0), 1.0);
        assert_eq!(length_scale(2.0), 0.5);
        assert_eq!(length_scale(0.5), 2.0);
        assert_eq!(length_scale(1.5), 0.667);
        assert_eq!(length_scale(0.7), 1.429);
    }
}
