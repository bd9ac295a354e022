//! Audio post-processing: leading silence and format conversion.

use crate::config::ConverterConfig;
use crate::error::VoiceError;
use hound::{SampleFormat, WavReader, WavWriter};
use opentts_types::settings::MAX_PREPEND_SILENCE_MS;
use opentts_types::DownloadFormat;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Prepends `milliseconds` of silence to the WAV file at `path`.
///
/// The rewritten file keeps the original sample rate, channel count, bit
/// depth and sample format. The new file is written next to the original
/// and renamed over it. Returns false without touching the file when
/// `milliseconds` is zero or negative. At most `MAX_PREPEND_SILENCE_MS` is
/// added.
pub fn prepend_silence(path: &Path, milliseconds: i64) -> Result<bool, VoiceError> {
    if milliseconds <= 0 {
        return Ok(false);
    }
    let milliseconds = milliseconds.min(i64::from(MAX_PREPEND_SILENCE_MS));

    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let frames = u64::from(spec.sample_rate) * milliseconds as u64 / 1000;
    let silent_samples = frames * u64::from(spec.channels);

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(".silence-")
        .suffix(".wav")
        .tempfile_in(dir)?;

    {
        let mut writer = WavWriter::create(tmp.path(), spec)?;
        match spec.sample_format {
            SampleFormat::Float => {
                for _ in 0..silent_samples {
                    writer.write_sample(0.0f32)?;
                }
                for sample in reader.samples::<f32>() {
                    writer.write_sample(sample?)?;
                }
            }
            SampleFormat::Int => {
                for _ in 0..silent_samples {
                    writer.write_sample(0i32)?;
                }
                for sample in reader.samples::<i32>() {
                    writer.write_sample(sample?)?;
                }
            }
        }
        writer.finalize()?;
    }
    drop(reader);

    tmp.persist(path).map_err(|e| VoiceError::Io(e.error))?;
    Ok(true)
}

/// Returns the basename of a user-supplied audio name if it is a `.wav`
/// file name, else `None`.
///
/// Query strings and fragments are dropped first, then everything up to
/// the last path separator.
pub fn safe_audio_filename(name: &str) -> Option<String> {
    let path = name.split(['?', '#']).next().unwrap_or_default();
    let base = path.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = base.strip_suffix(".wav")?;
    if stem.is_empty() {
        return None;
    }
    Some(base.to_string())
}

/// Locates an executable. Names without a path separator are searched on
/// `PATH`.
pub fn resolve_binary(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 || binary.is_absolute() {
        return binary.is_file().then(|| binary.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// A file ready to be served for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedAudio {
    pub path: PathBuf,
    pub file_name: String,
    pub format: DownloadFormat,
}

/// Transcodes generated WAV files with an external converter, caching the
/// result next to the source.
#[derive(Debug, Clone)]
pub struct AudioConverter {
    binary: PathBuf,
    timeout: Duration,
}

impl AudioConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            binary: config.binary,
            timeout: config.timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        resolve_binary(&self.binary).is_some()
    }

    /// Returns `source` in the requested format.
    ///
    /// `<stem>.<ext>` next to the source is reused unless it is missing or
    /// older than the source.
    ///
    /// # Errors
    ///
    /// - `AudioNotFound` if the source is missing.
    /// - `ConversionUnavailable` if the converter binary cannot be found.
    /// - `Conversion` / `ConversionTimeout` if the converter fails.
    pub async fn convert(
        &self,
        source: &Path,
        format: DownloadFormat,
    ) -> Result<ConvertedAudio, VoiceError> {
        let source_meta = tokio::fs::metadata(source)
            .await
            .map_err(|_| VoiceError::AudioNotFound(source.display().to_string()))?;

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| VoiceError::AudioNotFound(source.display().to_string()))?;

        if format == DownloadFormat::Wav {
            return Ok(ConvertedAudio {
                path: source.to_path_buf(),
                file_name: format!("{stem}.wav"),
                format,
            });
        }

        let binary = resolve_binary(&self.binary).ok_or_else(|| {
            VoiceError::ConversionUnavailable(self.binary.display().to_string())
        })?;

        let file_name = format!("{stem}.{}", format.extension());
        let target = source.with_file_name(&file_name);

        if is_stale(&target, &source_meta).await {
            self.run_converter(&binary, source, &target).await?;
            tracing::info!(source = %source.display(), %format, "audio converted");
        } else {
            tracing::debug!(target = %target.display(), "reusing converted audio");
        }

        Ok(ConvertedAudio {
            path: target,
            file_name,
            format,
        })
    }

    async fn run_converter(
        &self,
        binary: &Path,
        source: &Path,
        target: &Path,
    ) -> Result<(), VoiceError> {
        let child = Command::new(binary)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| VoiceError::ConversionTimeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(VoiceError::Conversion {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// True when `target` is missing or older than the source.
async fn is_stale(target: &Path, source_meta: &std::fs::Metadata) -> bool {
    let Ok(target_meta) = tokio::fs::metadata(target).await else {
        return true;
    };
    match (target_meta.modified(), source_meta.modified()) {
        (Ok(target_mtime), Ok(source_mtime)) => target_mtime < source_mtime,
        _ => true,
    }
}
