use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_VOICE: &str = "en_US-lessac-medium";
pub const DEFAULT_VOICE_BASE: &str =
    "https://huggingface.co/rhasspy/piper-voices/resolve/v1.0.0/en/en_US/lessac/medium";

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Paths and binaries used by the catalog and the synthesis dispatcher.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Directory holding `<id>.onnx` / `<id>.onnx.json` pairs.
    pub voices_dir: PathBuf,
    /// Directory receiving generated audio.
    pub audio_dir: PathBuf,
    pub default_voice: String,
    /// Where to fetch the default voice when it is not in the catalog.
    pub default_voice_base: String,
    pub piper_binary: PathBuf,
    pub synthesis_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voices_dir: PathBuf::from("/data/voices"),
            audio_dir: PathBuf::from("/data/audio"),
            default_voice: DEFAULT_VOICE.to_string(),
            default_voice_base: DEFAULT_VOICE_BASE.to_string(),
            piper_binary: PathBuf::from("piper"),
            synthesis_timeout: default_timeout(),
        }
    }
}

/// External audio converter (ffmpeg).
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub binary: PathBuf,
    pub timeout: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            timeout: default_timeout(),
        }
    }
}

/// Secondary provider (KittenTTS command-line engine).
#[derive(Debug, Clone)]
pub struct KittenConfig {
    pub binary: PathBuf,
    /// Model cache provisioned on first use.
    pub data_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for KittenConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("kitten-tts"),
            data_dir: PathBuf::from("/data/kitten"),
            timeout: Duration::from_secs(120),
        }
    }
}
