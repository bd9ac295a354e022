//! Server configuration loading from file and environment variables.

use opentts_voice::{
    ConverterConfig, KittenConfig, VoiceConfig, DEFAULT_VOICE, DEFAULT_VOICE_BASE,
};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Piper voices and the synthesis binary.
    #[serde(default)]
    pub voices: VoicesConfig,

    /// Generated audio and format conversion.
    #[serde(default)]
    pub audio: AudioConfig,

    /// Settings, history and enabled provider voices.
    #[serde(default)]
    pub state: StateConfig,

    /// Secondary synthesis provider.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Optional web frontend.
    #[serde(default)]
    pub frontend: FrontendConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "opentts_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoicesConfig {
    #[serde(default = "default_voices_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// Base URL used to fetch the default voice when it is not in the
    /// built-in catalog.
    #[serde(default = "default_voice_base")]
    pub default_voice_base: String,

    #[serde(default = "default_piper_binary")]
    pub piper_binary: PathBuf,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_audio_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_converter_binary")]
    pub converter_binary: PathBuf,

    #[serde(default = "default_timeout_seconds")]
    pub conversion_timeout_seconds: u64,

    /// Silence prepended when neither the request nor the settings say
    /// otherwise. Clamped to 0..=3000.
    #[serde(default)]
    pub prepend_silence_ms: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_binary")]
    pub binary: PathBuf,

    #[serde(default = "default_provider_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_provider_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontendConfig {
    /// Served at `/` when it contains `index.html`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3016
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_voices_dir() -> PathBuf {
    PathBuf::from("/data/voices")
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_voice_base() -> String {
    DEFAULT_VOICE_BASE.to_string()
}

fn default_piper_binary() -> PathBuf {
    PathBuf::from("piper")
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("/data/audio")
}

fn default_converter_binary() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/data/state")
}

fn default_provider_binary() -> PathBuf {
    PathBuf::from("kitten-tts")
}

fn default_provider_data_dir() -> PathBuf {
    PathBuf::from("/data/kitten")
}

fn default_provider_timeout_seconds() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            dir: default_voices_dir(),
            default_voice: default_voice(),
            default_voice_base: default_voice_base(),
            piper_binary: default_piper_binary(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            dir: default_audio_dir(),
            converter_binary: default_converter_binary(),
            conversion_timeout_seconds: default_timeout_seconds(),
            prepend_silence_ms: 0,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            binary: default_provider_binary(),
            data_dir: default_provider_data_dir(),
            timeout_seconds: default_provider_timeout_seconds(),
        }
    }
}

impl Config {
    pub fn voice_config(&self) -> VoiceConfig {
        VoiceConfig {
            voices_dir: self.voices.dir.clone(),
            audio_dir: self.audio.dir.clone(),
            default_voice: self.voices.default_voice.clone(),
            default_voice_base: self.voices.default_voice_base.clone(),
            piper_binary: self.voices.piper_binary.clone(),
            synthesis_timeout: Duration::from_secs(self.voices.timeout_seconds),
        }
    }

    pub fn converter_config(&self) -> ConverterConfig {
        ConverterConfig {
            binary: self.audio.converter_binary.clone(),
            timeout: Duration::from_secs(self.audio.conversion_timeout_seconds),
        }
    }

    pub fn kitten_config(&self) -> KittenConfig {
        KittenConfig {
            binary: self.provider.binary.clone(),
            data_dir: self.provider.data_dir.clone(),
            timeout: Duration::from_secs(self.provider.timeout_seconds),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides (see [`apply_env_overrides`]).
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Applies environment variable overrides using `lookup`.
///
/// - `OPENTTS_HOST`, `OPENTTS_PORT` override `server.*`
/// - `OPENTTS_LOG_LEVEL`, `OPENTTS_LOG_JSON` ("true" or "1") override `logging.*`
/// - `PIPER_VOICES_DIR`, `PIPER_DEFAULT_VOICE`, `PIPER_DEFAULT_VOICE_BASE`,
///   `PIPER_BIN`, `PIPER_TIMEOUT_SECONDS` override `voices.*`
/// - `PIPER_AUDIO_DIR`, `OPENTTS_FFMPEG_BIN`, `OPENTTS_PREPEND_SILENCE_MS`
///   override `audio.*`
/// - `OPENTTS_STATE_DIR` overrides `state.dir`
/// - `KITTEN_TTS_BIN`, `KITTEN_TTS_HOME` override `provider.*`
/// - `OPENTTS_FRONTEND_DIR` overrides `frontend.dir`
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(
    mut config: Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Config {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(parsed) = var("OPENTTS_HOST").and_then(|v| v.trim().parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = var("OPENTTS_PORT").and_then(|v| v.trim().parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(level) = var("OPENTTS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("OPENTTS_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    if let Some(dir) = var("PIPER_VOICES_DIR") {
        config.voices.dir = PathBuf::from(dir);
    }
    if let Some(voice) = var("PIPER_DEFAULT_VOICE") {
        config.voices.default_voice = voice.trim().to_string();
    }
    if let Some(base) = var("PIPER_DEFAULT_VOICE_BASE") {
        config.voices.default_voice_base = base;
    }
    if let Some(bin) = var("PIPER_BIN") {
        config.voices.piper_binary = PathBuf::from(bin);
    }
    if let Some(parsed) = var("PIPER_TIMEOUT_SECONDS").and_then(|v| v.trim().parse().ok()) {
        config.voices.timeout_seconds = parsed;
    }

    if let Some(dir) = var("PIPER_AUDIO_DIR") {
        config.audio.dir = PathBuf::from(dir);
    }
    if let Some(bin) = var("OPENTTS_FFMPEG_BIN") {
        config.audio.converter_binary = PathBuf::from(bin);
    }
    if let Some(parsed) = var("OPENTTS_PREPEND_SILENCE_MS").and_then(|v| v.trim().parse().ok()) {
        config.audio.prepend_silence_ms = parsed;
    }

    if let Some(dir) = var("OPENTTS_STATE_DIR") {
        config.state.dir = PathBuf::from(dir);
    }

    if let Some(bin) = var("KITTEN_TTS_BIN") {
        config.provider.binary = PathBuf::from(bin);
    }
    if let Some(dir) = var("KITTEN_TTS_HOME") {
        config.provider.data_dir = PathBuf::from(dir);
    }

    if let Some(dir) = var("OPENTTS_FRONTEND_DIR") {
        config.frontend.dir = Some(PathBuf::from(dir));
    }

    config
}
