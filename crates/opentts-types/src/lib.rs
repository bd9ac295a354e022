//! Shared types for the Open-TTS service.
//!
//! This crate holds the data model every other crate agrees on: voice
//! identifiers and catalog descriptors, the settings document with its
//! normalization rules, history entries, and the download formats the
//! service can transcode to.
//!
//! Nothing here touches the filesystem or spawns processes. Validation is
//! pure so that the store, the voice layer, and the HTTP layer all apply the
//! same rules.

pub mod history;
pub mod settings;
pub mod voice;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use history::HistoryEntry;
pub use settings::{Hotkeys, Settings, SettingsDefaults, Theme};
pub use voice::{
    is_valid_voice_id, CatalogEntry, InstalledVoice, ProviderVoiceId, VoiceDescriptor, VoiceKind,
};

/// Errors raised while validating client-supplied documents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A document had the wrong JSON shape.
    #[error("invalid document: {0}")]
    InvalidShape(String),

    /// A composite provider voice id could not be parsed.
    #[error("invalid provider voice id: {0}")]
    InvalidProviderVoice(String),
}

/// Output formats offered by the download endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    /// The synthesized WAV file, served as-is.
    #[default]
    Wav,
    /// MPEG layer III, produced by the external converter.
    Mp3,
    /// Ogg container, produced by the external converter.
    Ogg,
}

impl DownloadFormat {
    /// File extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
        }
    }

    /// MIME type sent with the download.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
        }
    }

    /// Parses a user-supplied format, coercing anything unknown to `wav`.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for DownloadFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            "ogg" => Ok(Self::Ogg),
            other => Err(ValidationError::InvalidShape(format!(
                "unsupported download format: {other}"
            ))),
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
