//! Voice identifiers, the static voice catalogs, and catalog descriptors.
//!
//! Two kinds of voice exist. File-based Piper voices are identified by a
//! plain id that doubles as the stem of the model files on disk, so the id
//! alphabet is restricted to keep it from escaping the voices directory.
//! Provider voices use a composite `provider:language:style` id and are
//! enabled through a persisted set rather than by file presence.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the secondary in-process provider.
pub const PROVIDER_NAME: &str = "kitten";

/// Languages the provider can speak.
pub const PROVIDER_LANGUAGES: &[&str] = &["en-us"];

/// Voice styles shipped with the provider.
pub const PROVIDER_STYLES: &[&str] = &[
    "expr-voice-2-m",
    "expr-voice-2-f",
    "expr-voice-3-m",
    "expr-voice-3-f",
    "expr-voice-4-m",
    "expr-voice-4-f",
    "expr-voice-5-m",
    "expr-voice-5-f",
];

/// Provider voices enabled on a fresh installation.
pub const PREINSTALLED_PROVIDER_VOICES: &[&str] =
    &["kitten:en-us:expr-voice-2-f", "kitten:en-us:expr-voice-2-m"];

const PIPER_VOICES_BASE: &str = "https://huggingface.co/rhasspy/piper-voices/resolve/v1.0.0";

/// A downloadable file-based voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub label: String,
    /// Directory URL holding `<id>.onnx` and `<id>.onnx.json`.
    pub base_url: String,
}

impl CatalogEntry {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            base_url: base_url.into(),
        }
    }

    pub fn model_url(&self) -> String {
        format!("{}/{}.onnx", self.base_url.trim_end_matches('/'), self.id)
    }

    pub fn config_url(&self) -> String {
        format!("{}/{}.onnx.json", self.base_url.trim_end_matches('/'), self.id)
    }
}

/// The built-in Piper voice catalog.
pub fn piper_catalog() -> Vec<CatalogEntry> {
    [
        ("en_US-lessac-medium", "English US - Lessac (Medium)", "en/en_US/lessac/medium"),
        ("en_US-amy-medium", "English US - Amy (Medium)", "en/en_US/amy/medium"),
        ("en_US-ryan-high", "English US - Ryan (High)", "en/en_US/ryan/high"),
        ("en_US-libritts-high", "English US - LibriTTS (High)", "en/en_US/libritts/high"),
        ("en_GB-alan-medium", "English UK - Alan (Medium)", "en/en_GB/alan/medium"),
        ("en_GB-alba-medium", "English UK - Alba (Medium)", "en/en_GB/alba/medium"),
        ("es_ES-sharvard-medium", "Spanish ES - Sharvard (Medium)", "es/es_ES/sharvard/medium"),
        ("fr_FR-siwis-medium", "French FR - Siwis (Medium)", "fr/fr_FR/siwis/medium"),
        ("de_DE-thorsten-medium", "German DE - Thorsten (Medium)", "de/de_DE/thorsten/medium"),
    ]
    .into_iter()
    .map(|(id, label, path)| CatalogEntry::new(id, label, format!("{PIPER_VOICES_BASE}/{path}")))
    .collect()
}

/// Returns true if `id` is safe to use as a file stem in the voices directory.
///
/// Only ASCII letters, digits, `_`, `.` and `-` are accepted. Ids made only
/// of dots are rejected as well.
pub fn is_valid_voice_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        && id.chars().any(|c| c != '.')
}

/// A parsed `provider:language:style` voice id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderVoiceId {
    pub provider: String,
    pub language: String,
    pub style: String,
}

impl ProviderVoiceId {
    /// Returns true if the id has the composite shape, whether or not its
    /// parts are supported.
    pub fn looks_composite(id: &str) -> bool {
        id.contains(':')
    }

    /// Whether language and style come from the supported enumerations.
    pub fn is_supported(&self) -> bool {
        self.provider == PROVIDER_NAME
            && PROVIDER_LANGUAGES.contains(&self.language.as_str())
            && PROVIDER_STYLES.contains(&self.style.as_str())
    }

    pub fn label(&self) -> String {
        format!("Kitten {} ({})", self.style, self.language)
    }

    /// All supported provider voices, languages outermost.
    pub fn catalog() -> Vec<Self> {
        PROVIDER_LANGUAGES
            .iter()
            .flat_map(|language| {
                PROVIDER_STYLES.iter().map(move |style| Self {
                    provider: PROVIDER_NAME.to_string(),
                    language: (*language).to_string(),
                    style: (*style).to_string(),
                })
            })
            .collect()
    }
}

impl FromStr for ProviderVoiceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(provider), Some(language), Some(style))
                if !provider.is_empty()
                    && !language.is_empty()
                    && !style.is_empty()
                    && !style.contains(':') =>
            {
                Ok(Self {
                    provider: provider.to_ascii_lowercase(),
                    language: language.to_ascii_lowercase(),
                    style: style.to_ascii_lowercase(),
                })
            }
            _ => Err(ValidationError::InvalidProviderVoice(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderVoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.language, self.style)
    }
}

/// Which synthesis backend a voice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceKind {
    /// Piper model files on disk.
    Piper,
    /// Secondary in-process provider.
    Provider,
}

/// A voice that can be used right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledVoice {
    pub id: String,
    pub label: String,
    /// Model file name for Piper voices, provider name otherwise.
    pub model: String,
}

/// A catalog entry annotated with its installation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceDescriptor {
    pub id: String,
    pub label: String,
    pub kind: VoiceKind,
    pub source_url: Option<String>,
    pub installed: bool,
    pub is_default: bool,
}
