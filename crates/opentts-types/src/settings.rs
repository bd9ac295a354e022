//! The settings document and its normalization.
//!
//! Settings are never patched in place. Every write merges the incoming
//! fields over the hard-coded defaults and then re-validates each field on
//! its own, so a partial or corrupt document always comes back complete.

use crate::DownloadFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;
pub const MAX_PREPEND_SILENCE_MS: u32 = 3000;

/// Hotkey actions and their default combos.
pub const HOTKEY_DEFAULTS: &[(&str, &str)] = &[
    ("focusInput", "v"),
    ("stopAudio", "s"),
    ("sendMessage", "enter"),
    ("openSettings", "ctrl+,"),
    ("moveUp", "arrowup"),
    ("moveDown", "arrowdown"),
    ("playFocused", "enter"),
    ("pinFocused", "p"),
    ("deleteFocused", "delete"),
];

/// UI colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

/// Action name to key combo.
pub type Hotkeys = BTreeMap<String, String>;

/// Values that depend on server configuration rather than constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsDefaults {
    pub voice: String,
    pub prepend_silence_ms: u32,
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        Self {
            voice: "en_US-lessac-medium".to_string(),
            prepend_silence_ms: 0,
        }
    }
}

/// A fully validated settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub voice: String,
    pub speed: f64,
    pub volume: f64,
    pub download_format: DownloadFormat,
    pub theme: Theme,
    pub auto_paste_clipboard: bool,
    pub hotkeys: Hotkeys,
    pub prepend_silence_ms: u32,
}

impl Settings {
    pub fn defaults(defaults: &SettingsDefaults) -> Self {
        Self {
            voice: defaults.voice.clone(),
            speed: 1.0,
            volume: 1.0,
            download_format: DownloadFormat::Wav,
            theme: Theme::Light,
            auto_paste_clipboard: false,
            hotkeys: default_hotkeys(),
            prepend_silence_ms: defaults.prepend_silence_ms.min(MAX_PREPEND_SILENCE_MS),
        }
    }

    /// Merges `incoming` over the defaults and validates every field.
    ///
    /// Anything that is not a JSON object is treated as an empty document.
    pub fn normalize(incoming: &Value, defaults: &SettingsDefaults) -> Self {
        let empty = Map::new();
        let fields = incoming.as_object().unwrap_or(&empty);
        let base = Self::defaults(defaults);

        let voice = fields
            .get("voice")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or(base.voice);

        let speed = finite_number(fields.get("speed"))
            .map(|s| s.clamp(MIN_SPEED, MAX_SPEED))
            .unwrap_or(base.speed);

        let volume = finite_number(fields.get("volume"))
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(base.volume);

        let download_format =
            DownloadFormat::parse_lenient(fields.get("downloadFormat").and_then(Value::as_str));

        let theme = match fields.get("theme").and_then(Value::as_str) {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        };

        let auto_paste_clipboard = fields
            .get("autoPasteClipboard")
            .and_then(Value::as_bool)
            .unwrap_or(base.auto_paste_clipboard);

        let hotkeys = normalize_hotkeys(fields.get("hotkeys"));

        let prepend_silence_ms = finite_number(fields.get("prependSilenceMs"))
            .map(|ms| ms.round().clamp(0.0, f64::from(MAX_PREPEND_SILENCE_MS)) as u32)
            .unwrap_or(base.prepend_silence_ms);

        Self {
            voice,
            speed,
            volume,
            download_format,
            theme,
            auto_paste_clipboard,
            hotkeys,
            prepend_silence_ms,
        }
    }
}

fn finite_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|n| n.is_finite())
}

pub fn default_hotkeys() -> Hotkeys {
    HOTKEY_DEFAULTS
        .iter()
        .map(|(action, combo)| ((*action).to_string(), (*combo).to_string()))
        .collect()
}

/// Normalizes a hotkeys object: unknown actions are dropped, invalid combos
/// fall back to their default.
pub fn normalize_hotkeys(incoming: Option<&Value>) -> Hotkeys {
    let supplied = incoming.and_then(Value::as_object);
    HOTKEY_DEFAULTS
        .iter()
        .map(|(action, default)| {
            let combo = supplied
                .and_then(|m| m.get(*action))
                .and_then(Value::as_str)
                .and_then(normalize_hotkey)
                .unwrap_or_else(|| (*default).to_string());
            ((*action).to_string(), combo)
        })
        .collect()
}

fn normalize_key_token(token: &str) -> String {
    let lower = token.trim().to_lowercase();
    match lower.as_str() {
        "del" => "delete".to_string(),
        "return" => "enter".to_string(),
        "esc" => "escape".to_string(),
        "spacebar" => "space".to_string(),
        _ => lower,
    }
}

/// Canonicalizes a combo like `Shift+Ctrl+K` into `ctrl+shift+k`.
///
/// Returns `None` when no non-modifier key is present.
pub fn normalize_hotkey(raw: &str) -> Option<String> {
    let mut ctrl = false;
    let mut alt = false;
    let mut shift = false;
    let mut meta = false;
    let mut key = None;

    for part in raw.split('+').map(normalize_key_token).filter(|p| !p.is_empty()) {
        match part.as_str() {
            "ctrl" | "control" => ctrl = true,
            "alt" | "option" => alt = true,
            "shift" => shift = true,
            "meta" | "cmd" | "command" => meta = true,
            _ => key = Some(part),
        }
    }

    let key = key?;
    let mut combo: Vec<&str> = Vec::with_capacity(5);
    if ctrl {
        combo.push("ctrl");
    }
    if alt {
        combo.push("alt");
    }
    if shift {
        combo.push("shift");
    }
    if meta {
        combo.push("meta");
    }
    combo.push(&key);
    Some(combo.join("+"))
}
