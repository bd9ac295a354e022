//! Settings, history and enabled-provider-voice documents.

use crate::error::StoreError;
use crate::json::{read_json, write_json};
use chrono::{DateTime, Utc};
use opentts_types::voice::PREINSTALLED_PROVIDER_VOICES;
use opentts_types::{HistoryEntry, ProviderVoiceId, Settings, SettingsDefaults, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";
pub const HISTORY_FILE: &str = "history.json";
pub const PROVIDER_VOICES_FILE: &str = "provider_voices.json";

/// Current layout of `provider_voices.json`.
const PROVIDER_VOICES_SCHEMA: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderVoicesDocument {
    schema_version: u32,
    enabled: Vec<String>,
}

/// File-backed store for the service's small state documents.
#[derive(Debug, Clone)]
pub struct StateStore {
    state_dir: PathBuf,
    voices_dir: PathBuf,
    defaults: SettingsDefaults,
}

impl StateStore {
    /// Creates a store rooted at `state_dir`.
    ///
    /// `voices_dir` is only inspected when deciding how to seed the enabled
    /// provider voice set for the first time.
    pub fn new(
        state_dir: impl Into<PathBuf>,
        voices_dir: impl Into<PathBuf>,
        defaults: SettingsDefaults,
    ) -> Self {
        Self {
            state_dir: state_dir.into(),
            voices_dir: voices_dir.into(),
            defaults,
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn settings_defaults(&self) -> &SettingsDefaults {
        &self.defaults
    }

    fn path(&self, file: &str) -> PathBuf {
        self.state_dir.join(file)
    }

    // ── Settings ──

    /// Returns the current settings, creating the document on first read.
    pub fn read_settings(&self) -> Settings {
        let path = self.path(SETTINGS_FILE);
        if !path.exists() {
            let settings = Settings::defaults(&self.defaults);
            if let Err(e) = write_json(&path, &settings) {
                tracing::warn!(path = %path.display(), error = %e, "failed to create settings file");
            }
            return settings;
        }

        let raw: Value = read_json(&path, Value::Null);
        Settings::normalize(&raw, &self.defaults)
    }

    /// Normalizes `incoming` over the defaults and persists the result.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the document cannot be written.
    pub fn write_settings(&self, incoming: &Value) -> Result<Settings, StoreError> {
        let settings = Settings::normalize(incoming, &self.defaults);
        write_json(&self.path(SETTINGS_FILE), &settings)?;
        tracing::debug!(voice = %settings.voice, "settings saved");
        Ok(settings)
    }

    // ── History ──

    /// Returns the stored history. Entries that no longer validate are
    /// skipped but stay in the file.
    ///
    /// Stored entries missing an `id` or `createdAt` get one, and the file
    /// is rewritten so they keep it on later reads.
    pub fn read_history(&self) -> Vec<HistoryEntry> {
        let now = Utc::now();
        let items = self.stored_history(now);
        items
            .iter()
            .filter_map(|item| match HistoryEntry::from_value(item, now) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping invalid history entry");
                    None
                }
            })
            .collect()
    }

    /// Validates one entry and appends it to the stored list.
    ///
    /// Entries already stored are kept as they are, including ones that
    /// would no longer validate.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Invalid` if the entry has no text, or an I/O error
    /// if the list cannot be written.
    pub fn append_history(&self, incoming: &Value) -> Result<HistoryEntry, StoreError> {
        let now = Utc::now();
        let entry = HistoryEntry::from_value(incoming, now)?;

        let mut items = self.stored_history(now);
        items.push(serde_json::to_value(&entry)?);
        write_json(&self.path(HISTORY_FILE), &items)?;

        tracing::debug!(id = %entry.id, total = items.len(), "history entry appended");
        Ok(entry)
    }

    /// The raw stored list with missing ids and timestamps filled in and
    /// persisted. A document that is not a list reads as empty.
    fn stored_history(&self, now: DateTime<Utc>) -> Vec<Value> {
        let path = self.path(HISTORY_FILE);
        let raw: Value = read_json(&path, Value::Array(Vec::new()));
        let Value::Array(mut items) = raw else {
            tracing::warn!("history document is not a list, treating as empty");
            return Vec::new();
        };

        let mut stamped = false;
        for item in &mut items {
            stamped |= HistoryEntry::stamp(item, now);
        }
        if stamped {
            if let Err(e) = write_json(&path, &items) {
                tracing::warn!(path = %path.display(), error = %e, "failed to persist history ids");
            }
        }
        items
    }

    /// Replaces the whole history list.
    ///
    /// Accepts either a bare array or `{"history": [...]}`. A single invalid
    /// entry rejects the whole replacement.
    pub fn replace_history(&self, incoming: &Value) -> Result<Vec<HistoryEntry>, StoreError> {
        let items = incoming
            .as_array()
            .or_else(|| incoming.get("history").and_then(Value::as_array))
            .ok_or_else(|| {
                ValidationError::InvalidShape("history must be a list of entries".to_string())
            })?;

        let now = Utc::now();
        let history = items
            .iter()
            .map(|item| HistoryEntry::from_value(item, now))
            .collect::<Result<Vec<_>, _>>()?;

        write_json(&self.path(HISTORY_FILE), &history)?;
        tracing::debug!(total = history.len(), "history replaced");
        Ok(history)
    }

    // ── Enabled provider voices ──

    /// Returns the enabled provider voices, seeding the set on first use.
    ///
    /// The seed is written together with a schema-version marker, so the
    /// fresh-install heuristic runs exactly once per state directory. Ids
    /// outside the provider catalog are dropped.
    pub fn enabled_provider_voices(&self) -> BTreeSet<String> {
        let path = self.path(PROVIDER_VOICES_FILE);
        let document: Option<ProviderVoicesDocument> = if path.exists() {
            read_json(&path, None)
        } else {
            None
        };

        match document {
            Some(doc) => {
                if doc.schema_version != PROVIDER_VOICES_SCHEMA {
                    tracing::warn!(
                        found = doc.schema_version,
                        expected = PROVIDER_VOICES_SCHEMA,
                        "unexpected provider voice schema version, reading anyway"
                    );
                }
                retain_known(doc.enabled)
            }
            None => self.seed_provider_voices(),
        }
    }

    /// Enables a provider voice. Returns false if it was already enabled.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Invalid` for ids outside the provider catalog.
    pub fn enable_provider_voice(&self, id: &str) -> Result<bool, StoreError> {
        let id = canonical_provider_id(id)?;
        let mut enabled = self.enabled_provider_voices();
        if !enabled.insert(id) {
            return Ok(false);
        }
        self.write_provider_voices(&enabled)?;
        Ok(true)
    }

    /// Disables a provider voice. Returns false if it was not enabled.
    pub fn disable_provider_voice(&self, id: &str) -> Result<bool, StoreError> {
        let id = canonical_provider_id(id)?;
        let mut enabled = self.enabled_provider_voices();
        if !enabled.remove(&id) {
            return Ok(false);
        }
        self.write_provider_voices(&enabled)?;
        Ok(true)
    }

    fn seed_provider_voices(&self) -> BTreeSet<String> {
        let existing_install = self.looks_like_existing_install();
        let enabled: BTreeSet<String> = if existing_install {
            ProviderVoiceId::catalog().iter().map(ToString::to_string).collect()
        } else {
            PREINSTALLED_PROVIDER_VOICES.iter().map(|id| id.to_string()).collect()
        };

        tracing::info!(
            existing_install,
            count = enabled.len(),
            "seeding enabled provider voices"
        );

        if let Err(e) = self.write_provider_voices(&enabled) {
            tracing::warn!(error = %e, "failed to persist seeded provider voices");
        }
        enabled
    }

    fn looks_like_existing_install(&self) -> bool {
        if self.path(SETTINGS_FILE).exists() || self.path(HISTORY_FILE).exists() {
            return true;
        }
        std::fs::read_dir(&self.voices_dir)
            .map(|entries| {
                entries.flatten().any(|entry| {
                    entry.path().extension().and_then(|e| e.to_str()) == Some("onnx")
                })
            })
            .unwrap_or(false)
    }

    fn write_provider_voices(&self, enabled: &BTreeSet<String>) -> Result<(), StoreError> {
        let document = ProviderVoicesDocument {
            schema_version: PROVIDER_VOICES_SCHEMA,
            enabled: enabled.iter().cloned().collect(),
        };
        write_json(&self.path(PROVIDER_VOICES_FILE), &document)
    }
}

fn canonical_provider_id(id: &str) -> Result<String, StoreError> {
    let parsed: ProviderVoiceId = id.parse()?;
    if !parsed.is_supported() {
        return Err(ValidationError::InvalidProviderVoice(id.to_string()).into());
    }
    Ok(parsed.to_string())
}

fn retain_known(ids: Vec<String>) -> BTreeSet<String> {
    ids.into_iter()
        .filter_map(|id| canonical_provider_id(&id).ok())
        .collect()
}
