//! History entries recorded by clients after each synthesis.

use crate::ValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One spoken phrase kept in the history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub voice: String,
    pub speed: f64,
    pub audio_url: String,
    pub pinned: bool,
}

impl HistoryEntry {
    /// Validates a client-supplied entry, assigning `id` and `createdAt`
    /// when they are missing.
    pub fn from_value(value: &Value, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let fields = value
            .as_object()
            .ok_or_else(|| ValidationError::InvalidShape("history entry must be an object".into()))?;

        let text = text_field(value).ok_or(ValidationError::MissingField("text"))?;

        let id = trimmed_field(value, "id").unwrap_or_else(new_id);
        let created_at = trimmed_field(value, "createdAt").unwrap_or_else(|| timestamp(now));

        Ok(Self {
            id,
            text,
            created_at,
            voice: trimmed_field(value, "voice").unwrap_or_default(),
            speed: fields
                .get("speed")
                .and_then(Value::as_f64)
                .filter(|s| s.is_finite())
                .unwrap_or(1.0),
            audio_url: trimmed_field(value, "audioUrl").unwrap_or_default(),
            pinned: fields.get("pinned").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    /// Fills in a missing `id` or `createdAt` on a stored entry in place.
    ///
    /// Other fields are left alone, valid or not. Returns whether anything
    /// was added.
    pub fn stamp(value: &mut Value, now: DateTime<Utc>) -> bool {
        let missing_id = trimmed_field(value, "id").is_none();
        let missing_created = trimmed_field(value, "createdAt").is_none();
        let Some(fields) = value.as_object_mut() else {
            return false;
        };

        if missing_id {
            fields.insert("id".to_string(), Value::String(new_id()));
        }
        if missing_created {
            fields.insert("createdAt".to_string(), Value::String(timestamp(now)));
        }
        missing_id || missing_created
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The non-blank `text` field, inner and outer whitespace kept.
fn text_field(value: &Value) -> Option<String> {
    value
        .get("text")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// A non-blank string field, trimmed.
fn trimmed_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
