//! Persistent state for the Open-TTS service.
//!
//! State lives in a handful of small JSON documents inside one directory:
//!
//! | File | Contents |
//! |------|----------|
//! | `settings.json` | the normalized [`Settings`](opentts_types::Settings) document |
//! | `history.json` | ordered list of [`HistoryEntry`](opentts_types::HistoryEntry) |
//! | `provider_voices.json` | enabled provider voices with a schema-version marker |
//!
//! Every write goes to a temporary sibling file that is then renamed over
//! the target, so readers never observe a partial document. Reads never
//! fail: a missing or malformed document is treated as absent.
//!
//! There is no locking. Two concurrent writers to the same document race at
//! the rename and the last one wins.
//!
//! # Usage
//!
//! ```rust,ignore
//! use opentts_store::StateStore;
//!
//! let store = StateStore::new("/data/state", "/data/voices", defaults);
//! let settings = store.read_settings();
//! let entry = store.append_history(&serde_json::json!({ "text": "hi" }))?;
//! ```

mod error;
mod json;
mod store;

pub use error::StoreError;
pub use json::{read_json, write_json};
pub use store::{StateStore, HISTORY_FILE, PROVIDER_VOICES_FILE, SETTINGS_FILE};
