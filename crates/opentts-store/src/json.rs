//! Atomic JSON document helpers.

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Reads a JSON document, returning `default` if it is missing or malformed.
pub fn read_json<T: DeserializeOwned>(path: &Path, default: T) -> T {
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return default,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read state file");
            return default;
        }
    };

    match serde_json::from_slice(&contents) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed state file");
            default
        }
    }
}

/// Writes `data` as pretty JSON, atomically replacing `path`.
///
/// The document is written to a temporary file in the same directory and
/// renamed over the target once flushed and synced.
///
/// # Errors
///
/// Returns `StoreError` if the directory cannot be created, the data cannot
/// be serialized, or the temporary file cannot be written or renamed.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let body = serde_json::to_vec_pretty(data)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&body)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;

    Ok(())
}
