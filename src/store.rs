//! Versioned JSON persistence for capture logs and profiles.
//!
//! Every stored object is wrapped in an envelope naming its kind and format
//! version:
//!
//! ```json
//! { "kind": "keystroke_capture", "version": 1, "saved_at": "...", "payload": ... }
//! ```
//!
//! Loading checks both before touching the payload, so an incompatible file
//! fails with an error that names what was expected and what was found.
//! A failed load only affects that one call.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// A type that can be stored through this module.
pub trait Versioned: Serialize + DeserializeOwned {
    /// Identifies the payload type inside the envelope.
    const KIND: &'static str;
    /// Bumped whenever the payload layout changes incompatibly.
    const VERSION: u32;
    /// File extension, without the leading dot.
    const FILE_EXTENSION: &'static str;

    /// Structural checks that serde alone cannot express.
    fn check_integrity(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected payload kind (expected \"{expected}\", got \"{found}\")")]
    UnexpectedKind { expected: String, found: String },

    #[error("class version mismatch for {kind} (expected \"{expected}\", got \"{found}\")")]
    VersionMismatch {
        kind: String,
        expected: u32,
        found: u32,
    },

    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: String, reason: String },

    #[error("failed to encode {kind}: {reason}")]
    Encode { kind: String, reason: String },
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: &'a str,
    version: u32,
    saved_at: DateTime<Utc>,
    payload: &'a T,
}

#[derive(Deserialize)]
struct RawEnvelope {
    kind: String,
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    payload: serde_json::Value,
}

/// Encode `value` into an envelope.
pub fn to_json<T: Versioned>(value: &T) -> Result<String, StoreError> {
    let envelope = EnvelopeRef {
        kind: T::KIND,
        version: T::VERSION,
        saved_at: Utc::now(),
        payload: value,
    };
    serde_json::to_string_pretty(&envelope).map_err(|e| StoreError::Encode {
        kind: T::KIND.to_string(),
        reason: e.to_string(),
    })
}

/// Decode an envelope produced by [`to_json`].
pub fn from_json<T: Versioned>(json: &str) -> Result<T, StoreError> {
    let malformed = |reason: String| StoreError::Malformed {
        kind: T::KIND.to_string(),
        reason,
    };

    let raw: RawEnvelope = serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;

    if raw.kind != T::KIND {
        return Err(StoreError::UnexpectedKind {
            expected: T::KIND.to_string(),
            found: raw.kind,
        });
    }
    if raw.version != T::VERSION {
        return Err(StoreError::VersionMismatch {
            kind: raw.kind,
            expected: T::VERSION,
            found: raw.version,
        });
    }

    let value: T = serde_json::from_value(raw.payload).map_err(|e| malformed(e.to_string()))?;
    value.check_integrity().map_err(malformed)?;

    if let Some(saved_at) = raw.saved_at {
        debug!(kind = T::KIND, %saved_at, "decoded stored object");
    }
    Ok(value)
}

/// `path` with the type's extension appended, unless it already has it.
pub fn path_with_extension<T: Versioned>(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == T::FILE_EXTENSION) {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(T::FILE_EXTENSION);
    PathBuf::from(name)
}

/// Write `value` to `path` (extension added if missing), creating parent
/// directories. Returns the path written.
pub fn save_to_file<T: Versioned>(value: &T, path: &Path) -> Result<PathBuf, StoreError> {
    let path = path_with_extension::<T>(path);
    let io_error = |source| StoreError::Io {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let json = to_json(value)?;
    std::fs::write(&path, json).map_err(io_error)?;

    info!(kind = T::KIND, path = %path.display(), "saved");
    Ok(path)
}

/// Read an object from `path`. If `path` does not exist, the same path with
/// the type's extension appended is tried.
pub fn load_from_file<T: Versioned>(path: &Path) -> Result<T, StoreError> {
    let path = if path.exists() {
        path.to_path_buf()
    } else {
        path_with_extension::<T>(path)
    };

    let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;

    let value = from_json(&content)?;
    info!(kind = T::KIND, path = %path.display(), "loaded");
    Ok(value)
}

/// Load every file in `dir` carrying the type's extension, keyed by file
/// stem. Any single failure aborts the whole directory load.
pub fn load_from_dir<T: Versioned>(dir: &Path) -> Result<BTreeMap<String, T>, StoreError> {
    let entries = std::fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut loaded = BTreeMap::new();
    for entry in entries {
        let path = entry
            .map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();

        if !path.is_file() || path.extension().map_or(true, |ext| ext != T::FILE_EXTENSION) {
            continue;
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        loaded.insert(stem, load_from_file(&path)?);
    }

    Ok(loaded)
}
