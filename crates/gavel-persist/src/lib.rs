//! JSON file-backed persistence for Gavel engine state.
//!
//! Provides [`JsonStore`], a small snapshot store that serializes a serde
//! value to `<state_dir>/<name>.json`. Writes go to a temporary file first
//! and are renamed into place, so a crash mid-write never corrupts the
//! previous snapshot.

#![forbid(unsafe_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Errors raised when a snapshot cannot be written.
#[derive(Debug)]
pub enum PersistError {
    /// Filesystem error while writing the snapshot.
    Io(io::Error),
    /// The state could not be serialized.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "snapshot IO error: {e}"),
            Self::Serialize(e) => write!(f, "snapshot serialization error: {e}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialize(e) => Some(e),
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err)
    }
}

/// A JSON snapshot store for one named piece of state.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Creates a store writing to `<state_dir>/<name>.json`.
    #[must_use]
    pub fn new(state_dir: &Path, name: &str) -> Self {
        Self {
            path: state_dir.join(format!("{name}.json")),
        }
    }

    /// The snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the last snapshot, or the type's default when the file is
    /// missing or unreadable. A corrupt snapshot is logged and discarded
    /// rather than taking the process down.
    #[must_use]
    pub fn load<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "discarding corrupt snapshot");
                    T::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => T::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read snapshot");
                T::default()
            }
        }
    }

    /// Writes a snapshot atomically (write to a sibling temp file, rename).
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if serialization or any filesystem step fails.
    pub fn save<T>(&self, state: &T) -> Result<(), PersistError>
    where
        T: Serialize,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &raw)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), bytes = raw.len(), "wrote snapshot");
        Ok(())
    }
}
