pub mod events;
pub mod officers;
pub mod submissions;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use events::{EventPatch, EventStore, NewEvent};
pub use officers::OfficerStore;
pub use submissions::{RegistrationPatch, SubmissionFilter, SubmissionStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt data file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),
}

/// A JSON document on disk, rewritten whole on every save.
/// Without a path it only lives in memory.
#[derive(Debug, Clone, Default)]
pub struct JsonFile {
    path: Option<PathBuf>,
}

impl JsonFile {
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn at(dir: &Path, name: &str) -> Self {
        Self {
            path: Some(dir.join(name)),
        }
    }

    /// Reads the document, a missing file reads as the default value
    pub fn load<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        let Some(path) = &self.path else {
            return Ok(T::default());
        };
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist yet, starting empty", path.display());
                Ok(T::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // write next to the target, then swap it in
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, path)?;
        debug!("Saved {}", path.display());
        Ok(())
    }
}
