//! The state snapshot document and its on-disk store.
//!
//! Saves write to a `.tmp` file first and atomically rename on
//! completion, so a crash mid-write never corrupts the existing state
//! file. Loading a missing file yields an empty repository; loading a
//! malformed file is an error the caller must surface at startup.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pagenet_core::validate::{validate_repository, ValidationError};
use pagenet_core::Repository;

/// Snapshot document version. Bumped on incompatible layout changes.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("state file i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot failed validation: {0}")]
    Invalid(#[from] ValidationError),
}

/// When the command applier persists after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavePolicy {
    /// Write the state file after every successful mutation.
    #[default]
    Immediate,
    /// Leave saving to membership events and shutdown.
    Deferred,
}

/// The complete persisted state: a versioned wrapper around the
/// repository collections. Statistics are process-local and excluded
/// by the repository's own serde layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    pub repository: Repository,
}

impl StateSnapshot {
    pub fn of(repository: &Repository) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            repository: repository.clone(),
        }
    }

    /// Serialises the snapshot for state transfer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialises and fully validates a received snapshot.
    ///
    /// A snapshot that parses but fails cross-reference validation is
    /// rejected — installing it would mean serving an unverifiable
    /// replica.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let snapshot: StateSnapshot = serde_json::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(snapshot.version));
        }
        validate_repository(&snapshot.repository)?;
        Ok(snapshot)
    }
}

/// Handle to the state file on disk.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    policy: SavePolicy,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, policy: SavePolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> SavePolicy {
        self.policy
    }

    /// Writes the repository to the state file via tmp + atomic rename.
    pub fn save(&self, repository: &Repository) -> Result<(), PersistenceError> {
        let tmp_path = self.path.with_extension("json.tmp");

        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &StateSnapshot::of(repository))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "state file written");
        Ok(())
    }

    /// Persists only when the policy says to save after every mutation.
    pub fn save_if_immediate(&self, repository: &Repository) -> Result<(), PersistenceError> {
        match self.policy {
            SavePolicy::Immediate => self.save(repository),
            SavePolicy::Deferred => Ok(()),
        }
    }

    /// Loads the state file, or an empty repository if none exists yet.
    pub fn load(&self) -> Result<Repository, PersistenceError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no state file, starting empty");
            return Ok(Repository::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let snapshot: StateSnapshot = serde_json::from_reader(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(snapshot.version));
        }
        validate_repository(&snapshot.repository)?;
        info!(
            path = %self.path.display(),
            nodes = snapshot.repository.nodes.len(),
            users = snapshot.repository.users.len(),
            "state file loaded"
        );
        Ok(snapshot.repository)
    }
}
