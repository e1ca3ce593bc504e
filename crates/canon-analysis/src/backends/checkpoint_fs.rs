//! Content-addressed checkpoint store in `<root>/.canon/checkpoints`.
//!
//! `save` copies the unit's bytes into `<hash>.blob` with the unit path in
//! `<hash>.unit`; the token is the hash. `commit` appends a JSON line to
//! `commits.log`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use canon_core::constants::STATE_DIR;
use canon_core::errors::CheckpointError;
use canon_core::traits::{CheckpointStore, CheckpointToken, CommitRef};
use canon_core::types::UnitRef;

use super::fs::write_atomic;

const CHECKPOINT_DIR: &str = "checkpoints";
const COMMIT_LOG: &str = "commits.log";

/// One journalled commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit: String,
    pub unit: String,
    pub content_hash: String,
    pub message: String,
    pub timestamp: u64,
}

pub struct FsCheckpointStore {
    root: PathBuf,
    dir: PathBuf,
    journal: Mutex<()>,
}

impl FsCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let dir = root.join(STATE_DIR).join(CHECKPOINT_DIR);
        Self {
            root,
            dir,
            journal: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All journalled commits, oldest first.
    pub fn commits(&self) -> Result<Vec<CommitRecord>, CheckpointError> {
        let path = self.dir.join(COMMIT_LOG);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| CheckpointError::CommitFailed {
            unit: COMMIT_LOG.to_string(),
            message: e.to_string(),
        })?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str(l).map_err(|e| CheckpointError::CommitFailed {
                    unit: COMMIT_LOG.to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn token_paths(&self, token: &str) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{token}.blob")),
            self.dir.join(format!("{token}.unit")),
        )
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn save(&self, unit: &UnitRef) -> Result<CheckpointToken, CheckpointError> {
        let fail = |message: String| CheckpointError::SaveFailed {
            unit: unit.to_string(),
            message,
        };
        let bytes = fs::read(unit.to_path(&self.root)).map_err(|e| fail(e.to_string()))?;

        let mut keyed = Vec::with_capacity(unit.as_str().len() + 1 + bytes.len());
        keyed.extend_from_slice(unit.as_str().as_bytes());
        keyed.push(0);
        keyed.extend_from_slice(&bytes);
        let token = format!("{:016x}", xxh3_64(&keyed));

        let (blob, meta) = self.token_paths(&token);
        if !blob.exists() {
            write_atomic(&blob, &bytes).map_err(|e| fail(e.to_string()))?;
        }
        write_atomic(&meta, unit.as_str().as_bytes()).map_err(|e| fail(e.to_string()))?;
        tracing::debug!(unit = %unit, token = %token, "checkpoint saved");
        Ok(CheckpointToken(token))
    }

    fn restore(&self, token: &CheckpointToken) -> Result<(), CheckpointError> {
        let (blob, meta) = self.token_paths(&token.0);
        if !blob.exists() || !meta.exists() {
            return Err(CheckpointError::UnknownToken {
                token: token.0.clone(),
            });
        }
        let fail = |message: String| CheckpointError::RestoreFailed {
            token: token.0.clone(),
            message,
        };
        let unit = fs::read_to_string(&meta).map_err(|e| fail(e.to_string()))?;
        let bytes = fs::read(&blob).map_err(|e| fail(e.to_string()))?;
        let unit = UnitRef::new(unit);
        write_atomic(&unit.to_path(&self.root), &bytes).map_err(|e| fail(e.to_string()))?;
        tracing::debug!(unit = %unit, token = %token, "checkpoint restored");
        Ok(())
    }

    fn commit(&self, unit: &UnitRef, message: &str) -> Result<CommitRef, CheckpointError> {
        let fail = |message: String| CheckpointError::CommitFailed {
            unit: unit.to_string(),
            message,
        };
        let bytes = fs::read(unit.to_path(&self.root)).map_err(|e| fail(e.to_string()))?;
        let content_hash = format!("{:016x}", xxh3_64(&bytes));
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let commit = format!(
            "fs-{:016x}",
            xxh3_64(format!("{unit}\0{content_hash}\0{message}\0{timestamp}").as_bytes())
        );
        let record = CommitRecord {
            commit: commit.clone(),
            unit: unit.to_string(),
            content_hash,
            message: message.to_string(),
            timestamp,
        };
        let line = serde_json::to_string(&record).map_err(|e| fail(e.to_string()))?;

        let _guard = self
            .journal
            .lock()
            .map_err(|_| fail("commit journal lock poisoned".to_string()))?;
        fs::create_dir_all(&self.dir).map_err(|e| fail(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(COMMIT_LOG))
            .map_err(|e| fail(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| fail(e.to_string()))?;
        Ok(CommitRef(commit))
    }
}
