//! Single-writer lock over the working tree.
//!
//! A refactor run holds a [`WriteLease`] for its full duration. The learner
//! and metrics engine hold [`ReadLease`]s, which coexist with each other
//! but never with a writer. Leases are passed explicitly to the operations
//! that need them.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fd_lock::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::constants::{LOCK_FILE, STATE_DIR};
use crate::errors::LockError;

pub struct WorkTreeLock {
    path: PathBuf,
    inner: RwLock<File>,
}

/// Exclusive ownership of the working tree.
pub struct WriteLease<'a> {
    _guard: RwLockWriteGuard<'a, File>,
}

/// Shared read access to the working tree.
pub struct ReadLease<'a> {
    _guard: RwLockReadGuard<'a, File>,
}

impl WorkTreeLock {
    /// Open (creating if needed) `<root>/.canon/run.lock`.
    pub fn open(root: &Path) -> Result<Self, LockError> {
        let dir = root.join(STATE_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;
        Ok(Self {
            path,
            inner: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking; `LockError::Held` if any other lease exists.
    pub fn try_write(&mut self) -> Result<WriteLease<'_>, LockError> {
        let path = self.path.clone();
        match self.inner.try_write() {
            Ok(guard) => {
                tracing::debug!(path = %path.display(), "write lease acquired");
                Ok(WriteLease { _guard: guard })
            }
            Err(e) => Err(contended(&path, e)),
        }
    }

    /// Non-blocking; `LockError::Held` if a writer holds the lock.
    pub fn try_read(&self) -> Result<ReadLease<'_>, LockError> {
        match self.inner.try_read() {
            Ok(guard) => Ok(ReadLease { _guard: guard }),
            Err(e) => Err(contended(&self.path, e)),
        }
    }
}

fn contended(path: &Path, e: io::Error) -> LockError {
    if e.kind() == io::ErrorKind::WouldBlock {
        LockError::Held {
            path: path.display().to_string(),
        }
    } else {
        io_error(path, e)
    }
}

fn io_error(path: &Path, e: io::Error) -> LockError {
    LockError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl std::fmt::Debug for WorkTreeLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkTreeLock").field("path", &self.path).finish()
    }
}
