//! Read-only connections for the learner and metrics queries.

use std::path::Path;
use std::sync::{Mutex, TryLockError};

use canon_core::errors::StorageError;
use rusqlite::{Connection, OpenFlags};

use super::pragmas::apply_read_pragmas;
use crate::sqlite_err;

const DEFAULT_READERS: usize = 2;
const MAX_READERS: usize = 8;

pub struct ReadPool {
    readers: Vec<Mutex<Connection>>,
}

impl ReadPool {
    pub fn open(path: &Path, size: usize) -> Result<Self, StorageError> {
        let readers = (0..size.clamp(1, MAX_READERS))
            .map(|_| {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(sqlite_err)?;
                apply_read_pragmas(&conn)?;
                Ok(Mutex::new(conn))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(Self { readers })
    }

    /// Run `f` on the first idle reader, or wait for the first one if all
    /// are busy.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        for reader in &self.readers {
            match reader.try_lock() {
                Ok(conn) => return f(&conn),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => return Err(poisoned()),
            }
        }
        let conn = self.readers[0].lock().map_err(|_| poisoned())?;
        f(&conn)
    }

    pub fn size(&self) -> usize {
        self.readers.len()
    }

    pub fn default_size() -> usize {
        DEFAULT_READERS
    }
}

fn poisoned() -> StorageError {
    StorageError::SqliteError {
        message: "reader lock poisoned".to_string(),
    }
}
