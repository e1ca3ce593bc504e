//! Units on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use rayon::prelude::*;

use canon_core::constants::STATE_DIR;
use canon_core::errors::WorkspaceError;
use canon_core::traits::{UnitEnumerator, UnitWorkspace};
use canon_core::types::{Unit, UnitRef};

use crate::parsers::Language;

/// Directories never enumerated, in addition to `.gitignore` rules.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    "dist",
    "build",
    "coverage",
    "target",
    "__pycache__",
    ".venv",
    STATE_DIR,
];

/// Reads and writes units relative to a root directory. Writes go through a
/// temporary sibling and a rename so a unit is never observed half-written.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl UnitWorkspace for FsWorkspace {
    fn read(&self, unit: &UnitRef) -> Result<String, WorkspaceError> {
        let path = unit.to_path(&self.root);
        if !path.is_file() {
            return Err(WorkspaceError::NotFound {
                unit: unit.to_string(),
            });
        }
        fs::read_to_string(&path).map_err(|e| WorkspaceError::ReadFailed {
            unit: unit.to_string(),
            message: e.to_string(),
        })
    }

    fn write(&self, unit: &UnitRef, content: &str) -> Result<(), WorkspaceError> {
        write_atomic(&unit.to_path(&self.root), content.as_bytes()).map_err(|e| {
            WorkspaceError::WriteFailed {
                unit: unit.to_string(),
                message: e.to_string(),
            }
        })
    }
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.canon-tmp"));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// Walks a root respecting `.gitignore` and yields supported source units
/// ordered by path.
#[derive(Debug, Clone)]
pub struct FsUnitEnumerator {
    root: PathBuf,
    max_file_size: u64,
}

impl FsUnitEnumerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: 1024 * 1024,
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    fn collect_paths(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.file_type().is_some_and(|t| t.is_dir())
                    && DEFAULT_IGNORE_DIRS.contains(&name.as_ref()))
            })
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| WorkspaceError::WalkFailed {
                root: self.root.display().to_string(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let ext = entry.path().extension().and_then(|e| e.to_str());
            if Language::is_supported_extension(ext) {
                paths.push(entry.into_path());
            }
        }
        Ok(paths)
    }
}

impl UnitEnumerator for FsUnitEnumerator {
    fn enumerate(&self) -> Result<Vec<Unit>, WorkspaceError> {
        let paths = self.collect_paths()?;
        let mut units: Vec<Unit> = paths
            .par_iter()
            .filter_map(|path| {
                let relative = path.strip_prefix(&self.root).unwrap_or(path);
                let unit_ref = UnitRef::new(relative.to_string_lossy());
                match fs::metadata(path) {
                    Ok(meta) if meta.len() > self.max_file_size => {
                        tracing::debug!(unit = %unit_ref, size = meta.len(), "unit too large; skipped");
                        return None;
                    }
                    Err(e) => {
                        tracing::warn!(unit = %unit_ref, error = %e, "stat failed; skipped");
                        return None;
                    }
                    Ok(_) => {}
                }
                match fs::read_to_string(path) {
                    Ok(content) => Some(Unit::new(unit_ref, content)),
                    Err(e) => {
                        tracing::warn!(unit = %unit_ref, error = %e, "unreadable unit skipped");
                        None
                    }
                }
            })
            .collect();
        units.sort_by(|a, b| a.unit_ref.cmp(&b.unit_ref));
        tracing::debug!(root = %self.root.display(), units = units.len(), "units enumerated");
        Ok(units)
    }
}
