//! Checkpoints as git blobs; commits as single-file commits on HEAD.
//!
//! Tokens have the form `<blob oid>:<unit path>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use git2::{Oid, Repository, Signature};

use canon_core::errors::CheckpointError;
use canon_core::traits::{CheckpointStore, CheckpointToken, CommitRef};
use canon_core::types::UnitRef;

use super::fs::write_atomic;

const FALLBACK_NAME: &str = "canon";
const FALLBACK_EMAIL: &str = "canon@localhost";

pub struct GitCheckpointStore {
    workdir: PathBuf,
    repo: Mutex<Repository>,
}

impl GitCheckpointStore {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self, CheckpointError> {
        let repo = Repository::discover(path).map_err(|e| CheckpointError::SaveFailed {
            unit: path.display().to_string(),
            message: e.message().to_string(),
        })?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| CheckpointError::SaveFailed {
                unit: path.display().to_string(),
                message: "repository has no working directory".to_string(),
            })?;
        Ok(Self {
            workdir,
            repo: Mutex::new(repo),
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn repo(&self) -> Result<MutexGuard<'_, Repository>, String> {
        self.repo
            .lock()
            .map_err(|_| "repository lock poisoned".to_string())
    }
}

fn parse_token(token: &CheckpointToken) -> Option<(Oid, UnitRef)> {
    let (oid, unit) = token.0.split_once(':')?;
    let oid = Oid::from_str(oid).ok()?;
    Some((oid, UnitRef::new(unit)))
}

impl CheckpointStore for GitCheckpointStore {
    fn save(&self, unit: &UnitRef) -> Result<CheckpointToken, CheckpointError> {
        let fail = |message: String| CheckpointError::SaveFailed {
            unit: unit.to_string(),
            message,
        };
        let bytes = fs::read(unit.to_path(&self.workdir)).map_err(|e| fail(e.to_string()))?;
        let repo = self.repo().map_err(fail)?;
        let oid = repo.blob(&bytes).map_err(|e| fail(e.message().to_string()))?;
        tracing::debug!(unit = %unit, blob = %oid, "checkpoint saved as git blob");
        Ok(CheckpointToken(format!("{oid}:{unit}")))
    }

    fn restore(&self, token: &CheckpointToken) -> Result<(), CheckpointError> {
        let (oid, unit) = parse_token(token).ok_or_else(|| CheckpointError::UnknownToken {
            token: token.0.clone(),
        })?;
        let fail = |message: String| CheckpointError::RestoreFailed {
            token: token.0.clone(),
            message,
        };
        let repo = self.repo().map_err(fail)?;
        let blob = repo.find_blob(oid).map_err(|_| CheckpointError::UnknownToken {
            token: token.0.clone(),
        })?;
        write_atomic(&unit.to_path(&self.workdir), blob.content()).map_err(|e| fail(e.to_string()))?;
        tracing::debug!(unit = %unit, blob = %oid, "checkpoint restored from git blob");
        Ok(())
    }

    fn commit(&self, unit: &UnitRef, message: &str) -> Result<CommitRef, CheckpointError> {
        let fail = |msg: String| CheckpointError::CommitFailed {
            unit: unit.to_string(),
            message: msg,
        };
        let git = |e: git2::Error| fail(e.message().to_string());

        let repo = self.repo().map_err(fail)?;
        let mut index = repo.index().map_err(git)?;
        index.add_path(Path::new(unit.as_str())).map_err(git)?;
        index.write().map_err(git)?;
        let tree_id = index.write_tree().map_err(git)?;
        let tree = repo.find_tree(tree_id).map_err(git)?;

        let signature = repo
            .signature()
            .or_else(|_| Signature::now(FALLBACK_NAME, FALLBACK_EMAIL))
            .map_err(git)?;
        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(git)?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(git)?;
        tracing::info!(unit = %unit, commit = %oid, "unit committed");
        Ok(CommitRef(oid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        (dir, repo)
    }

    #[test]
    fn test_checkpoint_and_restore() {
        let (dir, _repo) = init_repo();
        let path = dir.path().join("a.ts");
        fs::write(&path, "let a: any = 1;\n").unwrap();

        let store = GitCheckpointStore::open(dir.path()).unwrap();
        let unit = UnitRef::new("a.ts");
        let token = store.save(&unit).unwrap();
        fs::write(&path, "broken").unwrap();
        store.restore(&token).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "let a: any = 1;\n");
    }

    #[test]
    fn test_commit_creates_single_file_commits() {
        let (dir, repo) = init_repo();
        fs::write(dir.path().join("a.ts"), "let a = 1;\n").unwrap();
        fs::write(dir.path().join("b.ts"), "let b = 1;\n").unwrap();

        let store = GitCheckpointStore::open(dir.path()).unwrap();
        let first = store
            .commit(&UnitRef::new("a.ts"), "fix(typescript_any): auto-refactor a.ts")
            .unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id().to_string(), first.0);
        assert_eq!(head.message(), Some("fix(typescript_any): auto-refactor a.ts"));
        let tree = head.tree().unwrap();
        assert!(tree.get_name("a.ts").is_some());
        assert!(tree.get_name("b.ts").is_none());

        let second = store.commit(&UnitRef::new("b.ts"), "second").unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.id().to_string(), second.0);
        assert_eq!(head.parent_count(), 1);
    }

    #[test]
    fn test_malformed_token_is_unknown() {
        let (dir, _repo) = init_repo();
        let store = GitCheckpointStore::open(dir.path()).unwrap();
        let err = store.restore(&CheckpointToken("zz".into())).unwrap_err();
        assert!(matches!(err, CheckpointError::UnknownToken { .. }));
    }
}
