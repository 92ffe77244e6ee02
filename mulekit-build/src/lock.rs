//! Per-project advisory lock
//!
//! Two builds in the same project directory would clobber each other's
//! in-place edits. The lock file is created atomically and removed on drop.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

pub const LOCK_FILE: &str = ".mulekit.lock";

/// RAII guard for the project lock file
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
    _file: File,
}

impl ProjectLock {
    pub fn acquire(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    BuildError::Locked(path.clone())
                } else {
                    BuildError::Precondition(format!("failed to create lock file {}: {}", path.display(), e))
                }
            })?;
        // Holder pid, for whoever finds a stale lock
        let _ = writeln!(file, "{}", std::process::id());

        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_until_released() {
        let temp_dir = TempDir::new().unwrap();
        let lock = ProjectLock::acquire(temp_dir.path()).unwrap();
        assert!(lock.path().is_file());

        assert!(matches!(ProjectLock::acquire(temp_dir.path()), Err(BuildError::Locked(_))));

        drop(lock);
        assert!(!temp_dir.path().join(LOCK_FILE).exists());
        assert!(ProjectLock::acquire(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_missing_project_dir() {
        let temp_dir = TempDir::new().unwrap();
        let result = ProjectLock::acquire(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(BuildError::Precondition(_))));
    }
}
