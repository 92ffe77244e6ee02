//! Backup and restore of configuration files
//!
//! A [`BackupSnapshot`] copies files into a fresh, uniquely named directory
//! before they are mutated and copies them back afterwards. The lifecycle is
//! `Idle -> Snapshotted -> Restored`; `Restored` is terminal and a new
//! operation always takes a new snapshot.
//!
//! Snapshotting only reads the originals. If it fails half way the partial
//! backup directory is removed and the originals were never touched.
//!
//! Dropping a snapshot that is still `Snapshotted` restores it, so every exit
//! path of the owning scope (including a panic unwinding through it) puts the
//! originals back.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{CoreError, Result};
use crate::file_set::FileSet;

const BACKUP_DIR_PREFIX: &str = "mulekit-backup-";

/// Lifecycle state of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    Idle,
    Snapshotted,
    Restored,
}

#[derive(Debug, Clone)]
struct BackupEntry {
    original: PathBuf,
    backup: PathBuf,
}

/// What a restore put back
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    /// Files copied back to their original location
    pub restored: usize,
    /// Originals whose backup copy had disappeared
    pub missing: Vec<PathBuf>,
}

/// Backup of a set of files, owned by exactly one operation
#[derive(Debug)]
pub struct BackupSnapshot {
    id: String,
    backup_dir: PathBuf,
    entries: Vec<BackupEntry>,
    state: BackupState,
}

/// High-resolution timestamp plus a random suffix
pub fn generate_backup_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("{}-{}", nanos, suffix)
}

impl BackupSnapshot {
    /// A new, empty snapshot whose backup directory will live under `backup_root`
    pub fn new(backup_root: &Path) -> Self {
        let id = generate_backup_id();
        let backup_dir = backup_root.join(format!("{}{}", BACKUP_DIR_PREFIX, id));
        Self {
            id,
            backup_dir,
            entries: Vec::new(),
            state: BackupState::Idle,
        }
    }

    /// Snapshot `files`, all of which must live under `source_root`
    pub fn capture(source_root: &Path, files: &FileSet, backup_root: &Path) -> Result<Self> {
        let mut snapshot = Self::new(backup_root);
        snapshot.snapshot(source_root, files)?;
        Ok(snapshot)
    }

    /// Snapshot a single file
    pub fn capture_file(file: &Path, backup_root: &Path) -> Result<Self> {
        let source_root = file
            .parent()
            .ok_or_else(|| CoreError::Backup(format!("{} has no parent directory", file.display())))?;
        Self::capture(source_root, &FileSet::single(file.to_path_buf()), backup_root)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn state(&self) -> BackupState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Idle -> Snapshotted`: copy every file into the backup directory,
    /// keeping its path relative to `source_root`
    pub fn snapshot(&mut self, source_root: &Path, files: &FileSet) -> Result<()> {
        if self.state != BackupState::Idle {
            return Err(CoreError::Backup(format!(
                "snapshot {} is {:?}, expected Idle",
                self.id, self.state
            )));
        }

        match self.copy_to_backup(source_root, files) {
            Ok(entries) => {
                self.entries = entries;
                self.state = BackupState::Snapshotted;
                tracing::debug!(
                    "Backed up {} file(s) to {}",
                    self.entries.len(),
                    self.backup_dir.display()
                );
                Ok(())
            }
            Err(e) => {
                if self.backup_dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&self.backup_dir) {
                        tracing::warn!(
                            "Failed to remove partial backup {}: {}",
                            self.backup_dir.display(),
                            cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn copy_to_backup(&self, source_root: &Path, files: &FileSet) -> Result<Vec<BackupEntry>> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| CoreError::io(&self.backup_dir, e))?;

        let mut entries = Vec::with_capacity(files.len());
        for original in files {
            let relative = original.strip_prefix(source_root).map_err(|_| {
                CoreError::Backup(format!(
                    "{} is not under {}",
                    original.display(),
                    source_root.display()
                ))
            })?;
            let backup = self.backup_dir.join(relative);
            if let Some(parent) = backup.parent() {
                fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
            }
            fs::copy(original, &backup).map_err(|e| CoreError::io(original, e))?;
            entries.push(BackupEntry {
                original: original.clone(),
                backup,
            });
        }
        Ok(entries)
    }

    /// `Snapshotted -> Restored`: copy every backed-up file back and delete the
    /// backup directory.
    ///
    /// A missing backup copy is logged and skipped. If any copy back fails the
    /// backup directory is kept so the files can be recovered by hand.
    pub fn restore(&mut self) -> Result<RestoreReport> {
        if self.state != BackupState::Snapshotted {
            return Err(CoreError::Backup(format!(
                "snapshot {} is {:?}, nothing to restore",
                self.id, self.state
            )));
        }
        self.state = BackupState::Restored;

        let mut report = RestoreReport::default();
        let mut failures = Vec::new();

        for entry in &self.entries {
            if !entry.backup.is_file() {
                tracing::warn!(
                    "Backup copy of {} is missing, leaving it as is",
                    entry.original.display()
                );
                report.missing.push(entry.original.clone());
                continue;
            }
            let copied = entry
                .original
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|_| fs::copy(&entry.backup, &entry.original));
            match copied {
                Ok(_) => report.restored += 1,
                Err(e) => failures.push(format!("{}: {}", entry.original.display(), e)),
            }
        }

        if !failures.is_empty() {
            return Err(CoreError::Backup(format!(
                "failed to restore {} file(s), backup kept at {}: {}",
                failures.len(),
                self.backup_dir.display(),
                failures.join("; ")
            )));
        }

        if self.backup_dir.exists() {
            fs::remove_dir_all(&self.backup_dir).map_err(|e| CoreError::io(&self.backup_dir, e))?;
        }
        tracing::debug!("Restored {} file(s) from backup {}", report.restored, self.id);
        Ok(report)
    }
}

impl Drop for BackupSnapshot {
    fn drop(&mut self) {
        if self.state == BackupState::Snapshotted {
            if let Err(e) = self.restore() {
                tracing::warn!("Restore on drop failed for backup {}: {}", self.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_set::resolve;
    use std::collections::{BTreeMap, HashSet};
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let relative = e.path().strip_prefix(root).unwrap().to_path_buf();
                (relative, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    fn sample_tree(root: &Path) {
        write(&root.join("global.xml"), "<mule>${secure::db.password}</mule>\r\n");
        write(&root.join("flows/api.xml"), "<flow>Mule::p('secure::api.key')</flow>");
        write(&root.join("flows/nested/deep.xml"), "<x/>");
    }

    #[test]
    fn test_round_trip_restores_every_mutation() {
        let work = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let root = work.path().join("mule");
        sample_tree(&root);
        let before = read_tree(&root);

        let files = resolve(&root, "xml");
        let mut snapshot = BackupSnapshot::capture(&root, &files, backups.path()).unwrap();
        assert_eq!(snapshot.state(), BackupState::Snapshotted);
        assert_eq!(snapshot.len(), 3);

        write(&root.join("global.xml"), "changed");
        fs::remove_file(root.join("flows/api.xml")).unwrap();
        fs::remove_dir_all(root.join("flows/nested")).unwrap();

        let report = snapshot.restore().unwrap();
        assert_eq!(report.restored, 3);
        assert!(report.missing.is_empty());
        assert_eq!(snapshot.state(), BackupState::Restored);
        assert_eq!(read_tree(&root), before);
        assert!(!snapshot.backup_dir().exists());
    }

    #[test]
    fn test_drop_restores() {
        let work = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let pom = work.path().join("pom.xml");
        write(&pom, "<version>1.0.0</version>");

        let backup_dir;
        {
            let snapshot = BackupSnapshot::capture_file(&pom, backups.path()).unwrap();
            backup_dir = snapshot.backup_dir().to_path_buf();
            assert!(backup_dir.join("pom.xml").is_file());
            write(&pom, "<version>9.9.9</version>");
        }

        assert_eq!(fs::read_to_string(&pom).unwrap(), "<version>1.0.0</version>");
        assert!(!backup_dir.exists());
    }

    #[test]
    fn test_restore_is_terminal() {
        let work = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let pom = work.path().join("pom.xml");
        write(&pom, "a");

        let mut snapshot = BackupSnapshot::capture_file(&pom, backups.path()).unwrap();
        snapshot.restore().unwrap();
        assert!(matches!(snapshot.restore(), Err(CoreError::Backup(_))));
        assert!(matches!(
            snapshot.snapshot(work.path(), &FileSet::single(pom.clone())),
            Err(CoreError::Backup(_))
        ));
    }

    #[test]
    fn test_missing_backup_copy_is_a_warning() {
        let work = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let root = work.path();
        write(&root.join("a.xml"), "a");
        write(&root.join("b.xml"), "b");

        let mut snapshot = BackupSnapshot::capture(root, &resolve(root, "xml"), backups.path()).unwrap();
        fs::remove_file(snapshot.backup_dir().join("a.xml")).unwrap();
        write(&root.join("b.xml"), "changed");

        let report = snapshot.restore().unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.missing, vec![root.join("a.xml")]);
        assert_eq!(fs::read_to_string(root.join("b.xml")).unwrap(), "b");
        assert!(!snapshot.backup_dir().exists());
    }

    #[test]
    fn test_failed_snapshot_leaves_no_backup() {
        let work = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let root = work.path();
        write(&root.join("a.xml"), "a");
        let files = FileSet::single(root.join("does-not-exist.xml"));

        let mut snapshot = BackupSnapshot::new(backups.path());
        assert!(snapshot.snapshot(root, &files).is_err());
        assert_eq!(snapshot.state(), BackupState::Idle);
        assert!(!snapshot.backup_dir().exists());
        assert_eq!(fs::read_to_string(root.join("a.xml")).unwrap(), "a");
    }

    #[test]
    fn test_file_outside_source_root_is_rejected() {
        let work = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let stray = other.path().join("x.xml");
        write(&stray, "x");

        let result = BackupSnapshot::capture(work.path(), &FileSet::single(stray), backups.path());
        assert!(matches!(result, Err(CoreError::Backup(_))));
    }

    #[test]
    fn test_backup_ids_are_unique() {
        let ids: HashSet<String> = (0..10_000).map(|_| generate_backup_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_concurrent_snapshots_use_distinct_dirs() {
        let work = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let pom = work.path().join("pom.xml");
        write(&pom, "p");

        let first = BackupSnapshot::capture_file(&pom, backups.path()).unwrap();
        let second = BackupSnapshot::capture_file(&pom, backups.path()).unwrap();
        assert_ne!(first.id(), second.id());
        assert_ne!(first.backup_dir(), second.backup_dir());
    }
}
