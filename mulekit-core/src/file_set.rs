//! File-set resolution
//!
//! Turns a target path into the ordered list of configuration files to work on.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Ordered set of files selected for one scan or transform pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<PathBuf>,
}

impl FileSet {
    pub fn single(path: PathBuf) -> Self {
        Self { files: vec![path] }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Resolve `target` into a file set.
///
/// - An existing file is returned on its own, whatever its extension.
/// - A directory is walked recursively with no depth limit, keeping files whose
///   name ends in `.{extension}`. Entries are visited in file-name order so
///   repeated runs list files identically.
/// - Anything else yields an empty set; callers decide whether that is an error.
///
/// Symlinks are followed. Cycles reported by the walker are logged and skipped.
pub fn resolve(target: &Path, extension: &str) -> FileSet {
    if target.is_file() {
        return FileSet::single(target.to_path_buf());
    }
    if !target.is_dir() {
        tracing::debug!("Target does not exist: {}", target.display());
        return FileSet::default();
    }

    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut files = Vec::new();

    for entry in WalkDir::new(target)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", target.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .map(|name| name.ends_with(&suffix))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }

    FileSet { files }
}
