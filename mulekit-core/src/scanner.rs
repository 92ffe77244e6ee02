//! Violation scanner
//!
//! Reports sensitive property references that are missing the secure marker.
//! Pure reporting: nothing here writes to disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::patterns::{find_references, PropertyMatcher, SyntaxKind};

/// A sensitive reference without the secure marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    pub matched_text: String,
    pub property_name: String,
    pub syntax: SyntaxKind,
    /// The matched text with the marker added, in the same syntax
    pub suggested_fix: String,
}

/// Scan `content` for unsecured sensitive references.
///
/// Violations come back in line order, then left to right within a line.
pub fn scan(content: &str, matcher: &PropertyMatcher) -> Vec<Violation> {
    scan_with_path(content, Path::new(""), matcher)
}

fn scan_with_path(content: &str, file: &Path, matcher: &PropertyMatcher) -> Vec<Violation> {
    find_references(content)
        .into_iter()
        .filter(|r| !r.secured && matcher.is_sensitive(&r.property_name))
        .map(|r| Violation {
            file: file.to_path_buf(),
            line: r.line_number,
            suggested_fix: r.secured_text(),
            matched_text: r.raw_text,
            property_name: r.property_name,
            syntax: r.syntax,
        })
        .collect()
}

/// Scan a file on disk, tagging each violation with its path
pub fn scan_file(path: &Path, matcher: &PropertyMatcher) -> Result<Vec<Violation>> {
    let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    Ok(scan_with_path(&content, path, matcher))
}

/// Scan every file in order, concatenating the reports
pub fn scan_files<'a, I>(files: I, matcher: &PropertyMatcher) -> Result<Vec<Violation>>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut violations = Vec::new();
    for file in files {
        violations.extend(scan_file(file, matcher)?);
    }
    Ok(violations)
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {} -> {}",
            crate::path_utils::path_to_string(&self.file),
            self.line,
            self.matched_text,
            self.suggested_fix
        )
    }
}
