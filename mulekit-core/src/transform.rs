//! Secure marker stripping
//!
//! Text-to-text rewrites over configuration files. Only the marker bytes of
//! matched references are touched; whitespace, comments, XML declarations and
//! line endings pass through unchanged.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CoreError, Result};
use crate::patterns::find_references;

static SECURE_PROPERTIES_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<secure-properties:config\b.*?</secure-properties:config>")
        .expect("secure properties block pattern is valid")
});

/// Result of stripping one file's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// The rewritten content
    pub content: String,
    /// Number of references that lost their marker
    pub replacement_count: usize,
}

impl TransformResult {
    pub fn changed(&self) -> bool {
        self.replacement_count > 0
    }
}

/// Remove the secure marker from every marked brace and call reference.
///
/// Running it on its own output yields `replacement_count == 0`.
pub fn strip_marker(content: &str) -> TransformResult {
    let mut result = String::with_capacity(content.len());
    let mut cursor = 0;
    let mut replacement_count = 0;

    for reference in find_references(content) {
        if let Some(marker) = reference.marker_span {
            result.push_str(&content[cursor..marker.start]);
            cursor = marker.end;
            replacement_count += 1;
        }
    }
    result.push_str(&content[cursor..]);

    TransformResult {
        content: result,
        replacement_count,
    }
}

/// Delete the first `<secure-properties:config>` ... `</secure-properties:config>`
/// block. Content without such a block comes back unchanged.
pub fn remove_secure_properties_block(content: &str) -> String {
    SECURE_PROPERTIES_BLOCK_RE.replace(content, "").into_owned()
}

/// Apply [`remove_secure_properties_block`] until no block remains,
/// returning the content and the number of blocks removed
pub fn remove_all_secure_properties_blocks(content: &str) -> (String, usize) {
    let mut current = content.to_string();
    let mut removed = 0;
    while SECURE_PROPERTIES_BLOCK_RE.is_match(&current) {
        current = remove_secure_properties_block(&current);
        removed += 1;
    }
    (current, removed)
}

/// Outcome of stripping one file on disk
#[derive(Debug, Clone)]
pub struct FileStrip {
    pub path: PathBuf,
    pub replacement_count: usize,
    /// Whether the file was rewritten (false on dry runs or when nothing matched)
    pub written: bool,
}

/// Strip markers from a file, writing it back only when something changed
/// and `dry_run` is false
pub fn strip_file(path: &Path, dry_run: bool) -> Result<FileStrip> {
    let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    let result = strip_marker(&content);

    let written = result.changed() && !dry_run;
    if written {
        fs::write(path, &result.content).map_err(|e| CoreError::io(path, e))?;
    }

    Ok(FileStrip {
        path: path.to_path_buf(),
        replacement_count: result.replacement_count,
        written,
    })
}

/// Remove every secure properties block from a file in place.
/// Returns the number of blocks removed; a missing file counts as zero.
pub fn remove_secure_properties_file(path: &Path, dry_run: bool) -> Result<usize> {
    if !path.is_file() {
        return Ok(0);
    }
    let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    let (updated, removed) = remove_all_secure_properties_blocks(&content);
    if removed > 0 && !dry_run {
        fs::write(path, updated).map_err(|e| CoreError::io(path, e))?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::find_references;
    use tempfile::TempDir;

    #[test]
    fn test_strip_brace_form() {
        let result = strip_marker(r#"password="${secure::db.password}""#);
        assert_eq!(result.content, r#"password="${db.password}""#);
        assert_eq!(result.replacement_count, 1);
    }

    #[test]
    fn test_strip_call_form() {
        let result = strip_marker("Mule::p('secure::api.key')");
        assert_eq!(result.content, "Mule::p('api.key')");
        assert_eq!(result.replacement_count, 1);
    }

    #[test]
    fn test_strip_leaves_unmarked_references() {
        let source = "${http.host} Mule::p('http.port')";
        let result = strip_marker(source);
        assert_eq!(result.content, source);
        assert_eq!(result.replacement_count, 0);
        assert!(!result.changed());
    }

    #[test]
    fn test_strip_is_idempotent() {
        let sources = [
            "${secure::a} ${secure::secure::b} Mule::p('secure::c')",
            "${secure::secure::}",
            "<!-- ${secure::kept} --> ${secure::x}",
            "",
            "plain text\r\nwith crlf\r\n",
        ];
        for source in sources {
            let first = strip_marker(source);
            let second = strip_marker(&first.content);
            assert_eq!(second.replacement_count, 0, "not idempotent for {source:?}");
            assert_eq!(second.content, first.content);
        }
    }

    #[test]
    fn test_strip_preserves_bytes_outside_matches() {
        let source = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n\
                      <!-- keep ${secure::commented} -->\r\n\
                      \t<db:config user=\"${db.user}\" password=\"${secure::db.password}\" />\r\n\
                      \t<set-variable value=\"#[Mule::p('secure::api.key')]\"/>\r\n";
        let result = strip_marker(source);
        assert_eq!(result.replacement_count, 2);

        // Re-derive the output from the input by deleting only marker spans
        let mut expected = String::new();
        let mut cursor = 0;
        for reference in find_references(source) {
            let start = reference.span.start;
            expected.push_str(&source[cursor..start]);
            let raw = &reference.raw_text;
            match &reference.marker_span {
                Some(marker) => {
                    expected.push_str(&raw[..marker.start - start]);
                    expected.push_str(&raw[marker.end - start..]);
                }
                None => expected.push_str(raw),
            }
            cursor = reference.span.end;
        }
        expected.push_str(&source[cursor..]);

        assert_eq!(result.content, expected);
        assert!(result.content.contains("<!-- keep ${secure::commented} -->\r\n"));
        assert!(result.content.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n"));
    }

    #[test]
    fn test_remove_secure_properties_block() {
        let source = "<mule>\n  <secure-properties:config name=\"Secure\" file=\"${env}.yaml\" key=\"${key}\">\n    <secure-properties:encrypt algorithm=\"AES\"/>\n  </secure-properties:config>\n  <http:listener-config/>\n</mule>\n";
        let result = remove_secure_properties_block(source);
        assert!(!result.contains("secure-properties"));
        assert!(result.contains("<http:listener-config/>"));
        assert!(result.starts_with("<mule>\n  \n"));
    }

    #[test]
    fn test_remove_block_is_non_greedy_and_first_only() {
        let source = "<secure-properties:config a=\"1\"></secure-properties:config>\nkeep\n<secure-properties:config b=\"2\"></secure-properties:config>";
        let once = remove_secure_properties_block(source);
        assert_eq!(once, "\nkeep\n<secure-properties:config b=\"2\"></secure-properties:config>");

        let (all, removed) = remove_all_secure_properties_blocks(source);
        assert_eq!(all, "\nkeep\n");
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_remove_block_absent() {
        let source = "<mule><http:listener-config/></mule>";
        assert_eq!(remove_secure_properties_block(source), source);
        assert_eq!(remove_all_secure_properties_blocks(source).1, 0);
    }

    #[test]
    fn test_strip_file_writes_only_when_changed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("flow.xml");
        fs::write(&path, "<a v=\"${secure::token}\"/>").unwrap();

        let dry = strip_file(&path, true).unwrap();
        assert_eq!(dry.replacement_count, 1);
        assert!(!dry.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "<a v=\"${secure::token}\"/>");

        let real = strip_file(&path, false).unwrap();
        assert!(real.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "<a v=\"${token}\"/>");

        let again = strip_file(&path, false).unwrap();
        assert_eq!(again.replacement_count, 0);
        assert!(!again.written);
    }

    #[test]
    fn test_remove_secure_properties_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let removed = remove_secure_properties_file(&temp_dir.path().join("global.xml"), false).unwrap();
        assert_eq!(removed, 0);
    }
}
