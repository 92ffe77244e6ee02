//! Property reference patterns
//!
//! Recognizes the two property lookup syntaxes used in Mule configuration
//! files and classifies property names as sensitive.
//!
//! - Brace form: `${db.password}` / `${secure::db.password}`
//! - Call form: `Mule::p('api.key')` / `Mule::p('secure::api.key')`
//!
//! Matching is done over raw text with regular expressions. References inside
//! XML comments are ignored and no match crosses a line boundary.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Reserved name prefix marking a property as supplied through secure properties
pub const SECURE_MARKER: &str = "secure::";

static BRACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{((?:secure::)+)?([^}\s]+)\}").expect("brace pattern is valid")
});

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Mule::p\([ \t]*'((?:secure::)+)?([^'\s]+)'[ \t]*\)").expect("call pattern is valid")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));

/// Default substrings that make a property name sensitive
pub fn default_sensitive_patterns() -> Vec<String> {
    [
        "password",
        "secret",
        "key",
        "token",
        "credential",
        "apikey",
        "api_key",
        "api-key",
        "api.key",
        "consumerkey",
        "consumer.key",
        "consumer_key",
        "consumersecret",
        "consumer.secret",
        "consumer_secret",
        "tokenid",
        "token.id",
        "token_id",
        "tokensecret",
        "token.secret",
        "token_secret",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Which textual form a reference was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntaxKind {
    /// `${name}`
    Brace,
    /// `Mule::p('name')`
    Call,
}

/// One property lookup found in file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyReference {
    pub syntax: SyntaxKind,
    /// Exact matched text
    pub raw_text: String,
    /// Property name with every secure marker removed
    pub property_name: String,
    pub secured: bool,
    /// 1-based line of the match
    pub line_number: usize,
    /// Byte range of the whole match in the scanned content
    pub span: Range<usize>,
    /// Byte range of the marker run, when present
    pub marker_span: Option<Range<usize>>,
    /// Byte range of the bare property name
    pub name_span: Range<usize>,
}

impl PropertyReference {
    /// The same reference with the secure marker inserted before the name,
    /// keeping every other byte of the original match.
    pub fn secured_text(&self) -> String {
        let offset = self.name_span.start - self.span.start;
        format!(
            "{}{}{}",
            &self.raw_text[..offset],
            SECURE_MARKER,
            &self.raw_text[offset..]
        )
    }
}

/// Matches property references and classifies names against sensitive substrings
#[derive(Debug, Clone)]
pub struct PropertyMatcher {
    sensitive: Vec<String>,
}

impl Default for PropertyMatcher {
    fn default() -> Self {
        Self::new(default_sensitive_patterns())
    }
}

impl PropertyMatcher {
    pub fn new<I, S>(sensitive_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sensitive = sensitive_patterns
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { sensitive }
    }

    pub fn sensitive_patterns(&self) -> &[String] {
        &self.sensitive
    }

    /// Case-insensitive substring containment; `apikeyVersion` is sensitive.
    pub fn is_sensitive(&self, property_name: &str) -> bool {
        let name = property_name.to_lowercase();
        self.sensitive.iter().any(|p| name.contains(p.as_str()))
    }
}

/// All non-overlapping brace and call references in `content`, in text order.
///
/// When a brace match and a call match overlap, the one starting first wins.
pub fn find_references(content: &str) -> Vec<PropertyReference> {
    let comments: Vec<Range<usize>> = COMMENT_RE.find_iter(content).map(|m| m.range()).collect();
    let in_comment = |pos: usize| comments.iter().any(|c| c.contains(&pos));

    let mut found: Vec<PropertyReference> = Vec::new();
    for (syntax, re) in [(SyntaxKind::Brace, &*BRACE_RE), (SyntaxKind::Call, &*CALL_RE)] {
        for caps in re.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            if in_comment(whole.start()) {
                continue;
            }
            let marker = caps.get(1);
            found.push(PropertyReference {
                syntax,
                raw_text: whole.as_str().to_string(),
                property_name: name.as_str().to_string(),
                secured: marker.is_some(),
                line_number: 0,
                span: whole.range(),
                marker_span: marker.map(|m| m.range()),
                name_span: name.range(),
            });
        }
    }

    found.sort_by_key(|r| (r.span.start, r.span.end));

    let mut result: Vec<PropertyReference> = Vec::with_capacity(found.len());
    for reference in found {
        if let Some(last) = result.last() {
            if reference.span.start < last.span.end {
                continue;
            }
        }
        result.push(reference);
    }

    assign_line_numbers(content, &mut result);
    result
}

/// Fill in 1-based line numbers for references sorted by position
fn assign_line_numbers(content: &str, references: &mut [PropertyReference]) {
    let bytes = content.as_bytes();
    let mut line = 1;
    let mut cursor = 0;
    for reference in references.iter_mut() {
        line += bytes[cursor..reference.span.start]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        cursor = reference.span.start;
        reference.line_number = line;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brace_form_unsecured() {
        let refs = find_references(r#"<db:config password="${db.password}"/>"#);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].syntax, SyntaxKind::Brace);
        assert_eq!(refs[0].property_name, "db.password");
        assert_eq!(refs[0].raw_text, "${db.password}");
        assert!(!refs[0].secured);
        assert_eq!(refs[0].line_number, 1);
    }

    #[test]
    fn test_brace_form_secured() {
        let refs = find_references("${secure::db.password}");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].property_name, "db.password");
        assert!(refs[0].secured);
        assert_eq!(refs[0].marker_span, Some(2..10));
    }

    #[test]
    fn test_call_form() {
        let refs = find_references("#[Mule::p('secure::api.key') ++ Mule::p('http.port')]");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].syntax, SyntaxKind::Call);
        assert_eq!(refs[0].property_name, "api.key");
        assert!(refs[0].secured);
        assert_eq!(refs[1].property_name, "http.port");
        assert!(!refs[1].secured);
    }

    #[test]
    fn test_line_numbers_and_order() {
        let content = "<a>\n  ${one}\n  ${two} Mule::p('three')\n</a>\n";
        let refs = find_references(content);
        let summary: Vec<_> = refs
            .iter()
            .map(|r| (r.property_name.as_str(), r.line_number))
            .collect();
        assert_eq!(summary, vec![("one", 2), ("two", 3), ("three", 3)]);
    }

    #[test]
    fn test_ignores_comments() {
        let content = "<!-- ${db.password}\n Mule::p('api.key') -->\n${http.host}";
        let refs = find_references(content);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].property_name, "http.host");
        assert_eq!(refs[0].line_number, 3);
    }

    #[test]
    fn test_does_not_cross_lines() {
        assert!(find_references("${db.\npassword}").is_empty());
        assert!(find_references("Mule::p('api\n.key')").is_empty());
    }

    #[test]
    fn test_sensitive_classification() {
        let matcher = PropertyMatcher::default();
        assert!(matcher.is_sensitive("db.password"));
        assert!(matcher.is_sensitive("DB.PASSWORD"));
        assert!(matcher.is_sensitive("apikeyVersion"));
        assert!(matcher.is_sensitive("salesforce.consumerSecret"));
        assert!(!matcher.is_sensitive("http.host"));
        assert!(!matcher.is_sensitive("http.port"));
    }

    #[test]
    fn test_custom_patterns() {
        let matcher = PropertyMatcher::new(["PIN", ""]);
        assert_eq!(matcher.sensitive_patterns(), &["pin".to_string()]);
        assert!(matcher.is_sensitive("card.pin"));
        assert!(!matcher.is_sensitive("db.password"));
    }

    #[test]
    fn test_secured_text_preserves_form() {
        let refs = find_references("${db.password} Mule::p( 'api.key' )");
        assert_eq!(refs[0].secured_text(), "${secure::db.password}");
        assert_eq!(refs[1].secured_text(), "Mule::p( 'secure::api.key' )");
    }
}
