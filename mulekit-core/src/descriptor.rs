//! Project descriptor (pom.xml) access
//!
//! Fields are read and written by first-occurrence text substitution, never by
//! structural editing, so the rest of the file keeps its exact formatting.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{CoreError, Result};

pub const DESCRIPTOR_FILE: &str = "pom.xml";

/// In-memory copy of a project descriptor
#[derive(Debug, Clone)]
pub struct Descriptor {
    path: PathBuf,
    content: String,
}

fn field_regex(field: &str) -> Result<Regex> {
    let name = regex::escape(field);
    Ok(Regex::new(&format!(r"<{name}>\s*([^<]*?)\s*</{name}>"))?)
}

/// First `<field>value</field>` in `content`, trimmed
pub fn read_field(content: &str, field: &str) -> Result<Option<String>> {
    let re = field_regex(field)?;
    Ok(re
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Replace the value of the first `<field>` element, returning `None` when absent
pub fn replace_field(content: &str, field: &str, value: &str) -> Result<Option<String>> {
    let re = field_regex(field)?;
    let Some(value_match) = re.captures(content).and_then(|c| c.get(1)) else {
        return Ok(None);
    };
    let mut updated = String::with_capacity(content.len() + value.len());
    updated.push_str(&content[..value_match.start()]);
    updated.push_str(value);
    updated.push_str(&content[value_match.end()..]);
    Ok(Some(updated))
}

impl Descriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            content,
        })
    }

    /// Load `pom.xml` from a project directory
    pub fn load_from_project(project_dir: &Path) -> Result<Self> {
        Self::load(&project_dir.join(DESCRIPTOR_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn field(&self, field: &str) -> Result<Option<String>> {
        read_field(&self.content, field)
    }

    fn required(&self, field: &'static str) -> Result<String> {
        self.field(field)?.ok_or_else(|| CoreError::Descriptor {
            path: self.path.clone(),
            field,
        })
    }

    pub fn version(&self) -> Result<String> {
        self.required("version")
    }

    pub fn artifact_id(&self) -> Result<String> {
        self.required("artifactId")
    }

    pub fn group_id(&self) -> Result<Option<String>> {
        self.field("groupId")
    }

    /// `<name>`, falling back to `<artifactId>`
    pub fn project_name(&self) -> Result<String> {
        match self.field("name")? {
            Some(name) if !name.is_empty() => Ok(name),
            _ => self.artifact_id(),
        }
    }

    /// Mule runtime version declared through the `app.runtime` property
    pub fn runtime_version(&self) -> Result<Option<String>> {
        self.field("app.runtime")
    }

    pub fn set_version(&mut self, version: &str) -> Result<()> {
        self.set_field("version", version)
    }

    pub fn set_field(&mut self, field: &'static str, value: &str) -> Result<()> {
        self.content = replace_field(&self.content, field, value)?.ok_or_else(|| CoreError::Descriptor {
            path: self.path.clone(),
            field,
        })?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, &self.content).map_err(|e| CoreError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
    <modelVersion>4.0.0</modelVersion>
    <groupId>com.example</groupId>
    <artifactId>orders-api</artifactId>
    <version> 1.4.2 </version>
    <packaging>mule-application</packaging>
    <name>orders-api</name>
    <properties>
        <app.runtime>4.6.2</app.runtime>
    </properties>
    <dependencies>
        <dependency>
            <version>2.0.0</version>
        </dependency>
    </dependencies>
</project>
"#;

    fn write_pom(content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DESCRIPTOR_FILE);
        fs::write(&path, content).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_reads_first_occurrences() {
        let (_dir, path) = write_pom(POM);
        let pom = Descriptor::load(&path).unwrap();
        assert_eq!(pom.version().unwrap(), "1.4.2");
        assert_eq!(pom.artifact_id().unwrap(), "orders-api");
        assert_eq!(pom.group_id().unwrap().as_deref(), Some("com.example"));
        assert_eq!(pom.project_name().unwrap(), "orders-api");
        assert_eq!(pom.runtime_version().unwrap().as_deref(), Some("4.6.2"));
    }

    #[test]
    fn test_set_version_touches_only_first_value() {
        let (_dir, path) = write_pom(POM);
        let mut pom = Descriptor::load(&path).unwrap();
        pom.set_version("1.5.0").unwrap();
        pom.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("<version> 1.5.0 </version>"));
        assert!(written.contains("<version>2.0.0</version>"));
        assert_eq!(written.len(), POM.len());
    }

    #[test]
    fn test_missing_version_is_descriptor_error() {
        let (_dir, path) = write_pom("<project><artifactId>x</artifactId></project>");
        let mut pom = Descriptor::load(&path).unwrap();
        assert!(matches!(pom.version(), Err(CoreError::Descriptor { field: "version", .. })));
        assert!(matches!(pom.set_version("1.0.0"), Err(CoreError::Descriptor { .. })));
    }

    #[test]
    fn test_name_falls_back_to_artifact_id() {
        let (_dir, path) = write_pom("<project><artifactId>billing</artifactId><version>1</version></project>");
        let pom = Descriptor::load(&path).unwrap();
        assert_eq!(pom.project_name().unwrap(), "billing");
    }

    #[test]
    fn test_missing_descriptor_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            Descriptor::load_from_project(temp_dir.path()),
            Err(CoreError::Io { .. })
        ));
    }
}
