//! Build manifest
//!
//! Plain-text record written next to the packaged archive, listing what the
//! build changed and who built it where.

use std::fs;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Timestamp format embedded in archive names and manifests
pub const BUILD_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Current local time in [`BUILD_TIMESTAMP_FORMAT`]
pub fn build_timestamp() -> String {
    chrono::Local::now().format(BUILD_TIMESTAMP_FORMAT).to_string()
}

/// Who is running the build
pub fn operator_identity() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Which machine the build runs on
pub fn host_identity() -> String {
    if let Some(host) = ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
    {
        return host;
    }
    if let Ok(host) = fs::read_to_string("/etc/hostname") {
        let host = host.trim();
        if !host.is_empty() {
            return host.to_string();
        }
    }
    std::process::Command::new("hostname")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Accumulated description of one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildManifest {
    pub project_name: String,
    pub environment: Option<String>,
    pub package_name: String,
    pub version: String,
    pub build_timestamp: String,
    pub operator: String,
    pub host: String,
    changes: Vec<String>,
}

impl BuildManifest {
    pub fn new(project_name: impl Into<String>, version: impl Into<String>, build_timestamp: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            environment: None,
            package_name: String::new(),
            version: version.into(),
            build_timestamp: build_timestamp.into(),
            operator: operator_identity(),
            host: host_identity(),
            changes: Vec::new(),
        }
    }

    pub fn add_change(&mut self, change: impl Into<String>) {
        self.changes.push(change.into());
    }

    pub fn changes(&self) -> &[String] {
        &self.changes
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# Mulekit build manifest\n");
        out.push_str(&format!("project: {}\n", self.project_name));
        out.push_str(&format!(
            "environment: {}\n",
            self.environment.as_deref().unwrap_or("none")
        ));
        out.push_str(&format!("package: {}\n", self.package_name));
        out.push_str(&format!("version: {}\n", self.version));
        out.push_str(&format!("build_timestamp: {}\n", self.build_timestamp));
        out.push_str(&format!("built_by: {}\n", self.operator));
        out.push_str(&format!("host: {}\n", self.host));
        out.push_str("\nchanges:\n");
        if self.changes.is_empty() {
            out.push_str("  (none)\n");
        }
        for change in &self.changes {
            out.push_str(&format!("  - {}\n", change));
        }
        out
    }

    /// Write the rendered manifest, creating the parent directory
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        fs::write(path, self.render()).map_err(|e| CoreError::io(path, e))
    }
}
