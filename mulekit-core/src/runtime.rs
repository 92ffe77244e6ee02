//! Mule runtime discovery
//!
//! Resolution order:
//! 1. `MULE_HOME` override
//! 2. the runtime version declared by the project, matched against installed
//!    runtimes (exact, then prefix, then major.minor)
//! 3. the latest installed runtime
//!
//! "Latest" is decided by plain string comparison of version tokens.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::descriptor::Descriptor;
use crate::error::{CoreError, Result};
use crate::types::RuntimeConfig;

pub const MULE_HOME_ENV: &str = "MULE_HOME";

/// How a runtime was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeSource {
    ExplicitOverride,
    ProjectMatched,
    AutoDetected,
}

impl fmt::Display for RuntimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuntimeSource::ExplicitOverride => "explicit-override",
            RuntimeSource::ProjectMatched => "project-matched",
            RuntimeSource::AutoDetected => "auto-detected",
        };
        f.write_str(label)
    }
}

/// A resolved runtime installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeInstall {
    pub path: PathBuf,
    pub version: String,
    pub source: RuntimeSource,
}

/// Finds the runtime installation a project should run on
#[derive(Debug, Clone)]
pub struct RuntimeResolver {
    override_home: Option<PathBuf>,
    runtimes_dir: PathBuf,
}

/// Default location of installed runtimes (~/.mule/runtimes)
pub fn default_runtimes_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mule")
        .join("runtimes")
}

/// Version token at the end of a runtime directory name.
///
/// `mule-enterprise-standalone-4.6.2` -> `4.6.2`, `4.5.0` -> `4.5.0`
pub fn version_from_dir_name(name: &str) -> Option<String> {
    let token = name.rsplit('-').next().unwrap_or(name);
    let starts_with_digit = token.chars().next().is_some_and(|c| c.is_ascii_digit());
    if starts_with_digit && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
        Some(token.to_string())
    } else {
        None
    }
}

fn major_minor(version: &str) -> String {
    version.split('.').take(2).collect::<Vec<_>>().join(".")
}

impl RuntimeResolver {
    pub fn new(override_home: Option<PathBuf>, runtimes_dir: PathBuf) -> Self {
        Self {
            override_home,
            runtimes_dir,
        }
    }

    /// Resolver reading `MULE_HOME` and the configured runtimes directory
    pub fn from_env(config: &RuntimeConfig) -> Self {
        let override_home = std::env::var_os(MULE_HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let runtimes_dir = config.runtimes_dir.clone().unwrap_or_else(default_runtimes_dir);
        Self::new(override_home, runtimes_dir)
    }

    /// Installed runtimes, newest first
    pub fn installed(&self) -> Vec<(String, PathBuf)> {
        let Ok(entries) = fs::read_dir(&self.runtimes_dir) else {
            return Vec::new();
        };
        let mut found: Vec<(String, PathBuf)> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                let version = p.file_name()?.to_str().and_then(version_from_dir_name)?;
                Some((version, p))
            })
            .collect();
        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        found
    }

    /// Resolve a runtime, optionally guided by the project's declared version
    pub fn resolve(&self, project_dir: Option<&Path>) -> Result<RuntimeInstall> {
        if let Some(home) = &self.override_home {
            let version = home
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(version_from_dir_name)
                .unwrap_or_else(|| "unknown".to_string());
            return Ok(RuntimeInstall {
                path: home.clone(),
                version,
                source: RuntimeSource::ExplicitOverride,
            });
        }

        let installed = self.installed();

        if let Some(declared) = project_dir.and_then(declared_runtime) {
            if let Some((version, path)) = match_declared(&declared, &installed) {
                return Ok(RuntimeInstall {
                    path: path.clone(),
                    version: version.clone(),
                    source: RuntimeSource::ProjectMatched,
                });
            }
            tracing::warn!(
                "Project declares runtime {} but no installed runtime matches, using latest",
                declared
            );
        }

        installed
            .into_iter()
            .next()
            .map(|(version, path)| RuntimeInstall {
                path,
                version,
                source: RuntimeSource::AutoDetected,
            })
            .ok_or_else(|| {
                CoreError::RuntimeNotFound(format!(
                    "set {} or install a runtime under {}",
                    MULE_HOME_ENV,
                    self.runtimes_dir.display()
                ))
            })
    }
}

fn declared_runtime(project_dir: &Path) -> Option<String> {
    Descriptor::load_from_project(project_dir)
        .ok()?
        .runtime_version()
        .ok()
        .flatten()
}

/// Exact, then prefix, then major.minor; `installed` is newest first
fn match_declared<'a>(declared: &str, installed: &'a [(String, PathBuf)]) -> Option<&'a (String, PathBuf)> {
    installed
        .iter()
        .find(|(v, _)| v == declared)
        .or_else(|| installed.iter().find(|(v, _)| v.starts_with(declared)))
        .or_else(|| {
            let wanted = major_minor(declared);
            installed.iter().find(|(v, _)| major_minor(v) == wanted)
        })
}
