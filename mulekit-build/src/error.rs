//! Build pipeline errors

use std::fmt;
use std::path::PathBuf;

use mulekit_core::{CoreError, Violation};

/// Pipeline stage, used for logging and error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Precheck,
    Backup,
    Clean,
    Transform,
    ExternalBuild,
    LocateArtifact,
    Package,
    Manifest,
    Restore,
    Release,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Precheck => "precheck",
            BuildStage::Backup => "backup",
            BuildStage::Clean => "clean",
            BuildStage::Transform => "transform",
            BuildStage::ExternalBuild => "external build",
            BuildStage::LocateArtifact => "locate artifact",
            BuildStage::Package => "package",
            BuildStage::Manifest => "manifest",
            BuildStage::Restore => "restore",
            BuildStage::Release => "release",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    ExternalProcess(String),

    #[error("{} unsecured sensitive property reference(s) found; add the secure:: marker to each one", .violations.len())]
    Security { violations: Vec<Violation> },

    #[error("{0}")]
    Artifact(String),

    #[error("another build is running in this project (lock file {0}); remove it if no build is running")]
    Locked(PathBuf),

    #[error("git: {0}")]
    Vcs(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl BuildError {
    /// Violations behind a security failure
    pub fn violations(&self) -> &[Violation] {
        match self {
            BuildError::Security { violations } => violations,
            _ => &[],
        }
    }
}

/// A build error tagged with the stage that raised it
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {error}")]
pub struct BuildFailure {
    pub stage: BuildStage,
    #[source]
    pub error: BuildError,
}

impl BuildFailure {
    pub fn new(stage: BuildStage, error: impl Into<BuildError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_names_stage() {
        let failure = BuildFailure::new(BuildStage::ExternalBuild, BuildError::ExternalProcess("mvn exited with code 1".into()));
        assert_eq!(failure.to_string(), "external build failed: mvn exited with code 1");
    }

    #[test]
    fn test_security_message() {
        let err = BuildError::Security { violations: vec![] };
        assert!(err.to_string().starts_with("0 unsecured sensitive property reference(s) found"));
        assert!(err.violations().is_empty());
    }

    #[test]
    fn test_core_error_converts() {
        let failure = BuildFailure::new(BuildStage::Backup, CoreError::Backup("disk full".into()));
        assert!(matches!(failure.error, BuildError::Core(CoreError::Backup(_))));
        assert_eq!(failure.to_string(), "backup failed: Backup failed: disk full");
    }
}
