//! Locating and naming the packaged archive

use std::fs;
use std::path::{Path, PathBuf};

use mulekit_core::sanitize_filename;

use crate::error::{BuildError, Result};

/// Suffix Maven's Mule plugin gives the deployable archive
pub const PREFERRED_SUFFIX: &str = "-mule-application.jar";

const ARCHIVE_EXTENSION: &str = "jar";
const ORIGINAL_MARKER: &str = "original";

pub trait ArtifactLocator: Send + Sync {
    /// Path of the archive produced by a build in `working_dir`
    fn locate(&self, working_dir: &Path) -> Result<PathBuf>;
}

/// Looks for the archive in the build output directory.
///
/// Prefers `*-mule-application.jar`, then any `*.jar` whose name does not
/// contain `original`. Candidates are sorted so the choice is stable.
#[derive(Debug, Clone)]
pub struct TargetDirLocator {
    output_dir: PathBuf,
}

impl TargetDirLocator {
    /// `output_dir` is relative to the working directory
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ArtifactLocator for TargetDirLocator {
    fn locate(&self, working_dir: &Path) -> Result<PathBuf> {
        let dir = working_dir.join(&self.output_dir);
        let entries = fs::read_dir(&dir)
            .map_err(|e| BuildError::Artifact(format!("cannot read {}: {}", dir.display(), e)))?;

        let mut archives: Vec<(String, PathBuf)> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION))
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_string();
                Some((name, p))
            })
            .collect();
        archives.sort();

        if let Some((_, path)) = archives.iter().find(|(name, _)| name.ends_with(PREFERRED_SUFFIX)) {
            return Ok(path.clone());
        }
        archives
            .into_iter()
            .find(|(name, _)| !name.contains(ORIGINAL_MARKER))
            .map(|(_, path)| path)
            .ok_or_else(|| BuildError::Artifact(format!("no .{} archive found in {}", ARCHIVE_EXTENSION, dir.display())))
    }
}

/// Deterministic archive name:
/// `{project}[-{environment}][-local]-{version}-{timestamp}.{extension}`
///
/// `-local` is added only for stripped builds without an environment.
pub fn package_name(
    project: &str,
    environment: Option<&str>,
    local: bool,
    version: &str,
    timestamp: &str,
    extension: &str,
) -> String {
    let mut name = sanitize_filename(project);
    if let Some(env) = environment {
        name.push('-');
        name.push_str(&sanitize_filename(env));
    } else if local {
        name.push_str("-local");
    }
    format!("{}-{}-{}.{}", name, sanitize_filename(version), timestamp, extension)
}

/// Copy `artifact` next to itself under `name`, leaving the original in place
pub fn copy_as(artifact: &Path, dest_dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir).map_err(|e| mulekit_core::CoreError::io(dest_dir, e))?;
    let dest = dest_dir.join(name);
    fs::copy(artifact, &dest).map_err(|e| mulekit_core::CoreError::io(artifact, e))?;
    Ok(dest)
}
