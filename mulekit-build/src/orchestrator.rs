//! Build orchestration
//!
//! One build runs these stages in order:
//!
//! ```text
//! precheck -> lock -> backup(pom) -> [backup(config tree)] -> clean
//!   -> transform (strip | enforce) -> external build -> locate artifact
//!   -> copy under release name -> manifest -> restore
//! ```
//!
//! Restore runs on every path once the descriptor backup exists: success,
//! any stage error, and panics (through the snapshots' drop guards). The
//! project is left byte-identical to its state before the build.

use std::path::{Component, Path, PathBuf};

use mulekit_core::{
    build_timestamp, path_to_string, relative_to, remove_secure_properties_file, resolve, scan_files, strip_file,
    BackupSnapshot, BuildManifest, CoreError, Descriptor, ProjectConfig, DESCRIPTOR_FILE,
};

use crate::artifact::{copy_as, package_name, ArtifactLocator};
use crate::error::{BuildError, BuildFailure, BuildStage};
use crate::invoker::{output_tail, BuildArgs, BuildInvoker, BuildRequest};
use crate::lock::ProjectLock;

/// How secure property markers are treated during a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecureMode {
    /// Leave configuration untouched
    #[default]
    Keep,
    /// Remove `secure::` markers and the secure properties block for the build
    Strip,
    /// Refuse to build while any sensitive property lacks the marker
    Enforce,
}

impl SecureMode {
    pub fn from_flags(strip: bool, enforce: bool) -> Result<Self, BuildError> {
        match (strip, enforce) {
            (true, true) => Err(BuildError::Precondition(
                "--strip-secure and --enforce-secure cannot be used together".to_string(),
            )),
            (true, false) => Ok(SecureMode::Strip),
            (false, true) => Ok(SecureMode::Enforce),
            (false, false) => Ok(SecureMode::Keep),
        }
    }
}

/// Options for one build
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub project_dir: PathBuf,
    pub environment: Option<String>,
    pub secure_mode: SecureMode,
    /// Build with this descriptor version; the descriptor is restored afterwards
    pub version: Option<String>,
    pub args: BuildArgs,
}

/// What a successful build produced
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Archive as produced by the build tool
    pub original_artifact: PathBuf,
    /// Copy under the release name
    pub artifact: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: BuildManifest,
}

/// Snapshots held for the duration of one build
struct Rollback {
    descriptor: Option<BackupSnapshot>,
    config_tree: Option<BackupSnapshot>,
    /// Global config living outside the config tree snapshot
    global_config: Option<BackupSnapshot>,
}

impl Rollback {
    fn new() -> Self {
        Self {
            descriptor: None,
            config_tree: None,
            global_config: None,
        }
    }

    /// Restore everything that was snapshotted. Missing backup copies are
    /// warnings; the first copy-back failure is returned.
    fn restore_all(&mut self) -> Result<(), BuildFailure> {
        let mut first_error = None;
        let slots = [
            ("project descriptor", &mut self.descriptor),
            ("config tree", &mut self.config_tree),
            ("global config", &mut self.global_config),
        ];
        for (label, slot) in slots {
            let Some(mut snapshot) = slot.take() else {
                continue;
            };
            match snapshot.restore() {
                Ok(report) => {
                    tracing::debug!("Restored {} ({} file(s))", label, report.restored);
                    for missing in &report.missing {
                        tracing::warn!("Could not restore {}: backup copy missing", missing.display());
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to restore {}: {}", label, e);
                    first_error.get_or_insert(BuildFailure::new(BuildStage::Restore, e));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Sequences a build around the injected build tool and artifact locator
pub struct Orchestrator<I, L> {
    config: ProjectConfig,
    invoker: I,
    locator: L,
}

impl<I: BuildInvoker, L: ArtifactLocator> Orchestrator<I, L> {
    pub fn new(config: ProjectConfig, invoker: I, locator: L) -> Self {
        Self {
            config,
            invoker,
            locator,
        }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub async fn run(&self, options: &BuildOptions) -> Result<BuildOutcome, BuildFailure> {
        let project_dir = options.project_dir.as_path();

        self.precheck(options)
            .await
            .map_err(|e| BuildFailure::new(BuildStage::Precheck, e))?;
        let _lock = ProjectLock::acquire(project_dir).map_err(|e| BuildFailure::new(BuildStage::Precheck, e))?;

        let mut rollback = Rollback::new();
        let result = match self.backup(options, &mut rollback) {
            Ok(()) => self.run_stages(options).await,
            Err(e) => Err(BuildFailure::new(BuildStage::Backup, e)),
        };

        let restored = rollback.restore_all();
        match (result, restored) {
            (Ok(outcome), Ok(())) => {
                tracing::info!("Build complete: {}", outcome.artifact.display());
                Ok(outcome)
            }
            (Ok(_), Err(restore_failure)) => Err(restore_failure),
            (Err(failure), restored) => {
                if let Err(restore_failure) = restored {
                    tracing::warn!("{}", restore_failure);
                }
                Err(failure)
            }
        }
    }

    /// No filesystem or process side effects beyond probing the build tool
    async fn precheck(&self, options: &BuildOptions) -> Result<(), BuildError> {
        let project_dir = &options.project_dir;
        if !project_dir.is_dir() {
            return Err(BuildError::Precondition(format!(
                "project directory {} does not exist",
                project_dir.display()
            )));
        }
        let descriptor = project_dir.join(DESCRIPTOR_FILE);
        if !descriptor.is_file() {
            return Err(BuildError::Precondition(format!(
                "no {} in {}",
                DESCRIPTOR_FILE,
                project_dir.display()
            )));
        }
        self.check_output_dir(project_dir)?;
        if options.secure_mode != SecureMode::Keep {
            let tree = self.config.config_tree(project_dir);
            if !tree.is_dir() {
                return Err(BuildError::Precondition(format!(
                    "config tree {} does not exist",
                    tree.display()
                )));
            }
        }
        self.invoker.check_available().await
    }

    /// Clean deletes the output directory, so it has to be a subdirectory of
    /// the project holding neither the descriptor nor the config tree
    fn check_output_dir(&self, project_dir: &Path) -> Result<(), BuildError> {
        let output_dir = &self.config.output_dir;
        let mut depth = 0;
        for component in output_dir.components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                _ => {
                    return Err(BuildError::Precondition(format!(
                        "output_dir '{}' must be a relative path inside the project",
                        output_dir.display()
                    )))
                }
            }
        }
        if depth == 0 {
            return Err(BuildError::Precondition(format!(
                "output_dir '{}' must name a subdirectory of the project",
                output_dir.display()
            )));
        }

        let output = project_dir.join(output_dir);
        let descriptor = project_dir.join(DESCRIPTOR_FILE);
        if descriptor.starts_with(&output) || self.config.config_tree(project_dir).starts_with(&output) {
            return Err(BuildError::Precondition(format!(
                "output_dir '{}' contains project sources and would be deleted by clean",
                output_dir.display()
            )));
        }
        Ok(())
    }

    fn backup(&self, options: &BuildOptions, rollback: &mut Rollback) -> Result<(), BuildError> {
        let project_dir = &options.project_dir;
        let backup_root = self.config.backup_root();

        rollback.descriptor = Some(BackupSnapshot::capture_file(&project_dir.join(DESCRIPTOR_FILE), &backup_root)?);

        if options.secure_mode == SecureMode::Strip {
            let tree = self.config.config_tree(project_dir);
            let files = resolve(&tree, &self.config.extension);
            rollback.config_tree = Some(BackupSnapshot::capture(&tree, &files, &backup_root)?);
            tracing::info!("Backed up {} config file(s)", files.len());

            let global = self.config.global_config_path(project_dir);
            if global.is_file() && !files.iter().any(|f| f == &global) {
                rollback.global_config = Some(BackupSnapshot::capture_file(&global, &backup_root)?);
                tracing::info!("Backed up global config {}", global.display());
            }
        }
        Ok(())
    }

    async fn run_stages(&self, options: &BuildOptions) -> Result<BuildOutcome, BuildFailure> {
        let project_dir = options.project_dir.as_path();
        let at = |stage: BuildStage| move |e: BuildError| BuildFailure::new(stage, e);

        self.clean(project_dir);

        let mut descriptor = Descriptor::load_from_project(project_dir)
            .map_err(BuildError::from)
            .map_err(at(BuildStage::Transform))?;
        let timestamp = build_timestamp();
        let mut manifest = self
            .prepare_descriptor(&mut descriptor, options, &timestamp)
            .map_err(at(BuildStage::Transform))?;
        manifest.environment = options.environment.clone();

        self.transform(options, &mut manifest)
            .map_err(at(BuildStage::Transform))?;

        self.external_build(options)
            .await
            .map_err(at(BuildStage::ExternalBuild))?;

        let original_artifact = self
            .locator
            .locate(project_dir)
            .map_err(at(BuildStage::LocateArtifact))?;
        tracing::info!("Found artifact {}", original_artifact.display());

        let extension = original_artifact
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jar");
        let name = package_name(
            &manifest.project_name,
            options.environment.as_deref(),
            options.secure_mode == SecureMode::Strip,
            &manifest.version,
            &timestamp,
            extension,
        );
        let output_dir = self.config.output_path(project_dir);
        let artifact = copy_as(&original_artifact, &output_dir, &name).map_err(at(BuildStage::Package))?;
        manifest.package_name = name;

        let stem = artifact
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("build")
            .to_string();
        let manifest_path = output_dir.join(format!("{}.manifest.txt", stem));
        manifest
            .write(&manifest_path)
            .map_err(BuildError::from)
            .map_err(at(BuildStage::Manifest))?;

        Ok(BuildOutcome {
            original_artifact,
            artifact,
            manifest_path,
            manifest,
        })
    }

    /// Remove the previous build output. Failure only warrants a warning.
    fn clean(&self, project_dir: &Path) {
        let output_dir = self.config.output_path(project_dir);
        if output_dir.exists() {
            match std::fs::remove_dir_all(&output_dir) {
                Ok(()) => tracing::debug!("Removed {}", output_dir.display()),
                Err(e) => tracing::warn!("{}", BuildFailure::new(BuildStage::Clean, CoreError::io(&output_dir, e))),
            }
        }
    }

    fn prepare_descriptor(
        &self,
        descriptor: &mut Descriptor,
        options: &BuildOptions,
        timestamp: &str,
    ) -> Result<BuildManifest, BuildError> {
        let mut changes = Vec::new();
        if let Some(version) = &options.version {
            let previous = descriptor.version()?;
            descriptor.set_version(version)?;
            descriptor.save()?;
            changes.push(format!("Descriptor version {} -> {} for this build", previous, version));
        }

        let mut manifest = BuildManifest::new(descriptor.project_name()?, descriptor.version()?, timestamp);
        for change in changes {
            manifest.add_change(change);
        }
        Ok(manifest)
    }

    fn transform(&self, options: &BuildOptions, manifest: &mut BuildManifest) -> Result<(), BuildError> {
        let project_dir = &options.project_dir;
        let tree = self.config.config_tree(project_dir);

        match options.secure_mode {
            SecureMode::Keep => Ok(()),
            SecureMode::Strip => {
                let files = resolve(&tree, &self.config.extension);
                let mut total = 0;
                for file in &files {
                    let stripped = strip_file(file, false)?;
                    if stripped.replacement_count > 0 {
                        total += stripped.replacement_count;
                        manifest.add_change(format!(
                            "Stripped {} secure marker(s) in {}",
                            stripped.replacement_count,
                            path_to_string(&relative_to(file, project_dir))
                        ));
                    }
                }

                let global = self.config.global_config_path(project_dir);
                if global.is_file() {
                    let removed = remove_secure_properties_file(&global, false)?;
                    if removed > 0 {
                        manifest.add_change(format!(
                            "Removed {} secure properties block(s) from {}",
                            removed,
                            path_to_string(&relative_to(&global, project_dir))
                        ));
                    }
                } else {
                    tracing::warn!("Global config {} not found, skipping block removal", global.display());
                }

                tracing::info!("Stripped {} secure marker(s) across {} file(s)", total, files.len());
                Ok(())
            }
            SecureMode::Enforce => {
                let files = resolve(&tree, &self.config.extension);
                let violations = scan_files(&files, &self.config.matcher())?;
                if !violations.is_empty() {
                    for violation in &violations {
                        tracing::error!("Unsecured sensitive property: {}", violation);
                    }
                    return Err(BuildError::Security { violations });
                }
                manifest.add_change(format!(
                    "Verified secure markers in {} config file(s)",
                    files.len()
                ));
                Ok(())
            }
        }
    }

    async fn external_build(&self, options: &BuildOptions) -> Result<(), BuildError> {
        let mut args = options.args.clone();
        if args.profile.is_none() {
            args.profile = self.config.build.profile.clone();
        }
        let request = BuildRequest::package(&options.project_dir, &args);
        let output = self.invoker.run(&request).await?;
        if output.success() {
            return Ok(());
        }

        let code = output
            .exit_code
            .map_or_else(|| "a signal".to_string(), |c| format!("code {}", c));
        let mut message = format!("build tool exited with {}", code);
        let tail = output_tail(&output.output, 20);
        if !tail.is_empty() {
            message.push('\n');
            message.push_str(&tail);
        }
        Err(BuildError::ExternalProcess(message))
    }
}
