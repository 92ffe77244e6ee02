//! Release workflow
//!
//! Sets a new descriptor version, builds it, then records the release in
//! version control: commit, annotated tag and push.

use std::fs;

use mulekit_core::{CoreError, Descriptor, DESCRIPTOR_FILE};

use crate::artifact::ArtifactLocator;
use crate::error::{BuildError, BuildFailure, BuildStage};
use crate::git;
use crate::invoker::BuildInvoker;
use crate::orchestrator::{BuildOptions, BuildOutcome, Orchestrator};

#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    pub version: String,
    pub build: BuildOptions,
    /// Push the release commit and tag to the default remote
    pub push: bool,
}

#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub tag: String,
    pub previous_version: String,
    pub build: BuildOutcome,
    pub pushed: bool,
}

pub fn release_tag(version: &str) -> String {
    format!("v{}", version)
}

/// Run a full release. The descriptor version change is kept only when the
/// build succeeds; a failed push is logged and reported through
/// [`ReleaseOutcome::pushed`].
pub async fn release<I: BuildInvoker, L: ArtifactLocator>(
    orchestrator: &Orchestrator<I, L>,
    options: &ReleaseOptions,
) -> Result<ReleaseOutcome, BuildFailure> {
    let project_dir = options.build.project_dir.as_path();
    let at = |e: BuildError| BuildFailure::new(BuildStage::Release, e);

    let version = options.version.trim();
    if version.is_empty() {
        return Err(at(BuildError::Precondition("release version is empty".to_string())));
    }
    let tag = release_tag(version);

    let status = git::get_status(project_dir).map_err(at)?;
    if !status.is_clean() {
        return Err(at(BuildError::Vcs(format!(
            "working tree has uncommitted changes ({} staged, {} unstaged, {} untracked)",
            status.staged_count, status.unstaged_count, status.untracked_count
        ))));
    }
    if git::tag_exists(project_dir, &tag).map_err(at)? {
        return Err(at(BuildError::Vcs(format!("tag {} already exists", tag))));
    }

    let mut descriptor = Descriptor::load_from_project(project_dir)
        .map_err(BuildError::from)
        .map_err(at)?;
    let original = descriptor.content().to_string();
    let previous_version = descriptor.version().map_err(BuildError::from).map_err(at)?;
    descriptor.set_version(version).map_err(BuildError::from).map_err(at)?;
    descriptor.save().map_err(BuildError::from).map_err(at)?;
    tracing::info!("Releasing {} (was {})", tag, previous_version);

    let mut build_options = options.build.clone();
    build_options.version = None;
    let build = match orchestrator.run(&build_options).await {
        Ok(outcome) => outcome,
        Err(failure) => {
            if let Err(e) = fs::write(descriptor.path(), &original) {
                tracing::error!("{}", CoreError::io(descriptor.path(), e));
            } else {
                tracing::info!("Reverted {} to {}", DESCRIPTOR_FILE, previous_version);
            }
            return Err(failure);
        }
    };

    let message = format!("Release {}", tag);
    git::commit(project_dir, &message, &[DESCRIPTOR_FILE]).map_err(at)?;
    git::create_tag(project_dir, &tag, &message).map_err(at)?;
    tracing::info!("Tagged {}", tag);

    let pushed = options.push
        && match git::push_with_tags(project_dir) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Push failed, release is local only: {}", e);
                false
            }
        };

    Ok(ReleaseOutcome {
        tag,
        previous_version,
        build,
        pushed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::TargetDirLocator;
    use crate::invoker::{BuildOutput, BuildRequest};
    use async_trait::async_trait;
    use mulekit_core::ProjectConfig;
    use std::path::Path;
    use std::process::Command;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const POM: &str = "<project>\n  <artifactId>orders-api</artifactId>\n  <version>1.0.0</version>\n</project>\n";

    #[derive(Clone)]
    struct FakeInvoker {
        seen_pom: Arc<Mutex<Option<String>>>,
        exit_code: i32,
    }

    #[async_trait]
    impl BuildInvoker for FakeInvoker {
        async fn check_available(&self) -> Result<(), BuildError> {
            Ok(())
        }

        async fn run(&self, request: &BuildRequest) -> Result<BuildOutput, BuildError> {
            let dir = &request.working_dir;
            *self.seen_pom.lock().unwrap() = Some(fs::read_to_string(dir.join("pom.xml")).unwrap());
            let target = dir.join("target");
            fs::create_dir_all(&target).unwrap();
            fs::write(target.join("orders-api-mule-application.jar"), b"PK").unwrap();
            Ok(BuildOutput {
                exit_code: Some(self.exit_code),
                output: String::new(),
            })
        }
    }

    fn run_git(dir: &Path, args: &[&str]) {
        let status = Command::new("git").args(args).current_dir(dir).output().unwrap();
        assert!(status.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&status.stderr));
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    /// Committed project with `target/` ignored
    fn init_project() -> TempDir {
        let project = TempDir::new().unwrap();
        let dir = project.path();
        fs::write(dir.join("pom.xml"), POM).unwrap();
        fs::write(dir.join(".gitignore"), "target/\n").unwrap();
        fs::create_dir_all(dir.join("src/main/mule")).unwrap();
        fs::write(dir.join("src/main/mule/global.xml"), "<mule/>\n").unwrap();

        run_git(dir, &["init", "-q"]);
        run_git(dir, &["config", "user.email", "build@example.com"]);
        run_git(dir, &["config", "user.name", "Build"]);
        run_git(dir, &["config", "commit.gpgsign", "false"]);
        run_git(dir, &["config", "tag.gpgsign", "false"]);
        run_git(dir, &["add", "-A"]);
        run_git(dir, &["commit", "-q", "-m", "Initial"]);
        project
    }

    fn orchestrator(backups: &TempDir, exit_code: i32) -> (Orchestrator<FakeInvoker, TargetDirLocator>, FakeInvoker) {
        let invoker = FakeInvoker {
            seen_pom: Arc::new(Mutex::new(None)),
            exit_code,
        };
        let config = ProjectConfig {
            backup_root: Some(backups.path().to_path_buf()),
            ..Default::default()
        };
        (
            Orchestrator::new(config, invoker.clone(), TargetDirLocator::new("target")),
            invoker,
        )
    }

    fn options(dir: &Path, version: &str) -> ReleaseOptions {
        ReleaseOptions {
            version: version.to_string(),
            build: BuildOptions {
                project_dir: dir.to_path_buf(),
                ..Default::default()
            },
            push: true,
        }
    }

    #[test]
    fn test_release_tag() {
        assert_eq!(release_tag("1.2.0"), "v1.2.0");
    }

    #[tokio::test]
    async fn test_release_commits_and_tags() {
        if !git_available() {
            return;
        }
        let project = init_project();
        let backups = TempDir::new().unwrap();
        let (orchestrator, invoker) = orchestrator(&backups, 0);

        let outcome = release(&orchestrator, &options(project.path(), "1.1.0")).await.unwrap();

        assert_eq!(outcome.tag, "v1.1.0");
        assert_eq!(outcome.previous_version, "1.0.0");
        // No remote configured
        assert!(!outcome.pushed);
        assert_eq!(outcome.build.manifest.version, "1.1.0");
        assert!(invoker.seen_pom.lock().unwrap().as_deref().unwrap().contains("<version>1.1.0</version>"));

        let pom = fs::read_to_string(project.path().join("pom.xml")).unwrap();
        assert!(pom.contains("<version>1.1.0</version>"));
        assert!(git::tag_exists(project.path(), "v1.1.0").unwrap());
        assert!(git::get_status(project.path()).unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_failed_build_reverts_version() {
        if !git_available() {
            return;
        }
        let project = init_project();
        let backups = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&backups, 1);

        let failure = release(&orchestrator, &options(project.path(), "1.1.0")).await.unwrap_err();

        assert_eq!(failure.stage, BuildStage::ExternalBuild);
        assert_eq!(fs::read_to_string(project.path().join("pom.xml")).unwrap(), POM);
        assert!(!git::tag_exists(project.path(), "v1.1.0").unwrap());
    }

    #[tokio::test]
    async fn test_dirty_tree_is_refused() {
        if !git_available() {
            return;
        }
        let project = init_project();
        fs::write(project.path().join("src/main/mule/global.xml"), "<mule></mule>\n").unwrap();
        let backups = TempDir::new().unwrap();
        let (orchestrator, invoker) = orchestrator(&backups, 0);

        let failure = release(&orchestrator, &options(project.path(), "1.1.0")).await.unwrap_err();

        assert_eq!(failure.stage, BuildStage::Release);
        assert!(matches!(failure.error, BuildError::Vcs(_)));
        assert!(invoker.seen_pom.lock().unwrap().is_none());
        assert_eq!(fs::read_to_string(project.path().join("pom.xml")).unwrap(), POM);
    }

    #[tokio::test]
    async fn test_existing_tag_is_refused() {
        if !git_available() {
            return;
        }
        let project = init_project();
        run_git(project.path(), &["tag", "-a", "v1.1.0", "-m", "Release v1.1.0"]);
        let backups = TempDir::new().unwrap();
        let (orchestrator, _) = orchestrator(&backups, 0);

        let failure = release(&orchestrator, &options(project.path(), "1.1.0")).await.unwrap_err();
        assert!(matches!(&failure.error, BuildError::Vcs(msg) if msg.contains("already exists")));
    }
}
