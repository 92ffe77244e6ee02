//! External build invocation
//!
//! The orchestrator talks to the build tool through [`BuildInvoker`]; the
//! production implementation shells out to Maven.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{BuildError, Result};

/// Flags controlling a package build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArgs {
    pub profile: Option<String>,
    pub skip_tests: bool,
    pub attach_sources: bool,
    pub quiet: bool,
}

/// One invocation of the build tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub working_dir: PathBuf,
    pub args: Vec<String>,
}

impl BuildRequest {
    /// `clean package` in batch mode with the given flags
    pub fn package(working_dir: &Path, args: &BuildArgs) -> Self {
        let mut list = vec!["clean".to_string(), "package".to_string(), "-B".to_string()];
        if args.quiet {
            list.push("-q".to_string());
        }
        if let Some(profile) = &args.profile {
            list.push(format!("-P{}", profile));
        }
        if args.skip_tests {
            list.push("-DskipTests".to_string());
        }
        if args.attach_sources {
            list.push("-DattachMuleSources".to_string());
        }
        Self {
            working_dir: working_dir.to_path_buf(),
            args: list,
        }
    }
}

/// Result of a finished build process
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout and stderr; empty when output was streamed
    pub output: String,
}

impl BuildOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait BuildInvoker: Send + Sync {
    /// Fail if the build tool cannot be run at all
    async fn check_available(&self) -> Result<()>;

    /// Run the build to completion. Spawn failures are errors; a non-zero
    /// exit is reported through [`BuildOutput::exit_code`].
    async fn run(&self, request: &BuildRequest) -> Result<BuildOutput>;
}

/// Where the build tool's output goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream straight to the terminal
    #[default]
    Inherit,
    /// Collect it; keeps stdout free for machine-readable output
    Capture,
}

/// Runs Maven as a child process
#[derive(Debug, Clone)]
pub struct MavenInvoker {
    command: String,
    timeout: Option<Duration>,
    output_mode: OutputMode,
}

impl MavenInvoker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
            output_mode: OutputMode::Inherit,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    fn program(&self) -> String {
        if cfg!(windows) && !self.command.contains('.') {
            format!("{}.cmd", self.command)
        } else {
            self.command.clone()
        }
    }
}

#[async_trait]
impl BuildInvoker for MavenInvoker {
    async fn check_available(&self) -> Result<()> {
        let status = Command::new(self.program())
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| BuildError::Precondition(format!("'{}' is not runnable: {}", self.command, e)))?;

        if !status.success() {
            return Err(BuildError::Precondition(format!(
                "'{} -v' exited with {}",
                self.command, status
            )));
        }
        Ok(())
    }

    async fn run(&self, request: &BuildRequest) -> Result<BuildOutput> {
        tracing::info!("Running {} {}", self.command, request.args.join(" "));

        let (stdout, stderr) = match self.output_mode {
            OutputMode::Inherit => (Stdio::inherit(), Stdio::inherit()),
            OutputMode::Capture => (Stdio::piped(), Stdio::piped()),
        };

        let child = Command::new(self.program())
            .args(&request.args)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildError::ExternalProcess(format!("failed to start '{}': {}", self.command, e)))?;

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    BuildError::ExternalProcess(format!(
                        "'{}' did not finish within {}s and was killed",
                        self.command,
                        limit.as_secs()
                    ))
                })?,
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|e| BuildError::ExternalProcess(format!("waiting for '{}': {}", self.command, e)))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(BuildOutput {
            exit_code: output.status.code(),
            output: text,
        })
    }
}

/// Last `lines` lines of captured output, for error messages
pub fn output_tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
