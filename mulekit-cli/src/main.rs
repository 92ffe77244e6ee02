//! Mulekit CLI
//!
//! Command-line interface for building, scanning and releasing Mule projects.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mulekit_build::{
    release, BuildArgs, BuildFailure, BuildOptions, MavenInvoker, Orchestrator, OutputMode, ReleaseOptions,
    SecureMode, TargetDirLocator,
};
use mulekit_core::{
    path_to_string, relative_to, remove_secure_properties_file, resolve, scan_files, strip_file, ProjectConfig,
    RuntimeResolver, CONFIG_FILE,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mulekit")]
#[command(about = "Transactional build and secure-property tooling for Mule projects")]
#[command(version)]
struct Cli {
    /// Only log warnings and errors; also passes -q to the build tool
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default mulekit.toml
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing mulekit.toml
        #[arg(long)]
        force: bool,
    },

    /// Build the project, restoring every touched file afterwards
    Build {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Target environment, used in the package name
        #[arg(short, long)]
        env: Option<String>,

        /// Remove secure:: markers and the secure properties block for this build
        #[arg(long)]
        strip_secure: bool,

        /// Refuse to build while sensitive properties lack the secure:: marker
        #[arg(long)]
        enforce_secure: bool,

        /// Maven profile (default: build.profile from mulekit.toml)
        #[arg(short = 'P', long)]
        profile: Option<String>,

        #[arg(long)]
        skip_tests: bool,

        #[arg(long)]
        attach_sources: bool,

        /// Build with this version without changing pom.xml
        #[arg(long = "set-version")]
        version: Option<String>,

        /// Print the result as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Report sensitive properties that lack the secure:: marker
    Scan {
        /// File or directory to scan (default: the project's config tree)
        target: Option<PathBuf>,

        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Remove secure:: markers in place
    Strip {
        /// File or directory to strip (default: the project's config tree)
        target: Option<PathBuf>,

        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Also remove secure properties config blocks
        #[arg(long)]
        remove_block: bool,
    },

    /// Set the version, build, commit, tag and push
    Release {
        /// New version, e.g. 1.4.0
        version: String,

        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        #[arg(short = 'P', long)]
        profile: Option<String>,

        #[arg(long)]
        skip_tests: bool,

        /// Commit and tag locally only
        #[arg(long)]
        no_push: bool,
    },

    /// Show the runtime the project resolves to and installed runtimes
    Runtime {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn wants_json(&self) -> bool {
        matches!(
            self,
            Commands::Build { json: true, .. } | Commands::Scan { json: true, .. } | Commands::Runtime { json: true, .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogMode {
    Normal,
    Quiet,
    /// Logs on stderr without colors; stdout is reserved for JSON
    Stdio,
}

fn init_logging(mode: LogMode) {
    let level = if mode == LogMode::Quiet { "mulekit=warn" } else { "mulekit=info" };
    let filter = EnvFilter::from_default_env().add_directive(level.parse().unwrap());

    match mode {
        LogMode::Stdio => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init(),
        LogMode::Normal | LogMode::Quiet => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mode = if cli.command.wants_json() {
        LogMode::Stdio
    } else if cli.quiet {
        LogMode::Quiet
    } else {
        LogMode::Normal
    };
    init_logging(mode);

    match cli.command {
        Commands::Init { path, force } => cmd_init(path, force),
        Commands::Build {
            path,
            env,
            strip_secure,
            enforce_secure,
            profile,
            skip_tests,
            attach_sources,
            version,
            json,
        } => {
            let project_dir = project_dir(path)?;
            let secure_mode = SecureMode::from_flags(strip_secure, enforce_secure)?;
            let options = BuildOptions {
                project_dir,
                environment: env,
                secure_mode,
                version,
                args: BuildArgs {
                    profile,
                    skip_tests,
                    attach_sources,
                    quiet: cli.quiet || json,
                },
            };
            cmd_build(options, json).await
        }
        Commands::Scan { target, path, json } => cmd_scan(target, path, json),
        Commands::Strip {
            target,
            path,
            dry_run,
            remove_block,
        } => cmd_strip(target, path, dry_run, remove_block),
        Commands::Release {
            version,
            path,
            profile,
            skip_tests,
            no_push,
        } => {
            let options = ReleaseOptions {
                version,
                build: BuildOptions {
                    project_dir: project_dir(path)?,
                    args: BuildArgs {
                        profile,
                        skip_tests,
                        attach_sources: false,
                        quiet: cli.quiet,
                    },
                    ..Default::default()
                },
                push: !no_push,
            };
            cmd_release(options).await
        }
        Commands::Runtime { path, json } => cmd_runtime(path, json),
    }
}

fn project_dir(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("Failed to read current directory"),
    }
}

fn load_config(project_dir: &Path) -> Result<ProjectConfig> {
    ProjectConfig::load(project_dir).with_context(|| format!("Failed to load {}", CONFIG_FILE))
}

fn orchestrator(config: ProjectConfig, output_mode: OutputMode) -> Orchestrator<MavenInvoker, TargetDirLocator> {
    let invoker = MavenInvoker::new(config.build.command.clone())
        .with_timeout(config.build.timeout_secs.map(Duration::from_secs))
        .with_output_mode(output_mode);
    let locator = TargetDirLocator::new(config.output_dir.clone());
    Orchestrator::new(config, invoker, locator)
}

fn report_failure(failure: &BuildFailure, json: bool) {
    if json {
        let report = serde_json::json!({
            "success": false,
            "stage": failure.stage.to_string(),
            "error": failure.error.to_string(),
            "violations": failure.error.violations(),
        });
        println!("{}", report);
        return;
    }
    eprintln!("Error: {}", failure);
    for violation in failure.error.violations() {
        eprintln!("  {}", violation);
    }
}

/// Write a default mulekit.toml
fn cmd_init(path: Option<PathBuf>, force: bool) -> Result<ExitCode> {
    let project_dir = project_dir(path)?;
    let config_path = project_dir.join(CONFIG_FILE);
    if config_path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }

    let content = ProjectConfig::default().to_toml().context("Failed to serialize config")?;
    std::fs::write(&config_path, content).with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Wrote {}", config_path.display());
    Ok(ExitCode::SUCCESS)
}

/// Run one transactional build
async fn cmd_build(options: BuildOptions, json: bool) -> Result<ExitCode> {
    let config = load_config(&options.project_dir)?;
    let output_mode = if json { OutputMode::Capture } else { OutputMode::Inherit };

    match orchestrator(config, output_mode).run(&options).await {
        Ok(outcome) => {
            if json {
                let report = serde_json::json!({
                    "success": true,
                    "artifact": outcome.artifact,
                    "originalArtifact": outcome.original_artifact,
                    "manifest": outcome.manifest_path,
                    "version": outcome.manifest.version,
                    "environment": outcome.manifest.environment,
                });
                println!("{}", report);
            } else {
                println!("Built {}", outcome.artifact.display());
                println!("Manifest: {}", outcome.manifest_path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            report_failure(&failure, json);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn scan_target(target: Option<PathBuf>, project_dir: &Path, config: &ProjectConfig) -> PathBuf {
    target.unwrap_or_else(|| config.config_tree(project_dir))
}

/// Report unsecured sensitive properties; non-zero exit when any are found
fn cmd_scan(target: Option<PathBuf>, path: Option<PathBuf>, json: bool) -> Result<ExitCode> {
    let project_dir = project_dir(path)?;
    let config = load_config(&project_dir)?;
    let target = scan_target(target, &project_dir, &config);
    if !target.exists() {
        bail!("{} does not exist", target.display());
    }

    let files = resolve(&target, &config.extension);
    let violations = scan_files(&files, &config.matcher()).context("Scan failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&violations)?);
    } else if violations.is_empty() {
        println!("No unsecured sensitive properties in {} file(s)", files.len());
    } else {
        for violation in &violations {
            println!("{}", violation);
        }
        println!(
            "\n{} unsecured sensitive propert{} in {} file(s)",
            violations.len(),
            if violations.len() == 1 { "y" } else { "ies" },
            files.len()
        );
    }

    Ok(if violations.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Strip secure markers in place, without backup
fn cmd_strip(target: Option<PathBuf>, path: Option<PathBuf>, dry_run: bool, remove_block: bool) -> Result<ExitCode> {
    let project_dir = project_dir(path)?;
    let config = load_config(&project_dir)?;
    let target = scan_target(target, &project_dir, &config);
    if !target.exists() {
        bail!("{} does not exist", target.display());
    }

    let base = if target.is_dir() { target.clone() } else { project_dir.clone() };
    let files = resolve(&target, &config.extension);
    let mut total = 0;
    for file in &files {
        let stripped = strip_file(file, dry_run).with_context(|| format!("Failed to strip {}", file.display()))?;
        let blocks = if remove_block {
            remove_secure_properties_file(file, dry_run)
                .with_context(|| format!("Failed to remove block from {}", file.display()))?
        } else {
            0
        };
        if stripped.replacement_count > 0 || blocks > 0 {
            let mut line = format!(
                "{}: {} marker(s)",
                path_to_string(&relative_to(file, &base)),
                stripped.replacement_count
            );
            if blocks > 0 {
                line.push_str(&format!(", {} block(s)", blocks));
            }
            println!("{}", line);
        }
        total += stripped.replacement_count;
    }

    let verb = if dry_run { "Would strip" } else { "Stripped" };
    println!("{} {} marker(s) across {} file(s)", verb, total, files.len());
    Ok(ExitCode::SUCCESS)
}

/// Version, build, commit, tag, push
async fn cmd_release(options: ReleaseOptions) -> Result<ExitCode> {
    let config = load_config(&options.build.project_dir)?;

    match release(&orchestrator(config, OutputMode::Inherit), &options).await {
        Ok(outcome) => {
            println!(
                "Released {} ({} -> {})",
                outcome.tag, outcome.previous_version, outcome.build.manifest.version
            );
            println!("Artifact: {}", outcome.build.artifact.display());
            if !outcome.pushed {
                println!("Not pushed. Run: git push && git push --tags");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            report_failure(&failure, false);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Show runtime resolution
fn cmd_runtime(path: Option<PathBuf>, json: bool) -> Result<ExitCode> {
    let project_dir = project_dir(path)?;
    let config = load_config(&project_dir)?;
    let resolver = RuntimeResolver::from_env(&config.runtime);
    let installed = resolver.installed();
    let resolved = resolver.resolve(Some(&project_dir));

    if json {
        let report = serde_json::json!({
            "resolved": resolved.as_ref().ok(),
            "error": resolved.as_ref().err().map(|e| e.to_string()),
            "installed": installed
                .iter()
                .map(|(version, path)| serde_json::json!({ "version": version, "path": path }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &resolved {
            Ok(runtime) => println!("Runtime {} at {} ({})", runtime.version, runtime.path.display(), runtime.source),
            Err(e) => println!("No runtime: {}", e),
        }
        if !installed.is_empty() {
            println!("\nInstalled:");
            for (version, path) in &installed {
                println!("  {:<12} {}", version, path.display());
            }
        }
    }

    Ok(if resolved.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
