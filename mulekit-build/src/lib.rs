//! Mulekit Build
//!
//! Transactional build pipeline for Mule projects. Configuration is
//! transformed in place for the duration of one external build and restored
//! afterwards, whatever the outcome.

pub mod artifact;
pub mod error;
pub mod git;
pub mod invoker;
pub mod lock;
pub mod orchestrator;
pub mod release;

pub use artifact::{copy_as, package_name, ArtifactLocator, TargetDirLocator, PREFERRED_SUFFIX};
pub use error::{BuildError, BuildFailure, BuildStage};
pub use git::GitStatus;
pub use invoker::{BuildArgs, BuildInvoker, BuildOutput, BuildRequest, MavenInvoker, OutputMode};
pub use lock::{ProjectLock, LOCK_FILE};
pub use orchestrator::{BuildOptions, BuildOutcome, Orchestrator, SecureMode};
pub use release::{release, release_tag, ReleaseOptions, ReleaseOutcome};
