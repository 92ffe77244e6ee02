//! Configuration and report types
//!
//! Project configuration loaded from `mulekit.toml` and the manifest written
//! at the end of a build.

mod manifest;
mod project;

pub use manifest::*;
pub use project::*;
