//! Mulekit Core Library
//!
//! This crate provides the core functionality for Mulekit:
//! - Property reference matching and sensitive-name classification
//! - Secure marker stripping that preserves every other byte
//! - Violation scanning for unsecured sensitive properties
//! - Config-tree file set resolution
//! - Backup/restore snapshots around mutating operations
//! - Project descriptor (pom.xml) access and runtime discovery

pub mod backup;
pub mod descriptor;
pub mod error;
pub mod file_set;
pub mod path_utils;
pub mod patterns;
pub mod runtime;
pub mod scanner;
pub mod transform;
pub mod types;

// Re-export commonly used types
pub use backup::{generate_backup_id, BackupSnapshot, BackupState, RestoreReport};
pub use descriptor::{Descriptor, DESCRIPTOR_FILE};
pub use error::CoreError;
pub use file_set::{resolve, FileSet};
pub use patterns::{default_sensitive_patterns, find_references, PropertyMatcher, PropertyReference, SyntaxKind, SECURE_MARKER};
pub use runtime::{RuntimeInstall, RuntimeResolver, RuntimeSource};
pub use scanner::{scan, scan_file, scan_files, Violation};
pub use transform::{
    remove_all_secure_properties_blocks, remove_secure_properties_block, remove_secure_properties_file, strip_file,
    strip_marker, FileStrip, TransformResult,
};
pub use types::{
    build_timestamp, host_identity, operator_identity, BuildManifest, BuildToolConfig, ProjectConfig, RuntimeConfig,
    BUILD_TIMESTAMP_FORMAT, CONFIG_FILE,
};
pub use path_utils::{normalize_path, path_to_string, relative_to, sanitize_filename};
