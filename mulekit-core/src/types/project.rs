//! Mulekit project configuration
//!
//! Defines the optional `mulekit.toml` file at the project root.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::patterns::{default_sensitive_patterns, PropertyMatcher};

pub const CONFIG_FILE: &str = "mulekit.toml";

/// Project configuration (mulekit.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Root of the configuration tree (default: "src/main/mule")
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Global configuration file holding the secure properties block,
    /// relative to `config_dir` (default: "global.xml")
    #[serde(default = "default_global_config")]
    pub global_config: PathBuf,

    /// Extension of configuration files (default: "xml")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Case-insensitive substrings that make a property name sensitive
    #[serde(default = "default_sensitive_patterns")]
    pub sensitive_patterns: Vec<String>,

    /// Build output directory, relative to the project root (default: "target")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Where backup directories are created (default: system temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_root: Option<PathBuf>,

    /// External build tool settings
    #[serde(default)]
    pub build: BuildToolConfig,

    /// Runtime discovery settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("src/main/mule")
}

fn default_global_config() -> PathBuf {
    PathBuf::from("global.xml")
}

fn default_extension() -> String {
    "xml".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("target")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            global_config: default_global_config(),
            extension: default_extension(),
            sensitive_patterns: default_sensitive_patterns(),
            output_dir: default_output_dir(),
            backup_root: None,
            build: BuildToolConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// External build tool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildToolConfig {
    /// Build executable (default: "mvn")
    #[serde(default = "default_build_command")]
    pub command: String,

    /// Maven profile used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Kill the build after this many seconds. Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_build_command() -> String {
    "mvn".to_string()
}

impl Default for BuildToolConfig {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            profile: None,
            timeout_secs: None,
        }
    }
}

/// Runtime discovery configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory holding installed runtimes (default: ~/.mule/runtimes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtimes_dir: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load `mulekit.toml` from a project directory, falling back to defaults
    /// when the file does not exist
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        toml::from_str(&content).map_err(|source| CoreError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn config_tree(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.config_dir)
    }

    pub fn global_config_path(&self, project_dir: &Path) -> PathBuf {
        self.config_tree(project_dir).join(&self.global_config)
    }

    pub fn output_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.output_dir)
    }

    pub fn backup_root(&self) -> PathBuf {
        self.backup_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn matcher(&self) -> PropertyMatcher {
        PropertyMatcher::new(&self.sensitive_patterns)
    }
}
