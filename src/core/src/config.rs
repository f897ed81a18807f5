use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};

/// Default builder executable, resolved through `PATH`.
pub const DEFAULT_BUILDER: &str = "nydus-image";

/// Layered build workflow configuration.
///
/// Supplied once per image build and never mutated by the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Chunk dictionary reference handed to the builder (e.g. "bootstrap=/path/dict")
    pub chunk_dict: Option<String>,

    /// Target output directory; blobs are published under `<target_dir>/blobs`
    pub target_dir: PathBuf,

    /// Path to the builder executable
    pub builder_path: PathBuf,

    /// Newline separated prefetch patterns, fed to the builder on stdin
    pub prefetch_patterns: String,

    /// Image format version
    pub fs_version: FsVersion,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            chunk_dict: None,
            target_dir: PathBuf::from("."),
            builder_path: PathBuf::from(DEFAULT_BUILDER),
            prefetch_patterns: String::new(),
            fs_version: FsVersion::default(),
        }
    }
}

impl WorkflowConfig {
    /// Create a configuration targeting `target_dir` with default settings.
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            ..Default::default()
        }
    }

    /// Load a configuration file.
    ///
    /// `.yaml`/`.yml` files are parsed as YAML, everything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BuildError::ConfigError(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the workflow cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.target_dir.as_os_str().is_empty() {
            return Err(BuildError::ConfigError(
                "target_dir must not be empty".to_string(),
            ));
        }
        if self.builder_path.as_os_str().is_empty() {
            return Err(BuildError::ConfigError(
                "builder_path must not be empty".to_string(),
            ));
        }
        if let Some(dict) = &self.chunk_dict {
            if dict.trim().is_empty() {
                return Err(BuildError::ConfigError(
                    "chunk_dict must not be blank when set".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Directory holding the content-addressed blobs of this build.
    pub fn blobs_dir(&self) -> PathBuf {
        self.target_dir.join("blobs")
    }
}

/// RAFS image format version passed to the builder as `--fs-version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FsVersion {
    #[default]
    #[serde(rename = "5")]
    V5,
    #[serde(rename = "6")]
    V6,
}

impl std::fmt::Display for FsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V5 => write!(f, "5"),
            Self::V6 => write!(f, "6"),
        }
    }
}

impl std::str::FromStr for FsVersion {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "5" => Ok(Self::V5),
            "6" => Ok(Self::V6),
            _ => Err(BuildError::ConfigError(format!(
                "unknown fs version '{}' (supported: 5, 6)",
                s
            ))),
        }
    }
}

/// Convention used to represent deletions between layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteoutSpec {
    /// OCI `.wh.` marker files (default).
    #[default]
    Oci,
    /// Overlayfs character devices and xattrs.
    Overlayfs,
    /// No whiteout processing.
    None,
}

impl std::fmt::Display for WhiteoutSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Oci => write!(f, "oci"),
            Self::Overlayfs => write!(f, "overlayfs"),
            Self::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for WhiteoutSpec {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "oci" => Ok(Self::Oci),
            "overlayfs" => Ok(Self::Overlayfs),
            "none" => Ok(Self::None),
            _ => Err(BuildError::ConfigError(format!(
                "unknown whiteout spec '{}' (supported: oci, overlayfs, none)",
                s
            ))),
        }
    }
}
