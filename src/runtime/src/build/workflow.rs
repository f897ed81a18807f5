//! Layered build workflow.
//!
//! Builds the layers of one image bottom-to-top. Each layer's bootstrap is
//! built on top of the previous layer's bootstrap, and each new blob is
//! renamed into `<target>/blobs/<digest>` once the builder reports its digest.
//!
//! A `Workflow` holds the parent chain and dedup state of exactly one image.
//! `build` takes `&mut self`: layers of one image are never built
//! concurrently. Distinct images use distinct workflows and target
//! directories and may be built in parallel.

use std::path::{Path, PathBuf};

use layerforge_core::config::{WhiteoutSpec, WorkflowConfig};
use layerforge_core::error::{BuildError, Result};
use uuid::Uuid;

use super::builder::{BlobBuilder, BuilderOption, NydusImageBuilder};
use super::report::{report_path, BuildReport};
use super::resolver::BlobResolution;

/// Orchestrates per-layer builds of a single image.
pub struct Workflow {
    config: WorkflowConfig,
    /// Flat directory of published, digest-named blobs
    blobs_dir: PathBuf,
    /// Storage backend description handed to the builder
    backend_config: String,
    builder: Box<dyn BlobBuilder>,
    /// Bootstrap of the layer most recently requested
    bootstrap_path: Option<PathBuf>,
    /// Bootstrap the next layer builds on
    parent_bootstrap_path: Option<PathBuf>,
    /// Most recent newly produced blob
    last_blob_id: Option<String>,
    /// Version reported by the builder on the last successful invocation
    builder_version: Option<String>,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("blobs_dir", &self.blobs_dir)
            .field("bootstrap_path", &self.bootstrap_path)
            .field("parent_bootstrap_path", &self.parent_bootstrap_path)
            .field("last_blob_id", &self.last_blob_id)
            .field("builder_version", &self.builder_version)
            .finish_non_exhaustive()
    }
}

impl Workflow {
    /// Prepare a workflow that drives the configured builder executable.
    ///
    /// Clears and recreates `<target_dir>/blobs`.
    pub fn new(config: WorkflowConfig) -> Result<Self> {
        let builder = NydusImageBuilder::new(config.builder_path.clone());
        Self::with_builder(config, Box::new(builder))
    }

    /// Prepare a workflow around a caller-supplied builder.
    pub fn with_builder(config: WorkflowConfig, builder: Box<dyn BlobBuilder>) -> Result<Self> {
        let blobs_dir = config.blobs_dir();

        match std::fs::remove_dir_all(&blobs_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(BuildError::SetupError(format!(
                    "Remove blob directory {}: {}",
                    blobs_dir.display(),
                    e
                )))
            }
        }
        std::fs::create_dir_all(&blobs_dir).map_err(|e| {
            BuildError::SetupError(format!(
                "Create blob directory {}: {}",
                blobs_dir.display(),
                e
            ))
        })?;

        let backend_config =
            serde_json::json!({ "dir": blobs_dir.to_string_lossy() }).to_string();

        tracing::debug!(
            blobs_dir = %blobs_dir.display(),
            "Prepared layered build workflow"
        );

        Ok(Self {
            config,
            blobs_dir,
            backend_config,
            builder,
            bootstrap_path: None,
            parent_bootstrap_path: None,
            last_blob_id: None,
            builder_version: None,
        })
    }

    /// Build one layer on top of the previously built one.
    ///
    /// `parent_bootstrap_path` overrides the tracked parent for this call
    /// only. Returns the published blob path, whose file name is the blob
    /// digest, or `None` when the layer produced no new blob (empty layer,
    /// unchanged blob list, or a digest already published).
    pub fn build(
        &mut self,
        layer_dir: &Path,
        whiteout_spec: WhiteoutSpec,
        parent_bootstrap_path: Option<&Path>,
        bootstrap_path: &Path,
        aligned_chunk: bool,
    ) -> Result<Option<PathBuf>> {
        self.bootstrap_path = Some(bootstrap_path.to_path_buf());

        let parent = parent_bootstrap_path
            .map(Path::to_path_buf)
            .or_else(|| self.parent_bootstrap_path.clone());

        // Identity is unknown until the report is read
        let blob_path = self.blobs_dir.join(Uuid::new_v4().to_string());
        let output_json_path = report_path(bootstrap_path);

        let option = BuilderOption {
            parent_bootstrap_path: parent,
            bootstrap_path: bootstrap_path.to_path_buf(),
            rootfs_path: layer_dir.to_path_buf(),
            prefetch_patterns: self.config.prefetch_patterns.clone(),
            whiteout_spec,
            output_json_path: output_json_path.clone(),
            blob_path: blob_path.clone(),
            aligned_chunk,
            chunk_dict: self.config.chunk_dict.clone(),
            fs_version: self.config.fs_version,
            backend_config: self.backend_config.clone(),
        };

        if let Err(e) = self.builder.run(&option) {
            discard_staged(&blob_path);
            return Err(BuildError::InvocationError {
                layer: layer_dir.display().to_string(),
                message: e.to_string(),
            });
        }

        self.parent_bootstrap_path = Some(bootstrap_path.to_path_buf());

        let report = match BuildReport::load(&output_json_path) {
            Ok(report) => report,
            Err(e) => {
                discard_staged(&blob_path);
                return Err(e);
            }
        };
        self.builder_version = Some(report.version.clone());

        let resolution = BlobResolution::resolve(self.last_blob_id.as_deref(), &report.blobs);
        if let BlobResolution::New(id) = &resolution {
            self.last_blob_id = Some(id.clone());
        }

        tracing::debug!(
            layer = %layer_dir.display(),
            staged = %blob_path.display(),
            resolution = ?resolution,
            "Layer built"
        );

        let size = match std::fs::metadata(&blob_path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                discard_staged(&blob_path);
                return Err(BuildError::StatError(format!(
                    "failed to stat staged blob {}: {}",
                    blob_path.display(),
                    e
                )))
            }
        };
        if size == 0 {
            discard_staged(&blob_path);
            return Ok(None);
        }

        let Some(blob_id) = resolution.new_blob_id() else {
            discard_staged(&blob_path);
            return Ok(None);
        };

        let digested_blob_path = self.blobs_dir.join(blob_id);
        // Identical content built by two layers shares a digest; the
        // published copy is kept and the new one dropped.
        if digested_blob_path.exists() {
            tracing::warn!(
                blob = %digested_blob_path.display(),
                layer = %layer_dir.display(),
                "Same blob generated again"
            );
            discard_staged(&blob_path);
            return Ok(None);
        }

        std::fs::rename(&blob_path, &digested_blob_path).map_err(|e| {
            BuildError::PublishError(format!(
                "failed to rename {} → {}: {}",
                blob_path.display(),
                digested_blob_path.display(),
                e
            ))
        })?;

        tracing::info!(
            blob = %digested_blob_path.display(),
            size_bytes = size,
            layer = %layer_dir.display(),
            "Published blob"
        );

        Ok(Some(digested_blob_path))
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn blobs_dir(&self) -> &Path {
        &self.blobs_dir
    }

    /// JSON storage backend description, `{"dir": "<blobs_dir>"}`.
    pub fn backend_config(&self) -> &str {
        &self.backend_config
    }

    pub fn bootstrap_path(&self) -> Option<&Path> {
        self.bootstrap_path.as_deref()
    }

    /// Bootstrap the next `build` call will use as its parent.
    pub fn parent_bootstrap_path(&self) -> Option<&Path> {
        self.parent_bootstrap_path.as_deref()
    }

    pub fn last_blob_id(&self) -> Option<&str> {
        self.last_blob_id.as_deref()
    }

    /// Builder version recorded from the last report, for troubleshooting.
    pub fn builder_version(&self) -> Option<&str> {
        self.builder_version.as_deref()
    }
}

/// Remove a staged blob that will not be published.
fn discard_staged(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove staged blob"
            );
        }
    }
}
