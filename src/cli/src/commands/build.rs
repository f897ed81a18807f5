//! `layerforge build` command — Build image layers into bootstraps and blobs.
//!
//! Layers are built in the order given, each on top of the previous one.
//! Bootstraps land in `<target>/bootstraps/<index>-bootstrap`, blobs in
//! `<target>/blobs/<digest>`. A JSON summary is printed on success.

use std::path::PathBuf;

use clap::Args;
use layerforge_core::{FsVersion, WhiteoutSpec, WorkflowConfig};
use layerforge_runtime::Workflow;
use serde::Serialize;

#[derive(Args)]
pub struct BuildArgs {
    /// Layer directories, bottom-most layer first
    #[arg(required = true)]
    pub layers: Vec<PathBuf>,

    /// Output directory for bootstraps and blobs
    #[arg(short = 't', long = "target-dir")]
    pub target_dir: Option<PathBuf>,

    /// Workflow configuration file (YAML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Path to the nydus-image builder executable
    #[arg(long = "builder")]
    pub builder: Option<PathBuf>,

    /// Chunk dictionary reference (e.g., "bootstrap=/path/to/dict")
    #[arg(long = "chunk-dict")]
    pub chunk_dict: Option<String>,

    /// Newline separated prefetch patterns
    #[arg(long = "prefetch-patterns")]
    pub prefetch_patterns: Option<String>,

    /// Image format version (5 or 6)
    #[arg(long = "fs-version")]
    pub fs_version: Option<FsVersion>,

    /// Whiteout convention of the layers (oci, overlayfs, none)
    #[arg(long = "whiteout-spec", default_value = "oci")]
    pub whiteout_spec: WhiteoutSpec,

    /// Align uncompressed chunks to 4K
    #[arg(long = "aligned-chunk")]
    pub aligned_chunk: bool,

    /// Bootstrap the bottom-most layer is built on
    #[arg(long = "parent-bootstrap")]
    pub parent_bootstrap: Option<PathBuf>,
}

/// Result of one layer build, as printed in the summary.
#[derive(Debug, Serialize)]
struct LayerOutput {
    layer: PathBuf,
    bootstrap: PathBuf,
    blob: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct BuildSummary {
    builder_version: Option<String>,
    blobs_dir: PathBuf,
    layers: Vec<LayerOutput>,
}

pub fn execute(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;
    let mut workflow = Workflow::new(config)?;

    let bootstraps_dir = workflow.config().target_dir.join("bootstraps");
    std::fs::create_dir_all(&bootstraps_dir).map_err(|e| {
        format!(
            "Failed to create bootstrap directory {}: {}",
            bootstraps_dir.display(),
            e
        )
    })?;

    let mut outputs = Vec::with_capacity(args.layers.len());
    for (index, layer) in args.layers.iter().enumerate() {
        if !layer.is_dir() {
            return Err(format!("Layer '{}' is not a directory", layer.display()).into());
        }

        let bootstrap = bootstraps_dir.join(format!("{index}-bootstrap"));
        let parent = if index == 0 {
            args.parent_bootstrap.as_deref()
        } else {
            None
        };

        let blob = workflow.build(
            layer,
            args.whiteout_spec,
            parent,
            &bootstrap,
            args.aligned_chunk,
        )?;

        tracing::info!(
            index,
            layer = %layer.display(),
            blob = ?blob,
            "Layer done"
        );

        outputs.push(LayerOutput {
            layer: layer.clone(),
            bootstrap,
            blob,
        });
    }

    let summary = BuildSummary {
        builder_version: workflow.builder_version().map(str::to_string),
        blobs_dir: workflow.blobs_dir().to_path_buf(),
        layers: outputs,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Merge the config file (if any) with command-line overrides.
fn resolve_config(args: &BuildArgs) -> Result<WorkflowConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => WorkflowConfig::from_file(path)?,
        None => {
            if args.target_dir.is_none() {
                return Err("either --target-dir or --config must be given".into());
            }
            WorkflowConfig::default()
        }
    };

    if let Some(target_dir) = &args.target_dir {
        config.target_dir = target_dir.clone();
    }
    if let Some(builder) = &args.builder {
        config.builder_path = builder.clone();
    }
    if let Some(chunk_dict) = &args.chunk_dict {
        config.chunk_dict = Some(chunk_dict.clone());
    }
    if let Some(patterns) = &args.prefetch_patterns {
        config.prefetch_patterns = patterns.clone();
    }
    if let Some(fs_version) = args.fs_version {
        config.fs_version = fs_version;
    }

    config.validate()?;
    Ok(config)
}
