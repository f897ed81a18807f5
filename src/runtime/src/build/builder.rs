//! Builder invocation contract.
//!
//! The conversion of a layer directory into a bootstrap and blob is done by
//! an external `nydus-image` compatible executable. The workflow only sees
//! the [`BlobBuilder`] trait, so tests and in-process builders can stand in
//! for the subprocess.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use layerforge_core::config::{FsVersion, WhiteoutSpec};
use layerforge_core::error::{BuildError, Result};

/// Number of trailing stderr lines carried in a failure message.
const STDERR_TAIL_LINES: usize = 10;

/// Descriptor for a single layer build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderOption {
    /// Bootstrap of the layer below, `None` for the base layer
    pub parent_bootstrap_path: Option<PathBuf>,
    /// Where the builder writes this layer's bootstrap
    pub bootstrap_path: PathBuf,
    /// Layer content directory
    pub rootfs_path: PathBuf,
    /// Newline separated prefetch patterns
    pub prefetch_patterns: String,
    pub whiteout_spec: WhiteoutSpec,
    /// Where the builder writes its JSON report
    pub output_json_path: PathBuf,
    /// Staging path for the blob, renamed to its digest afterwards
    pub blob_path: PathBuf,
    pub aligned_chunk: bool,
    pub chunk_dict: Option<String>,
    pub fs_version: FsVersion,
    /// JSON storage backend description, `{"dir": "<blobs_dir>"}`.
    /// `nydus-image create` places the blob via `--blob`, so the subprocess
    /// builder does not forward it.
    pub backend_config: String,
}

/// Something that can turn one layer into a bootstrap, a blob and a report.
///
/// Implementations must leave the bootstrap at `bootstrap_path`, the report at
/// `output_json_path` and optionally the blob at `blob_path` when returning
/// `Ok`. Partial success is not interpreted by the caller.
pub trait BlobBuilder: Send {
    fn run(&self, option: &BuilderOption) -> Result<()>;
}

/// Runs `nydus-image create` as a child process.
#[derive(Debug, Clone)]
pub struct NydusImageBuilder {
    binary_path: PathBuf,
}

impl NydusImageBuilder {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Command line arguments for one `create` invocation.
    pub fn args(option: &BuilderOption) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "create".into(),
            "--log-level".into(),
            "warn".into(),
            "--prefetch-policy".into(),
            "fs".into(),
            "--blob".into(),
            option.blob_path.clone().into(),
            "--bootstrap".into(),
            option.bootstrap_path.clone().into(),
            "--whiteout-spec".into(),
            option.whiteout_spec.to_string().into(),
            "--output-json".into(),
            option.output_json_path.clone().into(),
            "--fs-version".into(),
            option.fs_version.to_string().into(),
        ];

        if let Some(dict) = &option.chunk_dict {
            args.push("--chunk-dict".into());
            args.push(dict.into());
        }
        if let Some(parent) = &option.parent_bootstrap_path {
            args.push("--parent-bootstrap".into());
            args.push(parent.clone().into());
        }
        if option.aligned_chunk {
            args.push("--aligned-chunk".into());
        }

        args.push(option.rootfs_path.clone().into());
        args
    }
}

impl BlobBuilder for NydusImageBuilder {
    fn run(&self, option: &BuilderOption) -> Result<()> {
        let args = Self::args(option);
        tracing::debug!(
            builder = %self.binary_path.display(),
            args = ?args,
            "Running builder"
        );

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BuildError::BuilderError(format!(
                    "failed to spawn {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        // Prefetch patterns are written from another thread while stdout and
        // stderr are drained here, so a builder that logs before reading
        // stdin never stalls on a full pipe.
        let stdin = child.stdin.take();
        let patterns = option.prefetch_patterns.as_bytes();
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                // Dropping the handle at the end closes the pipe.
                Some(mut stdin) => stdin.write_all(patterns),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        let output = output.map_err(|e| {
            BuildError::BuilderError(format!(
                "failed to wait for {}: {}",
                self.binary_path.display(),
                e
            ))
        })?;

        match written {
            Ok(Ok(())) => {}
            // The builder may exit without reading stdin at all.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => {
                return Err(BuildError::BuilderError(format!(
                    "failed to write prefetch patterns to {}: {}",
                    self.binary_path.display(),
                    e
                )))
            }
            Err(_) => {
                return Err(BuildError::BuilderError(format!(
                    "prefetch pattern writer for {} panicked",
                    self.binary_path.display()
                )))
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            tracing::debug!(builder = %self.binary_path.display(), "{}", line);
        }

        if !output.status.success() {
            return Err(BuildError::BuilderError(format!(
                "{} exited with {}: {}",
                self.binary_path.display(),
                output.status,
                stderr_tail(&stderr)
            )));
        }

        Ok(())
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option() -> BuilderOption {
        BuilderOption {
            parent_bootstrap_path: None,
            bootstrap_path: PathBuf::from("/out/bootstraps/0-bootstrap"),
            rootfs_path: PathBuf::from("/layers/0"),
            prefetch_patterns: String::new(),
            whiteout_spec: WhiteoutSpec::Oci,
            output_json_path: PathBuf::from("/out/bootstraps/0-bootstrap-output.json"),
            blob_path: PathBuf::from("/out/blobs/staging"),
            aligned_chunk: false,
            chunk_dict: None,
            fs_version: FsVersion::V5,
            backend_config: r#"{"dir":"/out/blobs"}"#.to_string(),
        }
    }

    fn as_strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_args_base_layer() {
        let args = as_strings(NydusImageBuilder::args(&option()));
        assert_eq!(
            args,
            vec![
                "create",
                "--log-level",
                "warn",
                "--prefetch-policy",
                "fs",
                "--blob",
                "/out/blobs/staging",
                "--bootstrap",
                "/out/bootstraps/0-bootstrap",
                "--whiteout-spec",
                "oci",
                "--output-json",
                "/out/bootstraps/0-bootstrap-output.json",
                "--fs-version",
                "5",
                "/layers/0",
            ]
        );
    }

    #[test]
    fn test_args_with_parent_dict_and_alignment() {
        let mut opt = option();
        opt.parent_bootstrap_path = Some(PathBuf::from("/out/bootstraps/0-bootstrap"));
        opt.bootstrap_path = PathBuf::from("/out/bootstraps/1-bootstrap");
        opt.chunk_dict = Some("bootstrap=/dict".to_string());
        opt.aligned_chunk = true;
        opt.whiteout_spec = WhiteoutSpec::Overlayfs;
        opt.fs_version = FsVersion::V6;

        let args = as_strings(NydusImageBuilder::args(&opt));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert_eq!(args[pos("--parent-bootstrap") + 1], "/out/bootstraps/0-bootstrap");
        assert_eq!(args[pos("--chunk-dict") + 1], "bootstrap=/dict");
        assert_eq!(args[pos("--whiteout-spec") + 1], "overlayfs");
        assert_eq!(args[pos("--fs-version") + 1], "6");
        assert!(args.contains(&"--aligned-chunk".to_string()));
        // Layer directory is always the trailing positional argument
        assert_eq!(args.last().unwrap(), "/layers/0");
    }

    #[test]
    fn test_spawn_failure_names_binary() {
        let builder = NydusImageBuilder::new("/nonexistent/nydus-image");
        let err = builder.run(&option()).unwrap_err();
        assert!(matches!(err, BuildError::BuilderError(_)));
        assert!(err.to_string().contains("/nonexistent/nydus-image"));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..15).map(|i| format!("line {}\n\n", i)).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 5"));
        assert!(tail.ends_with("line 14"));
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
    }
}
