//! Build report left by the builder after each invocation.

use std::path::{Component, Path, PathBuf};

use layerforge_core::error::{BuildError, Result};
use serde::{Deserialize, Serialize};

/// JSON report written by the builder (`--output-json`).
///
/// `blobs` is cumulative for the whole image, most recent last. Fields the
/// builder adds beyond these two are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildReport {
    /// Builder version string
    pub version: String,
    /// Blob identifiers produced so far for the image
    pub blobs: Vec<String>,
}

impl BuildReport {
    /// Load and decode a report file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| BuildError::ReportUnavailable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let report: Self =
            serde_json::from_slice(&data).map_err(|e| BuildError::ReportMalformed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        // Blob ids become file names under the blobs directory.
        if let Some(id) = report.blobs.iter().find(|id| !is_blob_file_name(id)) {
            return Err(BuildError::ReportMalformed {
                path: path.display().to_string(),
                message: format!("invalid blob id '{}'", id),
            });
        }

        Ok(report)
    }
}

/// A single plain path component: no separators, no `.`/`..`, not empty.
fn is_blob_file_name(id: &str) -> bool {
    let mut components = Path::new(id).components();
    !id.contains('/')
        && matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
}

/// Report path for a bootstrap: `<bootstrap>-output.json`.
pub fn report_path(bootstrap_path: &Path) -> PathBuf {
    let mut path = bootstrap_path.as_os_str().to_os_string();
    path.push("-output.json");
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_report_path_appends_suffix() {
        assert_eq!(
            report_path(Path::new("/out/bootstraps/3-bootstrap")),
            PathBuf::from("/out/bootstraps/3-bootstrap-output.json")
        );
    }

    #[test]
    fn test_load_report() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        std::fs::write(&path, r#"{"version": "v2.1.0", "blobs": ["aa", "bb"]}"#).unwrap();

        let report = BuildReport::load(&path).unwrap();
        assert_eq!(report.version, "v2.1.0");
        assert_eq!(report.blobs, vec!["aa", "bb"]);
        assert_eq!(report.blobs.last().map(String::as_str), Some("bb"));
    }

    #[test]
    fn test_load_report_ignores_extra_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        std::fs::write(
            &path,
            r#"{"version": "v2", "blobs": [], "trace": {"consumed_time": {}}}"#,
        )
        .unwrap();

        let report = BuildReport::load(&path).unwrap();
        assert!(report.blobs.is_empty());
    }

    #[test]
    fn test_load_report_missing_fields_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        std::fs::write(&path, "{}").unwrap();

        assert_eq!(BuildReport::load(&path).unwrap(), BuildReport::default());
    }

    #[test]
    fn test_load_report_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = BuildReport::load(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, BuildError::ReportUnavailable { .. }));
    }

    #[test]
    fn test_load_report_rejects_path_like_blob_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");

        for id in ["", ".", "..", "../outside", "nested/blob", "/etc/passwd", "blob/"] {
            let body = serde_json::json!({"version": "v2", "blobs": ["aa", id]});
            std::fs::write(&path, body.to_string()).unwrap();

            let err = BuildReport::load(&path).unwrap_err();
            assert!(matches!(err, BuildError::ReportMalformed { .. }), "{id:?}: {err:?}");
            assert!(err.to_string().contains("invalid blob id"), "{id:?}: {err}");
        }
    }

    #[test]
    fn test_load_report_accepts_digest_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        let digest = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        std::fs::write(&path, format!(r#"{{"version": "v2", "blobs": ["{digest}"]}}"#)).unwrap();

        assert_eq!(BuildReport::load(&path).unwrap().blobs, vec![digest]);
    }

    #[test]
    fn test_load_report_malformed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        std::fs::write(&path, r#"{"version": 3, "blobs": "nope"}"#).unwrap();

        let err = BuildReport::load(&path).unwrap_err();
        assert!(matches!(err, BuildError::ReportMalformed { .. }));
        assert!(err.to_string().contains("report.json"));
    }
}
