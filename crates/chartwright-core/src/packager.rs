//! Packaging generated manifests into a chart
//!
//! The packager looks for the manifests the resource generation step wrote
//! under `<base>/META-INF/jkube/<platform>` and bundles them as the chart's
//! templates. A missing directory is a configuration problem: it is reported
//! immediately, with the filesystem error kept as the cause, and never retried.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::archive::{ChartArtifact, build_archive};
use crate::chart::ChartMeta;
use crate::error::{CoreError, Result};
use crate::platform::Platform;

/// Extensions recognized as manifests
pub const MANIFEST_EXTENSIONS: [&str; 3] = ["yml", "yaml", "json"];

/// A manifest file read from the generated output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// Path relative to the manifest directory
    pub relative_path: PathBuf,
    pub content: Vec<u8>,
}

/// Access to generated manifests
///
/// Implementations must fail with the underlying `io::Error` when `dir` is
/// missing or not a directory.
pub trait ManifestSource: Send + Sync {
    fn collect(&self, dir: &Path) -> io::Result<Vec<ManifestFile>>;
}

/// Reads manifests from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskManifests;

impl ManifestSource for DiskManifests {
    fn collect(&self, dir: &Path) -> io::Result<Vec<ManifestFile>> {
        let metadata = std::fs::metadata(dir)?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", dir.display()),
            ));
        }

        let mut manifests = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() || !is_manifest(entry.path()) {
                continue;
            }

            let relative_path = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
                .to_path_buf();
            manifests.push(ManifestFile {
                relative_path,
                content: std::fs::read(entry.path())?,
            });
        }

        Ok(manifests)
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MANIFEST_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Builds chart artifacts from generated manifests
#[derive(Clone)]
pub struct ChartPackager {
    source: Arc<dyn ManifestSource>,
}

impl Default for ChartPackager {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartPackager {
    /// Packager reading from the local filesystem
    pub fn new() -> Self {
        Self::with_source(Arc::new(DiskManifests))
    }

    /// Packager reading through a custom manifest source
    pub fn with_source(source: Arc<dyn ManifestSource>) -> Self {
        Self { source }
    }

    /// Package the manifests generated for `platform` under `base_output_dir`
    pub fn package(
        &self,
        platform: Platform,
        base_output_dir: &Path,
        meta: &ChartMeta,
    ) -> Result<ChartArtifact> {
        meta.validate()?;

        let location = platform.manifest_location(base_output_dir);
        let dir = location.path();
        tracing::debug!(platform = %platform, dir = %dir.display(), "collecting manifests");

        let manifests = self
            .source
            .collect(dir)
            .map_err(|source| CoreError::ManifestDirectory {
                path: dir.to_path_buf(),
                source,
            })?;

        if manifests.is_empty() {
            return Err(CoreError::NoManifests {
                path: dir.to_path_buf(),
            });
        }

        let artifact = build_archive(meta, dir, &manifests)?;
        tracing::info!(
            chart = %meta.name,
            version = %meta.version,
            templates = manifests.len(),
            digest = %artifact.digest(),
            "packaged chart"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn demo_meta() -> ChartMeta {
        ChartMeta::parse("demo", "1.0.0").unwrap()
    }

    fn write_manifests(base: &Path, platform: Platform) {
        let dir = platform.manifest_location(base).path().to_path_buf();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("demo-service.yml"), "kind: Service\n").unwrap();
        std::fs::write(dir.join("demo-deployment.yml"), "kind: Deployment\n").unwrap();
        std::fs::write(dir.join("nested").join("route.json"), "{}").unwrap();
        std::fs::write(dir.join("README.md"), "not a manifest").unwrap();
    }

    #[test]
    fn test_missing_manifest_directory() {
        let temp = TempDir::new().unwrap();

        let err = ChartPackager::new()
            .package(Platform::OpenShift, temp.path(), &demo_meta())
            .unwrap_err();

        let message = err.to_string();
        let expected = Path::new("META-INF").join("jkube").join("openshift");
        assert!(
            message.contains(&expected.display().to_string()),
            "unexpected message: {message}"
        );
        assert!(err.is_configuration());

        let cause = err
            .source()
            .and_then(|s| s.downcast_ref::<io::Error>())
            .expect("io error cause");
        assert_eq!(cause.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_manifest_path_is_a_file() {
        let temp = TempDir::new().unwrap();
        let jkube = temp.path().join("META-INF").join("jkube");
        std::fs::create_dir_all(&jkube).unwrap();
        std::fs::write(jkube.join("kubernetes"), "oops").unwrap();

        let err = ChartPackager::new()
            .package(Platform::Kubernetes, temp.path(), &demo_meta())
            .unwrap_err();

        assert!(matches!(err, CoreError::ManifestDirectory { .. }));
    }

    #[test]
    fn test_empty_manifest_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(Platform::Kubernetes.manifest_location(temp.path()).path())
            .unwrap();

        let err = ChartPackager::new()
            .package(Platform::Kubernetes, temp.path(), &demo_meta())
            .unwrap_err();

        assert!(matches!(err, CoreError::NoManifests { .. }));
    }

    #[test]
    fn test_package_collects_manifests() {
        let temp = TempDir::new().unwrap();
        write_manifests(temp.path(), Platform::OpenShift);
        // Manifests for the other platform are ignored
        write_manifests(temp.path(), Platform::Kubernetes);

        let artifact = ChartPackager::new()
            .package(Platform::OpenShift, temp.path(), &demo_meta())
            .unwrap();

        assert_eq!(artifact.name(), "demo");
        assert_eq!(artifact.version().to_string(), "1.0.0");
        assert!(artifact.source_dir().ends_with("META-INF/jkube/openshift"));
        assert_eq!(
            artifact.templates(),
            &[
                "demo-deployment.yml",
                "demo-service.yml",
                "nested/route.json"
            ]
        );
        assert!(artifact.size() > 0);
    }

    #[test]
    fn test_invalid_chart_name_is_rejected_before_reading() {
        let temp = TempDir::new().unwrap();
        let meta = ChartMeta::parse("bad name", "1.0.0").unwrap();

        let err = ChartPackager::new()
            .package(Platform::OpenShift, temp.path(), &meta)
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidChart { .. }));
    }

    struct RecordingSource {
        requested: Mutex<Vec<PathBuf>>,
    }

    impl ManifestSource for RecordingSource {
        fn collect(&self, dir: &Path) -> io::Result<Vec<ManifestFile>> {
            self.requested.lock().unwrap().push(dir.to_path_buf());
            Ok(vec![ManifestFile {
                relative_path: PathBuf::from("cm.yml"),
                content: b"kind: ConfigMap\n".to_vec(),
            }])
        }
    }

    #[test]
    fn test_custom_manifest_source() {
        let source = Arc::new(RecordingSource {
            requested: Mutex::new(Vec::new()),
        });
        let packager = ChartPackager::with_source(source.clone());

        let artifact = packager
            .package(Platform::Kubernetes, Path::new("/build"), &demo_meta())
            .unwrap();

        assert_eq!(artifact.templates(), &["cm.yml"]);
        assert_eq!(
            source.requested.lock().unwrap().as_slice(),
            &[PathBuf::from("/build/META-INF/jkube/kubernetes")]
        );
    }
}
