//! Chart archive creation
//!
//! Charts are packaged as reproducible `.tgz` archives rooted at the chart
//! name, the layout Helm expects:
//!
//! ```text
//! <name>/Chart.yaml
//! <name>/values.yaml
//! <name>/templates/...
//! ```

use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};

use crate::chart::ChartMeta;
use crate::error::{CoreError, Result};
use crate::packager::ManifestFile;

/// Media type of a packaged chart
pub const CHART_MEDIA_TYPE: &str = "application/gzip";

/// A packaged chart, ready to be uploaded
///
/// Immutable once built. The archive bytes are reference counted, so
/// concurrent uploads read the same buffer.
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    meta: ChartMeta,
    source_dir: PathBuf,
    data: Bytes,
    digest: String,
    templates: Vec<String>,
}

impl ChartArtifact {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn version(&self) -> &semver::Version {
        &self.meta.version
    }

    pub fn meta(&self) -> &ChartMeta {
        &self.meta
    }

    /// Manifest directory the templates were read from
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Archive content
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// `sha256:<hex>` digest of the archive
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Template paths relative to the chart's `templates/` directory
    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    /// `<name>-<version>.tgz`
    pub fn file_name(&self) -> String {
        self.meta.archive_name()
    }

    /// Write the archive into `dir`, returning the file path
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, &self.data)?;
        Ok(path)
    }
}

/// Build a chart archive from metadata and collected manifests
pub fn build_archive(
    meta: &ChartMeta,
    source_dir: &Path,
    manifests: &[ManifestFile],
) -> Result<ChartArtifact> {
    let chart_yaml = meta.chart_file().to_yaml()?;
    let values_yaml = if meta.values.is_empty() {
        "{}\n".to_string()
    } else {
        serde_yaml::to_string(&meta.values)?
    };

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    let root = meta.name.as_str();

    append_bytes(&mut builder, &format!("{root}/Chart.yaml"), chart_yaml.as_bytes())?;
    append_bytes(&mut builder, &format!("{root}/values.yaml"), values_yaml.as_bytes())?;

    let mut templates = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let relative = archive_path(&manifest.relative_path)?;
        append_bytes(
            &mut builder,
            &format!("{root}/templates/{relative}"),
            &manifest.content,
        )?;
        templates.push(relative);
    }

    let encoder = builder.into_inner()?;
    let data = encoder.finish()?;

    Ok(ChartArtifact {
        meta: meta.clone(),
        source_dir: source_dir.to_path_buf(),
        digest: compute_digest(&data),
        data: Bytes::from(data),
        templates,
    })
}

/// List the file paths contained in a chart archive
pub fn list_entries(data: &[u8]) -> Result<Vec<String>> {
    let mut archive = Archive::new(GzDecoder::new(data));
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        entries.push(entry.path()?.to_string_lossy().to_string());
    }
    Ok(entries)
}

/// Read one file out of a chart archive
pub fn read_entry(data: &[u8], path: &str) -> Result<Vec<u8>> {
    let mut archive = Archive::new(GzDecoder::new(data));
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_string_lossy() == path {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }
    Err(CoreError::Archive {
        message: format!("File not found in archive: {}", path),
    })
}

/// `sha256:<hex>` digest of some bytes
#[must_use]
pub fn compute_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// Turn a relative manifest path into a `/`-separated archive path
fn archive_path(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            std::path::Component::Normal(part) => parts.push(part.to_string_lossy()),
            _ => {
                return Err(CoreError::Archive {
                    message: format!("Invalid manifest path: {}", relative.display()),
                });
            }
        }
    }
    if parts.is_empty() {
        return Err(CoreError::Archive {
            message: "Empty manifest path".to_string(),
        });
    }
    Ok(parts.join("/"))
}

fn append_bytes<W: Write>(builder: &mut Builder<W>, path: &str, content: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0); // Reproducible builds: use epoch time
    header.set_cksum();

    builder.append_data(&mut header, path, content)?;
    Ok(())
}
