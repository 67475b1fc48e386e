//! Release configuration
//!
//! A project describes its chart and target repositories in `chartwright.yaml`:
//!
//! ```yaml
//! chart:
//!   name: random-generator
//!   version: 0.1.0-SNAPSHOT
//! platform: openshift
//! outputDir: target/classes
//! repositories:
//!   - name: snapshots
//!     url: https://nexus.example.com/repository/helm-snapshots
//!     kind: nexus
//!     channel: snapshot
//!   - name: ghcr
//!     url: oci://ghcr.io/example/charts
//! ```

use chartwright_core::{BuildStrategy, ChartMeta, Platform, is_snapshot_version};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RepoError, Result};

/// Default name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "chartwright.yaml";

/// Project release configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseConfig {
    /// Chart to package
    pub chart: ChartMeta,

    /// Target platform
    #[serde(default)]
    pub platform: Platform,

    /// Explicit build strategy (otherwise derived from the platform)
    #[serde(default)]
    pub build_strategy: Option<BuildStrategy>,

    /// Build source type reported by the cluster (`Source`, `Docker`)
    #[serde(default)]
    pub source_type: Option<String>,

    /// Build output directory containing `META-INF/jkube`
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Where to keep a copy of the packaged archive
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,

    /// Target repositories
    #[serde(default)]
    pub repositories: Vec<Repository>,

    #[serde(default)]
    pub upload: UploadSettings,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl ReleaseConfig {
    /// Create a configuration for a chart with defaults everywhere else
    pub fn new(chart: ChartMeta) -> Self {
        Self {
            chart,
            platform: Platform::default(),
            build_strategy: None,
            source_type: None,
            output_dir: default_output_dir(),
            archive_dir: None,
            repositories: Vec::new(),
            upload: UploadSettings::default(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Relative directories are resolved against the file's parent directory.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;

        if let Some(base) = path.parent() {
            if config.output_dir.is_relative() {
                config.output_dir = base.join(&config.output_dir);
            }
            if let Some(dir) = config.archive_dir.as_mut() {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check repositories are well formed and uniquely named
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for repo in &self.repositories {
            if !seen.insert(repo.name.as_str()) {
                return Err(RepoError::RepositoryAlreadyExists {
                    name: repo.name.clone(),
                });
            }
            repo.validate()?;
        }
        if self.upload.max_concurrent == 0 {
            return Err(RepoError::InvalidConfig {
                message: "upload.maxConcurrent must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get a repository by name
    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Repositories that accept the given chart version
    ///
    /// Snapshot versions go to `any` and `snapshot` repositories, everything
    /// else to `any` and `stable` ones.
    pub fn repositories_for(&self, version: &semver::Version) -> Vec<Repository> {
        let snapshot = is_snapshot_version(version);
        self.repositories
            .iter()
            .filter(|r| r.channel.accepts(snapshot))
            .cloned()
            .collect()
    }

    /// Build strategy for the configured platform
    pub fn strategy(&self) -> BuildStrategy {
        self.platform
            .resolve_strategy(self.build_strategy, self.source_type.as_deref())
    }
}

/// Upload tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    /// Maximum number of repositories uploaded to at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            timeout: default_timeout(),
        }
    }
}

/// Repository definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Unique name for this repository
    pub name: String,

    /// Upload URL (HTTP(S) or `oci://`)
    pub url: String,

    /// Repository kind (auto-detected from the URL if not specified)
    #[serde(default)]
    pub kind: Option<RepositoryKind>,

    /// Which chart versions this repository receives
    #[serde(default)]
    pub channel: Channel,

    /// Skip TLS verification (insecure, not recommended)
    #[serde(default)]
    pub insecure_skip_tls: bool,

    /// Talk plain HTTP to an OCI registry (local registries such as `localhost:5000`)
    #[serde(default)]
    pub plain_http: bool,

    /// Credential reference name (stored separately)
    #[serde(default)]
    pub credential_ref: Option<String>,
}

impl Repository {
    /// Create a new repository, detecting its kind from the URL
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let kind = RepositoryKind::detect(&url)?;

        Ok(Self {
            name: name.into(),
            url,
            kind: Some(kind),
            channel: Channel::Any,
            insecure_skip_tls: false,
            plain_http: false,
            credential_ref: None,
        })
    }

    /// Override the detected kind
    #[must_use]
    pub fn with_kind(mut self, kind: RepositoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub fn with_plain_http(mut self, plain_http: bool) -> Self {
        self.plain_http = plain_http;
        self
    }

    /// Configured kind, or the one implied by the URL
    pub fn kind(&self) -> Result<RepositoryKind> {
        match self.kind {
            Some(kind) => Ok(kind),
            None => RepositoryKind::detect(&self.url),
        }
    }

    /// Check that the URL scheme matches the repository kind
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RepoError::InvalidConfig {
                message: format!("repository with URL {} has no name", self.url),
            });
        }

        let kind = self.kind()?;
        let is_http = self.url.starts_with("http://") || self.url.starts_with("https://");
        let valid = match kind {
            RepositoryKind::Oci => self.url.starts_with("oci://"),
            _ => is_http,
        };
        if !valid {
            return Err(RepoError::InvalidRepositoryUrl {
                url: self.url.clone(),
                reason: format!("not a valid URL for a {} repository", kind),
            });
        }
        Ok(())
    }

    /// Name used to look up credentials
    pub fn credential_key(&self) -> &str {
        self.credential_ref.as_deref().unwrap_or(&self.name)
    }
}

/// Repository kind, deciding the upload protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// ChartMuseum API: `POST` the archive to the URL
    ChartMuseum,
    /// Artifactory Helm repository: `PUT <url>/<archive>`
    Artifactory,
    /// Nexus Helm hosted repository: `PUT <url>/<archive>`
    Nexus,
    /// OCI-compliant registry
    Oci,
}

impl RepositoryKind {
    /// Auto-detect repository kind from URL
    pub fn detect(url: &str) -> Result<Self> {
        if url.starts_with("oci://") {
            Ok(RepositoryKind::Oci)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Ok(RepositoryKind::ChartMuseum)
        } else {
            Err(RepoError::InvalidRepositoryUrl {
                url: url.to_string(),
                reason: "URL must start with http://, https:// or oci://".to_string(),
            })
        }
    }
}

impl std::fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RepositoryKind::ChartMuseum => "chartmuseum",
            RepositoryKind::Artifactory => "artifactory",
            RepositoryKind::Nexus => "nexus",
            RepositoryKind::Oci => "oci",
        };
        f.write_str(name)
    }
}

/// Versions a repository receives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Any,
    Stable,
    Snapshot,
}

impl Channel {
    pub fn accepts(self, snapshot: bool) -> bool {
        match self {
            Channel::Any => true,
            Channel::Stable => !snapshot,
            Channel::Snapshot => snapshot,
        }
    }
}
