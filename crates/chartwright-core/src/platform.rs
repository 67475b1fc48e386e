//! Target platforms and where their generated manifests live

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::CoreError;
use crate::strategy::BuildStrategy;

/// Directory, relative to the build output, holding generated manifests
pub const MANIFEST_ROOT: [&str; 2] = ["META-INF", "jkube"];

/// Deployment target platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Kubernetes,
    #[serde(alias = "openShift")]
    OpenShift,
}

impl Platform {
    /// Path segment used for this platform's manifest directory
    #[must_use]
    pub const fn discriminator(self) -> &'static str {
        match self {
            Platform::Kubernetes => "kubernetes",
            Platform::OpenShift => "openshift",
        }
    }

    /// Strategy used when neither configuration nor the cluster says otherwise
    #[must_use]
    pub const fn default_strategy(self) -> BuildStrategy {
        match self {
            Platform::Kubernetes => BuildStrategy::Docker,
            Platform::OpenShift => BuildStrategy::S2i,
        }
    }

    /// Pick the build strategy for this platform
    ///
    /// An explicitly configured strategy wins, then the cluster's source type
    /// hint, then the platform default.
    #[must_use]
    pub fn resolve_strategy(
        self,
        configured: Option<BuildStrategy>,
        source_type: Option<&str>,
    ) -> BuildStrategy {
        configured
            .or_else(|| BuildStrategy::from_source_type(source_type))
            .unwrap_or_else(|| self.default_strategy())
    }

    /// Location of the generated manifests under `base_output_dir`
    #[must_use]
    pub fn manifest_location(self, base_output_dir: &Path) -> ManifestLocation {
        ManifestLocation::new(base_output_dir, self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kubernetes" | "k8s" => Ok(Platform::Kubernetes),
            "openshift" => Ok(Platform::OpenShift),
            _ => Err(CoreError::UnknownPlatform {
                name: s.to_string(),
            }),
        }
    }
}

/// `<base>/META-INF/jkube/<platform>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    platform: Platform,
    path: PathBuf,
}

impl ManifestLocation {
    pub fn new(base_output_dir: &Path, platform: Platform) -> Self {
        let mut path = base_output_dir.to_path_buf();
        path.extend(MANIFEST_ROOT);
        path.push(platform.discriminator());
        Self { platform, path }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
