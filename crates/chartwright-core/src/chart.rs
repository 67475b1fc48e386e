//! Chart metadata and the generated `Chart.yaml`

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Chart API version written to `Chart.yaml`
pub const CHART_API_VERSION: &str = "v1";

/// Template engine declared in `Chart.yaml`
pub const CHART_ENGINE: &str = "gotpl";

/// Metadata describing the chart to release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    /// Chart name (required)
    pub name: String,

    /// Chart version (required, SemVer)
    pub version: Version,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub home: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    /// Default values shipped as `values.yaml`
    #[serde(default)]
    pub values: serde_yaml::Mapping,
}

/// Chart maintainer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ChartMeta {
    /// Minimal metadata with just a name and a version
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            description: None,
            app_version: None,
            home: None,
            icon: None,
            sources: Vec::new(),
            keywords: Vec::new(),
            maintainers: Vec::new(),
            values: serde_yaml::Mapping::new(),
        }
    }

    /// Parse the version from a string
    pub fn parse(name: impl Into<String>, version: &str) -> Result<Self> {
        Ok(Self::new(name, Version::parse(version)?))
    }

    /// Check the name is usable as an archive and reference component
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                message: "chart name must not be empty".to_string(),
            });
        }
        if self
            .name
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        {
            return Err(CoreError::InvalidChart {
                message: format!(
                    "chart name '{}' may only contain ASCII letters, digits, '-', '_' and '.'",
                    self.name
                ),
            });
        }
        Ok(())
    }

    /// Whether the version is a development snapshot (`1.2.0-SNAPSHOT`)
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        is_snapshot_version(&self.version)
    }

    /// Archive file name: `<name>-<version>.tgz`
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.name, self.version)
    }

    /// Build the `Chart.yaml` document
    #[must_use]
    pub fn chart_file(&self) -> ChartFile {
        ChartFile {
            api_version: CHART_API_VERSION.to_string(),
            name: self.name.clone(),
            version: self.version.to_string(),
            description: self.description.clone(),
            app_version: self.app_version.clone(),
            home: self.home.clone(),
            icon: self.icon.clone(),
            sources: self.sources.clone(),
            keywords: self.keywords.clone(),
            maintainers: self.maintainers.clone(),
            engine: CHART_ENGINE.to_string(),
        }
    }
}

/// Check whether a version is a snapshot (pre-release ending in `SNAPSHOT`)
#[must_use]
pub fn is_snapshot_version(version: &Version) -> bool {
    version
        .pre
        .as_str()
        .to_ascii_uppercase()
        .ends_with("SNAPSHOT")
}

/// Serialized form of `Chart.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartFile {
    pub api_version: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,
    pub engine: String,
}

impl ChartFile {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// JSON form, used as the OCI config blob
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
