//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The generated manifest directory is missing or unreadable.
    ///
    /// Not retryable: the build has to run the resource generation step first.
    #[error("Generated manifest directory {} is missing or unreadable", .path.display())]
    ManifestDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No manifests found in {}", .path.display())]
    NoManifests { path: PathBuf },

    #[error("Invalid chart metadata: {message}")]
    InvalidChart { message: String },

    #[error("Unknown build strategy '{name}' (expected one of: s2i, jib, docker, buildpacks)")]
    UnknownStrategy { name: String },

    #[error("Unknown platform '{name}' (expected kubernetes or openshift)")]
    UnknownPlatform { name: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),
}

impl CoreError {
    /// Whether this error stems from missing or invalid inputs rather than a runtime fault
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::ManifestDirectory { .. }
                | CoreError::NoManifests { .. }
                | CoreError::InvalidChart { .. }
                | CoreError::UnknownStrategy { .. }
                | CoreError::UnknownPlatform { .. }
                | CoreError::InvalidVersion(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
