//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Repository already exists: {name}")]
    RepositoryAlreadyExists { name: String },

    #[error("Invalid repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Unexpected redirect from {url} to {location}")]
    UnexpectedRedirect { url: String, location: String },

    // ============ Authentication Errors ============
    #[error("Authentication required for {url}")]
    AuthRequired { url: String },

    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    // ============ OCI Errors ============
    #[error("Invalid OCI reference: {reference}")]
    InvalidOciReference { reference: String },

    #[error("OCI push failed: {message}")]
    OciPushFailed { message: String },

    // ============ Packaging Errors ============
    #[error(transparent)]
    Chart(#[from] chartwright_core::CoreError),

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepoError {
    /// HTTP status carried by this error, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            RepoError::HttpError { status, .. } => Some(*status),
            RepoError::AuthRequired { .. } => Some(401),
            _ => None,
        }
    }
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout { seconds: 30 }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidRepositoryUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

/// A repository rejected the chart or could not be reached
///
/// Wraps the transport-level cause so callers never see raw client errors.
#[derive(Debug, Error)]
#[error("Failed to upload chart to repository '{repository}': {cause}")]
pub struct BadUpload {
    pub repository: String,
    #[source]
    pub cause: RepoError,
}

impl BadUpload {
    pub fn new(repository: impl Into<String>, cause: RepoError) -> Self {
        Self {
            repository: repository.into(),
            cause,
        }
    }

    /// HTTP status returned by the repository, if it answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.cause.status()
    }
}
