//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use chartwright_core::CoreError;
use chartwright_repo::{ReleaseError, RepoError};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Project configuration or generated manifests are unusable
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartwright::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// One or more repositories did not receive the chart
    #[error("{message}")]
    #[diagnostic(code(chartwright::cli::upload))]
    Upload {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartwright::cli::io))]
    Io { message: String },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(chartwright::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(chartwright::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Upload { .. } => exit_codes::UPLOAD_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Render an error and its causes on one line
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause = cause.to_string();
        if !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
        source = source.and_then(|s| s.source());
    }
    message
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let help = match &err {
            CoreError::ManifestDirectory { .. } | CoreError::NoManifests { .. } => {
                Some("Generate the platform manifests before packaging".to_string())
            }
            _ => None,
        };
        let message = error_chain(&err);
        if err.is_configuration() {
            CliError::Config { message, help }
        } else {
            CliError::Io { message }
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Chart(core) => core.into(),
            RepoError::Io(io) => io.into(),
            other => CliError::config(error_chain(&other)),
        }
    }
}

impl From<ReleaseError> for CliError {
    fn from(err: ReleaseError) -> Self {
        match err {
            ReleaseError::Configuration(core) => core.into(),
            ReleaseError::NoRepositories { .. } => CliError::config_with_help(
                err.to_string(),
                "Add a repository to chartwright.yaml or check its channel",
            ),
            ReleaseError::Archive { .. } => CliError::Io {
                message: error_chain(&err),
            },
            ReleaseError::Upload(failure) => CliError::Upload {
                message: failure.to_string(),
                help: Some("Check repository URLs and credentials".to_string()),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
