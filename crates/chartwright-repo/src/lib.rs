//! Chartwright Repository Uploads
//!
//! This crate publishes packaged charts, including:
//!
//! - **HTTP repositories**: ChartMuseum (`POST`), Artifactory and Nexus (`PUT`)
//! - **OCI registries**: Helm-compatible pushes to GHCR, Harbor, ECR, etc.
//! - **Release pipeline**: package once, upload everywhere concurrently
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartwright_repo::{ReleaseConfig, ReleasePipeline, ReleaseRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReleaseConfig::load_from("chartwright.yaml".as_ref())?;
//! let pipeline = ReleasePipeline::new().with_max_concurrent(config.upload.max_concurrent);
//!
//! let report = pipeline
//!     .release(&ReleaseRequest::from_config(&config), &CancellationToken::new())
//!     .await?;
//! for outcome in &report.outcomes {
//!     println!("{}", outcome);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Redirects are never followed, so credentials stay with the configured host
//! - Credentials files are written with mode 0600 on Unix

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod oci;
pub mod pipeline;
pub mod upload;

// Re-exports for convenience
pub use client::{ChartClient, ClientFactory, DefaultClientFactory};
pub use config::{
    CONFIG_FILE_NAME, Channel, ReleaseConfig, Repository, RepositoryKind, UploadSettings,
};
pub use credentials::{CredentialStore, Credentials, DockerConfig, ResolvedCredentials};
pub use error::{BadUpload, RepoError, Result};
pub use http::HttpChartClient;
pub use oci::OciChartClient;
pub use pipeline::{
    AggregateFailure, ReleaseError, ReleasePipeline, ReleaseReport, ReleaseRequest, ReleaseStatus,
};
pub use upload::{RepositoryUploader, UploadOutcome, UploadStatus};
