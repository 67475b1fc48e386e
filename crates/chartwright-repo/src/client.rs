//! Remote chart clients
//!
//! A [`ChartClient`] pushes one packaged chart to one endpoint. Clients are
//! built by a [`ClientFactory`], which is the seam tests use to substitute
//! fakes for real network clients.

use async_trait::async_trait;
use chartwright_core::ChartArtifact;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Repository, RepositoryKind};
use crate::credentials::ResolvedCredentials;
use crate::error::Result;
use crate::http::HttpChartClient;
use crate::oci::OciChartClient;

/// Pushes chart archives to a remote repository
#[async_trait]
pub trait ChartClient: Send + Sync {
    /// Push the artifact, returning where it was stored
    async fn push(&self, artifact: &ChartArtifact) -> Result<String>;
}

/// Builds clients for repositories
///
/// Invoked lazily, possibly more than once for the same repository when
/// uploads race, so implementations should avoid side effects.
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        repo: &Repository,
        credentials: Option<ResolvedCredentials>,
    ) -> Result<Arc<dyn ChartClient>>;
}

/// Factory producing the HTTP and OCI clients
#[derive(Debug, Clone)]
pub struct DefaultClientFactory {
    timeout: Duration,
}

impl DefaultClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for DefaultClientFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ClientFactory for DefaultClientFactory {
    fn create(
        &self,
        repo: &Repository,
        credentials: Option<ResolvedCredentials>,
    ) -> Result<Arc<dyn ChartClient>> {
        tracing::debug!(repository = %repo.name, url = %repo.url, "creating chart client");
        match repo.kind()? {
            RepositoryKind::Oci => Ok(Arc::new(OciChartClient::new(
                repo.clone(),
                credentials,
                self.timeout,
            )?)),
            kind => Ok(Arc::new(HttpChartClient::new(
                repo.clone(),
                kind,
                credentials,
                self.timeout,
            )?)),
        }
    }
}
