//! OCI registry client
//!
//! Pushes charts the way `helm push` does: the `Chart.yaml` metadata as the
//! config blob and the archive as a single content layer, tagged with the
//! chart version.

use async_trait::async_trait;
use chartwright_core::ChartArtifact;
use oci_distribution::Reference;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::secrets::RegistryAuth;
use std::time::Duration;

use crate::client::ChartClient;
use crate::config::Repository;
use crate::credentials::ResolvedCredentials;
use crate::error::{RepoError, Result};

/// Media types for Helm charts in OCI
pub mod media_types {
    /// Helm chart config
    pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
    /// Helm chart content layer
    pub const HELM_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
}

/// OCI registry client
pub struct OciChartClient {
    repo: Repository,
    client: Client,
    auth: RegistryAuth,
    timeout: Duration,
}

impl OciChartClient {
    pub fn new(
        repo: Repository,
        credentials: Option<ResolvedCredentials>,
        timeout: Duration,
    ) -> Result<Self> {
        let auth = match credentials {
            Some(ResolvedCredentials::Basic { username, password }) => {
                RegistryAuth::Basic(username, password)
            }
            // Registries exchange the token through the basic auth flow
            Some(ResolvedCredentials::Bearer { token }) => RegistryAuth::Basic(String::new(), token),
            None => RegistryAuth::Anonymous,
        };

        let protocol = if repo.plain_http {
            ClientProtocol::Http
        } else {
            ClientProtocol::Https
        };
        let config = ClientConfig {
            protocol,
            accept_invalid_certificates: repo.insecure_skip_tls,
            ..Default::default()
        };

        Ok(Self {
            repo,
            client: Client::new(config),
            auth,
            timeout,
        })
    }

    /// Reference of a chart: `<registry>/<path>/<name>:<version>`
    ///
    /// OCI tags cannot contain `+`, so build metadata is written with `_`
    /// like Helm does.
    pub fn reference_for(&self, name: &str, version: &semver::Version) -> Result<Reference> {
        let base = self
            .repo
            .url
            .trim_start_matches("oci://")
            .trim_end_matches('/');
        let tag = version.to_string().replace('+', "_");
        let full = format!("{}/{}:{}", base, name, tag);

        Reference::try_from(full.as_str()).map_err(|e| RepoError::InvalidOciReference {
            reference: format!("{}: {}", full, e),
        })
    }
}

#[async_trait]
impl ChartClient for OciChartClient {
    async fn push(&self, artifact: &ChartArtifact) -> Result<String> {
        let reference = self.reference_for(artifact.name(), artifact.version())?;

        let config = Config {
            data: artifact.meta().chart_file().to_json()?,
            media_type: media_types::HELM_CONFIG.to_string(),
            annotations: None,
        };
        let layers = vec![ImageLayer {
            data: artifact.data().to_vec(),
            media_type: media_types::HELM_CONTENT.to_string(),
            annotations: None,
        }];

        let push = self
            .client
            .push(&reference, &layers, config, &self.auth, None);
        let response = tokio::time::timeout(self.timeout, push)
            .await
            .map_err(|_| RepoError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| RepoError::OciPushFailed {
                message: e.to_string(),
            })?;

        tracing::debug!(
            repository = %self.repo.name,
            reference = %reference,
            manifest = %response.manifest_url,
            "chart pushed"
        );
        Ok(response.manifest_url)
    }
}
