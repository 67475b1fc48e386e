//! Classic HTTP chart repositories
//!
//! Supports the upload APIs of the usual Helm repository servers:
//! - ChartMuseum: `POST` the archive to the configured URL (`.../api/charts`)
//! - Artifactory and Nexus: `PUT` the archive to `<url>/<name>-<version>.tgz`

use async_trait::async_trait;
use chartwright_core::ChartArtifact;
use chartwright_core::archive::CHART_MEDIA_TYPE;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use std::time::Duration;

use crate::client::ChartClient;
use crate::config::{Repository, RepositoryKind};
use crate::credentials::ResolvedCredentials;
use crate::error::{RepoError, Result};

/// Longest server response body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// HTTP chart repository client
pub struct HttpChartClient {
    repo: Repository,
    kind: RepositoryKind,
    client: reqwest::Client,
    credentials: Option<ResolvedCredentials>,
    timeout: Duration,
}

impl HttpChartClient {
    pub fn new(
        repo: Repository,
        kind: RepositoryKind,
        credentials: Option<ResolvedCredentials>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Never follow redirects: credentials must not leak to another origin
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .danger_accept_invalid_certs(repo.insecure_skip_tls)
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            repo,
            kind,
            client,
            credentials,
            timeout,
        })
    }

    /// Target URL for an artifact
    pub fn upload_url(&self, artifact: &ChartArtifact) -> String {
        match self.kind {
            RepositoryKind::ChartMuseum => self.repo.url.clone(),
            _ => format!(
                "{}/{}",
                self.repo.url.trim_end_matches('/'),
                artifact.file_name()
            ),
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        match self.kind {
            RepositoryKind::ChartMuseum => self.client.post(url),
            _ => self.client.put(url),
        }
    }
}

#[async_trait]
impl ChartClient for HttpChartClient {
    async fn push(&self, artifact: &ChartArtifact) -> Result<String> {
        let url = self.upload_url(artifact);

        let mut request = self
            .request(&url)
            .header(CONTENT_TYPE, CHART_MEDIA_TYPE)
            .body(artifact.data().clone());
        if let Some(creds) = &self.credentials {
            request = request.header(AUTHORIZATION, creds.auth_header());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RepoError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                RepoError::from(e)
            }
        })?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>")
                .to_string();
            return Err(RepoError::UnexpectedRedirect { url, location });
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(RepoError::AuthRequired { url });
        }
        if status == StatusCode::FORBIDDEN {
            return Err(RepoError::AuthFailed {
                message: format!("Access denied to {}", url),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        tracing::debug!(
            repository = %self.repo.name,
            %url,
            status = status.as_u16(),
            "chart accepted"
        );
        Ok(url)
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}
