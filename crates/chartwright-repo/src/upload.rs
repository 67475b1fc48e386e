//! Uploading a packaged chart to one repository

use chartwright_core::{ChartArtifact, LazyHandle};
use std::fmt;
use std::sync::Arc;

use crate::client::{ChartClient, ClientFactory};
use crate::config::{Repository, RepositoryKind};
use crate::credentials::ResolvedCredentials;
use crate::error::{BadUpload, RepoError};

/// Result of uploading to a single repository
#[derive(Debug)]
pub struct UploadOutcome {
    pub repository: String,
    pub kind: Option<RepositoryKind>,
    pub status: UploadStatus,
}

#[derive(Debug)]
pub enum UploadStatus {
    /// The repository accepted the chart
    Uploaded { location: String },
    /// The repository rejected the chart or could not be reached
    Failed(BadUpload),
    /// The release was cancelled before this upload started
    Cancelled,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, UploadStatus::Uploaded { .. })
    }

    pub fn error(&self) -> Option<&BadUpload> {
        match &self.status {
            UploadStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn cancelled(repo: &Repository) -> Self {
        Self {
            repository: repo.name.clone(),
            kind: repo.kind().ok(),
            status: UploadStatus::Cancelled,
        }
    }

    pub(crate) fn failed(repo: &Repository, cause: RepoError) -> Self {
        Self {
            repository: repo.name.clone(),
            kind: repo.kind().ok(),
            status: UploadStatus::Failed(BadUpload::new(&repo.name, cause)),
        }
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            UploadStatus::Uploaded { location } => {
                write!(f, "{}: uploaded to {}", self.repository, location)
            }
            UploadStatus::Failed(err) => write!(f, "{}: {}", self.repository, err.cause),
            UploadStatus::Cancelled => write!(f, "{}: cancelled", self.repository),
        }
    }
}

type ClientHandle = LazyHandle<Arc<dyn ChartClient>, RepoError>;

/// Uploads charts to one configured repository
///
/// The remote client is created on first use and kept for the uploader's
/// lifetime; it is never shared with another repository.
pub struct RepositoryUploader {
    repo: Repository,
    client: ClientHandle,
}

impl RepositoryUploader {
    pub fn new(
        repo: Repository,
        credentials: Option<ResolvedCredentials>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        let target = repo.clone();
        let client = LazyHandle::fallible(move || factory.create(&target, credentials.clone()));
        Self { repo, client }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Push the artifact, converting every failure into the outcome
    pub async fn upload(&self, artifact: &ChartArtifact) -> UploadOutcome {
        tracing::info!(
            repository = %self.repo.name,
            url = %self.repo.url,
            chart = %artifact.name(),
            version = %artifact.version(),
            "uploading chart"
        );

        let status = match self.push(artifact).await {
            Ok(location) => {
                tracing::info!(repository = %self.repo.name, %location, "upload complete");
                UploadStatus::Uploaded { location }
            }
            Err(cause) => {
                tracing::warn!(repository = %self.repo.name, error = %cause, "upload failed");
                UploadStatus::Failed(BadUpload::new(&self.repo.name, cause))
            }
        };

        UploadOutcome {
            repository: self.repo.name.clone(),
            kind: self.repo.kind().ok(),
            status,
        }
    }

    async fn push(&self, artifact: &ChartArtifact) -> Result<String, RepoError> {
        self.repo.validate()?;
        let client = self.client.try_get()?;
        client.push(artifact).await
    }
}

impl fmt::Debug for RepositoryUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryUploader")
            .field("repository", &self.repo.name)
            .field("client_ready", &self.client.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chartwright_core::{ChartMeta, ManifestFile, build_archive};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn artifact() -> ChartArtifact {
        let meta = ChartMeta::parse("demo", "1.0.0").unwrap();
        let manifests = vec![ManifestFile {
            relative_path: PathBuf::from("deployment.yml"),
            content: b"kind: Deployment\n".to_vec(),
        }];
        build_archive(&meta, Path::new("/out"), &manifests).unwrap()
    }

    struct FixedClient {
        pushes: Arc<AtomicUsize>,
        status: Option<u16>,
    }

    #[async_trait]
    impl ChartClient for FixedClient {
        async fn push(&self, artifact: &ChartArtifact) -> crate::Result<String> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            match self.status {
                None => Ok(format!("mem://{}", artifact.file_name())),
                Some(status) => Err(RepoError::HttpError {
                    status,
                    message: "rejected".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
        pushes: Arc<AtomicUsize>,
        status: Option<u16>,
        fail_creation: bool,
    }

    impl ClientFactory for CountingFactory {
        fn create(
            &self,
            _repo: &Repository,
            _credentials: Option<ResolvedCredentials>,
        ) -> crate::Result<Arc<dyn ChartClient>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail_creation {
                return Err(RepoError::NetworkError {
                    message: "no route to host".to_string(),
                });
            }
            Ok(Arc::new(FixedClient {
                pushes: Arc::clone(&self.pushes),
                status: self.status,
            }))
        }
    }

    fn repo() -> Repository {
        Repository::new("stable", "https://charts.example.com/api/charts").unwrap()
    }

    #[tokio::test]
    async fn test_client_is_created_once() {
        let factory = Arc::new(CountingFactory::default());
        let uploader = RepositoryUploader::new(repo(), None, factory.clone());
        assert!(!format!("{:?}", uploader).contains("client_ready: true"));

        let first = uploader.upload(&artifact()).await;
        let second = uploader.upload(&artifact()).await;

        assert!(first.is_success());
        assert!(second.is_success());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.pushes.load(Ordering::SeqCst), 2);
        assert_eq!(first.to_string(), "stable: uploaded to mem://demo-1.0.0.tgz");
    }

    #[tokio::test]
    async fn test_rejection_becomes_bad_upload() {
        let factory = Arc::new(CountingFactory {
            status: Some(500),
            ..Default::default()
        });
        let uploader = RepositoryUploader::new(repo(), None, factory);

        let outcome = uploader.upload(&artifact()).await;

        assert!(!outcome.is_success());
        let err = outcome.error().unwrap();
        assert_eq!(err.repository, "stable");
        assert_eq!(err.status(), Some(500));
        assert_eq!(outcome.kind, Some(RepositoryKind::ChartMuseum));
    }

    #[tokio::test]
    async fn test_client_creation_failure_is_retried_next_time() {
        let factory = Arc::new(CountingFactory {
            fail_creation: true,
            ..Default::default()
        });
        let uploader = RepositoryUploader::new(repo(), None, factory.clone());

        assert!(uploader.upload(&artifact()).await.error().is_some());
        assert!(uploader.upload(&artifact()).await.error().is_some());
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(factory.pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_repository_never_creates_client() {
        let factory = Arc::new(CountingFactory::default());
        let bad = Repository::new("broken", "oci://ghcr.io/org")
            .unwrap()
            .with_kind(RepositoryKind::Artifactory);
        let uploader = RepositoryUploader::new(bad, None, factory.clone());

        let outcome = uploader.upload(&artifact()).await;

        assert!(matches!(
            outcome.error().map(|e| &e.cause),
            Some(RepoError::InvalidRepositoryUrl { .. })
        ));
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }
}
