//! Release pipeline
//!
//! Packages the generated manifests once, then pushes the archive to every
//! target repository concurrently and aggregates the per-repository
//! outcomes into a [`ReleaseReport`].

use chartwright_core::{BuildStrategy, ChartArtifact, ChartMeta, ChartPackager, CoreError, Platform};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientFactory, DefaultClientFactory};
use crate::config::{ReleaseConfig, Repository};
use crate::credentials::CredentialStore;
use crate::error::BadUpload;
use crate::upload::{RepositoryUploader, UploadOutcome, UploadStatus};

/// Default number of uploads running at once
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Errors ending a release
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// Packaging failed; nothing was uploaded
    #[error(transparent)]
    Configuration(#[from] CoreError),

    #[error("No repositories configured for {chart} {version}")]
    NoRepositories { chart: String, version: String },

    /// The packaged archive could not be saved; nothing was uploaded
    #[error("Failed to write chart archive to {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    /// At least one repository did not receive the chart
    #[error(transparent)]
    Upload(AggregateFailure),
}

impl ReleaseError {
    /// Whether the release failed before any upload was attempted
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReleaseError::Configuration(_) | ReleaseError::NoRepositories { .. }
        )
    }
}

/// Every repository that did not receive the chart
#[derive(Debug)]
pub struct AggregateFailure {
    pub chart: String,
    pub version: String,
    pub attempted: usize,
    pub failures: Vec<BadUpload>,
    pub cancelled: Vec<String>,
}

impl AggregateFailure {
    pub fn failed_repositories(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.repository.as_str())
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missed = self.failures.len() + self.cancelled.len();
        write!(
            f,
            "Failed to release {} {} to {} of {} repositories",
            self.chart, self.version, missed, self.attempted
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.repository, failure.cause)?;
        }
        for name in &self.cancelled {
            write!(f, "\n  {}: cancelled", name)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {}

/// What to release and where
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub platform: Platform,
    /// Build output directory containing `META-INF/jkube`
    pub output_dir: PathBuf,
    pub chart: ChartMeta,
    /// Target repositories, in reporting order
    pub repositories: Vec<Repository>,
    /// Where to keep a copy of the archive, if anywhere
    pub archive_dir: Option<PathBuf>,
    pub build_strategy: Option<BuildStrategy>,
    pub source_type: Option<String>,
}

impl ReleaseRequest {
    pub fn new(platform: Platform, output_dir: impl Into<PathBuf>, chart: ChartMeta) -> Self {
        Self {
            platform,
            output_dir: output_dir.into(),
            chart,
            repositories: Vec::new(),
            archive_dir: None,
            build_strategy: None,
            source_type: None,
        }
    }

    /// Request for a project configuration, routed by the chart's channel
    pub fn from_config(config: &ReleaseConfig) -> Self {
        Self {
            platform: config.platform,
            output_dir: config.output_dir.clone(),
            chart: config.chart.clone(),
            repositories: config.repositories_for(&config.chart.version),
            archive_dir: config.archive_dir.clone(),
            build_strategy: config.build_strategy,
            source_type: config.source_type.clone(),
        }
    }

    pub fn with_repository(mut self, repo: Repository) -> Self {
        self.repositories.push(repo);
        self
    }

    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    pub fn strategy(&self) -> BuildStrategy {
        self.platform
            .resolve_strategy(self.build_strategy, self.source_type.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// Every repository received the chart
    Succeeded,
    /// Some repositories received the chart
    PartiallyFailed,
    /// No repository received the chart
    Failed,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReleaseStatus::Succeeded => "succeeded",
            ReleaseStatus::PartiallyFailed => "partially failed",
            ReleaseStatus::Failed => "failed",
        })
    }
}

/// Result of a completed release
#[derive(Debug)]
pub struct ReleaseReport {
    pub artifact: ChartArtifact,
    pub archive_path: Option<PathBuf>,
    pub strategy: BuildStrategy,
    /// One outcome per repository, in request order
    pub outcomes: Vec<UploadOutcome>,
}

impl ReleaseReport {
    pub fn status(&self) -> ReleaseStatus {
        let succeeded = self.succeeded().count();
        if succeeded == self.outcomes.len() {
            ReleaseStatus::Succeeded
        } else if succeeded == 0 {
            ReleaseStatus::Failed
        } else {
            ReleaseStatus::PartiallyFailed
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BadUpload> {
        self.outcomes.iter().filter_map(|o| o.error())
    }

    /// Turn any repository that missed the chart into an error
    pub fn into_result(self) -> Result<ReleaseReport, ReleaseError> {
        if self.status() == ReleaseStatus::Succeeded {
            return Ok(self);
        }

        let attempted = self.outcomes.len();
        let mut failures = Vec::new();
        let mut cancelled = Vec::new();
        for outcome in self.outcomes {
            match outcome.status {
                UploadStatus::Failed(err) => failures.push(err),
                UploadStatus::Cancelled => cancelled.push(outcome.repository),
                UploadStatus::Uploaded { .. } => {}
            }
        }

        Err(ReleaseError::Upload(AggregateFailure {
            chart: self.artifact.name().to_string(),
            version: self.artifact.version().to_string(),
            attempted,
            failures,
            cancelled,
        }))
    }
}

/// Packages a chart and publishes it to repositories
pub struct ReleasePipeline {
    packager: ChartPackager,
    factory: Arc<dyn ClientFactory>,
    credentials: CredentialStore,
    max_concurrent: usize,
}

impl Default for ReleasePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleasePipeline {
    /// Pipeline reading manifests from disk and pushing with real clients
    pub fn new() -> Self {
        Self {
            packager: ChartPackager::new(),
            factory: Arc::new(DefaultClientFactory::default()),
            credentials: CredentialStore::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn with_packager(mut self, packager: ChartPackager) -> Self {
        self.packager = packager;
        self
    }

    pub fn with_client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    /// Limit the number of uploads in flight (at least one)
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Package the chart and upload it to every requested repository
    ///
    /// Packaging errors abort before any upload. Upload failures do not stop
    /// the other uploads; they are reported in the returned report. Uploads
    /// not yet started when `cancel` fires are reported as cancelled.
    pub async fn release(
        &self,
        request: &ReleaseRequest,
        cancel: &CancellationToken,
    ) -> Result<ReleaseReport, ReleaseError> {
        if request.repositories.is_empty() {
            return Err(ReleaseError::NoRepositories {
                chart: request.chart.name.clone(),
                version: request.chart.version.to_string(),
            });
        }

        let strategy = request.strategy();
        tracing::info!(
            chart = %request.chart.name,
            version = %request.chart.version,
            platform = %request.platform,
            %strategy,
            repositories = request.repositories.len(),
            "starting release"
        );

        let artifact = self
            .packager
            .package(request.platform, &request.output_dir, &request.chart)?;

        let archive_path = match &request.archive_dir {
            Some(dir) => Some(artifact.write_to(dir).map_err(|source| ReleaseError::Archive {
                path: dir.clone(),
                source,
            })?),
            None => None,
        };

        let outcomes = self.upload_all(&artifact, &request.repositories, cancel).await;

        let report = ReleaseReport {
            artifact,
            archive_path,
            strategy,
            outcomes,
        };
        tracing::info!(
            chart = %report.artifact.name(),
            status = %report.status(),
            succeeded = report.succeeded().count(),
            total = report.outcomes.len(),
            "release finished"
        );
        Ok(report)
    }

    async fn upload_all(
        &self,
        artifact: &ChartArtifact,
        repositories: &[Repository],
        cancel: &CancellationToken,
    ) -> Vec<UploadOutcome> {
        let uploads = repositories.iter().enumerate().map(|(index, repo)| async move {
            if cancel.is_cancelled() {
                tracing::warn!(repository = %repo.name, "release cancelled before upload");
                return (index, UploadOutcome::cancelled(repo));
            }

            let credentials = match self.credentials.resolve_for(repo) {
                Ok(credentials) => credentials,
                Err(err) => {
                    tracing::warn!(repository = %repo.name, error = %err, "credentials unavailable");
                    return (index, UploadOutcome::failed(repo, err));
                }
            };

            let uploader = RepositoryUploader::new(repo.clone(), credentials, Arc::clone(&self.factory));
            (index, uploader.upload(artifact).await)
        });

        let mut outcomes: Vec<(usize, UploadOutcome)> = stream::iter(uploads)
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

impl fmt::Debug for ReleasePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleasePipeline")
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChartClient;
    use crate::config::RepositoryKind;
    use crate::credentials::{Credentials, ResolvedCredentials};
    use crate::error::RepoError;
    use async_trait::async_trait;
    use chartwright_core::{ManifestFile, ManifestSource};
    use std::collections::HashSet;
    use std::io;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Manifests served from memory
    struct StaticManifests {
        files: Vec<ManifestFile>,
        calls: AtomicUsize,
    }

    impl StaticManifests {
        fn new(files: Vec<ManifestFile>) -> Arc<Self> {
            Arc::new(Self {
                files,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ManifestSource for StaticManifests {
        fn collect(&self, _dir: &Path) -> io::Result<Vec<ManifestFile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.files.is_empty() {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such directory"));
            }
            Ok(self.files.clone())
        }
    }

    fn manifests() -> Arc<StaticManifests> {
        StaticManifests::new(vec![ManifestFile {
            relative_path: PathBuf::from("deployment.yml"),
            content: b"kind: Deployment\n".to_vec(),
        }])
    }

    #[derive(Default)]
    struct FakeRegistry {
        created: AtomicUsize,
        pushes: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        failing: HashSet<String>,
        delay: Option<Duration>,
        cancel_on_push: Option<CancellationToken>,
        seen_credentials: Mutex<Vec<(String, Option<ResolvedCredentials>)>>,
    }

    struct FakeClient {
        repo: String,
        registry: Arc<FakeRegistry>,
    }

    #[async_trait]
    impl ChartClient for FakeClient {
        async fn push(&self, artifact: &ChartArtifact) -> crate::Result<String> {
            let registry = &self.registry;
            registry.pushes.fetch_add(1, Ordering::SeqCst);
            let now = registry.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            registry.peak.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = registry.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(token) = &registry.cancel_on_push {
                token.cancel();
            }
            registry.in_flight.fetch_sub(1, Ordering::SeqCst);

            if registry.failing.contains(&self.repo) {
                return Err(RepoError::HttpError {
                    status: 503,
                    message: "Service Unavailable".to_string(),
                });
            }
            Ok(format!("fake://{}/{}", self.repo, artifact.file_name()))
        }
    }

    struct FakeFactory(Arc<FakeRegistry>);

    impl ClientFactory for FakeFactory {
        fn create(
            &self,
            repo: &Repository,
            credentials: Option<ResolvedCredentials>,
        ) -> crate::Result<Arc<dyn ChartClient>> {
            self.0.created.fetch_add(1, Ordering::SeqCst);
            self.0
                .seen_credentials
                .lock()
                .unwrap()
                .push((repo.name.clone(), credentials));
            Ok(Arc::new(FakeClient {
                repo: repo.name.clone(),
                registry: Arc::clone(&self.0),
            }))
        }
    }

    fn pipeline(registry: &Arc<FakeRegistry>, source: Arc<StaticManifests>) -> ReleasePipeline {
        ReleasePipeline::new()
            .with_packager(ChartPackager::with_source(source))
            .with_client_factory(Arc::new(FakeFactory(Arc::clone(registry))))
    }

    fn repo(name: &str) -> Repository {
        Repository::new(name, format!("https://{}.example.com/api/charts", name)).unwrap()
    }

    fn request(names: &[&str]) -> ReleaseRequest {
        let chart = ChartMeta::parse("random-generator", "0.1.0").unwrap();
        names
            .iter()
            .fold(ReleaseRequest::new(Platform::OpenShift, "/build", chart), |req, name| {
                req.with_repository(repo(name))
            })
    }

    #[tokio::test]
    async fn test_single_repository_uploads_once() {
        let registry = Arc::new(FakeRegistry::default());
        let pipeline = pipeline(&registry, manifests());

        let report = pipeline
            .release(&request(&["stable"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(registry.created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pushes.load(Ordering::SeqCst), 1);
        assert_eq!(report.status(), ReleaseStatus::Succeeded);
        assert_eq!(report.strategy, BuildStrategy::S2i);
        assert_eq!(report.artifact.file_name(), "random-generator-0.1.0.tgz");
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_one_failing_repository_is_partial_failure() {
        let registry = Arc::new(FakeRegistry {
            failing: HashSet::from(["broken".to_string()]),
            ..Default::default()
        });
        let pipeline = pipeline(&registry, manifests());

        let report = pipeline
            .release(&request(&["stable", "broken"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status(), ReleaseStatus::PartiallyFailed);
        assert_eq!(report.succeeded().count(), 1);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].repository, "broken");
        assert_eq!(failed[0].status(), Some(503));

        match report.into_result() {
            Err(ReleaseError::Upload(failure)) => {
                assert_eq!(failure.failed_repositories().collect::<Vec<_>>(), vec!["broken"]);
                let message = failure.to_string();
                assert!(message.contains("1 of 2 repositories"));
                assert!(message.contains("broken"));
                assert!(message.contains("503"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_outcomes_follow_request_order() {
        let registry = Arc::new(FakeRegistry {
            delay: Some(Duration::from_millis(5)),
            ..Default::default()
        });
        let pipeline = pipeline(&registry, manifests()).with_max_concurrent(3);
        let names = ["a", "b", "c", "d", "e"];

        let report = pipeline
            .release(&request(&names), &CancellationToken::new())
            .await
            .unwrap();

        let order: Vec<_> = report.outcomes.iter().map(|o| o.repository.as_str()).collect();
        assert_eq!(order, names);
        assert!(report.outcomes.iter().all(|o| o.kind == Some(RepositoryKind::ChartMuseum)));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let registry = Arc::new(FakeRegistry {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let pipeline = pipeline(&registry, manifests()).with_max_concurrent(2);

        let report = pipeline
            .release(&request(&["a", "b", "c", "d", "e"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status(), ReleaseStatus::Succeeded);
        assert_eq!(registry.pushes.load(Ordering::SeqCst), 5);
        assert_eq!(registry.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_packaging_failure_aborts_before_upload() {
        let registry = Arc::new(FakeRegistry::default());
        let pipeline = pipeline(&registry, StaticManifests::new(Vec::new()));

        let err = pipeline
            .release(&request(&["stable"]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(err.to_string().contains("META-INF/jkube/openshift"));
        assert_eq!(registry.created.load(Ordering::SeqCst), 0);
        assert_eq!(registry.pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_repositories() {
        let registry = Arc::new(FakeRegistry::default());
        let source = manifests();
        let pipeline = pipeline(&registry, Arc::clone(&source));

        let err = pipeline
            .release(&request(&[]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseError::NoRepositories { .. }));
        assert!(err.is_configuration());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let registry = Arc::new(FakeRegistry::default());
        let pipeline = pipeline(&registry, manifests());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = pipeline.release(&request(&["a", "b"]), &cancel).await.unwrap();

        assert_eq!(report.status(), ReleaseStatus::Failed);
        assert!(report.outcomes.iter().all(|o| matches!(o.status, UploadStatus::Cancelled)));
        assert_eq!(registry.created.load(Ordering::SeqCst), 0);

        match report.into_result() {
            Err(ReleaseError::Upload(failure)) => {
                assert_eq!(failure.cancelled, vec!["a", "b"]);
                assert!(failure.failures.is_empty());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_keeps_in_flight_upload() {
        let cancel = CancellationToken::new();
        let registry = Arc::new(FakeRegistry {
            cancel_on_push: Some(cancel.clone()),
            ..Default::default()
        });
        let pipeline = pipeline(&registry, manifests()).with_max_concurrent(1);

        let report = pipeline
            .release(&request(&["first", "second"]), &cancel)
            .await
            .unwrap();

        assert!(report.outcomes[0].is_success());
        assert!(matches!(report.outcomes[1].status, UploadStatus::Cancelled));
        assert_eq!(report.status(), ReleaseStatus::PartiallyFailed);
        assert_eq!(registry.pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_credentials_are_passed_per_repository() {
        let registry = Arc::new(FakeRegistry::default());
        let mut store = CredentialStore::default();
        store.set("stable", Credentials::bearer("s3cret"));
        let pipeline = pipeline(&registry, manifests()).with_credentials(store);

        pipeline
            .release(&request(&["stable", "public"]), &CancellationToken::new())
            .await
            .unwrap();

        let mut seen = registry.seen_credentials.lock().unwrap().clone();
        seen.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            seen,
            vec![
                ("public".to_string(), None),
                (
                    "stable".to_string(),
                    Some(ResolvedCredentials::Bearer {
                        token: "s3cret".to_string()
                    })
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_archive_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(FakeRegistry::default());
        let pipeline = pipeline(&registry, manifests());

        let report = pipeline
            .release(
                &request(&["stable"]).with_archive_dir(dir.path()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let path = report.archive_path.unwrap();
        assert_eq!(path, dir.path().join("random-generator-0.1.0.tgz"));
        assert_eq!(std::fs::read(path).unwrap(), report.artifact.data().to_vec());
    }

    #[tokio::test]
    async fn test_unwritable_archive_dir_is_not_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"a regular file").unwrap();
        let registry = Arc::new(FakeRegistry::default());
        let pipeline = pipeline(&registry, manifests());

        let err = pipeline
            .release(
                &request(&["stable"]).with_archive_dir(blocker.join("sub")),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(&err, ReleaseError::Archive { path, .. } if path == &blocker.join("sub")));
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("blocker"));
        assert_eq!(registry.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_request_from_config_routes_channels() {
        use crate::config::Channel;

        let chart = ChartMeta::parse("demo", "1.0.0-SNAPSHOT").unwrap();
        let mut config = ReleaseConfig::new(chart);
        config.repositories = vec![
            repo("releases").with_channel(Channel::Stable),
            repo("snapshots").with_channel(Channel::Snapshot),
            repo("everything"),
        ];

        let request = ReleaseRequest::from_config(&config);
        let names: Vec<_> = request.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["snapshots", "everything"]);
        assert_eq!(request.strategy(), BuildStrategy::Docker);
    }
}
