//! Push command - package the chart and upload it to every repository

use chartwright_repo::{
    CredentialStore, DefaultClientFactory, ReleasePipeline, ReleaseRequest, UploadStatus,
};
use console::style;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::ProjectArgs;
use crate::error::{CliError, Result};
use crate::util::short_digest;

pub fn run(
    args: &ProjectArgs,
    only: &[String],
    max_concurrent: Option<usize>,
    timeout: Option<Duration>,
    credentials: Option<&Path>,
) -> Result<()> {
    let mut config = super::load_project(args)?;
    if let Some(max) = max_concurrent {
        config.upload.max_concurrent = max;
    }
    if let Some(timeout) = timeout {
        config.upload.timeout = timeout;
    }

    for name in only {
        if config.get(name).is_none() {
            return Err(CliError::usage_with_help(
                format!("Repository not configured: {}", name),
                "Repository names come from the repositories section of chartwright.yaml",
            ));
        }
    }

    let mut request = ReleaseRequest::from_config(&config);
    if !only.is_empty() {
        request.repositories.retain(|r| only.contains(&r.name));
    }

    let store = match credentials {
        Some(path) => CredentialStore::load_from(path)?,
        None => CredentialStore::load()?,
    };

    let pipeline = ReleasePipeline::new()
        .with_client_factory(Arc::new(DefaultClientFactory::new(config.upload.timeout)))
        .with_credentials(store)
        .with_max_concurrent(config.upload.max_concurrent);

    println!(
        "{} {} v{} to {} repositories",
        style("Releasing").cyan().bold(),
        request.chart.name,
        request.chart.version,
        request.repositories.len()
    );

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("Failed to start async runtime: {}", e)))?;

    let cancel = CancellationToken::new();
    let report = runtime.block_on(async {
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling pending uploads");
                interrupt.cancel();
            }
        });
        pipeline.release(&request, &cancel).await
    })?;

    println!(
        "  {} {} ({})",
        style("Packaged").green().bold(),
        report.artifact.file_name(),
        short_digest(report.artifact.digest(), 16)
    );
    if let Some(path) = &report.archive_path {
        println!("  {} {}", style("Saved").dim(), path.display());
    }

    println!();
    for outcome in &report.outcomes {
        match &outcome.status {
            UploadStatus::Uploaded { location } => {
                println!("  {} {} {}", style("✓").green(), outcome.repository, style(location).dim());
            }
            UploadStatus::Failed(err) => {
                println!("  {} {} {}", style("✗").red(), outcome.repository, err.cause);
            }
            UploadStatus::Cancelled => {
                println!("  {} {} {}", style("-").yellow(), outcome.repository, style("cancelled").dim());
            }
        }
    }
    println!();
    println!("{}: {}", style("Status").bold(), report.status());

    report.into_result()?;
    Ok(())
}
