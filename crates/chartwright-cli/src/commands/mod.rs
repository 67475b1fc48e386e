//! CLI commands

pub mod package;
pub mod push;
pub mod strategy;

use chartwright_repo::ReleaseConfig;

use crate::ProjectArgs;
use crate::error::{CliError, Result};

/// Load `chartwright.yaml` and apply command-line overrides
pub fn load_project(args: &ProjectArgs) -> Result<ReleaseConfig> {
    if !args.config.exists() {
        return Err(CliError::config_with_help(
            format!("Configuration file not found: {}", args.config.display()),
            "Run from the project directory or pass --config <path>",
        ));
    }

    let mut config = ReleaseConfig::load_from(&args.config)?;
    if let Some(platform) = args.platform {
        config.platform = platform;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &args.archive_dir {
        config.archive_dir = Some(dir.clone());
    }

    tracing::debug!(
        config = %args.config.display(),
        chart = %config.chart.name,
        platform = %config.platform,
        "loaded project configuration"
    );
    Ok(config)
}
