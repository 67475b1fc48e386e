//! Chartwright CLI - package generated manifests as Helm charts and publish them

use chartwright_core::{BuildStrategy, Platform};
use chartwright_repo::CONFIG_FILE_NAME;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;
mod util;

#[derive(Parser)]
#[command(name = "chartwright")]
#[command(author = "Chartwright Contributors")]
#[command(version)]
#[command(about = "Package generated Kubernetes and OpenShift manifests as Helm charts", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

/// Options shared by commands reading `chartwright.yaml`
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project configuration file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Target platform (kubernetes, openshift)
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Build output directory containing META-INF/jkube
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory to write the chart archive to
    #[arg(short = 'a', long)]
    pub archive_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Package the generated manifests into a chart archive
    Package {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Package the chart and upload it to the configured repositories
    Push {
        #[command(flatten)]
        project: ProjectArgs,

        /// Only upload to these repositories (repeatable)
        #[arg(short = 'r', long = "repository")]
        repositories: Vec<String>,

        /// Maximum number of uploads running at once
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Per-request timeout (e.g. 30s, 2m)
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,

        /// Credentials file (default: ~/.config/chartwright/credentials.yaml)
        #[arg(long, env = "CHARTWRIGHT_CREDENTIALS")]
        credentials: Option<PathBuf>,
    },

    /// Show which build strategy applies
    Strategy {
        /// Build source type reported by the cluster (e.g. Source, Docker)
        source_type: Option<String>,

        /// Target platform
        #[arg(long, default_value = "kubernetes")]
        platform: Platform,

        /// Explicitly configured strategy (s2i, jib, docker, buildpacks)
        #[arg(long = "build-strategy")]
        build_strategy: Option<BuildStrategy>,

        /// List every strategy and whether it supports watch mode
        #[arg(long)]
        list: bool,
    },
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().width(200).build())
    }));

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Package { project } => commands::package::run(&project),

        Commands::Push {
            project,
            repositories,
            max_concurrent,
            timeout,
            credentials,
        } => commands::push::run(
            &project,
            &repositories,
            max_concurrent,
            timeout,
            credentials.as_deref(),
        ),

        Commands::Strategy {
            source_type,
            platform,
            build_strategy,
            list,
        } => {
            if list {
                commands::strategy::list();
                Ok(())
            } else {
                commands::strategy::run(platform, build_strategy, source_type.as_deref());
                Ok(())
            }
        }
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
