//! Package command - build the chart archive without uploading

use chartwright_core::ChartPackager;
use console::style;

use crate::ProjectArgs;
use crate::error::Result;
use crate::util::{format_size, short_digest};

pub fn run(args: &ProjectArgs) -> Result<()> {
    let config = super::load_project(args)?;
    let chart = &config.chart;

    println!(
        "{} {} v{} ({}, {} build)",
        style("Packaging").cyan().bold(),
        chart.name,
        chart.version,
        config.platform,
        config.strategy()
    );

    let artifact = ChartPackager::new().package(config.platform, &config.output_dir, chart)?;

    let target_dir = config.archive_dir.as_ref().unwrap_or(&config.output_dir);
    let created_path = artifact.write_to(target_dir)?;

    println!(
        "  {} {}",
        style("Created").green().bold(),
        created_path.display()
    );
    println!("  {} {}", style("Size").dim(), format_size(artifact.size()));

    println!();
    println!("{}:", style("Templates").bold());
    for template in artifact.templates() {
        println!("  {}", template);
    }

    println!();
    println!(
        "{}: {}",
        style("Digest").bold(),
        short_digest(artifact.digest(), 16)
    );

    Ok(())
}
