//! Strategy command - show how the build strategy is chosen

use chartwright_core::{BuildStrategy, Platform};
use console::style;

fn watch_support(strategy: BuildStrategy) -> &'static str {
    if strategy.supports_watch() {
        "watch supported"
    } else {
        "watch not supported"
    }
}

/// Print every known strategy
pub fn list() {
    for strategy in BuildStrategy::ALL {
        println!("{}: {}", strategy.label(), watch_support(strategy));
    }
}

/// Resolve and explain the strategy for a platform
pub fn run(platform: Platform, configured: Option<BuildStrategy>, source_type: Option<&str>) {
    let strategy = platform.resolve_strategy(configured, source_type);

    let reason = if configured.is_some() {
        "configured explicitly".to_string()
    } else if strategy.is_same(source_type) {
        format!("source type '{}'", source_type.unwrap_or_default())
    } else {
        format!("{} default", platform)
    };

    println!("{} {}", style("Strategy:").bold(), strategy.label());
    println!("{} {}", style("Watch:").bold(), watch_support(strategy));
    println!("{} {}", style("Reason:").bold(), reason);
}
