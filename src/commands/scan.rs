use anyhow::Result;

use super::config::Config;
use crate::application::{self, ScanReport};
use crate::registry::MergeOutcome;
use crate::runtime::Runtime;

/// Scan the packages root, update the registry and list what was found.
#[tracing::instrument(skip(config))]
pub fn scan<R: Runtime>(config: Config<R>) -> Result<()> {
    let layout = config.layout()?;
    let report = application::scan(
        &config.runtime,
        &layout,
        &config.settings,
        Some(config.cleanup.clone()),
    )?;

    if report.catalog.is_empty() {
        println!("No packages found in {}.", layout.mods_dir.display());
    } else {
        print_packages(&report);
    }
    print_notices(&report);
    Ok(())
}

pub(crate) fn print_packages(report: &ScanReport) {
    for package in report.catalog.packages() {
        let mut line = format!("{} [priority {}]", package.display_name, package.priority);
        if let Some(entry) = report.registry.get(&package.canonical_key) {
            let details: Vec<&str> = ["version", "author"]
                .iter()
                .filter_map(|f| entry.field_str(f))
                .collect();
            if !details.is_empty() {
                line.push_str(&format!(" {}", details.join(" by ")));
            }
        }
        if package.root.is_archive() {
            line.push_str(" (archive)");
        }
        println!("{}", line);
        for variant in &package.variants {
            println!("  {}/{}", package.display_name, variant.name);
        }
    }
}

pub(crate) fn print_notices(report: &ScanReport) {
    for (key, outcome) in &report.notices {
        match outcome {
            MergeOutcome::Added => println!("+ {}", key),
            MergeOutcome::Changed(changes) if changes.is_empty() => {
                println!("~ {} (content updated)", key)
            }
            MergeOutcome::Changed(changes) => {
                for change in changes {
                    println!("~ {} {}", key, change);
                }
            }
            MergeOutcome::Unchanged => {}
        }
    }
    for key in &report.pruned {
        println!("- {}", key);
    }
    for item in &report.skipped {
        eprintln!("Skipped {}: {}", item.path.display(), item.reason);
    }
    if let Some(e) = &report.persist_error {
        eprintln!("Warning: {}", e);
    }
}
