use anyhow::Result;

use super::config::Config;
use super::selection_list;
use crate::application;
use crate::archive::Extractor;
use crate::runtime::Runtime;
use crate::staging::{ConflictReport, detect_conflicts};

/// Report which of the given selections (or every package) ship the same file
/// names. Read-only apart from the registry upkeep a scan does.
#[tracing::instrument(skip(config))]
pub fn conflicts<R: Runtime>(config: Config<R>, specs: Vec<String>) -> Result<()> {
    let layout = config.layout()?;
    let report = application::scan(
        &config.runtime,
        &layout,
        &config.settings,
        Some(config.cleanup.clone()),
    )?;
    let all = specs.is_empty();
    let selections = selection_list(&report.catalog, &specs, all)?;

    let conflicts = detect_conflicts(
        &config.runtime,
        &Extractor::new(),
        &config.settings.safety_limits(),
        &config.settings.ignore_list(),
        selections.as_slice(),
    );
    print_conflicts(&conflicts);
    Ok(())
}

pub(crate) fn print_conflicts(report: &ConflictReport) {
    for (path, reason) in &report.unreadable {
        eprintln!("Could not read {}: {}", path.display(), reason);
    }
    if !report.has_conflicts() {
        println!("No conflicts.");
        return;
    }
    for item in report.conflicted() {
        println!("{}:", item.display_name);
        for file in &item.files {
            println!("  {}", file);
        }
    }
}
