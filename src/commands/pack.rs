use anyhow::{Result, anyhow, bail};

use super::config::Config;
use super::conflicts::print_conflicts;
use super::selection_list;
use crate::application::{self, PackPass, PassOutcome, PassReport};
use crate::packaging::PackTool;
use crate::runtime::Runtime;
use crate::staging::{CollisionPolicy, SortOrder};

/// Run one packaging pass over the given selections, in the given order.
#[tracing::instrument(skip(config, tool))]
pub async fn pack<R, T>(
    mut config: Config<R>,
    tool: &T,
    specs: Vec<String>,
    all: bool,
    sort: SortOrder,
    collision: Option<CollisionPolicy>,
) -> Result<()>
where
    R: Runtime + Clone + 'static,
    T: PackTool + ?Sized,
{
    if specs.is_empty() && !all {
        bail!("Nothing selected. Pass package names (Key, Key/Variant, Key/*) or --all.");
    }
    if let Some(policy) = collision {
        config.settings.collision_policy = policy;
    }

    let layout = config.layout()?;
    let scan = application::scan(
        &config.runtime,
        &layout,
        &config.settings,
        Some(config.cleanup.clone()),
    )?;
    if let Some(e) = &scan.persist_error {
        eprintln!("Warning: {}", e);
    }
    let selections = selection_list(&scan.catalog, &specs, all)?;
    if selections.is_empty() {
        bail!("No packages found in {}.", layout.mods_dir.display());
    }

    let pass = PackPass::new(
        config.runtime.clone(),
        tool,
        &layout,
        &config.settings,
        config.cleanup.clone(),
    );
    let report = pass.run(selections, sort).await;
    print_report(&report);

    let message = report.outcome.message();
    match report.outcome {
        PassOutcome::Failed(_) => Err(anyhow!(message)),
        _ => {
            println!("{}", message);
            Ok(())
        }
    }
}

fn print_report(report: &PassReport) {
    for e in &report.restore.errors {
        eprintln!("Warning: {}", e);
    }
    if report.conflicts.has_conflicts() {
        println!("Conflicting files:");
        print_conflicts(&report.conflicts);
    }
    let Some(staging) = &report.staging else {
        return;
    };
    for collision in &staging.collisions {
        let discarded: Vec<&str> = collision
            .discarded
            .iter()
            .map(|f| f.source_package_key.as_str())
            .collect();
        println!(
            "{}: using {} over {}",
            collision.output_name,
            collision.kept.source_package_key,
            discarded.join(", ")
        );
    }
    for copy in &staging.overrides {
        println!("Copied {} to {}", copy.source_path.display(), copy.dest.display());
    }
    for failure in &staging.failures {
        eprintln!(
            "Skipped {} ({}): {}",
            failure.selection,
            failure.source.display(),
            failure.reason
        );
    }
    println!("Staged {} file(s).", staging.files.len());
}
