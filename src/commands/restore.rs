use anyhow::{Result, bail};

use super::config::Config;
use crate::runtime::Runtime;

/// Put the original game files back and delete every packed archive.
#[tracing::instrument(skip(config))]
pub fn restore<R: Runtime>(config: Config<R>, yes: bool) -> Result<()> {
    let layout = config.layout()?;

    if !yes {
        let prompt = format!(
            "Restore original game files and delete everything in {}?",
            layout.archive_out.display()
        );
        if !config.runtime.confirm(&prompt)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let report = layout
        .original_files(&config.settings)
        .restore_originals(&config.runtime);

    for path in &report.restored {
        println!("Restored {}", path.display());
    }
    println!("Removed {} packed archive(s).", report.cleared.len());
    for e in &report.errors {
        eprintln!("{}", e);
    }
    if !report.is_clean() {
        bail!("{} item(s) could not be restored.", report.errors.len());
    }
    Ok(())
}
