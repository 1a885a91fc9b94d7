use anyhow::{Context, Result, bail};
use log::debug;
use std::path::PathBuf;

use super::config::Config;
use crate::runtime::Runtime;

/// Point the manager at a game folder: remember it, create the packages root
/// and take the one-time backups of the protected files.
#[tracing::instrument(skip(config))]
pub fn init<R: Runtime>(
    mut config: Config<R>,
    game_dir: PathBuf,
    tool_path: Option<PathBuf>,
) -> Result<()> {
    if !config.runtime.is_dir(&game_dir) {
        bail!("Game directory {} does not exist.", game_dir.display());
    }

    config.settings.game_dir = Some(game_dir.clone());
    config.overrides.game_dir = Some(game_dir);
    if let Some(tool) = tool_path {
        config.settings.tool_path = Some(tool);
    }
    if let Some(work_dir) = config.overrides.work_dir.clone() {
        config.settings.work_dir = Some(work_dir);
    }

    let layout = config.layout()?;
    config.settings.game_dir = Some(layout.game_dir.clone());
    if config.settings.work_dir.is_some() {
        config.settings.work_dir = Some(layout.work_root.clone());
    }
    if config.settings.tool_path.is_some() {
        config.settings.tool_path = Some(layout.tool_path.clone());
    }
    layout.ensure_dirs(&config.runtime)?;
    config
        .runtime
        .create_dir_all(&layout.package_dir)
        .with_context(|| format!("Failed to create {:?}", layout.package_dir))?;

    let created = layout
        .original_files(&config.settings)
        .ensure_backups(&config.runtime)?;
    debug!("Created {} backup copies", created.len());
    config.save_settings()?;

    println!("Game folder set: {}", layout.game_dir.display());
    println!("Packages folder: {}", layout.mods_dir.display());
    for path in &created {
        println!("Backed up {}", path.display());
    }
    if !config.runtime.is_file(&layout.tool_path) {
        println!(
            "Note: packaging tool not found at {}; place it there or pass --tool.",
            layout.tool_path.display()
        );
    }
    Ok(())
}
