use anyhow::{Result, bail};
use std::path::PathBuf;

use super::config::Config;
use crate::archive::Extractor;
use crate::package;
use crate::runtime::Runtime;

/// Copy dropped folders and archives into the packages root.
#[tracing::instrument(skip(config))]
pub fn import<R: Runtime>(config: Config<R>, sources: Vec<PathBuf>) -> Result<()> {
    let layout = config.layout()?;
    layout.ensure_dirs(&config.runtime)?;

    let report = package::import(
        &config.runtime,
        &Extractor::new(),
        &config.settings.safety_limits(),
        &sources,
        &layout.mods_dir,
    );

    for dest in &report.imported {
        println!("Imported {}", dest.display());
    }
    for (source, reason) in &report.failed {
        eprintln!("Failed to import {}: {}", source.display(), reason);
    }
    if report.imported.is_empty() && !report.failed.is_empty() {
        bail!("Nothing was imported.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::write_zip;
    use crate::config::Settings;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    fn config(root: &std::path::Path) -> Config<RealRuntime> {
        let mut config = Config::new(
            RealRuntime,
            root.join("settings.json"),
            Settings::default(),
        );
        config.overrides.game_dir = Some(root.join("game"));
        config.overrides.work_dir = Some(root.join("work"));
        config
    }

    #[test]
    fn test_import_folder_and_archive() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("drop/Outfit");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("a_mesh.stream"), "m").unwrap();
        let archive = dir.path().join("drop/Hair.zip");
        write_zip(&archive, &[("h_mesh.stream", b"h")]);

        import(config(dir.path()), vec![folder, archive]).unwrap();

        let mods = dir.path().join("game/mods");
        assert!(mods.join("Outfit/a_mesh.stream").exists());
        assert!(mods.join("Hair.zip").exists());
    }

    #[test]
    fn test_import_all_failed_is_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("Evil.zip");
        write_zip(&archive, &[("../evil.core", b"x")]);

        let err = import(config(dir.path()), vec![archive]).unwrap_err();
        assert!(err.to_string().contains("Nothing was imported"));
        assert!(!dir.path().join("game/mods/Evil.zip").exists());
    }
}
