use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::archive::{ArchiveExtractor, Extractor, SafetyLimits};
use crate::runtime::Runtime;

/// Result of importing a batch of dropped paths.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Destination paths inside the packages root.
    pub imported: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Copy each dropped folder or archive into the packages root under its own
/// name, replacing an existing copy. Archives are validated first. One failing
/// item does not stop the others.
#[tracing::instrument(skip(runtime, extractor, limits))]
pub fn import<R: Runtime>(
    runtime: &R,
    extractor: &Extractor,
    limits: &SafetyLimits,
    sources: &[PathBuf],
    mods_root: &Path,
) -> ImportReport {
    let mut report = ImportReport::default();
    for source in sources {
        match import_one(runtime, extractor, limits, source, mods_root) {
            Ok(dest) => {
                info!("Imported {:?} to {:?}", source, dest);
                report.imported.push(dest);
            }
            Err(e) => {
                warn!("Failed to import {:?}: {:#}", source, e);
                report.failed.push((source.clone(), format!("{:#}", e)));
            }
        }
    }
    report
}

fn import_one<R: Runtime>(
    runtime: &R,
    extractor: &Extractor,
    limits: &SafetyLimits,
    source: &Path,
    mods_root: &Path,
) -> Result<PathBuf> {
    let name = source
        .file_name()
        .with_context(|| format!("{:?} has no file name", source))?;
    let dest = mods_root.join(name);
    if dest == source {
        bail!("already in the packages root");
    }
    runtime
        .create_dir_all(mods_root)
        .with_context(|| format!("Failed to create packages root {:?}", mods_root))?;

    if runtime.is_dir(source) {
        copy_tree(runtime, source, &dest)?;
    } else if runtime.is_file(source) && extractor.can_handle(source) {
        extractor.validate(runtime, source, limits)?;
        runtime
            .copy(source, &dest)
            .with_context(|| format!("Failed to copy {:?} to {:?}", source, dest))?;
    } else {
        bail!("not a folder or a supported archive (.zip, .tar.gz, .tgz)");
    }
    Ok(dest)
}

/// Copy a folder's files into `<dest>.partial`, then swap it onto `dest`.
fn copy_tree<R: Runtime>(runtime: &R, source: &Path, dest: &Path) -> Result<()> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    if runtime.exists(&partial) {
        runtime.remove_dir_all(&partial)?;
    }

    let result = (|| -> Result<()> {
        runtime.create_dir_all(&partial)?;
        for file in runtime.walk_files(source)? {
            let relative = file.strip_prefix(source)?;
            let target = partial.join(relative);
            if let Some(parent) = target.parent() {
                runtime.create_dir_all(parent)?;
            }
            runtime
                .copy(&file, &target)
                .with_context(|| format!("Failed to copy {:?}", file))?;
        }
        if runtime.exists(dest) {
            debug!("Replacing existing copy at {:?}", dest);
            runtime.remove_dir_all(dest)?;
        }
        runtime.rename(&partial, dest)
    })();

    if result.is_err() && runtime.exists(&partial) {
        let _ = runtime.remove_dir_all(&partial);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::write_zip;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_import_folder_and_archive() {
        let dir = tempdir().unwrap();
        let drop = dir.path().join("drop");
        let mods = dir.path().join("mods");

        let folder = drop.join("Cool Mod-5-1-0");
        fs::create_dir_all(folder.join("Red")).unwrap();
        fs::write(folder.join("Red/variation.png"), "png").unwrap();
        fs::write(folder.join("a_mesh.stream"), "m").unwrap();

        let archive = drop.join("SuperArmor-100-2-5-12.zip");
        write_zip(&archive, &[("x_texture.stream", b"t")]);

        let report = import(
            &RealRuntime,
            &Extractor::new(),
            &SafetyLimits::default(),
            &[folder, archive],
            &mods,
        );

        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(report.imported.len(), 2);
        assert!(mods.join("Cool Mod-5-1-0/Red/variation.png").exists());
        assert!(mods.join("Cool Mod-5-1-0/a_mesh.stream").exists());
        assert!(mods.join("SuperArmor-100-2-5-12.zip").exists());
        assert!(!mods.join("Cool Mod-5-1-0.partial").exists());
    }

    #[test]
    fn test_import_replaces_existing_copy() {
        let dir = tempdir().unwrap();
        let mods = dir.path().join("mods");
        fs::create_dir_all(mods.join("Mod")).unwrap();
        fs::write(mods.join("Mod/stale.core"), "old").unwrap();

        let source = dir.path().join("drop/Mod");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("fresh.core"), "new").unwrap();

        let report = import(
            &RealRuntime,
            &Extractor::new(),
            &SafetyLimits::default(),
            &[source],
            &mods,
        );

        assert!(report.failed.is_empty());
        assert!(mods.join("Mod/fresh.core").exists());
        assert!(!mods.join("Mod/stale.core").exists());
    }

    #[test]
    fn test_import_rejects_unsafe_archive_and_continues() {
        let dir = tempdir().unwrap();
        let mods = dir.path().join("mods");
        let evil = dir.path().join("Evil.zip");
        write_zip(&evil, &[("../../evil.core", b"x")]);
        let good = dir.path().join("Good.zip");
        write_zip(&good, &[("a.core", b"x")]);
        let loose = dir.path().join("notes.txt");
        fs::write(&loose, "hi").unwrap();

        let report = import(
            &RealRuntime,
            &Extractor::new(),
            &SafetyLimits::default(),
            &[evil.clone(), loose.clone(), good],
            &mods,
        );

        assert_eq!(report.imported, vec![mods.join("Good.zip")]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].0, evil);
        assert!(report.failed[0].1.contains("escapes"));
        assert_eq!(report.failed[1].0, loose);
        assert!(!mods.join("Evil.zip").exists());
    }
}
