use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

use super::identity::archive_stem;
use crate::runtime::Runtime;

/// Find candidate packages directly below the packages root: every folder and
/// every supported archive, sorted by name. Hidden entries are skipped.
///
/// Directory structure: `<mods>/<package>/` or `<mods>/<package>.zip`
#[tracing::instrument(skip(runtime))]
pub fn find_candidates<R: Runtime>(runtime: &R, mods_root: &Path) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();

    if !runtime.exists(mods_root) {
        debug!("Packages root {:?} does not exist", mods_root);
        return Ok(candidates);
    }

    for path in runtime.read_dir(mods_root)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if runtime.is_dir(&path) || (runtime.is_file(&path) && archive_stem(name).is_some()) {
            candidates.push(path);
        }
    }

    debug!("Found {} candidate package(s)", candidates.len());
    Ok(candidates)
}
