use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use super::Runtime;

/// Temp file used while replacing `path`: same directory, hidden, per process.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Replace `path` with `contents` so that readers see either the old or the
/// new document, never a truncated one. On failure the temp file is removed
/// and `path` is untouched.
#[tracing::instrument(skip(runtime, contents))]
pub fn write_atomic<R: Runtime + ?Sized>(runtime: &R, path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        runtime
            .create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp = temp_path_for(path);
    let result = runtime
        .write(&temp, contents)
        .with_context(|| format!("Failed to write {:?}", temp))
        .and_then(|_| {
            runtime
                .rename(&temp, path)
                .with_context(|| format!("Failed to move {:?} onto {:?}", temp, path))
        });

    if result.is_err() {
        if let Err(e) = runtime.remove_file(&temp) {
            debug!("Failed to remove temp file {:?}: {}", temp, e);
        }
    }
    result
}
