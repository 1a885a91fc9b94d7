//! Interrupt cleanup for half-built scratch state.
//!
//! Work that builds a directory in place (`pack.partial`, an archive being
//! unpacked into the extraction scratch) registers the path here while it is
//! in progress. If the process is interrupted, everything still registered is
//! removed, so the next pass never sees a partial directory.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Paths that are mid-construction and must not survive an interruption.
#[derive(Debug, Default)]
pub struct CleanupContext {
    #[cfg(test)]
    pub paths: Vec<PathBuf>,
    #[cfg(not(test))]
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove every registered path from disk, newest first, and forget them.
    /// Returns how many were removed.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in self.paths.drain(..).rev() {
            debug!("Cleaning up: {:?}", path);
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else if path.exists() {
                std::fs::remove_file(&path)
            } else {
                continue;
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to clean up {:?}: {}", path, e),
            }
        }
        removed
    }
}

pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Lock the context even if a panicking thread poisoned it; the path list is
/// still meaningful.
pub fn lock(ctx: &SharedCleanupContext) -> MutexGuard<'_, CleanupContext> {
    ctx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps a path registered until [`CleanupGuard::success`] is called.
/// Dropping the guard without success leaves the path registered.
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
    path: PathBuf,
}

impl CleanupGuard {
    pub fn new(ctx: SharedCleanupContext, path: PathBuf) -> Self {
        lock(&ctx).add(path.clone());
        Self { ctx, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path is complete; stop tracking it.
    pub fn success(self) {
        lock(&self.ctx).remove(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cleanup_context_add_is_idempotent() {
        let mut ctx = CleanupContext::new();
        let path = PathBuf::from("/work/pack.partial");

        ctx.add(path.clone());
        ctx.add(path.clone());
        assert_eq!(ctx.paths.len(), 1);

        ctx.remove(&path);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_cleanup_removes_partial_directory() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("pack.partial");
        fs::create_dir(&partial).unwrap();
        fs::write(partial.join("x_mesh.stream"), "m").unwrap();

        let mut ctx = CleanupContext::new();
        ctx.add(partial.clone());

        assert_eq!(ctx.cleanup(), 1);
        assert!(!partial.exists());
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_cleanup_removes_files_and_skips_missing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".registry.json.1.tmp");
        fs::write(&file, "{}").unwrap();

        let mut ctx = CleanupContext::new();
        ctx.add(file.clone());
        ctx.add(dir.path().join("never-created"));

        assert_eq!(ctx.cleanup(), 1);
        assert!(!file.exists());
    }

    #[test]
    fn test_cleanup_guard_success_unregisters() {
        let ctx = new_shared();
        let guard = CleanupGuard::new(Arc::clone(&ctx), PathBuf::from("/work/pack.partial"));
        assert_eq!(guard.path(), Path::new("/work/pack.partial"));
        assert_eq!(lock(&ctx).paths.len(), 1);

        guard.success();
        assert!(lock(&ctx).is_empty());
    }

    #[test]
    fn test_cleanup_guard_drop_keeps_path_registered() {
        let ctx = new_shared();
        {
            let _guard = CleanupGuard::new(Arc::clone(&ctx), PathBuf::from("/work/extracted/A"));
        }
        assert_eq!(lock(&ctx).paths, vec![PathBuf::from("/work/extracted/A")]);
    }
}
