//! Pristine copies of the game files a pass overwrites.
//!
//! The first time the game folder is seen, each protected file is copied into
//! the backup directory and beside itself as `<name>.org`. Neither copy is ever
//! replaced by `ensure_backups`, so they keep the state from before any mod
//! was packed.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::RestoreError;
use crate::runtime::Runtime;

pub const PROTECTED_FILES: [&str; 2] = ["streaming_graph.core", "streaming_links.stream"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
    /// Entries removed from the archive-output directory.
    pub cleared: Vec<PathBuf>,
    pub errors: Vec<RestoreError>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalFiles {
    package_dir: PathBuf,
    backup_dir: PathBuf,
    archive_out: PathBuf,
    protected: Vec<String>,
}

impl OriginalFiles {
    pub fn new(package_dir: PathBuf, backup_dir: PathBuf, archive_out: PathBuf) -> Self {
        Self {
            package_dir,
            backup_dir,
            archive_out,
            protected: PROTECTED_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_protected(mut self, names: Vec<String>) -> Self {
        self.protected = names;
        self
    }

    pub fn protected(&self) -> &[String] {
        &self.protected
    }

    pub fn original_path(&self, name: &str) -> PathBuf {
        self.package_dir.join(name)
    }

    pub fn backup_path(&self, name: &str) -> PathBuf {
        self.backup_dir.join(name)
    }

    pub fn org_path(&self, name: &str) -> PathBuf {
        self.package_dir.join(format!("{}.org", name))
    }

    /// Take the one-time backups. Returns the copies created by this call.
    #[tracing::instrument(skip(self, runtime))]
    pub fn ensure_backups<R: Runtime>(&self, runtime: &R) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for name in &self.protected {
            let original = self.original_path(name);
            if !runtime.exists(&original) {
                debug!("No original {:?} to back up", original);
                continue;
            }

            let backup = self.backup_path(name);
            if !runtime.exists(&backup) {
                runtime
                    .create_dir_all(&self.backup_dir)
                    .with_context(|| format!("Failed to create {:?}", self.backup_dir))?;
                copy_file(runtime, &original, &backup)?;
                created.push(backup);
            }

            let org = self.org_path(name);
            if !runtime.exists(&org) {
                copy_file(runtime, &original, &org)?;
                created.push(org);
            }
        }
        if !created.is_empty() {
            info!("Backed up {} original file(s)", created.len());
        }
        Ok(created)
    }

    /// Put every backed-up original back in place and empty the
    /// archive-output directory. Each failure is recorded and the rest still
    /// run.
    #[tracing::instrument(skip(self, runtime))]
    pub fn restore_originals<R: Runtime>(&self, runtime: &R) -> RestoreReport {
        let mut report = RestoreReport::default();

        for name in &self.protected {
            let backup = self.backup_path(name);
            if !runtime.exists(&backup) {
                continue;
            }
            let original = self.original_path(name);
            match copy_file(runtime, &backup, &original) {
                Ok(()) => report.restored.push(original),
                Err(e) => {
                    warn!("Could not restore {:?}: {:#}", original, e);
                    report.errors.push(RestoreError::from_anyhow(original, &e));
                }
            }
        }

        self.clear_archive_out(runtime, &mut report);
        debug!(
            "Restored {} file(s), cleared {} archive(s), {} error(s)",
            report.restored.len(),
            report.cleared.len(),
            report.errors.len()
        );
        report
    }

    /// Rewrite every `<name>.org` from its backup.
    #[tracing::instrument(skip(self, runtime))]
    pub fn refresh_org_copies<R: Runtime>(&self, runtime: &R) -> Vec<RestoreError> {
        let mut errors = Vec::new();
        for name in &self.protected {
            let backup = self.backup_path(name);
            if !runtime.exists(&backup) {
                continue;
            }
            let org = self.org_path(name);
            if let Err(e) = copy_file(runtime, &backup, &org) {
                warn!("Could not refresh {:?}: {:#}", org, e);
                errors.push(RestoreError::from_anyhow(org, &e));
            }
        }
        errors
    }

    fn clear_archive_out<R: Runtime>(&self, runtime: &R, report: &mut RestoreReport) {
        if !runtime.is_dir(&self.archive_out) {
            return;
        }
        let children = match runtime.read_dir(&self.archive_out) {
            Ok(children) => children,
            Err(e) => {
                report
                    .errors
                    .push(RestoreError::from_anyhow(self.archive_out.clone(), &e));
                return;
            }
        };
        for child in children {
            let result = if runtime.is_dir(&child) {
                runtime.remove_dir_all(&child)
            } else {
                runtime.remove_file(&child)
            };
            match result {
                Ok(()) => report.cleared.push(child),
                Err(e) => {
                    warn!("Could not delete {:?}: {:#}", child, e);
                    report.errors.push(RestoreError::from_anyhow(child, &e));
                }
            }
        }
    }
}

fn copy_file<R: Runtime>(runtime: &R, from: &Path, to: &Path) -> Result<()> {
    runtime
        .copy(from, to)
        .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
    Ok(())
}
