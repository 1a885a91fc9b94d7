//! Scan: one discovery pass over the packages root that rebuilds the catalog
//! and brings the registry up to date.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::archive::{Extractor, ValidatedArchive};
use crate::cleanup::{CleanupGuard, SharedCleanupContext};
use crate::config::{GameLayout, Settings};
use crate::error::RegistryError;
use crate::package::{
    Catalog, MetaSnapshot, Package, PackageRoot, archive_variant_names, find_candidates,
    find_shared_dir, normalize, raw_name_of, resolve_dir_variants,
};
use crate::registry::{MergeOutcome, Registry};
use crate::runtime::Runtime;

/// A candidate that could not be turned into a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct ScanReport {
    pub catalog: Catalog,
    pub registry: Registry,
    /// Merge outcome per key, `Unchanged` ones included.
    pub notices: BTreeMap<String, MergeOutcome>,
    pub pruned: Vec<String>,
    pub skipped: Vec<SkippedItem>,
    /// Set if the registry could not be written; the catalog is still valid.
    pub persist_error: Option<RegistryError>,
}

impl ScanReport {
    pub fn added(&self) -> impl Iterator<Item = &str> {
        self.notices
            .iter()
            .filter(|(_, o)| matches!(o, MergeOutcome::Added))
            .map(|(k, _)| k.as_str())
    }

    pub fn changed(&self) -> impl Iterator<Item = (&str, &MergeOutcome)> {
        self.notices
            .iter()
            .filter(|(_, o)| matches!(o, MergeOutcome::Changed(_)))
            .map(|(k, o)| (k.as_str(), o))
    }
}

pub struct Scanner<'a, R: Runtime> {
    runtime: &'a R,
    layout: &'a GameLayout,
    settings: &'a Settings,
    extractor: Extractor,
    cleanup: Option<SharedCleanupContext>,
}

impl<'a, R: Runtime> Scanner<'a, R> {
    pub fn new(runtime: &'a R, layout: &'a GameLayout, settings: &'a Settings) -> Self {
        Self {
            runtime,
            layout,
            settings,
            extractor: Extractor::new(),
            cleanup: None,
        }
    }

    pub fn with_cleanup(mut self, cleanup: SharedCleanupContext) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Discover, validate and resolve every candidate, then merge, persist
    /// and prune the registry. Only a packages root that cannot be listed is
    /// an error; bad candidates are reported as skipped.
    #[tracing::instrument(skip(self))]
    pub fn scan(&self) -> Result<ScanReport> {
        let candidates = find_candidates(self.runtime, &self.layout.mods_dir)
            .with_context(|| format!("Failed to scan {:?}", self.layout.mods_dir))?;
        debug!("Found {} candidate(s)", candidates.len());

        let mut registry = Registry::load(self.runtime, &self.layout.registry_path);
        let mut catalog = Catalog::new();
        let mut notices: BTreeMap<String, MergeOutcome> = BTreeMap::new();
        let mut skipped = Vec::new();
        // Keys whose package is still on disk, loadable or not.
        let mut existing: BTreeSet<String> = BTreeSet::new();

        for path in candidates {
            if let Some(raw) = raw_name_of(&path) {
                existing.insert(normalize(&raw));
            }
            let (mut package, snapshot) = match self.load_package(&path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!("Skipping {:?}: {:#}", path, e);
                    skipped.push(SkippedItem {
                        path,
                        reason: format!("{:#}", e),
                    });
                    continue;
                }
            };

            let key = package.canonical_key.clone();
            let outcome = registry.merge(&package, &snapshot);
            if let Some(entry) = registry.get(&key) {
                package.priority = entry.priority;
            }
            notices
                .entry(key.clone())
                .and_modify(|o| {
                    if !matches!(o, MergeOutcome::Added) {
                        *o = outcome.clone();
                    }
                })
                .or_insert(outcome);

            if !catalog.upsert(package) {
                warn!("Duplicate package key {}; {:?} replaces the earlier one", key, path);
            }
        }

        let mut persist_error = registry.persist(self.runtime).err();
        existing.extend(catalog.keys().map(str::to_string));
        let pruned = match registry.prune(self.runtime, &existing) {
            Ok(pruned) => pruned,
            Err(e) => {
                persist_error.get_or_insert(e);
                Vec::new()
            }
        };
        if let Some(e) = &persist_error {
            warn!("{}", e);
        }

        info!(
            "Scanned {} package(s), {} skipped, {} pruned",
            catalog.len(),
            skipped.len(),
            pruned.len()
        );
        Ok(ScanReport {
            catalog,
            registry,
            notices,
            pruned,
            skipped,
            persist_error,
        })
    }

    fn load_package(&self, path: &Path) -> Result<(Package, MetaSnapshot)> {
        let raw = raw_name_of(path).with_context(|| format!("Unusable name {:?}", path))?;
        let metadata_file = &self.settings.metadata_file;

        if self.runtime.is_dir(path) {
            let mut package = Package::new(raw, PackageRoot::Directory(path.to_path_buf()));
            package.variants = resolve_dir_variants(self.runtime, path)?;
            package.shared_dir = find_shared_dir(self.runtime, path);
            let snapshot = MetaSnapshot::read_dir(self.runtime, path, metadata_file, None)?;
            return Ok((package, snapshot));
        }

        let archive = self
            .extractor
            .validate(self.runtime, path, &self.settings.safety_limits())?;
        let package = Package::new(raw, PackageRoot::Archive(path.to_path_buf()));
        let key = package.canonical_key.clone();

        if archive_variant_names(archive.entries()).is_empty() {
            let scratch = self.layout.extracted_dir.join(format!(".meta-{}", key));
            let snapshot =
                MetaSnapshot::read_archive(self.runtime, &archive, metadata_file, &scratch)?;
            return Ok((package, snapshot));
        }

        let dir = self.extract_package(&archive, &key)?;
        let mut package = Package {
            root: PackageRoot::Extracted {
                archive: path.to_path_buf(),
                dir: dir.clone(),
            },
            ..package
        };
        package.variants = resolve_dir_variants(self.runtime, &dir)?;
        package.shared_dir = find_shared_dir(self.runtime, &dir);
        let snapshot = MetaSnapshot::read_dir(self.runtime, &dir, metadata_file, Some(path))?;
        Ok((package, snapshot))
    }

    /// Unpack a validated archive into `<extracted>/<key>`, replacing any
    /// earlier copy.
    fn extract_package(&self, archive: &ValidatedArchive, key: &str) -> Result<PathBuf> {
        let dir = self.layout.extracted_dir.join(key);
        let partial = self.layout.extracted_dir.join(format!("{}.partial", key));
        for stale in [&partial, &dir] {
            if self.runtime.exists(stale) {
                self.runtime
                    .remove_dir_all(stale)
                    .with_context(|| format!("Failed to clear {:?}", stale))?;
            }
        }

        let guard = self
            .cleanup
            .as_ref()
            .map(|ctx| CleanupGuard::new(ctx.clone(), partial.clone()));
        let extracted = archive
            .extract_into(self.runtime, &partial, |e| Some(e.path.clone()))
            .map_err(anyhow::Error::from)
            .and_then(|written| {
                if written.is_empty() {
                    self.runtime.create_dir_all(&partial)?;
                }
                self.runtime
                    .rename(&partial, &dir)
                    .with_context(|| format!("Failed to move {:?} to {:?}", partial, dir))
            });
        settle_partial(self.runtime, &partial, extracted.is_ok(), guard);
        extracted?;
        debug!("Extracted {:?} to {:?}", archive.path(), dir);
        Ok(dir)
    }
}

/// Remove a failed `.partial` extraction. The path stays registered for
/// interrupt cleanup until it is known to be gone.
fn settle_partial<R: Runtime>(
    runtime: &R,
    partial: &Path,
    succeeded: bool,
    guard: Option<CleanupGuard>,
) {
    if !succeeded && runtime.exists(partial) {
        if let Err(e) = runtime.remove_dir_all(partial) {
            warn!("Failed to remove {:?}: {:#}", partial, e);
            return;
        }
    }
    if let Some(guard) = guard {
        guard.success();
    }
}

/// Run a scan with the default collaborators.
pub fn scan<R: Runtime>(
    runtime: &R,
    layout: &GameLayout,
    settings: &Settings,
    cleanup: Option<SharedCleanupContext>,
) -> Result<ScanReport> {
    let scanner = Scanner::new(runtime, layout, settings);
    match cleanup {
        Some(ctx) => scanner.with_cleanup(ctx).scan(),
        None => scanner.scan(),
    }
}
