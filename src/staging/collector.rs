//! The staging collector: copies the payload files of every enabled selection
//! into the scratch directory the packaging tool reads from.
//!
//! Files are keyed by file name only, so two selections shipping the same name
//! collide; the [`CollisionPolicy`] decides which copy is kept and every
//! collision is reported. The scratch directory is rebuilt from nothing on each
//! run: work happens in `<scratch>.partial`, which is renamed into place once
//! complete.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::payload::PayloadRules;
use crate::archive::{Extractor, SafetyLimits, ValidatedArchive};
use crate::cleanup::{CleanupGuard, SharedCleanupContext};
use crate::error::PackError;
use crate::package::{PayloadSource, Selection};
use crate::runtime::Runtime;

pub const DEFAULT_OVERRIDE_ARTIFACT: &str = "package.20.01.core.stream";

/// Which copy survives when two selections ship the same file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The file processed last overwrites earlier ones.
    #[default]
    LastProcessed,
    /// The lowest priority number wins; on a tie the earlier file is kept.
    HighestPriority,
}

/// One file placed in the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingFile {
    pub source_package_key: String,
    pub output_name: String,
    /// The file on disk, or `<archive>/<entry>` for archive members.
    pub source_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub output_name: String,
    pub kept: StagingFile,
    pub discarded: Vec<StagingFile>,
}

/// A whole-package artifact copied straight into the archive-output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideCopy {
    pub source_package_key: String,
    pub source_path: PathBuf,
    pub dest: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingFailure {
    pub selection: String,
    pub source: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StagingReport {
    /// Files in the scratch directory, by output name.
    pub files: Vec<StagingFile>,
    pub collisions: Vec<Collision>,
    pub overrides: Vec<OverrideCopy>,
    pub failures: Vec<StagingFailure>,
    /// True if at least one file landed in the scratch directory.
    pub collected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingOptions {
    pub rules: PayloadRules,
    pub limits: SafetyLimits,
    pub policy: CollisionPolicy,
    /// File name that bypasses staging and goes to the archive-output folder.
    pub override_artifact: String,
}

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            rules: PayloadRules::default(),
            limits: SafetyLimits::default(),
            policy: CollisionPolicy::default(),
            override_artifact: DEFAULT_OVERRIDE_ARTIFACT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum Origin {
    File(PathBuf),
    /// Index into the plan's validated archives, then the entry index.
    Entry { archive: usize, index: usize },
}

#[derive(Debug, Clone)]
struct Planned {
    file: StagingFile,
    origin: Origin,
    priority: u8,
}

#[derive(Default)]
struct Plan {
    archives: Vec<ValidatedArchive>,
    payload: Vec<Planned>,
    overrides: Vec<Planned>,
    failures: Vec<StagingFailure>,
}

pub struct Collector<R: Runtime> {
    runtime: R,
    extractor: Extractor,
    options: StagingOptions,
    cleanup: Option<SharedCleanupContext>,
}

impl<R: Runtime> Collector<R> {
    pub fn new(runtime: R, options: StagingOptions) -> Self {
        Self {
            runtime,
            extractor: Extractor::new(),
            options,
            cleanup: None,
        }
    }

    /// Register the in-progress scratch directory so an interrupted run can
    /// remove it.
    pub fn with_cleanup(mut self, cleanup: SharedCleanupContext) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Stage `selections` in the order given into `scratch`. Per-item failures
    /// are recorded in the report; only a failure to build or move the
    /// scratch directory itself is an error, and then no scratch directory is
    /// left behind.
    #[tracing::instrument(skip(self, selections), fields(count = selections.len()))]
    pub fn stage(
        &self,
        selections: &[Selection],
        scratch: &Path,
        archive_out: &Path,
    ) -> Result<StagingReport, PackError> {
        let partial = partial_path(scratch);
        self.clear(scratch)?;
        self.clear(&partial)?;

        let plan = self.plan(selections);
        let (winners, collisions) = resolve(&plan.payload, self.options.policy);

        let guard = self
            .cleanup
            .as_ref()
            .map(|ctx| CleanupGuard::new(ctx.clone(), partial.clone()));

        let mut report = StagingReport {
            collisions,
            failures: plan.failures.clone(),
            ..StagingReport::default()
        };

        let placed = match self.materialize(&plan, &winners, &partial, &mut report) {
            Ok(placed) => placed,
            Err(e) => {
                self.discard(&partial);
                return Err(e);
            }
        };

        if let Err(e) = self.runtime.rename(&partial, scratch) {
            self.discard(&partial);
            return Err(PackError::StagingFailed(format!(
                "Failed to move {:?} to {:?}: {:#}",
                partial, scratch, e
            )));
        }
        if let Some(guard) = guard {
            guard.success();
        }

        report.overrides = self.copy_overrides(&plan, archive_out, &mut report.failures);
        report.collected = !placed.is_empty();
        report.files = placed;

        info!(
            "Staged {} file(s), {} collision(s), {} failure(s)",
            report.files.len(),
            report.collisions.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn clear(&self, dir: &Path) -> Result<(), PackError> {
        if self.runtime.exists(dir) {
            self.runtime.remove_dir_all(dir).map_err(|e| {
                PackError::StagingFailed(format!("Failed to clear {:?}: {:#}", dir, e))
            })?;
        }
        Ok(())
    }

    fn discard(&self, dir: &Path) {
        if self.runtime.exists(dir) {
            if let Err(e) = self.runtime.remove_dir_all(dir) {
                warn!("Failed to remove {:?}: {:#}", dir, e);
            }
        }
    }

    /// Enumerate every candidate file in processing order.
    fn plan(&self, selections: &[Selection]) -> Plan {
        let mut plan = Plan::default();
        let artifact = self.options.override_artifact.as_str();

        for selection in selections {
            let key = selection.package().canonical_key.clone();
            let priority = selection.priority();

            for source in selection.payload_sources() {
                let mut push = |file_name: &str, source_path: PathBuf, origin: Origin| {
                    let planned = Planned {
                        file: StagingFile {
                            source_package_key: key.clone(),
                            output_name: file_name.to_string(),
                            source_path,
                        },
                        origin,
                        priority,
                    };
                    if !artifact.is_empty() && file_name.eq_ignore_ascii_case(artifact) {
                        plan.overrides.push(planned);
                    } else if self.options.rules.is_payload(file_name) {
                        plan.payload.push(planned);
                    }
                };

                match &source {
                    PayloadSource::Directory(dir) => match self.runtime.walk_files(dir) {
                        Ok(files) => {
                            for file in files {
                                if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
                                    let name = name.to_string();
                                    push(&name, file.clone(), Origin::File(file));
                                }
                            }
                        }
                        Err(e) => plan.failures.push(StagingFailure {
                            selection: selection.display_name(),
                            source: dir.clone(),
                            reason: format!("{:#}", e),
                        }),
                    },
                    PayloadSource::Archive(path) => {
                        match self.extractor.validate(&self.runtime, path, &self.options.limits) {
                            Ok(validated) => {
                                let slot = plan.archives.len();
                                for entry in validated.files() {
                                    if let Some(name) = entry.file_name() {
                                        push(
                                            name,
                                            path.join(&entry.path),
                                            Origin::Entry {
                                                archive: slot,
                                                index: entry.index,
                                            },
                                        );
                                    }
                                }
                                plan.archives.push(validated);
                            }
                            Err(e) => {
                                warn!("Skipping archive {:?}: {}", path, e);
                                plan.failures.push(StagingFailure {
                                    selection: selection.display_name(),
                                    source: path.clone(),
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }

        debug!(
            "Planned {} payload file(s) and {} override artifact(s)",
            plan.payload.len(),
            plan.overrides.len()
        );
        plan
    }

    /// Write the winning files into `partial`. Returns what was placed.
    fn materialize(
        &self,
        plan: &Plan,
        winners: &BTreeMap<String, usize>,
        partial: &Path,
        report: &mut StagingReport,
    ) -> Result<Vec<StagingFile>, PackError> {
        self.runtime.create_dir_all(partial).map_err(|e| {
            PackError::StagingFailed(format!("Failed to create {:?}: {:#}", partial, e))
        })?;

        let mut placed = Vec::new();
        let mut by_archive: BTreeMap<usize, Vec<&Planned>> = BTreeMap::new();

        for planned in winners.values().map(|&i| &plan.payload[i]) {
            match &planned.origin {
                Origin::File(source) => {
                    let dest = partial.join(&planned.file.output_name);
                    match self.runtime.copy(source, &dest) {
                        Ok(_) => placed.push(planned.file.clone()),
                        Err(e) => report.failures.push(StagingFailure {
                            selection: planned.file.source_package_key.clone(),
                            source: source.clone(),
                            reason: format!("{:#}", e),
                        }),
                    }
                }
                Origin::Entry { archive, .. } => {
                    by_archive.entry(*archive).or_default().push(planned);
                }
            }
        }

        for (slot, files) in by_archive {
            let archive = &plan.archives[slot];
            let wanted: BTreeMap<usize, &str> = files
                .iter()
                .filter_map(|p| match p.origin {
                    Origin::Entry { index, .. } => Some((index, p.file.output_name.as_str())),
                    Origin::File(_) => None,
                })
                .collect();

            let result = archive.extract_into(&self.runtime, partial, |entry| {
                wanted.get(&entry.index).map(PathBuf::from)
            });
            match result {
                Ok(_) => placed.extend(files.iter().map(|p| p.file.clone())),
                Err(e) => {
                    let left = self.roll_back(partial, wanted.values().copied());
                    let reason = if left.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}; could not remove {:?}", e, left)
                    };
                    report.failures.push(StagingFailure {
                        selection: files
                            .first()
                            .map(|p| p.file.source_package_key.clone())
                            .unwrap_or_default(),
                        source: archive.path().to_path_buf(),
                        reason,
                    });
                }
            }
        }

        placed.sort_by(|a, b| a.output_name.cmp(&b.output_name));
        Ok(placed)
    }

    /// Remove whatever a failed archive managed to write into `partial`.
    /// Returns the files that could not be removed.
    fn roll_back<'n>(
        &self,
        partial: &Path,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Vec<PathBuf> {
        let mut left = Vec::new();
        for name in names {
            let path = partial.join(name);
            if !self.runtime.exists(&path) {
                continue;
            }
            if let Err(e) = self.runtime.remove_file(&path) {
                warn!("Failed to remove {:?}: {:#}", path, e);
                left.push(path);
            }
        }
        left
    }

    fn copy_overrides(
        &self,
        plan: &Plan,
        archive_out: &Path,
        failures: &mut Vec<StagingFailure>,
    ) -> Vec<OverrideCopy> {
        let mut copies = Vec::new();
        if plan.overrides.is_empty() {
            return copies;
        }
        if let Err(e) = self.runtime.create_dir_all(archive_out) {
            for planned in &plan.overrides {
                failures.push(StagingFailure {
                    selection: planned.file.source_package_key.clone(),
                    source: planned.file.source_path.clone(),
                    reason: format!("Failed to create {:?}: {:#}", archive_out, e),
                });
            }
            return copies;
        }

        for planned in &plan.overrides {
            let dest = archive_out.join(&planned.file.output_name);
            let result = match &planned.origin {
                Origin::File(source) => self.runtime.copy(source, &dest).map(|_| ()),
                Origin::Entry { archive, index } => plan.archives[*archive]
                    .extract_into(&self.runtime, archive_out, |entry| {
                        (entry.index == *index).then(|| PathBuf::from(&planned.file.output_name))
                    })
                    .map(|_| ())
                    .map_err(anyhow::Error::from),
            };
            match result {
                Ok(()) => {
                    info!("Copied override artifact {:?} to {:?}", planned.file.source_path, dest);
                    copies.push(OverrideCopy {
                        source_package_key: planned.file.source_package_key.clone(),
                        source_path: planned.file.source_path.clone(),
                        dest,
                    });
                }
                Err(e) => failures.push(StagingFailure {
                    selection: planned.file.source_package_key.clone(),
                    source: planned.file.source_path.clone(),
                    reason: format!("{:#}", e),
                }),
            }
        }
        copies
    }
}

/// `<scratch>.partial`, next to the scratch directory.
pub fn partial_path(scratch: &Path) -> PathBuf {
    let mut name = scratch.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Pick one planned file per output name. Returns the winner indices keyed by
/// name and a collision record for every name with more than one candidate.
fn resolve(payload: &[Planned], policy: CollisionPolicy) -> (BTreeMap<String, usize>, Vec<Collision>) {
    let mut winners: BTreeMap<String, usize> = BTreeMap::new();
    let mut contenders: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (i, planned) in payload.iter().enumerate() {
        let name = &planned.file.output_name;
        contenders.entry(name.clone()).or_default().push(i);
        match winners.get(name) {
            None => {
                winners.insert(name.clone(), i);
            }
            Some(&current) => {
                let replace = match policy {
                    CollisionPolicy::LastProcessed => true,
                    CollisionPolicy::HighestPriority => planned.priority < payload[current].priority,
                };
                if replace {
                    winners.insert(name.clone(), i);
                }
            }
        }
    }

    let collisions = contenders
        .into_iter()
        .filter(|(_, all)| all.len() > 1)
        .map(|(name, all)| {
            let kept = winners[&name];
            let discarded: Vec<StagingFile> = all
                .iter()
                .filter(|&&i| i != kept)
                .map(|&i| payload[i].file.clone())
                .collect();
            let sources: BTreeSet<&str> = all
                .iter()
                .map(|&i| payload[i].file.source_package_key.as_str())
                .collect();
            debug!("Collision on {} between {:?}", name, sources);
            Collision {
                output_name: name,
                kept: payload[kept].file.clone(),
                discarded,
            }
        })
        .collect();

    (winners, collisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::write_zip;
    use crate::cleanup;
    use crate::package::{Package, PackageRoot, Variant};
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self { dir: tempdir().unwrap() }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn scratch(&self) -> PathBuf {
            self.root().join("work/pack")
        }

        fn archive_out(&self) -> PathBuf {
            self.root().join("game/package/ar")
        }

        fn package(&self, name: &str, priority: u8, files: &[(&str, &str)]) -> Selection {
            let dir = self.root().join("mods").join(name);
            for (path, body) in files {
                let path = dir.join(path);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, body).unwrap();
            }
            let mut package = Package::new(name, PackageRoot::Directory(dir));
            package.priority = priority;
            Selection::Package(package)
        }

        fn stage(&self, selections: &[Selection], policy: CollisionPolicy) -> StagingReport {
            let options = StagingOptions {
                policy,
                ..StagingOptions::default()
            };
            Collector::new(RealRuntime, options)
                .stage(selections, &self.scratch(), &self.archive_out())
                .unwrap()
        }

        fn staged(&self, name: &str) -> String {
            fs::read_to_string(self.scratch().join(name)).unwrap()
        }
    }

    #[test]
    fn test_stage_copies_only_payload_flat() {
        let fx = Fixture::new();
        let a = fx.package(
            "A",
            5,
            &[
                ("meshes/deep/hero_mesh.stream", "a-mesh"),
                ("0badf00d.core", "a-core"),
                ("variation.png", "png"),
                ("streaming_graph.core", "nope"),
            ],
        );

        let report = fx.stage(&[a], CollisionPolicy::LastProcessed);

        assert!(report.collected);
        let names: Vec<_> = report.files.iter().map(|f| f.output_name.as_str()).collect();
        assert_eq!(names, vec!["0badf00d.core", "hero_mesh.stream"]);
        assert_eq!(fx.staged("hero_mesh.stream"), "a-mesh");
        assert!(!fx.scratch().join("variation.png").exists());
        assert!(!fx.scratch().join("meshes").exists());
        assert!(!partial_path(&fx.scratch()).exists());
    }

    #[test]
    fn test_stage_clears_previous_scratch() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.scratch()).unwrap();
        fs::write(fx.scratch().join("stale_mesh.stream"), "old").unwrap();
        let a = fx.package("A", 5, &[("x_mesh.stream", "a")]);

        fx.stage(&[a], CollisionPolicy::LastProcessed);
        assert!(!fx.scratch().join("stale_mesh.stream").exists());
        assert!(fx.scratch().join("x_mesh.stream").exists());
    }

    #[test]
    fn test_last_processed_wins_and_collision_is_reported() {
        let fx = Fixture::new();
        let a = fx.package("A", 0, &[("x_mesh.stream", "from-a")]);
        let b = fx.package("B", 5, &[("x_mesh.stream", "from-b")]);

        let report = fx.stage(&[a, b], CollisionPolicy::LastProcessed);

        assert_eq!(fx.staged("x_mesh.stream"), "from-b");
        assert_eq!(report.collisions.len(), 1);
        let collision = &report.collisions[0];
        assert_eq!(collision.output_name, "x_mesh.stream");
        assert_eq!(collision.kept.source_package_key, "B");
        assert_eq!(collision.discarded[0].source_package_key, "A");
    }

    #[test]
    fn test_highest_priority_wins_with_ties_keeping_earlier() {
        let fx = Fixture::new();
        let a = fx.package("A", 3, &[("x_mesh.stream", "from-a")]);
        let b = fx.package("B", 1, &[("x_mesh.stream", "from-b")]);
        let c = fx.package("C", 1, &[("x_mesh.stream", "from-c")]);
        let d = fx.package("D", 4, &[("x_mesh.stream", "from-d")]);

        let report = fx.stage(&[a, b, c, d], CollisionPolicy::HighestPriority);

        assert_eq!(fx.staged("x_mesh.stream"), "from-b");
        assert_eq!(report.collisions[0].kept.source_package_key, "B");
        assert_eq!(report.collisions[0].discarded.len(), 3);
    }

    #[test]
    fn test_staging_is_deterministic() {
        let fx = Fixture::new();
        let selections = vec![
            fx.package("A", 5, &[("x_mesh.stream", "a"), ("00ff.core", "a")]),
            fx.package("B", 2, &[("x_mesh.stream", "b"), ("y_texture.stream", "b")]),
        ];

        let first = fx.stage(&selections, CollisionPolicy::LastProcessed);
        let first_content: Vec<_> = first.files.iter().map(|f| fx.staged(&f.output_name)).collect();
        let second = fx.stage(&selections, CollisionPolicy::LastProcessed);
        let second_content: Vec<_> = second.files.iter().map(|f| fx.staged(&f.output_name)).collect();

        assert_eq!(first, second);
        assert_eq!(first_content, second_content);
    }

    #[test]
    fn test_nothing_collected() {
        let fx = Fixture::new();
        let a = fx.package("A", 5, &[("readme.txt", "hi")]);
        let report = fx.stage(&[a], CollisionPolicy::LastProcessed);
        assert!(!report.collected);
        assert!(report.files.is_empty());
        assert!(fx.scratch().is_dir());
    }

    #[test]
    fn test_override_artifact_goes_to_archive_out() {
        let fx = Fixture::new();
        let a = fx.package(
            "A",
            5,
            &[("Package.20.01.Core.Stream", "prebuilt"), ("x_mesh.stream", "m")],
        );

        let report = fx.stage(&[a], CollisionPolicy::LastProcessed);

        assert_eq!(report.overrides.len(), 1);
        let dest = fx.archive_out().join("Package.20.01.Core.Stream");
        assert_eq!(report.overrides[0].dest, dest);
        assert_eq!(fs::read_to_string(dest).unwrap(), "prebuilt");
        assert!(fx.scratch().join("x_mesh.stream").exists());
        assert!(!fx.scratch().join("Package.20.01.Core.Stream").exists());
    }

    #[test]
    fn test_archive_source_extracts_payload_only() {
        let fx = Fixture::new();
        let archive = fx.root().join("mods/Z.zip");
        fs::create_dir_all(archive.parent().unwrap()).unwrap();
        write_zip(
            &archive,
            &[
                ("Z/z_texture.stream", b"tex"),
                ("Z/preview.png", b"png"),
                ("Z/abc_def.core", b"core"),
                ("package.20.01.core.stream", b"prebuilt"),
            ],
        );
        let z = Selection::Package(Package::new("Z", PackageRoot::Archive(archive.clone())));

        let report = fx.stage(&[z], CollisionPolicy::LastProcessed);

        assert!(report.collected);
        assert_eq!(fx.staged("z_texture.stream"), "tex");
        assert_eq!(fx.staged("abc_def.core"), "core");
        assert!(!fx.scratch().join("preview.png").exists());
        assert_eq!(report.files[1].source_path, archive.join("Z/z_texture.stream"));
        assert!(fx.archive_out().join("package.20.01.core.stream").exists());
    }

    #[test]
    fn test_roll_back_reports_files_it_could_not_remove() {
        // --- Setup ---
        let partial = Path::new("/w/pack.partial");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .returning(|p| !p.ends_with("never_written.stream"));
        runtime
            .expect_remove_file()
            .with(eq(PathBuf::from("/w/pack.partial/a_mesh.stream")))
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_remove_file()
            .with(eq(PathBuf::from("/w/pack.partial/b_mesh.stream")))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("locked")));
        let collector = Collector::new(runtime, StagingOptions::default());

        // --- Execute ---
        let left = collector.roll_back(
            partial,
            ["a_mesh.stream", "b_mesh.stream", "never_written.stream"],
        );

        // --- Verify ---
        assert_eq!(left, vec![PathBuf::from("/w/pack.partial/b_mesh.stream")]);
    }

    #[test]
    fn test_oversized_archive_entry_is_rejected_before_writing() {
        let fx = Fixture::new();
        let archive = fx.root().join("Big.zip");
        write_zip(
            &archive,
            &[("a_mesh.stream", b"0123456789"), ("package.20.01.core.stream", b"o")],
        );
        let big = Selection::Package(Package::new("Big", PackageRoot::Archive(archive)));
        let options = StagingOptions {
            limits: SafetyLimits {
                max_file_size: 4,
                ..SafetyLimits::default()
            },
            ..StagingOptions::default()
        };

        let report = Collector::new(RealRuntime, options)
            .stage(&[big], &fx.scratch(), &fx.archive_out())
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("per-file limit"));
        assert!(!report.collected);
        assert_eq!(fs::read_dir(fx.scratch()).unwrap().count(), 0);
        assert!(!fx.archive_out().exists());
    }

    #[test]
    fn test_unsafe_archive_is_skipped_and_reported() {
        let fx = Fixture::new();
        let evil = fx.root().join("Evil.zip");
        write_zip(&evil, &[("../../evil_mesh.stream", b"x")]);
        let evil = Selection::Package(Package::new("Evil", PackageRoot::Archive(evil)));
        let good = fx.package("Good", 5, &[("g_mesh.stream", "g")]);

        let report = fx.stage(&[evil, good], CollisionPolicy::LastProcessed);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].selection, "Evil");
        assert!(report.collected);
        assert!(!fx.root().join("evil_mesh.stream").exists());
        assert!(!fx.scratch().parent().unwrap().parent().unwrap().join("evil_mesh.stream").exists());
    }

    #[test]
    fn test_variant_stages_shared_files_then_variant() {
        let fx = Fixture::new();
        let root = fx.root().join("mods/Outfit");
        for (path, body) in [
            ("shared_files/body_mesh.stream", "shared"),
            ("shared_files/common_texture.stream", "shared"),
            ("Red/variation.png", "png"),
            ("Red/body_mesh.stream", "red"),
        ] {
            fs::create_dir_all(root.join(path).parent().unwrap()).unwrap();
            fs::write(root.join(path), body).unwrap();
        }
        let mut package = Package::new("Outfit", PackageRoot::Directory(root.clone()));
        package.shared_dir = Some(root.join("shared_files"));
        let red = Selection::Variant {
            package,
            variant: Variant {
                name: "Red".into(),
                path: root.join("Red"),
                preview: None,
            },
        };

        fx.stage(&[red], CollisionPolicy::LastProcessed);
        assert_eq!(fx.staged("body_mesh.stream"), "red");
        assert_eq!(fx.staged("common_texture.stream"), "shared");
    }

    #[test]
    fn test_failed_rename_leaves_no_scratch() {
        // Building succeeds, moving the partial directory into place fails
        let mut runtime = MockRuntime::new();
        let scratch = PathBuf::from("/work/pack");
        let partial = PathBuf::from("/work/pack.partial");

        runtime.expect_exists().returning(|_| false);
        runtime.expect_create_dir_all().returning(|_| Ok(()));
        runtime
            .expect_walk_files()
            .returning(|dir| Ok(vec![dir.join("x_mesh.stream")]));
        runtime.expect_copy().returning(|_, _| Ok(1));
        runtime
            .expect_rename()
            .returning(|_, _| Err(anyhow::anyhow!("busy")));

        let selection = Selection::Package(Package::new(
            "A",
            PackageRoot::Directory(PathBuf::from("/mods/A")),
        ));
        let ctx = cleanup::new_shared();
        let err = Collector::new(runtime, StagingOptions::default())
            .with_cleanup(ctx.clone())
            .stage(&[selection], &scratch, Path::new("/game/ar"))
            .unwrap_err();

        assert!(matches!(err, PackError::StagingFailed(_)));
        // The partial directory stays registered for interrupt cleanup
        assert_eq!(ctx.lock().unwrap().paths, vec![partial]);
    }

    #[test]
    fn test_copy_failure_is_recorded_not_fatal() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        runtime.expect_create_dir_all().returning(|_| Ok(()));
        runtime.expect_walk_files().returning(|dir| {
            Ok(vec![dir.join("a_mesh.stream"), dir.join("b_mesh.stream")])
        });
        runtime.expect_copy().returning(|from, _| {
            if from.ends_with("a_mesh.stream") {
                Err(anyhow::anyhow!("locked"))
            } else {
                Ok(1)
            }
        });
        runtime.expect_rename().returning(|_, _| Ok(()));

        let selection = Selection::Package(Package::new(
            "A",
            PackageRoot::Directory(PathBuf::from("/mods/A")),
        ));
        let report = Collector::new(runtime, StagingOptions::default())
            .stage(&[selection], Path::new("/work/pack"), Path::new("/game/ar"))
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("locked"));
        assert_eq!(report.files.len(), 1);
        assert!(report.collected);
    }
}
