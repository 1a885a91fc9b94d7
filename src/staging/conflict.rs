//! Conflict detection: which enabled selections ship files with the same name.
//!
//! Read-only. Directory sources are walked; archive sources are validated and
//! read from their listing, never extracted.

use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use super::payload::IgnoreList;
use crate::archive::{Extractor, SafetyLimits};
use crate::package::{PayloadSource, Selection};
use crate::runtime::Runtime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionConflicts {
    pub selection_id: String,
    pub display_name: String,
    /// File names this selection shares with another enabled selection.
    pub files: BTreeSet<String>,
}

impl SelectionConflicts {
    pub fn is_conflicted(&self) -> bool {
        !self.files.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub conflicting_names: BTreeSet<String>,
    /// One item per selection, in the order given.
    pub items: Vec<SelectionConflicts>,
    /// Sources that could not be listed, with the reason.
    pub unreadable: Vec<(PathBuf, String)>,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicting_names.is_empty()
    }

    pub fn conflicted(&self) -> impl Iterator<Item = &SelectionConflicts> {
        self.items.iter().filter(|i| i.is_conflicted())
    }
}

/// Count file names across all enabled selections; any name seen more than
/// once marks every selection that contributes it. A source shared by several
/// selections (a package's `shared_files`) is counted once.
#[tracing::instrument(skip_all, fields(count = selections.len()))]
pub fn detect_conflicts<R: Runtime>(
    runtime: &R,
    extractor: &Extractor,
    limits: &SafetyLimits,
    ignore: &IgnoreList,
    selections: &[Selection],
) -> ConflictReport {
    let mut report = ConflictReport::default();
    let mut names_by_source: BTreeMap<PayloadSource, Vec<String>> = BTreeMap::new();

    for selection in selections {
        for source in selection.payload_sources() {
            if names_by_source.contains_key(&source) {
                continue;
            }
            let names = match list_names(runtime, extractor, limits, &source) {
                Ok(names) => names,
                Err(reason) => {
                    warn!("Cannot list {:?} for conflict check: {}", source.path(), reason);
                    report.unreadable.push((source.path().to_path_buf(), reason));
                    Vec::new()
                }
            };
            let names = names.into_iter().filter(|n| !ignore.is_ignored(n)).collect();
            names_by_source.insert(source, names);
        }
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for names in names_by_source.values() {
        for name in names {
            *counts.entry(name.as_str()).or_default() += 1;
        }
    }
    report.conflicting_names = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect();

    for selection in selections {
        let files = selection
            .payload_sources()
            .iter()
            .filter_map(|source| names_by_source.get(source))
            .flatten()
            .filter(|name| report.conflicting_names.contains(*name))
            .cloned()
            .collect();
        report.items.push(SelectionConflicts {
            selection_id: selection.id(),
            display_name: selection.display_name(),
            files,
        });
    }

    debug!(
        "{} conflicting file name(s) across {} selection(s)",
        report.conflicting_names.len(),
        selections.len()
    );
    report
}

fn list_names<R: Runtime>(
    runtime: &R,
    extractor: &Extractor,
    limits: &SafetyLimits,
    source: &PayloadSource,
) -> Result<Vec<String>, String> {
    let paths: Vec<PathBuf> = match source {
        PayloadSource::Directory(dir) => runtime.walk_files(dir).map_err(|e| format!("{:#}", e))?,
        PayloadSource::Archive(archive) => extractor
            .validate(runtime, archive, limits)
            .map_err(|e| e.to_string())?
            .files()
            .map(|e| e.path.clone())
            .collect(),
    };
    Ok(paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .map(str::to_string)
        .collect())
}
