//! One packaging pass: restore originals, check conflicts, stage, hand off.

use log::{debug, error, info, warn};
use std::path::PathBuf;

use crate::archive::Extractor;
use crate::cleanup::SharedCleanupContext;
use crate::config::{GameLayout, Settings};
use crate::error::PackError;
use crate::package::{Selection, SelectionList};
use crate::packaging::{PackTool, RestoreReport, handoff};
use crate::runtime::Runtime;
use crate::staging::{
    Collector, ConflictReport, SortOrder, StagingReport, detect_conflicts, order,
};

#[derive(Debug)]
pub enum PassOutcome {
    Packed { artifact: PathBuf },
    NothingCollected,
    Failed(PackError),
}

impl PassOutcome {
    /// The one line shown to the user.
    pub fn message(&self) -> String {
        match self {
            PassOutcome::Packed { artifact } => format!("Done. Installed {}", artifact.display()),
            PassOutcome::NothingCollected => {
                "No eligible files; nothing was packed.".to_string()
            }
            PassOutcome::Failed(e) => format!("Packing failed: {}", e),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PassOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub restore: RestoreReport,
    pub conflicts: ConflictReport,
    /// `None` if staging itself failed.
    pub staging: Option<StagingReport>,
}

pub struct PackPass<'a, R: Runtime, T: PackTool + ?Sized> {
    runtime: R,
    tool: &'a T,
    layout: &'a GameLayout,
    settings: &'a Settings,
    cleanup: SharedCleanupContext,
}

impl<'a, R, T> PackPass<'a, R, T>
where
    R: Runtime + Clone + 'static,
    T: PackTool + ?Sized,
{
    pub fn new(
        runtime: R,
        tool: &'a T,
        layout: &'a GameLayout,
        settings: &'a Settings,
        cleanup: SharedCleanupContext,
    ) -> Self {
        Self {
            runtime,
            tool,
            layout,
            settings,
            cleanup,
        }
    }

    /// Run the pass over `selections`, ordered by `sort`. Never returns an
    /// error; every failure ends up in the outcome.
    #[tracing::instrument(skip(self, selections), fields(count = selections.len()))]
    pub async fn run(&self, selections: SelectionList, sort: SortOrder) -> PassReport {
        let originals = self.layout.original_files(self.settings);
        if let Err(e) = originals.ensure_backups(&self.runtime) {
            warn!("Could not back up original files: {:#}", e);
        }
        let restore = originals.restore_originals(&self.runtime);
        for e in &restore.errors {
            warn!("{}", e);
        }

        let mut selections: Vec<_> = selections.iter().cloned().collect();
        order::apply(sort, &mut selections);

        let conflicts = detect_conflicts(
            &self.runtime,
            &Extractor::new(),
            &self.settings.safety_limits(),
            &self.settings.ignore_list(),
            &selections,
        );
        for item in conflicts.conflicted() {
            warn!(
                "{} shares {} file(s) with other enabled packages",
                item.display_name,
                item.files.len()
            );
        }

        let staging = match self.stage(selections).await {
            Ok(report) => report,
            Err(e) => {
                error!("{}", e);
                return PassReport {
                    outcome: PassOutcome::Failed(e),
                    restore,
                    conflicts,
                    staging: None,
                };
            }
        };

        for e in originals.refresh_org_copies(&self.runtime) {
            warn!("{}", e);
        }

        let outcome = if !staging.collected {
            info!("Nothing collected; skipping the packaging tool");
            PassOutcome::NothingCollected
        } else {
            let options = self.layout.handoff_options(self.settings);
            match handoff(&self.runtime, self.tool, &options).await {
                Ok(artifact) => PassOutcome::Packed { artifact },
                Err(e) => {
                    error!("{}", e);
                    PassOutcome::Failed(e)
                }
            }
        };

        PassReport {
            outcome,
            restore,
            conflicts,
            staging: Some(staging),
        }
    }

    /// File copying and archive extraction run on the blocking pool.
    async fn stage(&self, selections: Vec<Selection>) -> Result<StagingReport, PackError> {
        let collector = Collector::new(self.runtime.clone(), self.settings.staging_options())
            .with_cleanup(self.cleanup.clone());
        let scratch = self.layout.scratch.clone();
        let archive_out = self.layout.archive_out.clone();
        debug!("Staging {} selection(s) into {:?}", selections.len(), scratch);

        tokio::task::spawn_blocking(move || collector.stage(&selections, &scratch, &archive_out))
            .await
            .map_err(|e| PackError::StagingFailed(format!("staging task did not finish: {}", e)))?
    }
}
