//! Staging: selection ordering, conflict detection and payload collection.

mod collector;
mod conflict;
pub mod order;
mod payload;

pub use collector::{
    Collector, Collision, CollisionPolicy, DEFAULT_OVERRIDE_ARTIFACT, OverrideCopy,
    StagingFailure, StagingFile, StagingOptions, StagingReport, partial_path,
};
pub use conflict::{ConflictReport, SelectionConflicts, detect_conflicts};
pub use order::{SortOrder, sort_ascending_priority, sort_descending_priority};
pub use payload::{
    DEFAULT_IGNORE_EXTENSIONS, DEFAULT_PAYLOAD_EXTENSIONS, IgnoreList, PayloadRules,
};
