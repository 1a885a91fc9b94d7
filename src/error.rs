//! Typed failures the engine reports to its caller.
//!
//! Plumbing code works with `anyhow::Result` and attaches context; these enums
//! exist where the caller has to react differently to different failures
//! (skip one archive, abort a pass, report one file and carry on).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Rejections and read failures for a single package archive. All of them are
/// confined to the offending archive; a scan skips it and moves on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("Unreadable or corrupt archive {path:?}: {reason}")]
    BadArchive { path: PathBuf, reason: String },

    #[error("Archive entry {entry:?} declares {size} bytes, over the {limit}-byte per-file limit")]
    OversizedEntry { entry: String, size: u64, limit: u64 },

    #[error("Archive entry {entry:?} escapes the extraction directory")]
    PathTraversal { entry: String },

    #[error("Archive expands to more than {limit} bytes (reached {total} at entry {entry:?})")]
    ArchiveTooLarge { entry: String, total: u64, limit: u64 },

    #[error("Unsupported archive format: {0:?}")]
    Unsupported(PathBuf),

    #[error("Failed to extract {entry:?} to {dest:?}: {reason}")]
    ExtractFailed {
        entry: String,
        dest: PathBuf,
        reason: String,
    },
}

impl ArchiveError {
    /// True for the three safety rejections, as opposed to I/O or format trouble.
    pub fn is_safety_rejection(&self) -> bool {
        matches!(
            self,
            ArchiveError::OversizedEntry { .. }
                | ArchiveError::PathTraversal { .. }
                | ArchiveError::ArchiveTooLarge { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Never propagated out of `Registry::load`; logged and replaced by an empty registry.
    #[error("Failed to load registry {path:?}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Failed to persist registry {path:?}: {reason}; the previous document was left in place")]
    PersistFailed { path: PathBuf, reason: String },
}

/// Failures that end the current packaging pass. Staged files and the registry
/// are left as they were.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("Packaging tool not found at {0:?}")]
    ToolMissing(PathBuf),

    #[error("Packaging tool failed ({status}): {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("Failed to remove stale artifact {path:?}: {reason}")]
    StaleArtifact { path: PathBuf, reason: String },

    #[error("Packaging tool finished but {path:?} did not appear within {waited:?}")]
    ArtifactNotProduced { path: PathBuf, waited: Duration },

    #[error("Failed to copy {from:?} to {to:?}: {reason}")]
    ArtifactCopyFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Staging failed: {0}")]
    StagingFailed(String),
}

/// Per-file failures while putting original game files back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("Permission denied writing {path:?}; close the game and try again")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to restore {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },
}

impl RestoreError {
    /// Classify an error from a runtime operation on `path`.
    pub fn from_anyhow(path: PathBuf, err: &anyhow::Error) -> Self {
        let denied = err
            .chain()
            .filter_map(|e| e.downcast_ref::<std::io::Error>())
            .any(|e| e.kind() == std::io::ErrorKind::PermissionDenied);
        if denied {
            RestoreError::PermissionDenied { path }
        } else {
            RestoreError::Io {
                path,
                reason: format!("{:#}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_safety_rejections_are_classified() {
        assert!(
            ArchiveError::PathTraversal {
                entry: "../x".into()
            }
            .is_safety_rejection()
        );
        assert!(
            !ArchiveError::BadArchive {
                path: "a.zip".into(),
                reason: "eof".into()
            }
            .is_safety_rejection()
        );
    }

    #[test]
    fn test_restore_error_detects_permission_denied_through_context() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        let err = Err::<(), _>(io)
            .context("Failed to copy file")
            .unwrap_err();
        let restore = RestoreError::from_anyhow(PathBuf::from("/g/streaming_graph.core"), &err);
        assert_eq!(
            restore,
            RestoreError::PermissionDenied {
                path: PathBuf::from("/g/streaming_graph.core")
            }
        );
    }

    #[test]
    fn test_restore_error_other_io() {
        let err = anyhow::anyhow!("disk on fire");
        let restore = RestoreError::from_anyhow(PathBuf::from("/g/x"), &err);
        assert!(matches!(restore, RestoreError::Io { .. }));
        assert!(restore.to_string().contains("disk on fire"));
    }
}
