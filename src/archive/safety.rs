//! Pre-extraction safety checks for untrusted package archives.

use serde::{Deserialize, Serialize};

use super::ArchiveEntry;
use crate::error::ArchiveError;
use crate::runtime::escapes_root;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_TOTAL_UNCOMPRESSED_SIZE: u64 = 800 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyLimits {
    pub max_file_size: u64,
    pub max_total_uncompressed_size: u64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_total_uncompressed_size: DEFAULT_MAX_TOTAL_UNCOMPRESSED_SIZE,
        }
    }
}

/// Check every entry in listing order and return the total declared size.
///
/// Per entry: declared size against the per-file limit, then path containment,
/// then the running total against the archive limit. The first failure wins.
pub fn validate_entries(
    entries: &[ArchiveEntry],
    limits: &SafetyLimits,
) -> Result<u64, ArchiveError> {
    let mut total: u64 = 0;
    for entry in entries {
        if entry.size > limits.max_file_size {
            return Err(ArchiveError::OversizedEntry {
                entry: entry.name.clone(),
                size: entry.size,
                limit: limits.max_file_size,
            });
        }

        if escapes_root(&entry.path) {
            return Err(ArchiveError::PathTraversal {
                entry: entry.name.clone(),
            });
        }

        total = total.saturating_add(entry.size);
        if total > limits.max_total_uncompressed_size {
            return Err(ArchiveError::ArchiveTooLarge {
                entry: entry.name.clone(),
                total,
                limit: limits.max_total_uncompressed_size,
            });
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::EntryKind;
    use crate::runtime::entry_path;

    const MIB: u64 = 1024 * 1024;

    fn entry(index: usize, name: &str, size: u64) -> ArchiveEntry {
        ArchiveEntry {
            index,
            name: name.to_string(),
            path: entry_path(name),
            size,
            kind: EntryKind::File,
        }
    }

    #[test]
    fn test_accepts_reasonable_archive() {
        let entries = vec![entry(0, "a/x_mesh.stream", 10), entry(1, "b.core", 20)];
        assert_eq!(
            validate_entries(&entries, &SafetyLimits::default()).unwrap(),
            30
        );
    }

    #[test]
    fn test_rejects_oversized_entry() {
        let entries = vec![entry(0, "huge_texture.stream", 60 * MIB)];
        let err = validate_entries(&entries, &SafetyLimits::default()).unwrap_err();
        assert_eq!(
            err,
            ArchiveError::OversizedEntry {
                entry: "huge_texture.stream".into(),
                size: 60 * MIB,
                limit: 50 * MIB,
            }
        );
    }

    #[test]
    fn test_rejects_traversal_regardless_of_size() {
        for size in [0, 1, 49 * MIB] {
            let entries = vec![entry(0, "../../evil.core", size)];
            let err = validate_entries(&entries, &SafetyLimits::default()).unwrap_err();
            assert!(matches!(err, ArchiveError::PathTraversal { .. }), "{err:?}");
        }
    }

    #[test]
    fn test_rejects_absolute_entry() {
        let entries = vec![entry(0, "/etc/cron.d/evil", 5)];
        assert!(matches!(
            validate_entries(&entries, &SafetyLimits::default()),
            Err(ArchiveError::PathTraversal { .. })
        ));
    }

    #[test]
    fn test_rejects_zip_bomb_total() {
        let entries: Vec<_> = (0..17)
            .map(|i| entry(i, &format!("part{i}.core"), 49 * MIB))
            .collect();
        let err = validate_entries(&entries, &SafetyLimits::default()).unwrap_err();
        match err {
            ArchiveError::ArchiveTooLarge { entry, total, limit } => {
                assert_eq!(entry, "part16.core");
                assert_eq!(total, 17 * 49 * MIB);
                assert_eq!(limit, 800 * MIB);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_first_failure_in_listing_order_wins() {
        let limits = SafetyLimits {
            max_file_size: 100,
            max_total_uncompressed_size: 1000,
        };
        let entries = vec![entry(0, "../up.core", 10), entry(1, "big.core", 500)];
        assert!(matches!(
            validate_entries(&entries, &limits),
            Err(ArchiveError::PathTraversal { .. })
        ));

        let entries = vec![entry(0, "big.core", 500), entry(1, "../up.core", 10)];
        assert!(matches!(
            validate_entries(&entries, &limits),
            Err(ArchiveError::OversizedEntry { .. })
        ));
    }

    #[test]
    fn test_inner_parent_components_that_stay_inside_are_fine() {
        let entries = vec![entry(0, "Red/../shared_files/a.core", 1)];
        assert!(validate_entries(&entries, &SafetyLimits::default()).is_ok());
    }
}
