//! Package archives: listing, safety validation and selective extraction.
//!
//! Nothing is ever written out of an archive that has not passed
//! [`safety::validate_entries`]: the only way to extract is through a
//! [`ValidatedArchive`], and the only way to get one is [`Extractor::validate`].

pub mod safety;
mod tar_gz;
mod zip;

use crate::error::ArchiveError;
use crate::runtime::{Runtime, escapes_root, is_path_under};
use log::{debug, warn};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use safety::SafetyLimits;
pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, hard links, devices. Listed for validation, never extracted.
    Other,
}

/// One entry of an archive listing, as declared by the archive itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the archive's own listing order.
    pub index: usize,
    /// Name exactly as stored in the archive.
    pub name: String,
    /// Lexically normalized relative path (see [`crate::runtime::entry_path`]).
    pub path: PathBuf,
    /// Declared uncompressed size in bytes.
    pub size: u64,
    pub kind: EntryKind,
}

impl ArchiveEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// First path component, if the entry lives inside a folder.
    pub fn top_folder(&self) -> Option<&str> {
        let mut components = self.path.components();
        let first = components.next()?;
        components.next()?;
        first.as_os_str().to_str()
    }

    /// Number of path components (a root-level file has depth 1).
    pub fn depth(&self) -> usize {
        self.path.components().count()
    }
}

/// A request to write one archive entry to `dest`, never more than `limit` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractTarget {
    pub index: usize,
    pub dest: PathBuf,
    pub limit: u64,
}

/// Trait for format-specific archive readers
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// List every entry without decompressing any payload.
    fn list_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
    ) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Write the requested entries. Returns the number of bytes written.
    fn extract_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        targets: &[ExtractTarget],
    ) -> Result<u64, ArchiveError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Zip,
    TarGz,
}

/// Dispatcher that selects the appropriate extractor based on archive format.
#[derive(Default)]
pub struct Extractor {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn format_of(&self, archive_path: &Path) -> Option<Format> {
        if self.zip.can_handle(archive_path) {
            Some(Format::Zip)
        } else if self.tar_gz.can_handle(archive_path) {
            Some(Format::TarGz)
        } else {
            None
        }
    }

    /// List the archive and run the safety checks over the whole listing.
    #[tracing::instrument(skip(self, runtime, limits))]
    pub fn validate<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        limits: &SafetyLimits,
    ) -> Result<ValidatedArchive, ArchiveError> {
        let format = self
            .format_of(archive_path)
            .ok_or_else(|| ArchiveError::Unsupported(archive_path.to_path_buf()))?;
        let entries = self.list_entries(runtime, archive_path)?;
        let total = safety::validate_entries(&entries, limits)?;
        debug!(
            "Validated {:?}: {} entries, {} bytes uncompressed",
            archive_path,
            entries.len(),
            total
        );
        Ok(ValidatedArchive {
            path: archive_path.to_path_buf(),
            format,
            entries,
        })
    }
}

impl ArchiveExtractor for Extractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        self.format_of(archive_path).is_some()
    }

    fn list_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
    ) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        match self.format_of(archive_path) {
            Some(Format::Zip) => self.zip.list_entries(runtime, archive_path),
            Some(Format::TarGz) => self.tar_gz.list_entries(runtime, archive_path),
            None => Err(ArchiveError::Unsupported(archive_path.to_path_buf())),
        }
    }

    fn extract_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        targets: &[ExtractTarget],
    ) -> Result<u64, ArchiveError> {
        match self.format_of(archive_path) {
            Some(Format::Zip) => self.zip.extract_entries(runtime, archive_path, targets),
            Some(Format::TarGz) => self.tar_gz.extract_entries(runtime, archive_path, targets),
            None => Err(ArchiveError::Unsupported(archive_path.to_path_buf())),
        }
    }
}

/// An archive whose full listing passed the safety checks.
#[derive(Debug, Clone)]
pub struct ValidatedArchive {
    path: PathBuf,
    format: Format,
    entries: Vec<ArchiveEntry>,
}

impl ValidatedArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Regular-file entries only.
    pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| e.is_file())
    }

    /// Extract every file entry for which `select` returns a destination path
    /// relative to `root`. Returns the absolute paths written, in listing order.
    pub fn extract_into<R, F>(
        &self,
        runtime: &R,
        root: &Path,
        mut select: F,
    ) -> Result<Vec<PathBuf>, ArchiveError>
    where
        R: Runtime,
        F: FnMut(&ArchiveEntry) -> Option<PathBuf>,
    {
        let mut targets = Vec::new();
        for entry in self.files() {
            let Some(relative) = select(entry) else {
                continue;
            };
            let dest = root.join(&relative);
            if escapes_root(&relative) || !is_path_under(&dest, root) {
                return Err(ArchiveError::PathTraversal {
                    entry: entry.name.clone(),
                });
            }
            targets.push(ExtractTarget {
                index: entry.index,
                dest,
                limit: entry.size,
            });
        }

        if targets.is_empty() {
            return Ok(Vec::new());
        }

        match self.format {
            Format::Zip => ZipExtractor.extract_entries(runtime, &self.path, &targets)?,
            Format::TarGz => TarGzExtractor.extract_entries(runtime, &self.path, &targets)?,
        };

        Ok(targets.into_iter().map(|t| t.dest).collect())
    }
}

/// Create `target.dest` (and its parents) and copy at most `target.limit` bytes
/// into it. An entry that carries more data than it declared is an error.
pub(crate) fn write_capped<R, Rd>(
    runtime: &R,
    reader: &mut Rd,
    entry_name: &str,
    target: &ExtractTarget,
) -> Result<u64, ArchiveError>
where
    R: Runtime,
    Rd: Read + ?Sized,
{
    let fail = |reason: String| ArchiveError::ExtractFailed {
        entry: entry_name.to_string(),
        dest: target.dest.clone(),
        reason,
    };

    if let Some(parent) = target.dest.parent() {
        runtime
            .create_dir_all(parent)
            .map_err(|e| fail(format!("{:#}", e)))?;
    }
    let mut out = runtime
        .create_file(&target.dest)
        .map_err(|e| fail(format!("{:#}", e)))?;

    let copied = {
        let mut limited = Read::take(&mut *reader, target.limit);
        std::io::copy(&mut limited, &mut out).map_err(|e| fail(e.to_string()))?
    };
    let mut extra = [0u8; 1];
    if copied == target.limit && reader.read(&mut extra).map_err(|e| fail(e.to_string()))? > 0 {
        drop(out);
        let mut reason = format!("entry holds more than its declared {} bytes", target.limit);
        if let Err(e) = runtime.remove_file(&target.dest) {
            warn!("Failed to remove truncated {:?}: {:#}", target.dest, e);
            reason.push_str(&format!("; truncated copy left at {:?}", target.dest));
        }
        return Err(fail(reason));
    }
    out.flush().map_err(|e| fail(e.to_string()))?;
    Ok(copied)
}

fn bad_archive(path: &Path, reason: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::BadArchive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
