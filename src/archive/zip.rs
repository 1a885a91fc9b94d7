use crate::error::ArchiveError;
use crate::runtime::{Runtime, entry_path};
use log::debug;
use std::path::Path;
use zip::ZipArchive;

use super::{ArchiveEntry, ArchiveExtractor, EntryKind, ExtractTarget, bad_archive, write_capped};

/// Reader for .zip archives
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    fn open<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
    ) -> Result<ZipArchive<Box<dyn crate::runtime::ReadSeek>>, ArchiveError> {
        let reader = runtime
            .open_seekable(archive_path)
            .map_err(|e| bad_archive(archive_path, format!("{:#}", e)))?;
        ZipArchive::new(reader).map_err(|e| bad_archive(archive_path, e))
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".zip")
    }

    #[tracing::instrument(skip(self, runtime))]
    fn list_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
    ) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut archive = self.open(runtime, archive_path)?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            // Raw access reads the header only; nothing is decompressed.
            let file = archive
                .by_index_raw(index)
                .map_err(|e| bad_archive(archive_path, format!("entry {}: {}", index, e)))?;
            let name = file.name().to_string();
            let kind = if file.is_dir() {
                EntryKind::Dir
            } else if file.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            entries.push(ArchiveEntry {
                index,
                path: entry_path(&name),
                name,
                size: file.size(),
                kind,
            });
        }

        debug!("Listed {} zip entries in {:?}", entries.len(), archive_path);
        Ok(entries)
    }

    #[tracing::instrument(skip(self, runtime, targets))]
    fn extract_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        targets: &[ExtractTarget],
    ) -> Result<u64, ArchiveError> {
        let mut archive = self.open(runtime, archive_path)?;
        let mut written = 0;

        for target in targets {
            let mut file = archive
                .by_index(target.index)
                .map_err(|e| bad_archive(archive_path, format!("entry {}: {}", target.index, e)))?;
            let name = file.name().to_string();
            written += write_capped(runtime, &mut file, &name, target)?;
        }

        Ok(written)
    }
}
