use crate::error::ArchiveError;
use crate::runtime::{Runtime, entry_path};
use flate2::read::GzDecoder;
use log::debug;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tar::{Archive, EntryType};

use super::{ArchiveEntry, ArchiveExtractor, EntryKind, ExtractTarget, bad_archive, write_capped};

/// Reader for gzip-compressed tarballs (.tar.gz / .tgz)
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzExtractor;

impl TarGzExtractor {
    fn open<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
    ) -> Result<Archive<GzDecoder<Box<dyn Read + Send>>>, ArchiveError> {
        let reader = runtime
            .open(archive_path)
            .map_err(|e| bad_archive(archive_path, format!("{:#}", e)))?;
        Ok(Archive::new(GzDecoder::new(reader)))
    }
}

fn kind_of(entry_type: EntryType) -> EntryKind {
    if entry_type.is_file() {
        EntryKind::File
    } else if entry_type.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::Other
    }
}

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    #[tracing::instrument(skip(self, runtime))]
    fn list_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
    ) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut archive = self.open(runtime, archive_path)?;
        let iter = archive
            .entries()
            .map_err(|e| bad_archive(archive_path, e))?;

        let mut entries = Vec::new();
        for (index, entry) in iter.enumerate() {
            let entry = entry.map_err(|e| bad_archive(archive_path, format!("entry {}: {}", index, e)))?;
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let size = entry
                .header()
                .size()
                .map_err(|e| bad_archive(archive_path, format!("entry {:?}: {}", name, e)))?;
            entries.push(ArchiveEntry {
                index,
                path: entry_path(&name),
                name,
                size,
                kind: kind_of(entry.header().entry_type()),
            });
        }

        debug!("Listed {} tar entries in {:?}", entries.len(), archive_path);
        Ok(entries)
    }

    /// Tarballs are sequential, so this is a second streaming pass that picks
    /// the requested indices as they go by.
    #[tracing::instrument(skip(self, runtime, targets))]
    fn extract_entries<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        targets: &[ExtractTarget],
    ) -> Result<u64, ArchiveError> {
        let wanted: HashMap<usize, &ExtractTarget> = targets.iter().map(|t| (t.index, t)).collect();
        let Some(&last) = wanted.keys().max() else {
            return Ok(0);
        };

        let mut archive = self.open(runtime, archive_path)?;
        let iter = archive
            .entries()
            .map_err(|e| bad_archive(archive_path, e))?;

        let mut written = 0;
        let mut found = 0;
        for (index, entry) in iter.enumerate() {
            if index > last {
                break;
            }
            let mut entry =
                entry.map_err(|e| bad_archive(archive_path, format!("entry {}: {}", index, e)))?;
            let Some(target) = wanted.get(&index) else {
                continue;
            };
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            written += write_capped(runtime, &mut entry, &name, target)?;
            found += 1;
        }

        if found != wanted.len() {
            return Err(bad_archive(
                archive_path,
                format!("expected {} entries, found {}", wanted.len(), found),
            ));
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::write_tar_gz;
    use crate::runtime::RealRuntime;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::{self, File};
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_can_handle_tar_gz() {
        let extractor = TarGzExtractor;
        assert!(extractor.can_handle(Path::new("file.tar.gz")));
        assert!(extractor.can_handle(Path::new("file.TGZ")));
        assert!(!extractor.can_handle(Path::new("file.zip")));
        assert!(!extractor.can_handle(Path::new("file.tar")));
    }

    #[test]
    fn test_list_entries_with_directories() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("mod.tar.gz");
        {
            let file = File::create(&archive_path).unwrap();
            let enc = GzEncoder::new(file, Compression::default());
            let mut tar = tar::Builder::new(enc);

            let mut header = tar::Header::new_gnu();
            header.set_path("Blue/").unwrap();
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_cksum();
            tar.append(&header, &[][..]).unwrap();

            let mut header = tar::Header::new_gnu();
            header.set_path("Blue/x_mesh.stream").unwrap();
            header.set_size(4);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, &b"mesh"[..]).unwrap();

            tar.into_inner().unwrap().finish().unwrap();
        }

        let entries = TarGzExtractor
            .list_entries(&RealRuntime, &archive_path)
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Dir);
        assert_eq!(entries[1].kind, EntryKind::File);
        assert_eq!(entries[1].size, 4);
        assert_eq!(entries[1].path, PathBuf::from("Blue/x_mesh.stream"));
    }

    #[test]
    fn test_list_corrupted_archive() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("mod.tar.gz");
        fs::write(&archive_path, "definitely not gzip").unwrap();

        let result = TarGzExtractor.list_entries(&RealRuntime, &archive_path);
        assert!(matches!(result, Err(ArchiveError::BadArchive { .. })));
    }

    #[test]
    fn test_extract_picks_requested_indices() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("mod.tgz");
        write_tar_gz(
            &archive_path,
            &[("a.core", b"aa"), ("b.core", b"bbb"), ("c.core", b"c")],
        );

        let out = dir.path().join("out");
        let written = TarGzExtractor
            .extract_entries(
                &RealRuntime,
                &archive_path,
                &[
                    ExtractTarget {
                        index: 0,
                        dest: out.join("a.core"),
                        limit: 2,
                    },
                    ExtractTarget {
                        index: 2,
                        dest: out.join("c.core"),
                        limit: 1,
                    },
                ],
            )
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(fs::read(out.join("a.core")).unwrap(), b"aa");
        assert_eq!(fs::read(out.join("c.core")).unwrap(), b"c");
        assert!(!out.join("b.core").exists());
    }

    #[test]
    fn test_extract_missing_index_is_an_error() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("mod.tar.gz");
        write_tar_gz(&archive_path, &[("a.core", b"aa")]);

        let result = TarGzExtractor.extract_entries(
            &RealRuntime,
            &archive_path,
            &[ExtractTarget {
                index: 5,
                dest: dir.path().join("out/x.core"),
                limit: 1,
            }],
        );
        assert!(matches!(result, Err(ArchiveError::BadArchive { .. })));
    }

    #[test]
    fn test_extract_nothing_requested() {
        let dir = tempdir().unwrap();
        let written = TarGzExtractor
            .extract_entries(&RealRuntime, &dir.path().join("absent.tar.gz"), &[])
            .unwrap();
        assert_eq!(written, 0);
    }
}
