use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::archive::ValidatedArchive;
use crate::runtime::Runtime;

pub const DEFAULT_METADATA_FILE: &str = "modinfo.json";

/// Fields a package may supply about itself (`author`, `version`,
/// `description`, `link`, `priority`, ...). Unknown fields are kept.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct PackageMeta {
    pub fields: Map<String, Value>,
}

impl PackageMeta {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => bail!("expected a JSON object, found {}", json_kind(&other)),
        }
    }

    #[tracing::instrument(skip(runtime, path))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read(path)?;
        Self::parse(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Hex SHA-256 of `content`.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// What a scan learns from a package's metadata file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaSnapshot {
    /// Parsed content; `None` if the file is absent or unparseable.
    pub meta: Option<PackageMeta>,
    pub fingerprint: Option<String>,
    pub mtime: Option<u64>,
}

impl MetaSnapshot {
    fn from_bytes(origin: &Path, bytes: &[u8], mtime: Option<u64>) -> Self {
        let meta = match PackageMeta::parse(bytes) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Ignoring unparseable metadata {:?}: {}", origin, e);
                None
            }
        };
        Self {
            meta,
            fingerprint: Some(fingerprint(bytes)),
            mtime,
        }
    }

    /// Read `<dir>/<file_name>`. The mtime is taken from `mtime_source`, which
    /// is the file itself for plain folders and the archive for extracted ones.
    #[tracing::instrument(skip(runtime))]
    pub fn read_dir<R: Runtime>(
        runtime: &R,
        dir: &Path,
        file_name: &str,
        mtime_source: Option<&Path>,
    ) -> Result<Self> {
        let path = dir.join(file_name);
        if !runtime.is_file(&path) {
            return Ok(Self::default());
        }
        let bytes = runtime.read(&path)?;
        let mtime = runtime.modified_secs(mtime_source.unwrap_or(path.as_path())).ok();
        Ok(Self::from_bytes(&path, &bytes, mtime))
    }

    /// Extract the shallowest entry named `file_name` alone into `scratch`,
    /// read it, and remove the copy. The mtime is the archive's.
    #[tracing::instrument(skip(runtime, archive))]
    pub fn read_archive<R: Runtime>(
        runtime: &R,
        archive: &ValidatedArchive,
        file_name: &str,
        scratch: &Path,
    ) -> Result<Self> {
        let Some(entry) = archive
            .files()
            .filter(|e| e.file_name() == Some(file_name))
            .min_by_key(|e| e.depth())
        else {
            return Ok(Self::default());
        };
        let wanted = entry.index;

        let written = archive.extract_into(runtime, scratch, |e| {
            (e.index == wanted).then(|| PathBuf::from(file_name))
        })?;
        let Some(copy) = written.first() else {
            return Ok(Self::default());
        };

        let bytes = runtime.read(copy);
        if let Err(e) = runtime.remove_dir_all(scratch) {
            debug!("Failed to remove metadata scratch {:?}: {}", scratch, e);
        }
        let bytes = bytes?;
        let mtime = runtime.modified_secs(archive.path()).ok();
        Ok(Self::from_bytes(archive.path(), &bytes, mtime))
    }
}
