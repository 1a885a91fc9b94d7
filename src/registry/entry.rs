use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::package::{DEFAULT_PRIORITY, MAX_PRIORITY};

pub const SCHEMA_VERSION: u32 = 1;

/// Keys that belong to the entry itself and are never taken from a package's
/// metadata file.
pub(crate) const RESERVED_FIELDS: [&str; 3] =
    ["source_path", "content_fingerprint", "content_mtime"];

/// One tracked package in the registry document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub source_path: PathBuf,

    #[serde(default = "default_priority", deserialize_with = "lenient_priority")]
    pub priority: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_mtime: Option<u64>,

    /// Free-form metadata: name, author, version, description, link, ...
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RegistryEntry {
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            source_path,
            priority: DEFAULT_PRIORITY,
            content_fingerprint: None,
            content_mtime: None,
            fields: Map::new(),
        }
    }

    /// Value of a metadata field as it appears in the document.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "priority" => Some(Value::from(self.priority)),
            "source_path" => Some(Value::from(self.source_path.to_string_lossy().into_owned())),
            _ => self.fields.get(name).cloned(),
        }
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Book-keeping stored under the reserved `_meta` key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegistryMeta {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// RFC 3339 timestamp of the last successful persist.
    #[serde(default)]
    pub last_write: Option<String>,
    #[serde(default)]
    pub entry_count: usize,
}

impl Default for RegistryMeta {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_write: None,
            entry_count: 0,
        }
    }
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

/// Accept only JSON integers in `0..=5`. Strings, floats, negatives and
/// out-of-range integers are rejected.
pub fn validate_priority(value: &Value) -> Option<u8> {
    value
        .as_u64()
        .filter(|p| *p <= u64::from(MAX_PRIORITY))
        .map(|p| p as u8)
}

/// A stored priority that fails validation reads back as the default instead
/// of failing the whole entry.
fn lenient_priority<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(validate_priority(&value).unwrap_or(DEFAULT_PRIORITY))
}
