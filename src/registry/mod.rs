//! Persistent metadata registry.
//!
//! One JSON document maps each canonical key to a [`RegistryEntry`]; the
//! reserved `_meta` key holds book-keeping. The registry is an owned value:
//! load it, pass it to whatever needs it, persist it.

mod diff;
mod entry;

pub use diff::{FieldChange, MergeOutcome, WATCHED_FIELDS, diff};
pub use entry::{RegistryEntry, RegistryMeta, SCHEMA_VERSION, validate_priority};

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::RegistryError;
use crate::package::{MetaSnapshot, Package};
use crate::runtime::{Runtime, write_atomic};
use entry::RESERVED_FIELDS;

pub const REGISTRY_FILE: &str = "registry.json";
pub const META_KEY: &str = "_meta";

#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    meta: RegistryMeta,
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    /// An empty registry that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            meta: RegistryMeta::default(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the document at `path`. Never fails: a missing, unreadable or
    /// unparseable document yields an empty registry, and malformed entries
    /// are skipped.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Self {
        match Self::try_load(runtime, path) {
            Ok(registry) => registry,
            Err(e) => {
                warn!("{}; starting with an empty registry", e);
                Self::empty(path)
            }
        }
    }

    fn try_load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self, RegistryError> {
        let mut registry = Self::empty(path);
        if !runtime.exists(path) {
            debug!("No registry at {:?}", path);
            return Ok(registry);
        }

        let load_failed = |reason: String| RegistryError::LoadFailed {
            path: path.to_path_buf(),
            reason,
        };
        let content = runtime
            .read_to_string(path)
            .map_err(|e| load_failed(format!("{:#}", e)))?;
        let document: Map<String, Value> =
            serde_json::from_str(&content).map_err(|e| load_failed(e.to_string()))?;

        for (key, value) in document {
            if key == META_KEY {
                match serde_json::from_value(value) {
                    Ok(meta) => registry.meta = meta,
                    Err(e) => warn!("Ignoring malformed {} in {:?}: {}", META_KEY, path, e),
                }
                continue;
            }
            match serde_json::from_value::<RegistryEntry>(value) {
                Ok(entry) => {
                    registry.entries.insert(key, entry);
                }
                Err(e) => warn!("Skipping malformed registry entry {:?}: {}", key, e),
            }
        }

        debug!("Loaded {} registry entries from {:?}", registry.len(), path);
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &RegistryMeta {
        &self.meta
    }

    pub fn get(&self, key: &str) -> Option<&RegistryEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold a freshly scanned package into its entry.
    ///
    /// Fresh metadata fields overwrite stored ones; stored fields the package
    /// no longer supplies are kept. `priority` is validated on its own and an
    /// invalid value leaves the stored one in place. Snapshots are replaced.
    #[tracing::instrument(skip(self, package, snapshot), fields(key = %package.canonical_key))]
    pub fn merge(&mut self, package: &Package, snapshot: &MetaSnapshot) -> MergeOutcome {
        let key = &package.canonical_key;
        let previous = self.entries.get(key).cloned();

        let mut entry = previous
            .clone()
            .unwrap_or_else(|| RegistryEntry::new(package.source_path().to_path_buf()));
        entry.source_path = package.source_path().to_path_buf();
        entry
            .fields
            .insert("name".to_string(), Value::from(package.display_name.clone()));

        if let Some(meta) = &snapshot.meta {
            for (field, value) in &meta.fields {
                if field == "priority" {
                    match validate_priority(value) {
                        Some(priority) => entry.priority = priority,
                        None => warn!(
                            "Ignoring invalid priority {} for {}; keeping {}",
                            value, key, entry.priority
                        ),
                    }
                } else if RESERVED_FIELDS.contains(&field.as_str()) {
                    debug!("Ignoring reserved field {:?} in metadata for {}", field, key);
                } else {
                    entry.fields.insert(field.clone(), value.clone());
                }
            }
        }
        entry.content_fingerprint = snapshot.fingerprint.clone();
        entry.content_mtime = snapshot.mtime;

        let outcome = match &previous {
            None => MergeOutcome::Added,
            Some(old) if *old == entry => MergeOutcome::Unchanged,
            Some(old) => {
                let stamps_moved = old.content_fingerprint != entry.content_fingerprint
                    || old.content_mtime != entry.content_mtime;
                let changes = diff(old, &entry, &WATCHED_FIELDS);
                if changes.is_empty() && !stamps_moved {
                    // Only unwatched fields or the source path moved.
                    debug!("Entry {} updated without notable changes", key);
                    MergeOutcome::Unchanged
                } else {
                    MergeOutcome::Changed(changes)
                }
            }
        };

        self.entries.insert(key.clone(), entry);
        outcome
    }

    /// Set a package's priority from user input. Only integers `0..=5` are
    /// accepted.
    pub fn set_priority(&mut self, key: &str, value: &Value) -> Result<u8> {
        let priority = validate_priority(value)
            .ok_or_else(|| anyhow!("Invalid priority {}: expected an integer from 0 to 5", value))?;
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| anyhow!("Package {} is not in the registry", key))?;
        entry.priority = priority;
        Ok(priority)
    }

    /// Serialize the whole document, `_meta` included.
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        let mut document = Map::new();
        document.insert(META_KEY.to_string(), serde_json::to_value(&self.meta)?);
        for (key, entry) in &self.entries {
            document.insert(key.clone(), serde_json::to_value(entry)?);
        }
        Ok(Value::Object(document))
    }

    /// Write the document atomically. On failure the previous document is
    /// left as it was.
    #[tracing::instrument(skip(self, runtime))]
    pub fn persist<R: Runtime>(&mut self, runtime: &R) -> Result<(), RegistryError> {
        let persist_failed = |reason: String| RegistryError::PersistFailed {
            path: self.path.clone(),
            reason,
        };

        let mut meta = self.meta.clone();
        meta.schema_version = SCHEMA_VERSION;
        meta.entry_count = self.entries.len();
        meta.last_write = Some(chrono::Utc::now().to_rfc3339());

        let previous_meta = std::mem::replace(&mut self.meta, meta);
        let bytes = self
            .to_document()
            .and_then(|doc| serde_json::to_vec_pretty(&doc))
            .map_err(|e| persist_failed(e.to_string()));
        let result = bytes.and_then(|bytes| {
            write_atomic(runtime, &self.path, &bytes).map_err(|e| persist_failed(format!("{:#}", e)))
        });

        match result {
            Ok(()) => {
                debug!("Persisted {} registry entries to {:?}", self.entries.len(), self.path);
                Ok(())
            }
            Err(e) => {
                self.meta = previous_meta;
                Err(e)
            }
        }
    }

    /// Drop entries whose key is not in `existing`. Persists only if something
    /// was removed. Returns the removed keys.
    #[tracing::instrument(skip(self, runtime, existing))]
    pub fn prune<R: Runtime>(
        &mut self,
        runtime: &R,
        existing: &BTreeSet<String>,
    ) -> Result<Vec<String>, RegistryError> {
        let removed: Vec<String> = self
            .entries
            .keys()
            .filter(|k| !existing.contains(*k))
            .cloned()
            .collect();
        if removed.is_empty() {
            return Ok(removed);
        }

        for key in &removed {
            self.entries.remove(key);
            info!("Pruned registry entry {}", key);
        }
        self.persist(runtime)?;
        Ok(removed)
    }
}
