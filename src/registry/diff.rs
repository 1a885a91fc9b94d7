use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::entry::RegistryEntry;

/// Fields whose changes are worth telling the user about.
pub const WATCHED_FIELDS: [&str; 6] = ["name", "author", "version", "description", "priority", "link"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| match v {
            None => "(none)".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        write!(f, "{}: {} -> {}", self.field, show(&self.old), show(&self.new))
    }
}

/// What merging a freshly scanned package did to its entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Added,
    /// Content or fields changed. The list holds the watched fields that
    /// differ and may be empty when only the metadata file's content moved.
    Changed(Vec<FieldChange>),
    Unchanged,
}

/// Compare the `watched` fields of two entries, in `watched` order.
pub fn diff(old: &RegistryEntry, new: &RegistryEntry, watched: &[&str]) -> Vec<FieldChange> {
    watched
        .iter()
        .filter_map(|field| {
            let (before, after) = (old.field(field), new.field(field));
            (before != after).then(|| FieldChange {
                field: field.to_string(),
                old: before,
                new: after,
            })
        })
        .collect()
}
