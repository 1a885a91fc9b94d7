//! Which files are game payload and which are noise.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PAYLOAD_EXTENSIONS: [&str; 2] = ["stream", "core"];

/// Extensions the conflict detector never counts: previews, docs, manifests.
pub const DEFAULT_IGNORE_EXTENSIONS: [&str; 14] = [
    "png", "jpg", "jpeg", "webp", "bmp", "gif", "dds", "txt", "md", "json", "ini", "url", "nfo",
    "pdf",
];

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn stem_of(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
}

/// Allow-list deciding which files get staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRules {
    pub extensions: Vec<String>,
    /// Apply the stem rules for `.stream` and `.core` files.
    pub strict_names: bool,
}

impl Default for PayloadRules {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_PAYLOAD_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            strict_names: true,
        }
    }
}

impl PayloadRules {
    /// `.stream`: stem contains `_` and ends in `mesh` or `texture`.
    /// `.core`: stem with underscores removed is hexadecimal.
    pub fn is_payload(&self, file_name: &str) -> bool {
        let Some(ext) = extension_of(file_name) else {
            return false;
        };
        if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
            return false;
        }
        if !self.strict_names {
            return true;
        }

        let stem = stem_of(file_name);
        match ext.as_str() {
            "stream" => {
                let lower = stem.to_ascii_lowercase();
                stem.contains('_') && (lower.ends_with("mesh") || lower.ends_with("texture"))
            }
            "core" => {
                let digits = stem.replace('_', "");
                !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
            }
            _ => true,
        }
    }
}

/// Extensions skipped when counting file-name collisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList {
    extensions: Vec<String>,
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_EXTENSIONS.iter().map(|e| e.to_string()))
    }
}

impl IgnoreList {
    pub fn new(extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_ignored(&self, file_name: &str) -> bool {
        extension_of(file_name)
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }
}
