//! Package identity: turning a file or folder name into a stable key.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Trailing `-<pkg>-<major>-<minor>[-<build>]` version suffix, as produced by
/// common mod hosting sites.
static VERSION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)-\d+-\d+-\d+(?:-\d+)?$").expect("version suffix pattern is valid")
});

const ARCHIVE_SUFFIXES: [&str; 3] = [".tar.gz", ".tgz", ".zip"];

/// Derive the canonical key for a raw package name.
///
/// Strips version suffixes until none remains and trims whitespace. Never
/// fails, and a non-empty input always yields a non-empty key.
///
/// ```
/// use hfwmm::package::normalize;
/// assert_eq!(normalize("SuperArmor-100-2-5-12"), "SuperArmor");
/// assert_eq!(normalize("Cool Mod-5-1-0"), "Cool Mod");
/// assert_eq!(normalize("NoVersion"), "NoVersion");
/// ```
pub fn normalize(raw: &str) -> String {
    let mut current = raw.trim();
    while let Some(prefix) = VERSION_SUFFIX
        .captures(current)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
    {
        if prefix.is_empty() || prefix == current {
            break;
        }
        current = prefix;
    }

    if current.is_empty() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            raw.to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        current.to_string()
    }
}

/// If `name` ends in a supported archive extension, return the name without it.
pub fn archive_stem(name: &str) -> Option<&str> {
    let lower = name.to_ascii_lowercase();
    ARCHIVE_SUFFIXES.iter().find_map(|suffix| {
        if lower.ends_with(suffix) && name.len() > suffix.len() {
            Some(&name[..name.len() - suffix.len()])
        } else {
            None
        }
    })
}

/// The raw package name for a discovered path: the folder name, or the
/// archive file name without its extension.
pub fn raw_name_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    Some(archive_stem(name).unwrap_or(name).to_string())
}
