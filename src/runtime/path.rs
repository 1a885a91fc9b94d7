//! Lexical path helpers. None of these touch the filesystem.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// A `..` that cannot be folded into a preceding component is kept, which is
/// exactly what makes an archive entry escape its extraction root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    result.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    result.pop();
                } else {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if `path` is under `dir` by comparing normalized path components.
/// `/a/b/../../etc` is NOT under `/a`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Turn a raw archive entry name into a normalized relative path.
///
/// Archive producers on Windows write `\` separators; both are accepted.
pub fn entry_path(raw_name: &str) -> PathBuf {
    let unified = raw_name.replace('\\', "/");
    let mut path = PathBuf::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => path.push(Component::ParentDir.as_os_str()),
            other => path.push(other),
        }
    }
    // An absolute name like "/etc/passwd" or "C:/x" must not lose its anchor.
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return PathBuf::from(unified);
    }
    normalize_path(&path)
}

/// True if a (normalized) relative entry path would land outside the directory
/// it is extracted into: it keeps a `..`, or it is rooted.
pub fn escapes_root(path: &Path) -> bool {
    if path.is_absolute() || path.has_root() {
        return true;
    }
    let text = path.to_string_lossy();
    if has_drive_prefix(&text) {
        return true;
    }
    normalize_path(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
