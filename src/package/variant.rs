//! Variant resolution: which sub-folders of a package are alternative looks
//! the user picks between.
//!
//! A sub-folder is a variant if it holds a preview image directly inside it.
//! The `shared_files` folder is never a variant.

use anyhow::{Result, bail};
use log::debug;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::model::{Package, Selection, Variant};
use crate::archive::ArchiveEntry;
use crate::runtime::Runtime;

pub const SHARED_FILES_DIR: &str = "shared_files";

pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "webp", "bmp", "gif", "dds"];

/// Stem keywords, most preferred first.
const PREVIEW_KEYWORDS: [&str; 4] = ["preview", "variation", "screenshot", "image"];

/// Outcome of looking for variants in a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantResolution {
    /// No variants; the package root is the payload.
    RootOnly,
    /// Exactly one variant, selected automatically.
    Single(Variant),
    /// Several variants; the caller has to choose.
    Choose(Vec<Variant>),
}

impl From<Vec<Variant>> for VariantResolution {
    fn from(mut variants: Vec<Variant>) -> Self {
        match variants.len() {
            0 => VariantResolution::RootOnly,
            1 => VariantResolution::Single(variants.remove(0)),
            _ => VariantResolution::Choose(variants),
        }
    }
}

/// External decision for a package with several variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantChoice {
    One(String),
    All,
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

pub fn is_shared_files(name: &str) -> bool {
    name.eq_ignore_ascii_case(SHARED_FILES_DIR)
}

/// Pick the preview image among `files`: the first image whose stem contains
/// the highest-ranked keyword, else the first image at all.
pub fn find_preview(files: &[PathBuf]) -> Option<PathBuf> {
    let images: Vec<&PathBuf> = files.iter().filter(|f| is_image(f)).collect();
    PREVIEW_KEYWORDS
        .iter()
        .find_map(|keyword| {
            images.iter().find(|f| {
                f.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_ascii_lowercase().contains(*keyword))
                    .unwrap_or(false)
            })
        })
        .or_else(|| images.first())
        .map(|f| (*f).clone())
}

/// Find variant folders directly below `root`, in name order.
#[tracing::instrument(skip(runtime))]
pub fn resolve_dir_variants<R: Runtime>(runtime: &R, root: &Path) -> Result<Vec<Variant>> {
    let mut variants = Vec::new();
    for child in runtime.read_dir(root)? {
        if !runtime.is_dir(&child) {
            continue;
        }
        let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_shared_files(name) {
            continue;
        }

        let files: Vec<PathBuf> = runtime
            .read_dir(&child)?
            .into_iter()
            .filter(|p| runtime.is_file(p))
            .collect();
        if let Some(preview) = find_preview(&files) {
            debug!("Variant {:?} with preview {:?}", name, preview);
            variants.push(Variant {
                name: name.to_string(),
                path: child.clone(),
                preview: Some(preview),
            });
        }
    }
    Ok(variants)
}

/// Names of top-level archive folders that hold an image directly inside,
/// sorted. Decided from the listing alone, before anything is extracted.
pub fn archive_variant_names(entries: &[ArchiveEntry]) -> Vec<String> {
    let names: BTreeSet<String> = entries
        .iter()
        .filter(|e| e.is_file() && e.depth() == 2 && is_image(&e.path))
        .filter_map(|e| e.top_folder())
        .filter(|folder| !is_shared_files(folder))
        .map(str::to_string)
        .collect();
    names.into_iter().collect()
}

/// Locate the package's `shared_files` folder, if any.
pub fn find_shared_dir<R: Runtime>(runtime: &R, root: &Path) -> Option<PathBuf> {
    let shared = root.join(SHARED_FILES_DIR);
    runtime.is_dir(&shared).then_some(shared)
}

/// Turn a package plus an optional choice into the selections to enable.
pub fn select_variants(package: &Package, choice: Option<&VariantChoice>) -> Result<Vec<Selection>> {
    let as_selection = |variant: &Variant| Selection::Variant {
        package: package.clone(),
        variant: variant.clone(),
    };

    match (VariantResolution::from(package.variants.clone()), choice) {
        (VariantResolution::RootOnly, None) => Ok(vec![Selection::Package(package.clone())]),
        (VariantResolution::RootOnly, Some(_)) => {
            bail!("Package {} has no variants", package.display_name)
        }
        (VariantResolution::Single(variant), None | Some(VariantChoice::All)) => {
            Ok(vec![as_selection(&variant)])
        }
        (VariantResolution::Single(_) | VariantResolution::Choose(_), Some(VariantChoice::One(name))) => {
            match package.variant(name) {
                Some(variant) => Ok(vec![as_selection(variant)]),
                None => bail!(
                    "Package {} has no variant named {:?} (available: {})",
                    package.display_name,
                    name,
                    variant_names(package)
                ),
            }
        }
        (VariantResolution::Choose(variants), Some(VariantChoice::All)) => {
            Ok(variants.iter().map(as_selection).collect())
        }
        (VariantResolution::Choose(_), None) => bail!(
            "Package {} has {} variants, choose one of: {}",
            package.display_name,
            package.variants.len(),
            variant_names(package)
        ),
    }
}

fn variant_names(package: &Package) -> String {
    package
        .variants
        .iter()
        .map(|v| v.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
