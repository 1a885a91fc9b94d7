//! Turning command-line selection strings into an ordered selection list.

use anyhow::{Result, anyhow, bail};
use log::debug;
use std::str::FromStr;

use crate::package::{Catalog, SelectionList, VariantChoice, normalize, select_variants};

/// A selection specification.
/// Format: "Key", "Key/Variant" or "Key/*" (every variant)
#[derive(Debug, PartialEq, Clone)]
pub struct SelectionSpec {
    pub key: String,
    pub choice: Option<VariantChoice>,
}

impl std::fmt::Display for SelectionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.choice {
            None => write!(f, "{}", self.key),
            Some(VariantChoice::All) => write!(f, "{}/*", self.key),
            Some(VariantChoice::One(name)) => write!(f, "{}/{}", self.key, name),
        }
    }
}

impl FromStr for SelectionSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, choice) = match s.split_once('/') {
            Some((key, "*")) => (key, Some(VariantChoice::All)),
            Some((key, variant)) => {
                let variant = variant.trim();
                if variant.is_empty() || variant.contains('/') {
                    return Err(anyhow!(
                        "Invalid selection {:?}. Expected 'Key', 'Key/Variant' or 'Key/*'.",
                        s
                    ));
                }
                (key, Some(VariantChoice::One(variant.to_string())))
            }
            None => (s, None),
        };

        let key = normalize(key);
        if key.trim().is_empty() {
            return Err(anyhow!("Invalid selection {:?}: empty package name.", s));
        }
        Ok(SelectionSpec { key, choice })
    }
}

/// Resolve specs against the catalog, in the order given. Duplicates are
/// dropped; an unknown key or an ambiguous package is an error.
pub fn resolve_selections(catalog: &Catalog, specs: &[SelectionSpec]) -> Result<SelectionList> {
    let mut list = SelectionList::new();
    for spec in specs {
        let Some(package) = catalog.get(&spec.key) else {
            bail!("Package {} not found. Run `hfwmm scan` to see available packages.", spec.key);
        };
        for selection in select_variants(package, spec.choice.as_ref())? {
            if !list.add(selection) {
                debug!("Ignoring duplicate selection {}", spec);
            }
        }
    }
    Ok(list)
}

/// Every package in the catalog: the root for plain packages, every variant
/// for packages that have them.
pub fn select_all(catalog: &Catalog) -> Result<SelectionList> {
    let mut list = SelectionList::new();
    for package in catalog.packages() {
        let choice = (!package.variants.is_empty()).then_some(VariantChoice::All);
        for selection in select_variants(package, choice.as_ref())? {
            list.add(selection);
        }
    }
    Ok(list)
}
