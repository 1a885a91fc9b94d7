use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::identity::normalize;

/// Default priority for a package that never declared one. Lower numbers take
/// precedence in the canonical ordering.
pub const DEFAULT_PRIORITY: u8 = 5;
pub const MAX_PRIORITY: u8 = 5;

/// Where a package's files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageRoot {
    Directory(PathBuf),
    /// A validated archive read in place.
    Archive(PathBuf),
    /// A validated archive unpacked into the extraction scratch area.
    Extracted { archive: PathBuf, dir: PathBuf },
}

impl PackageRoot {
    /// The path files are read from.
    pub fn path(&self) -> &Path {
        match self {
            PackageRoot::Directory(path) | PackageRoot::Archive(path) => path,
            PackageRoot::Extracted { dir, .. } => dir,
        }
    }

    /// The path that was discovered on disk.
    pub fn source(&self) -> &Path {
        match self {
            PackageRoot::Directory(path) | PackageRoot::Archive(path) => path,
            PackageRoot::Extracted { archive, .. } => archive,
        }
    }

    pub fn is_archive(&self) -> bool {
        !matches!(self, PackageRoot::Directory(_))
    }
}

/// A named sub-selection of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub path: PathBuf,
    pub preview: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub raw_name: String,
    pub canonical_key: String,
    pub display_name: String,
    pub root: PackageRoot,
    pub priority: u8,
    pub enabled: bool,
    pub variants: Vec<Variant>,
    /// `shared_files` folder staged together with any selected variant.
    pub shared_dir: Option<PathBuf>,
}

impl Package {
    pub fn new(raw_name: impl Into<String>, root: PackageRoot) -> Self {
        let raw_name = raw_name.into();
        let canonical_key = normalize(&raw_name);
        Self {
            display_name: canonical_key.clone(),
            canonical_key,
            raw_name,
            root,
            priority: DEFAULT_PRIORITY,
            enabled: false,
            variants: Vec::new(),
            shared_dir: None,
        }
    }

    pub fn source_path(&self) -> &Path {
        self.root.source()
    }

    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// Something files can be staged from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadSource {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl PayloadSource {
    pub fn path(&self) -> &Path {
        match self {
            PayloadSource::Directory(path) | PayloadSource::Archive(path) => path,
        }
    }
}

/// One enabled item: a whole package or one of its variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Package(Package),
    Variant { package: Package, variant: Variant },
}

impl Selection {
    pub fn package(&self) -> &Package {
        match self {
            Selection::Package(package) | Selection::Variant { package, .. } => package,
        }
    }

    /// Stable identity used to ignore duplicate adds.
    pub fn id(&self) -> String {
        match self {
            Selection::Package(package) => package.canonical_key.clone(),
            Selection::Variant { package, variant } => {
                format!("{}/{}", package.canonical_key, variant.name)
            }
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Selection::Package(package) => package.display_name.clone(),
            Selection::Variant { package, variant } => {
                format!("{}/{}", package.display_name, variant.name)
            }
        }
    }

    pub fn priority(&self) -> u8 {
        self.package().priority
    }

    /// Sources to stage for this selection, in processing order. A variant
    /// brings its package's `shared_files` first so the variant's own files
    /// are processed after them.
    pub fn payload_sources(&self) -> Vec<PayloadSource> {
        match self {
            Selection::Package(package) => match &package.root {
                PackageRoot::Directory(dir) | PackageRoot::Extracted { dir, .. } => {
                    vec![PayloadSource::Directory(dir.clone())]
                }
                PackageRoot::Archive(archive) => vec![PayloadSource::Archive(archive.clone())],
            },
            Selection::Variant { package, variant } => {
                let mut sources = Vec::with_capacity(2);
                if let Some(shared) = &package.shared_dir {
                    sources.push(PayloadSource::Directory(shared.clone()));
                }
                sources.push(PayloadSource::Directory(variant.path.clone()));
                sources
            }
        }
    }
}

/// Ordered enabled selections. Adding a selection that is already present is a
/// no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionList {
    items: Vec<Selection>,
}

impl SelectionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if an equal selection was already present.
    pub fn add(&mut self, selection: Selection) -> bool {
        let id = selection.id();
        if self.items.iter().any(|s| s.id() == id) {
            return false;
        }
        self.items.push(selection);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selection> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Selection] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [Selection] {
        &mut self.items
    }
}

impl FromIterator<Selection> for SelectionList {
    fn from_iter<I: IntoIterator<Item = Selection>>(iter: I) -> Self {
        let mut list = SelectionList::new();
        for selection in iter {
            list.add(selection);
        }
        list
    }
}

impl<'a> IntoIterator for &'a SelectionList {
    type Item = &'a Selection;
    type IntoIter = std::slice::Iter<'a, Selection>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Tracked packages keyed by canonical key.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: BTreeMap<String, Package>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the package with the same key. Returns true if the
    /// key was not tracked before.
    pub fn upsert(&mut self, package: Package) -> bool {
        self.packages
            .insert(package.canonical_key.clone(), package)
            .is_none()
    }

    pub fn get(&self, key: &str) -> Option<&Package> {
        self.packages.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Package> {
        self.packages.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_package(raw: &str) -> Package {
        Package::new(raw, PackageRoot::Directory(PathBuf::from("/mods").join(raw)))
    }

    fn with_variants(mut package: Package, names: &[&str]) -> Package {
        let root = package.root_path().to_path_buf();
        package.variants = names
            .iter()
            .map(|n| Variant {
                name: n.to_string(),
                path: root.join(n),
                preview: Some(root.join(n).join("variation.png")),
            })
            .collect();
        package
    }

    #[test]
    fn test_package_new_normalizes_identity() {
        let package = dir_package("SuperArmor-100-2-5-12");
        assert_eq!(package.canonical_key, "SuperArmor");
        assert_eq!(package.display_name, "SuperArmor");
        assert_eq!(package.raw_name, "SuperArmor-100-2-5-12");
        assert_eq!(package.priority, DEFAULT_PRIORITY);
        assert!(!package.enabled);
    }

    #[test]
    fn test_extracted_root_paths() {
        let root = PackageRoot::Extracted {
            archive: PathBuf::from("/mods/A.zip"),
            dir: PathBuf::from("/work/extracted/A"),
        };
        assert_eq!(root.source(), Path::new("/mods/A.zip"));
        assert_eq!(root.path(), Path::new("/work/extracted/A"));
        assert!(root.is_archive());
    }

    #[test]
    fn test_variant_selection_identity_and_name() {
        let package = with_variants(dir_package("Outfit-1-2-3"), &["Red", "Blue"]);
        let selection = Selection::Variant {
            variant: package.variant("Blue").unwrap().clone(),
            package,
        };
        assert_eq!(selection.id(), "Outfit/Blue");
        assert_eq!(selection.display_name(), "Outfit/Blue");
    }

    #[test]
    fn test_variant_sources_put_shared_files_first() {
        let mut package = with_variants(dir_package("Outfit"), &["Red"]);
        package.shared_dir = Some(PathBuf::from("/mods/Outfit/shared_files"));
        let selection = Selection::Variant {
            variant: package.variants[0].clone(),
            package,
        };
        assert_eq!(
            selection.payload_sources(),
            vec![
                PayloadSource::Directory(PathBuf::from("/mods/Outfit/shared_files")),
                PayloadSource::Directory(PathBuf::from("/mods/Outfit/Red")),
            ]
        );
    }

    #[test]
    fn test_archive_package_source() {
        let package = Package::new("A", PackageRoot::Archive(PathBuf::from("/mods/A.zip")));
        assert_eq!(
            Selection::Package(package).payload_sources(),
            vec![PayloadSource::Archive(PathBuf::from("/mods/A.zip"))]
        );
    }

    #[test]
    fn test_selection_list_ignores_duplicates() {
        let package = with_variants(dir_package("Outfit"), &["Red"]);
        let variant = Selection::Variant {
            variant: package.variants[0].clone(),
            package: package.clone(),
        };

        let mut list = SelectionList::new();
        assert!(list.add(variant.clone()));
        assert!(!list.add(variant));
        assert!(list.add(Selection::Package(package.clone())));
        assert!(!list.add(Selection::Package(package)));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_catalog_upsert_by_key() {
        let mut catalog = Catalog::new();
        assert!(catalog.upsert(dir_package("SuperArmor-100-2-5-12")));
        let mut newer = dir_package("SuperArmor-100-2-6-0");
        newer.priority = 1;
        assert!(!catalog.upsert(newer));

        assert_eq!(catalog.len(), 1);
        let stored = catalog.get("SuperArmor").unwrap();
        assert_eq!(stored.raw_name, "SuperArmor-100-2-6-0");
        assert_eq!(stored.priority, 1);
    }
}
