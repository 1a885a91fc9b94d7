//! Package management module
//!
//! Everything the engine knows about a single package: how its key is derived
//! from the name on disk, where its files live, which variants it offers,
//! and what its metadata file says.

mod discovery;
mod identity;
mod import;
mod meta;
mod model;
mod variant;

pub use discovery::find_candidates;
pub use identity::{archive_stem, normalize, raw_name_of};
pub use import::{ImportReport, import};
pub use meta::{DEFAULT_METADATA_FILE, MetaSnapshot, PackageMeta, fingerprint};
pub use model::{
    Catalog, DEFAULT_PRIORITY, MAX_PRIORITY, Package, PackageRoot, PayloadSource, Selection,
    SelectionList, Variant,
};
pub use variant::{
    IMAGE_EXTENSIONS, SHARED_FILES_DIR, VariantChoice, VariantResolution, archive_variant_names,
    find_preview, find_shared_dir, is_image, is_shared_files, resolve_dir_variants,
    select_variants,
};
