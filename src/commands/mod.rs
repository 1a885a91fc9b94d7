//! CLI commands. Each one loads what it needs through [`Config`], calls into
//! the application layer and prints plain-text results.

use anyhow::Result;

use crate::application::{SelectionSpec, resolve_selections, select_all};
use crate::package::{Catalog, SelectionList};

pub mod config;
mod conflicts;
mod import;
mod init;
mod pack;
mod priority;
mod restore;
mod scan;

pub use config::Config;
pub use conflicts::conflicts;
pub use import::import;
pub use init::init;
pub use pack::pack;
pub use priority::priority;
pub use restore::restore;
pub use scan::scan;

/// Parse selection strings and resolve them against the catalog. With `all`,
/// every package is selected and `specs` is ignored.
pub(crate) fn selection_list(catalog: &Catalog, specs: &[String], all: bool) -> Result<SelectionList> {
    if all {
        return select_all(catalog);
    }
    let specs = specs
        .iter()
        .map(|s| s.parse::<SelectionSpec>())
        .collect::<Result<Vec<_>>>()?;
    resolve_selections(catalog, &specs)
}
