//! Application layer - Use cases that coordinate the engine components.
//!
//! This layer sequences discovery, registry upkeep and the packaging pass, and
//! hands plain-data reports back to the CLI layer.

mod pass;
mod scan;
mod select;

pub use pass::{PackPass, PassOutcome, PassReport};
pub use scan::{ScanReport, Scanner, SkippedItem, scan};
pub use select::{SelectionSpec, resolve_selections, select_all};
