//! Priority ordering of enabled selections. Both directions are stable: items
//! with equal priority keep the order the caller gave them.

use serde::{Deserialize, Serialize};

use crate::package::Selection;

/// Which way to order selections by priority number before staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Leave the caller's order untouched.
    #[default]
    AsGiven,
    Ascending,
    Descending,
}

/// Priority 0 first, 5 last.
pub fn sort_ascending_priority(selections: &mut [Selection]) {
    selections.sort_by_key(|s| s.priority());
}

/// Priority 5 first, 0 last. Under last-processed-wins collision handling this
/// makes priority 0 win.
pub fn sort_descending_priority(selections: &mut [Selection]) {
    selections.sort_by_key(|s| std::cmp::Reverse(s.priority()));
}

pub fn apply(order: SortOrder, selections: &mut [Selection]) {
    match order {
        SortOrder::AsGiven => {}
        SortOrder::Ascending => sort_ascending_priority(selections),
        SortOrder::Descending => sort_descending_priority(selections),
    }
}
