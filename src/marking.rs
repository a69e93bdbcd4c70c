//! Activity marking over a persisted, already-annotated tree listing.
//!
//! This mirrors [`crate::processors::ActiveCalculator`] but works on stored entries, where
//! relationships come from the materialized path instead of parent pointers.

use enumset::EnumSetType;
use serde::{Deserialize, Serialize};

use crate::{
    request::MenuRequest,
    tree::{is_descendant_path, is_sibling_path, AnnotatedEntry},
};

#[derive(EnumSetType, Debug, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
pub enum Mark {
    Active,
    Ancestor,
    Descendant,
    Sibling,
}

/// Mark the entry whose `uri` equals the request path as active, then flag every other
/// entry as its descendant, sibling or ancestor. Two linear passes: relationships can only be
/// computed once the active entry is known. Without a match the listing is returned as is.
#[tracing::instrument(skip(request, tree), fields(rows = tree.len()))]
pub fn marked_annotated_list(
    request: Option<&MenuRequest>,
    mut tree: Vec<AnnotatedEntry>,
) -> Vec<AnnotatedEntry> {
    let Some(request) = request else {
        return tree;
    };
    let Some(active_idx) = tree.iter().position(|row| row.entry.uri == request.path()) else {
        tracing::debug!("no entry matches '{}'", request.path());
        return tree;
    };
    tree[active_idx].marks.insert(Mark::Active);
    let active_path = tree[active_idx].entry.path.clone();

    for (idx, row) in tree.iter_mut().enumerate() {
        if idx == active_idx {
            continue;
        }
        let path = row.entry.path.as_str();
        if is_descendant_path(path, &active_path) {
            row.marks.insert(Mark::Descendant);
        }
        if is_sibling_path(path, &active_path) && path != active_path {
            row.marks.insert(Mark::Sibling);
        }
        if is_descendant_path(&active_path, path) {
            row.marks.insert(Mark::Ancestor);
        }
    }
    tree
}
