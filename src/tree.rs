//! Materialized-path helpers and annotated tree listings.
//!
//! Every persisted entry stores a path made of fixed-width base-36 steps, one per level:
//! the third child of the first root is `0001` + `0003`. Sorting by path yields a
//! depth-first listing, and ancestry is a prefix test.

use enumset::EnumSet;
use serde::{Deserialize, Serialize};

use crate::{
    entry::{MenuEntry, SiteId},
    error::MenuError,
    marking::Mark,
    store::MenuStore,
};

pub const STEPLEN: usize = 4;
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Largest position a single step can encode.
pub const MAX_STEP: usize = 36usize.pow(STEPLEN as u32) - 1;

pub fn encode_step(position: usize) -> Result<String, MenuError> {
    if position == 0 || position > MAX_STEP {
        return Err(MenuError::Store(format!(
            "tree position {position} is outside 1..={MAX_STEP}"
        )));
    }
    let mut digits = [b'0'; STEPLEN];
    let mut rest = position;
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[rest % 36];
        rest /= 36;
    }
    Ok(digits.iter().map(|b| *b as char).collect())
}

pub fn decode_step(step: &str) -> Option<usize> {
    if step.len() != STEPLEN {
        return None;
    }
    step.bytes().try_fold(0usize, |acc, b| {
        let digit = ALPHABET.iter().position(|a| *a == b.to_ascii_uppercase())?;
        Some(acc * 36 + digit)
    })
}

pub fn depth_of(path: &str) -> usize {
    path.len() / STEPLEN
}

/// `None` for roots.
pub fn parent_path(path: &str) -> Option<&str> {
    if path.len() <= STEPLEN {
        None
    } else {
        Some(&path[..path.len() - STEPLEN])
    }
}

/// The last step of `path`, as a position.
pub fn last_position(path: &str) -> Option<usize> {
    path.get(path.len().saturating_sub(STEPLEN)..)
        .and_then(decode_step)
}

pub fn child_path(parent: &str, position: usize) -> Result<String, MenuError> {
    Ok(format!("{parent}{}", encode_step(position)?))
}

/// Strictly below `ancestor`.
pub fn is_descendant_path(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() && path.starts_with(ancestor)
}

/// Same parent (roots share the empty parent). True for `a == b`; callers exclude self.
pub fn is_sibling_path(a: &str, b: &str) -> bool {
    a.len() == b.len() && parent_path(a) == parent_path(b)
}

/// Structural rendering hints for one row of a depth-first listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TreeInfo {
    /// This row starts a deeper level than the previous one.
    pub open: bool,
    /// Levels closed after this row.
    pub close: Vec<usize>,
    /// Depth relative to the first row.
    pub level: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedEntry {
    pub entry: MenuEntry,
    pub info: TreeInfo,
    #[serde(default)]
    pub marks: EnumSet<Mark>,
}

impl AnnotatedEntry {
    pub fn is_active(&self) -> bool {
        self.marks.contains(Mark::Active)
    }

    pub fn is_ancestor(&self) -> bool {
        self.marks.contains(Mark::Ancestor)
    }

    pub fn is_descendant(&self) -> bool {
        self.marks.contains(Mark::Descendant)
    }

    pub fn is_sibling(&self) -> bool {
        self.marks.contains(Mark::Sibling)
    }
}

/// Annotate entries already sorted by path with open/close/level information.
pub fn annotated_list(entries: Vec<MenuEntry>) -> Vec<AnnotatedEntry> {
    let mut result: Vec<AnnotatedEntry> = Vec::with_capacity(entries.len());
    let mut start_depth = None;
    let mut prev_depth: Option<usize> = None;
    for entry in entries {
        let depth = entry.depth;
        let start = *start_depth.get_or_insert(depth);
        let open = depth > 0 && prev_depth.map_or(true, |prev| depth > prev);
        if let (Some(prev), Some(last)) = (prev_depth, result.last_mut()) {
            if depth < prev {
                last.info.close = (0..prev - depth).collect();
            }
        }
        result.push(AnnotatedEntry {
            entry,
            info: TreeInfo {
                open,
                close: Vec::new(),
                level: depth.saturating_sub(start),
            },
            marks: EnumSet::empty(),
        });
        prev_depth = Some(depth);
    }
    if let (Some(start), Some(prev), Some(last)) = (start_depth, prev_depth, result.last_mut()) {
        if start > 0 {
            last.info.close = (0..prev + 1 - start).collect();
        }
    }
    result
}

/// Published entries under `parent` (or the whole site), optionally bounded by depth
/// relative to the parent. A bound of zero means unbounded.
#[tracing::instrument(skip(store, parent), fields(parent = parent.map(|p| p.id)))]
pub fn published_annotated_list<S: MenuStore>(
    store: &S,
    site: SiteId,
    parent: Option<&MenuEntry>,
    min_depth: Option<usize>,
    max_depth: Option<usize>,
) -> Result<Vec<AnnotatedEntry>, MenuError> {
    let parent_depth = parent.map(|p| p.depth).unwrap_or(0);
    let min_depth = min_depth.filter(|d| *d > 0).map(|d| d + parent_depth);
    let max_depth = max_depth.filter(|d| *d > 0).map(|d| d + parent_depth);
    let entries = store
        .get_tree(site, parent.map(|p| p.id))?
        .into_iter()
        .filter(|e| e.is_published)
        .filter(|e| min_depth.map_or(true, |min| e.depth >= min))
        .filter(|e| max_depth.map_or(true, |max| e.depth <= max))
        .collect::<Vec<_>>();
    Ok(annotated_list(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn entry(path: &str) -> MenuEntry {
        MenuEntry {
            id: 0,
            site_id: 1,
            path: path.to_string(),
            depth: depth_of(path),
            numchild: 0,
            menu_slug: String::new(),
            title: path.to_string(),
            uri: "/".to_string(),
            is_published: true,
            original: None,
            created: 0,
            modified: 0,
        }
    }

    #[test]
    fn test_step_encoding() {
        assert_eq!(encode_step(1).unwrap(), "0001");
        assert_eq!(encode_step(36).unwrap(), "0010");
        assert_eq!(encode_step(MAX_STEP).unwrap(), "ZZZZ");
        assert!(encode_step(0).is_err());
        assert!(encode_step(MAX_STEP + 1).is_err());
        assert_eq!(decode_step("0010"), Some(36));
        assert_eq!(decode_step("zzzz"), Some(MAX_STEP));
        assert_eq!(decode_step("001"), None);
    }

    #[test]
    fn test_path_relations() {
        assert_eq!(parent_path("0001"), None);
        assert_eq!(parent_path("00010002"), Some("0001"));
        assert_eq!(last_position("00010002"), Some(2));
        assert!(is_descendant_path("000100020003", "0001"));
        assert!(!is_descendant_path("0001", "0001"));
        assert!(!is_descendant_path("00020001", "0001"));
        assert!(is_sibling_path("0001", "0003"));
        assert!(is_sibling_path("00010001", "00010004"));
        assert!(!is_sibling_path("00010001", "00020001"));
    }

    #[test]
    fn test_annotated_list_open_close() {
        let rows = annotated_list(vec![
            entry("0001"),
            entry("00010001"),
            entry("000100010001"),
            entry("0002"),
        ]);
        let infos = rows.iter().map(|r| r.info.clone()).collect::<Vec<_>>();
        assert_eq!(
            infos,
            vec![
                TreeInfo { open: true, close: vec![], level: 0 },
                TreeInfo { open: true, close: vec![], level: 1 },
                TreeInfo { open: true, close: vec![0, 1], level: 2 },
                TreeInfo { open: false, close: vec![0], level: 0 },
            ]
        );
    }
}
