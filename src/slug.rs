//! Slug helpers used to derive stable lookup keys for menus and menu entries.

use unicode_normalization::UnicodeNormalization;

/// Storage limit of a persisted entry's `menu_slug`.
pub const MENU_SLUG_MAX_LENGTH: usize = 100;

/// Storage limit of a menu grouping's slug.
pub const MENU_TITLE_MAX_LENGTH: usize = 50;

/// Used when neither the path nor the title yields a usable slug.
pub const DEFAULT_SLUG: &str = "default";

/// Turn arbitrary text into a lowercase ascii slug: accents are folded, anything that is not
/// alphanumeric, `_` or `-` is dropped, and whitespace runs become a single `-`.
pub fn slugify(text: &str) -> String {
    let folded = text
        .nfkd()
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .to_lowercase();
    let kept = folded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect::<String>();
    let mut slug = String::with_capacity(kept.len());
    let mut pending_dash = false;
    for c in kept.trim().chars() {
        if c.is_whitespace() || c == '-' {
            pending_dash = true;
            continue;
        }
        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.push(c);
    }
    slug
}

/// Derive a `menu_slug` from an address: the query string is ignored and each path segment
/// becomes one dash-separated part, so `/a/b/c/?d=e` gives `a-b-c`.
pub fn set_menu_slug(path: &str, max_length: usize) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let joined = path
        .split('/')
        .map(slugify)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    truncate(&joined, max_length)
}

/// Slug for a new entry: from the path, else from the title, else [DEFAULT_SLUG].
pub fn entry_slug(path: &str, title: &str) -> String {
    let from_path = set_menu_slug(path, MENU_SLUG_MAX_LENGTH);
    if !from_path.is_empty() {
        return from_path;
    }
    let from_title = truncate(&slugify(title), MENU_SLUG_MAX_LENGTH);
    if !from_title.is_empty() {
        return from_title;
    }
    DEFAULT_SLUG.to_string()
}

fn truncate(slug: &str, max_length: usize) -> String {
    slug.chars().take(max_length).collect()
}
