//! Read-side helpers over persisted entries: lookup parsing, menu listings, breadcrumbs and
//! sitemap hints.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::{
    entry::{EntryId, MenuEntry, SiteId},
    error::MenuError,
    marking::marked_annotated_list,
    request::MenuRequest,
    store::MenuStore,
    tree::{published_annotated_list, AnnotatedEntry},
};

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("static regex"));

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// How a caller-supplied string identifies an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuLookup {
    Id(EntryId),
    Slug(String),
    /// Case-insensitive.
    Uri(String),
}

impl MenuLookup {
    /// All digits is an id, a slug-shaped string is a menu slug, anything else non-empty is a
    /// uri. An empty string falls back to the request path; without a request there is
    /// nothing to look up.
    pub fn parse(text: &str, request: Option<&MenuRequest>) -> Option<MenuLookup> {
        let text = text.trim();
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = text.parse() {
                return Some(MenuLookup::Id(id));
            }
        }
        if SLUG_RE.is_match(text) {
            return Some(MenuLookup::Slug(text.to_string()));
        }
        if !text.is_empty() {
            return Some(MenuLookup::Uri(text.to_string()));
        }
        request.map(|r| MenuLookup::Uri(r.path().to_string()))
    }

    /// First matching entry of `site` in tree order, published or not.
    pub fn resolve<S: MenuStore>(
        &self,
        store: &S,
        site: SiteId,
    ) -> Result<Option<MenuEntry>, MenuError> {
        Ok(match self {
            MenuLookup::Id(id) => store.get(*id)?.filter(|e| e.site_id == site),
            MenuLookup::Slug(slug) => store.find_by_slug(site, slug)?.into_iter().next(),
            MenuLookup::Uri(uri) => store.find_by_uri(site, uri)?.into_iter().next(),
        })
    }
}

impl Display for MenuLookup {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            MenuLookup::Id(id) => write!(f, "id={id}"),
            MenuLookup::Slug(slug) => write!(f, "menu_slug={slug}"),
            MenuLookup::Uri(uri) => write!(f, "uri~={uri}"),
        }
    }
}

fn lookup_entry<S: MenuStore>(
    store: &S,
    site: SiteId,
    text: &str,
    request: Option<&MenuRequest>,
) -> Result<Option<MenuEntry>, MenuError> {
    let Some(lookup) = MenuLookup::parse(text, request) else {
        return Ok(None);
    };
    let found = lookup.resolve(store, site)?;
    if found.is_none() {
        tracing::debug!("no menu entry for {}", lookup);
    }
    Ok(found)
}

/// Published ancestors of the looked-up entry, followed by the entry itself.
pub fn breadcrumbs<S: MenuStore>(
    store: &S,
    site: SiteId,
    text: &str,
    request: Option<&MenuRequest>,
) -> Result<Vec<MenuEntry>, MenuError> {
    let Some(entry) = lookup_entry(store, site, text, request)? else {
        return Ok(Vec::new());
    };
    let mut trail = store
        .get_ancestors(entry.id)?
        .into_iter()
        .filter(|e| e.is_published)
        .collect::<Vec<_>>();
    trail.push(entry);
    Ok(trail)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShownMenu {
    pub root: MenuEntry,
    pub nodes: Vec<AnnotatedEntry>,
}

/// The published subtree of the looked-up entry, `start` to `start + levels` deep relative
/// to it, marked against `request`.
#[tracing::instrument(skip(store, request))]
pub fn show_menu<S: MenuStore>(
    store: &S,
    site: SiteId,
    text: &str,
    request: Option<&MenuRequest>,
    start: usize,
    levels: usize,
) -> Result<Option<ShownMenu>, MenuError> {
    let Some(root) = lookup_entry(store, site, text, request)? else {
        return Ok(None);
    };
    let listing =
        published_annotated_list(store, site, Some(&root), Some(start), Some(start + levels))?;
    Ok(Some(ShownMenu {
        nodes: marked_annotated_list(request, listing),
        root,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
}

/// Deeper pages matter less: one tenth per level, never below 0.01.
pub fn priority(depth: usize) -> f64 {
    let remove = if depth > 0 { depth as f64 / 10.0 } else { 0.0 };
    1.0 - remove.min(0.99)
}

/// Timestamps are unix seconds.
pub fn changefreq(modified: u64, now: u64) -> ChangeFreq {
    let days = now.saturating_sub(modified) / SECONDS_PER_DAY;
    if days < 3 {
        ChangeFreq::Daily
    } else if days <= 7 {
        ChangeFreq::Weekly
    } else {
        ChangeFreq::Monthly
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub location: String,
    pub lastmod: u64,
    pub changefreq: ChangeFreq,
    pub priority: f64,
}

/// One entry per published menu entry of `site`, in tree order.
pub fn sitemap<S: MenuStore>(
    store: &S,
    site: SiteId,
    now: u64,
) -> Result<Vec<SitemapEntry>, MenuError> {
    Ok(published_annotated_list(store, site, None, None, None)?
        .into_iter()
        .map(|row| SitemapEntry {
            location: row.entry.uri.clone(),
            lastmod: row.entry.modified,
            changefreq: changefreq(row.entry.modified, now),
            priority: priority(row.entry.depth),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_lookup_parsing() {
        let request = MenuRequest::new("/here/?x=1").unwrap();
        assert_eq!(MenuLookup::parse("4", None), Some(MenuLookup::Id(4)));
        assert_eq!(
            MenuLookup::parse("default", None),
            Some(MenuLookup::Slug("default".to_string()))
        );
        assert_eq!(
            MenuLookup::parse("/HI", None),
            Some(MenuLookup::Uri("/HI".to_string()))
        );
        assert_eq!(
            MenuLookup::parse("", Some(&request)),
            Some(MenuLookup::Uri("/here/".to_string()))
        );
        assert_eq!(MenuLookup::parse("", None), None);
    }

    #[test]
    fn test_priority_by_depth() {
        let priorities = [0, 1, 2, 3, 50].map(priority);
        let expected = [1.0, 0.9, 0.8, 0.7, 0.01];
        for (got, want) in priorities.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
    }

    #[test]
    fn test_changefreq_bands() {
        let now = 100 * SECONDS_PER_DAY;
        assert_eq!(changefreq(now, now), ChangeFreq::Daily);
        assert_eq!(changefreq(now - 2 * SECONDS_PER_DAY, now), ChangeFreq::Daily);
        assert_eq!(changefreq(now - 5 * SECONDS_PER_DAY, now), ChangeFreq::Weekly);
        assert_eq!(changefreq(now - 7 * SECONDS_PER_DAY, now), ChangeFreq::Weekly);
        assert_eq!(changefreq(now - 8 * SECONDS_PER_DAY, now), ChangeFreq::Monthly);
    }
}
