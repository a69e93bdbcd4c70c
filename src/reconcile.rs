//! URL reconciliation: diff candidate addresses against persisted entries and insert only
//! what is missing.
//!
//! Inserts are always unpublished; publishing stays an editorial decision. Running
//! [update_all_urls] twice with the same candidates writes nothing the second time.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::{
    entry::{EntryId, MenuEntry, NewEntry, SiteId, TITLE_MAX_LENGTH},
    error::MenuError,
    slug::{entry_slug, DEFAULT_SLUG, MENU_SLUG_MAX_LENGTH},
    store::MenuStore,
    uri::{MenuObject, Uri, UrlSource, NO_TITLE},
};

/// What happens to entries whose object-derived address is no longer a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Leave them untouched.
    #[default]
    Retain,
    /// Unpublish them. Entries are never deleted.
    Unpublish,
}

/// Candidates whose path is not yet stored for `site` (case-insensitive), first occurrence
/// of each path only.
///
/// Both "no candidates" and "nothing missing" are reported as `None`.
pub fn find_missing<S: MenuStore>(
    store: &S,
    urls: &[Uri],
    site: SiteId,
) -> Result<Option<Vec<Uri>>, MenuError> {
    if urls.is_empty() {
        return Ok(None);
    }
    let existing = store
        .get_tree(site, None)?
        .into_iter()
        .map(|e| e.uri.to_lowercase())
        .collect::<BTreeSet<_>>();
    let mut seen = BTreeSet::new();
    let missing = urls
        .iter()
        .filter(|u| {
            let key = u.path.to_lowercase();
            !existing.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(None)
    } else {
        Ok(Some(missing))
    }
}

fn new_entry_for(uri: &Uri) -> NewEntry {
    let mut title = uri.title.trim().chars().take(TITLE_MAX_LENGTH).collect::<String>();
    if title.trim().is_empty() {
        title = NO_TITLE.to_string();
    }
    let slug = entry_slug(&uri.path, &title)
        .chars()
        .take(MENU_SLUG_MAX_LENGTH)
        .collect::<String>();
    NewEntry::new(title, uri.path.clone())
        .with_slug(slug)
        .with_original(uri.origin.clone())
}

/// Insert one unpublished root entry per URI.
#[tracing::instrument(skip(store, urls), fields(urls = urls.len()))]
pub fn add_urls<S: MenuStore>(
    store: &mut S,
    urls: Vec<Uri>,
    site: SiteId,
) -> Result<Vec<(MenuEntry, Uri)>, MenuError> {
    let mut added = Vec::with_capacity(urls.len());
    for uri in urls {
        let entry = store.add_root(site, new_entry_for(&uri))?;
        tracing::info!("added menu entry {} for site {}", entry, site);
        added.push((entry, uri));
    }
    Ok(added)
}

/// `find_missing` then `add_urls`; `None` when nothing needed inserting.
pub fn update_all_urls<S: MenuStore>(
    store: &mut S,
    urls: &[Uri],
    site: SiteId,
) -> Result<Option<Vec<(MenuEntry, Uri)>>, MenuError> {
    match find_missing(store, urls, site)? {
        None => Ok(None),
        Some(missing) => add_urls(store, missing, site).map(Some),
    }
}

/// Administrative import: the whole diff-and-insert either lands or rolls back.
pub fn import_urls<S: MenuStore>(
    store: &mut S,
    urls: &[Uri],
    site: SiteId,
) -> Result<Option<Vec<(MenuEntry, Uri)>>, MenuError> {
    store.atomic(|s| update_all_urls(s, urls, site))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub added: Vec<EntryId>,
    /// Paths that failed to insert, with the reason.
    pub failed: Vec<(String, String)>,
    pub unpublished: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.failed.is_empty() && self.unpublished == 0
    }
}

impl Display for SyncReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} added, {} failed, {} unpublished",
            self.added.len(),
            self.failed.len(),
            self.unpublished
        )
    }
}

/// Like [add_urls], but a failing URI is logged and recorded instead of aborting the batch.
pub fn add_urls_isolated<S: MenuStore>(store: &mut S, urls: Vec<Uri>, site: SiteId) -> SyncReport {
    let mut report = SyncReport::default();
    for uri in urls {
        match store.add_root(site, new_entry_for(&uri)) {
            Ok(entry) => {
                tracing::info!("added menu entry {} for site {}", entry, site);
                report.added.push(entry.id);
            }
            Err(e) => {
                tracing::warn!("skipping '{}' for site {}: {}", uri.path, site, e);
                report.failed.push((uri.path, e.to_string()));
            }
        }
    }
    report
}

/// Unpublish published entries that came from an object and whose address is no longer
/// among `urls`. A no-op under [StalePolicy::Retain].
pub fn apply_stale_policy<S: MenuStore>(
    store: &mut S,
    urls: &[Uri],
    site: SiteId,
    policy: StalePolicy,
) -> Result<usize, MenuError> {
    if policy == StalePolicy::Retain {
        return Ok(0);
    }
    let candidates = urls
        .iter()
        .map(|u| u.path.to_lowercase())
        .collect::<BTreeSet<_>>();
    let stale = store
        .get_tree(site, None)?
        .into_iter()
        .filter(|e| e.is_published && e.original.is_some())
        .filter(|e| !candidates.contains(&e.uri.to_lowercase()))
        .map(|e| e.id)
        .collect::<Vec<_>>();
    if stale.is_empty() {
        return Ok(0);
    }
    tracing::info!("unpublishing {} stale menu entries for site {}", stale.len(), site);
    store.set_published(&stale, false)
}

/// Background sync for one site: isolated inserts followed by the stale policy.
#[tracing::instrument(skip(store, urls), fields(urls = urls.len()))]
pub fn sync_site<S: MenuStore>(
    store: &mut S,
    urls: &[Uri],
    site: SiteId,
    policy: StalePolicy,
) -> Result<SyncReport, MenuError> {
    let mut report = match find_missing(store, urls, site)? {
        Some(missing) => add_urls_isolated(store, missing, site),
        None => SyncReport::default(),
    };
    report.unpublished = apply_stale_policy(store, urls, site, policy)?;
    Ok(report)
}

/// Sync every site independently; one site's failure never stops the others.
pub fn sync_sites<S: MenuStore>(
    store: &mut S,
    urls: &[Uri],
    sites: &[SiteId],
    policy: StalePolicy,
) -> Vec<(SiteId, Result<SyncReport, MenuError>)> {
    sites
        .iter()
        .map(|site| {
            let result = sync_site(store, urls, *site, policy);
            match &result {
                Ok(report) => tracing::debug!("site {}: {}", site, report),
                Err(e) => tracing::warn!("site {} failed to sync: {}", site, e),
            }
            (*site, result)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultForSite {
    pub entry: MenuEntry,
    pub created: bool,
}

/// The root `/` entry with slug `default`, created (published) if the site has none.
pub fn ensure_default_for_site<S: MenuStore>(
    store: &mut S,
    site: SiteId,
) -> Result<DefaultForSite, MenuError> {
    let existing = store
        .find_by_uri(site, "/")?
        .into_iter()
        .find(|e| e.is_root() && e.menu_slug == DEFAULT_SLUG);
    if let Some(entry) = existing {
        return Ok(DefaultForSite {
            entry,
            created: false,
        });
    }
    let entry = store.add_root(
        site,
        NewEntry::new("Home", "/")
            .with_slug(DEFAULT_SLUG)
            .published(true),
    )?;
    tracing::info!("created default menu root for site {}", site);
    Ok(DefaultForSite {
        entry,
        created: true,
    })
}

/// Published entry whose uri matches `uri`, ignoring case.
pub fn get_menuitem_or_none<S: MenuStore>(
    store: &S,
    site: SiteId,
    uri: &str,
) -> Result<Option<MenuEntry>, MenuError> {
    Ok(store
        .find_by_uri(site, uri)?
        .into_iter()
        .find(|e| e.is_published))
}

/// Object listener: on first save, make sure the object's address has an entry.
pub fn create_menu_url<S: MenuStore, T: MenuObject + ?Sized>(
    store: &mut S,
    site: SiteId,
    obj: &T,
    created: bool,
) -> Result<Option<Vec<(MenuEntry, Uri)>>, MenuError> {
    if !created {
        return Ok(None);
    }
    update_all_urls(store, &[Uri::from_object(obj)], site)
}

/// Object listener: the object moved from `old` to `new`; rewrite matching entries.
/// Returns `None` when the address did not change.
pub fn update_old_url<S: MenuStore>(
    store: &mut S,
    site: SiteId,
    old: &str,
    new: &str,
) -> Result<Option<usize>, MenuError> {
    if old == new {
        return Ok(None);
    }
    let changed = store.update_uri(site, old, new)?;
    tracing::debug!("moved {} menu entries from '{}' to '{}'", changed, old, new);
    Ok(Some(changed))
}

/// Named URL sources whose union is the candidate set for reconciliation.
#[derive(Clone, Default)]
pub struct UrlRegistry {
    sources: Vec<Arc<dyn UrlSource>>,
}

impl fmt::Debug for UrlRegistry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.verbose_name()))
            .finish()
    }
}

impl UrlRegistry {
    pub fn new() -> UrlRegistry {
        UrlRegistry::default()
    }

    pub fn register(&mut self, source: Arc<dyn UrlSource>) {
        self.sources.push(source);
    }

    /// Returns true if a source with that verbose name was removed.
    pub fn unregister(&mut self, verbose_name: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.verbose_name() != verbose_name);
        before != self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// `(verbose_name, uri)` pairs sorted by verbose name, then path.
    pub fn list(&self) -> Result<Vec<(String, Uri)>, MenuError> {
        let mut listing = Vec::new();
        for source in self.sources.iter() {
            let name = source.verbose_name();
            for uri in source.get_urls()? {
                listing.push((name.clone(), uri));
            }
        }
        listing.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.path.cmp(&b.1.path)));
        Ok(listing)
    }

    pub fn all_urls(&self) -> Result<Vec<Uri>, MenuError> {
        Ok(self.list()?.into_iter().map(|(_, uri)| uri).collect())
    }

    pub fn items_to_update<S: MenuStore>(
        &self,
        store: &S,
        site: SiteId,
    ) -> Result<Option<Vec<Uri>>, MenuError> {
        find_missing(store, &self.all_urls()?, site)
    }

    pub fn update<S: MenuStore>(
        &self,
        store: &mut S,
        site: SiteId,
    ) -> Result<Option<Vec<(MenuEntry, Uri)>>, MenuError> {
        let urls = self.all_urls()?;
        import_urls(store, &urls, site)
    }
}
