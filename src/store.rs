//! Persistence seam for menu entries, menu records and custom items.
//!
//! [MenuStore] is the narrow interface every other module talks to. [MemoryStore] is the
//! bundled implementation: a materialized-path tree in ordered maps that snapshots to JSON.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::{
    collection::{CustomMenuItem, MenuRecord},
    entry::{now_secs, validate_uri, EntryId, MenuEntry, NewEntry, SiteId},
    error::MenuError,
    tree::{child_path, depth_of, is_descendant_path, last_position, parent_path, STEPLEN},
};

pub trait MenuStore {
    /// `parent` and everything below it (or the whole site), sorted by tree path.
    fn get_tree(&self, site: SiteId, parent: Option<EntryId>) -> Result<Vec<MenuEntry>, MenuError>;

    fn get(&self, id: EntryId) -> Result<Option<MenuEntry>, MenuError>;

    /// Sorted by tree path.
    fn find_by_slug(&self, site: SiteId, slug: &str) -> Result<Vec<MenuEntry>, MenuError>;

    /// Case-insensitive match on `uri`, sorted by tree path.
    fn find_by_uri(&self, site: SiteId, uri: &str) -> Result<Vec<MenuEntry>, MenuError>;

    /// Root first, immediate parent last.
    fn get_ancestors(&self, id: EntryId) -> Result<Vec<MenuEntry>, MenuError>;

    fn add_root(&mut self, site: SiteId, entry: NewEntry) -> Result<MenuEntry, MenuError>;

    fn add_child(&mut self, parent: EntryId, entry: NewEntry) -> Result<MenuEntry, MenuError>;

    /// Rewrite every entry of `site` whose uri matches `old`, ignoring case. Returns the rows
    /// changed.
    fn update_uri(&mut self, site: SiteId, old: &str, new: &str) -> Result<usize, MenuError>;

    /// Returns the rows whose flag actually changed.
    fn set_published(&mut self, ids: &[EntryId], is_published: bool) -> Result<usize, MenuError>;

    /// Remove `id` and its whole subtree. Returns the rows removed.
    fn delete(&mut self, id: EntryId) -> Result<usize, MenuError>;

    fn get_menu(&self, site: SiteId, slug: &str) -> Result<Option<MenuRecord>, MenuError>;

    fn create_menu(&mut self, record: MenuRecord) -> Result<(), MenuError>;

    fn custom_items(&self, site: SiteId, menu_slug: &str)
        -> Result<Vec<CustomMenuItem>, MenuError>;

    fn add_custom_item(&mut self, item: CustomMenuItem) -> Result<(), MenuError>;

    /// Run `f` as one unit. Stores that can roll back override this; the default just runs it.
    fn atomic<T, F>(&mut self, f: F) -> Result<T, MenuError>
    where
        F: FnOnce(&mut Self) -> Result<T, MenuError>,
        Self: Sized,
    {
        f(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    entries: BTreeMap<EntryId, MenuEntry>,
    #[serde(default)]
    menus: Vec<MenuRecord>,
    #[serde(default)]
    custom_items: Vec<CustomMenuItem>,
    next_id: EntryId,
    #[serde(skip)]
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Number of mutating operations that changed state since this store was created/loaded.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(path: &Path) -> Result<MemoryStore, MenuError> {
        let raw = fs::read_to_string(path)?;
        let store: MemoryStore = serde_json::from_str(&raw)?;
        tracing::debug!(
            "[MemoryStore] loaded {} entries from {:?}",
            store.entries.len(),
            path
        );
        Ok(store)
    }

    /// Like [MemoryStore::load] but a missing file is an empty store.
    pub fn load_or_default(path: &Path) -> Result<MemoryStore, MenuError> {
        match MemoryStore::load(path) {
            Err(MenuError::NotFound(_)) => {
                tracing::info!("[MemoryStore] no snapshot at {:?}, starting empty", path);
                Ok(MemoryStore::default())
            }
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), MenuError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!("[MemoryStore] saved {} entries to {:?}", self.entries.len(), path);
        Ok(())
    }

    fn sorted(&self, mut entries: Vec<MenuEntry>) -> Vec<MenuEntry> {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    fn next_position(&self, parent: Option<&str>) -> usize {
        let width = parent.map_or(0, str::len) + STEPLEN;
        self.entries
            .values()
            .filter(|e| e.path.len() == width && parent_path(&e.path) == parent)
            .filter_map(|e| last_position(&e.path))
            .max()
            .unwrap_or(0)
            + 1
    }

    fn insert(&mut self, site: SiteId, path: String, entry: NewEntry) -> MenuEntry {
        self.next_id += 1;
        let now = now_secs();
        let record = MenuEntry {
            id: self.next_id,
            site_id: site,
            depth: depth_of(&path),
            path,
            numchild: 0,
            menu_slug: entry.menu_slug.unwrap_or_default(),
            title: entry.title,
            uri: entry.uri,
            is_published: entry.is_published,
            original: entry.original,
            created: now,
            modified: now,
        };
        self.entries.insert(record.id, record.clone());
        self.writes += 1;
        record
    }
}

impl MenuStore for MemoryStore {
    fn get_tree(&self, site: SiteId, parent: Option<EntryId>) -> Result<Vec<MenuEntry>, MenuError> {
        let entries = match parent {
            None => self
                .entries
                .values()
                .filter(|e| e.site_id == site)
                .cloned()
                .collect(),
            Some(id) => {
                let parent = self
                    .entries
                    .get(&id)
                    .ok_or_else(|| MenuError::NotFound(format!("menu entry {id}")))?;
                self.entries
                    .values()
                    .filter(|e| e.id == id || is_descendant_path(&e.path, &parent.path))
                    .cloned()
                    .collect()
            }
        };
        Ok(self.sorted(entries))
    }

    fn get(&self, id: EntryId) -> Result<Option<MenuEntry>, MenuError> {
        Ok(self.entries.get(&id).cloned())
    }

    fn find_by_slug(&self, site: SiteId, slug: &str) -> Result<Vec<MenuEntry>, MenuError> {
        let found = self
            .entries
            .values()
            .filter(|e| e.site_id == site && e.menu_slug == slug)
            .cloned()
            .collect();
        Ok(self.sorted(found))
    }

    fn find_by_uri(&self, site: SiteId, uri: &str) -> Result<Vec<MenuEntry>, MenuError> {
        let needle = uri.to_lowercase();
        let found = self
            .entries
            .values()
            .filter(|e| e.site_id == site && e.uri.to_lowercase() == needle)
            .cloned()
            .collect();
        Ok(self.sorted(found))
    }

    fn get_ancestors(&self, id: EntryId) -> Result<Vec<MenuEntry>, MenuError> {
        let entry = self
            .entries
            .get(&id)
            .ok_or_else(|| MenuError::NotFound(format!("menu entry {id}")))?;
        let found = self
            .entries
            .values()
            .filter(|e| is_descendant_path(&entry.path, &e.path))
            .cloned()
            .collect();
        Ok(self.sorted(found))
    }

    fn add_root(&mut self, site: SiteId, entry: NewEntry) -> Result<MenuEntry, MenuError> {
        let entry = entry.validate()?;
        let path = child_path("", self.next_position(None))?;
        Ok(self.insert(site, path, entry))
    }

    fn add_child(&mut self, parent: EntryId, entry: NewEntry) -> Result<MenuEntry, MenuError> {
        let entry = entry.validate()?;
        let (site, parent_path) = {
            let parent = self
                .entries
                .get(&parent)
                .ok_or_else(|| MenuError::NotFound(format!("parent menu entry {parent}")))?;
            (parent.site_id, parent.path.clone())
        };
        let path = child_path(&parent_path, self.next_position(Some(&parent_path)))?;
        let child = self.insert(site, path, entry);
        if let Some(parent) = self.entries.get_mut(&parent) {
            parent.numchild += 1;
        }
        Ok(child)
    }

    fn update_uri(&mut self, site: SiteId, old: &str, new: &str) -> Result<usize, MenuError> {
        validate_uri(new)?;
        let old = old.to_lowercase();
        let now = now_secs();
        let mut changed = 0;
        for entry in self
            .entries
            .values_mut()
            .filter(|e| e.site_id == site && e.uri.to_lowercase() == old)
        {
            entry.uri = new.to_string();
            entry.modified = now;
            changed += 1;
        }
        if changed > 0 {
            self.writes += 1;
        }
        Ok(changed)
    }

    fn set_published(&mut self, ids: &[EntryId], is_published: bool) -> Result<usize, MenuError> {
        let now = now_secs();
        let mut changed = 0;
        for id in ids {
            if let Some(entry) = self.entries.get_mut(id) {
                if entry.is_published != is_published {
                    entry.is_published = is_published;
                    entry.modified = now;
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.writes += 1;
        }
        Ok(changed)
    }

    fn delete(&mut self, id: EntryId) -> Result<usize, MenuError> {
        let Some(path) = self.entries.get(&id).map(|e| e.path.clone()) else {
            return Ok(0);
        };
        let doomed = self
            .entries
            .values()
            .filter(|e| e.id == id || is_descendant_path(&e.path, &path))
            .map(|e| e.id)
            .collect::<Vec<_>>();
        for doomed_id in doomed.iter() {
            self.entries.remove(doomed_id);
        }
        if let Some(parent) = parent_path(&path) {
            if let Some(entry) = self.entries.values_mut().find(|e| e.path == parent) {
                entry.numchild = entry.numchild.saturating_sub(1);
            }
        }
        self.writes += 1;
        Ok(doomed.len())
    }

    fn get_menu(&self, site: SiteId, slug: &str) -> Result<Option<MenuRecord>, MenuError> {
        Ok(self
            .menus
            .iter()
            .find(|m| m.site_id == site && m.slug == slug)
            .cloned())
    }

    fn create_menu(&mut self, record: MenuRecord) -> Result<(), MenuError> {
        if self.get_menu(record.site_id, &record.slug)?.is_some() {
            return Err(MenuError::Store(format!(
                "menu '{}' already exists for site {}",
                record.slug, record.site_id
            )));
        }
        self.menus.push(record);
        self.writes += 1;
        Ok(())
    }

    fn custom_items(
        &self,
        site: SiteId,
        menu_slug: &str,
    ) -> Result<Vec<CustomMenuItem>, MenuError> {
        Ok(self
            .custom_items
            .iter()
            .filter(|i| i.site_id == site && i.menu_slug == menu_slug)
            .cloned()
            .collect())
    }

    fn add_custom_item(&mut self, item: CustomMenuItem) -> Result<(), MenuError> {
        self.custom_items.push(item);
        self.writes += 1;
        Ok(())
    }

    /// Snapshot, run, and restore the snapshot if `f` fails.
    fn atomic<T, F>(&mut self, f: F) -> Result<T, MenuError>
    where
        F: FnOnce(&mut Self) -> Result<T, MenuError>,
        Self: Sized,
    {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!("[MemoryStore] rolling back: {}", e);
                *self = snapshot;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_paths_are_allocated_in_order() {
        let mut store = MemoryStore::new();
        let a = store.add_root(1, NewEntry::new("A", "/a/")).unwrap();
        let b = store.add_root(1, NewEntry::new("B", "/b/")).unwrap();
        let a1 = store.add_child(a.id, NewEntry::new("A1", "/a/1/")).unwrap();
        let a2 = store.add_child(a.id, NewEntry::new("A2", "/a/2/")).unwrap();
        assert_eq!(a.path, "0001");
        assert_eq!(b.path, "0002");
        assert_eq!(a1.path, "00010001");
        assert_eq!(a2.path, "00010002");
        assert_eq!(a2.depth, 2);
        assert_eq!(store.get(a.id).unwrap().unwrap().numchild, 2);

        let tree = store.get_tree(1, Some(a.id)).unwrap();
        let titles = tree.iter().map(|e| e.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, ["A", "A1", "A2"]);
        let ancestors = store.get_ancestors(a2.id).unwrap();
        assert_eq!(ancestors.len(), 1);
        assert_eq!(ancestors[0].id, a.id);
    }

    #[test]
    fn test_delete_removes_subtree() {
        let mut store = MemoryStore::new();
        let a = store.add_root(1, NewEntry::new("A", "/a/")).unwrap();
        let a1 = store.add_child(a.id, NewEntry::new("A1", "/a/1/")).unwrap();
        store.add_child(a1.id, NewEntry::new("A11", "/a/1/1/")).unwrap();
        store.add_root(1, NewEntry::new("B", "/b/")).unwrap();
        assert_eq!(store.delete(a1.id).unwrap(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a.id).unwrap().unwrap().numchild, 0);
    }

    #[test]
    fn test_uri_lookup_is_case_insensitive() {
        let mut store = MemoryStore::new();
        store.add_root(1, NewEntry::new("Hi", "/HI")).unwrap();
        assert_eq!(store.find_by_uri(1, "/hi").unwrap().len(), 1);
        assert!(store.find_by_uri(2, "/hi").unwrap().is_empty());
    }

    #[test]
    fn test_atomic_rolls_back_on_error() {
        let mut store = MemoryStore::new();
        let result: Result<(), MenuError> = store.atomic(|s| {
            s.add_root(1, NewEntry::new("A", "/a/"))?;
            s.add_root(1, NewEntry::new("Bad", "nope"))?;
            Ok(())
        });
        assert!(matches!(result, Err(MenuError::Validation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_published_counts_changes_only() {
        let mut store = MemoryStore::new();
        let a = store.add_root(1, NewEntry::new("A", "/a/")).unwrap();
        let b = store
            .add_root(1, NewEntry::new("B", "/b/").published(true))
            .unwrap();
        assert_eq!(store.set_published(&[a.id, b.id], true).unwrap(), 1);
        assert_eq!(store.set_published(&[a.id, b.id], true).unwrap(), 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("menus.json");
        let mut store = MemoryStore::new();
        let a = store.add_root(1, NewEntry::new("A", "/a/")).unwrap();
        store.save(&file).unwrap();

        let mut loaded = MemoryStore::load(&file).unwrap();
        assert_eq!(loaded.get(a.id).unwrap(), Some(a));
        assert_eq!(loaded.write_count(), 0);
        let b = loaded.add_root(1, NewEntry::new("B", "/b/")).unwrap();
        assert_eq!(b.id, 2);

        let missing = MemoryStore::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert!(missing.is_empty());
    }
}
