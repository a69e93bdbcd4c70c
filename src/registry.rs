//! Source registration and the application-wide [MenuContext].
//!
//! Sources are registered explicitly, either one by one or by resolving the dotted names
//! listed in [`crate::config::MenuhinConfig::menu_handlers`] against a [SourceCatalog]. A
//! [MenuContext] is built once at startup and passed to whatever renders menus; it owns the
//! built collections and an optional cache, and can be rebuilt with [MenuContext::reload].

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Formatter},
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    collection::{menu_slug_for, MenuCollection, MenuRecord, MenuSource, SourceMap},
    config::MenuhinConfig,
    entry::SiteId,
    error::MenuError,
    node::MenuNode,
    processors::{MenuTree, Pipeline},
    request::MenuRequest,
    slug::MENU_TITLE_MAX_LENGTH,
    store::MenuStore,
};

pub type SourceFactory = Arc<dyn Fn() -> Arc<dyn MenuSource> + Send + Sync>;

/// Every source this binary knows how to build, addressable as `module.Class`.
#[derive(Clone, Default)]
pub struct SourceCatalog {
    modules: BTreeMap<String, BTreeMap<String, SourceFactory>>,
}

impl Debug for SourceCatalog {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let names = self
            .modules
            .iter()
            .flat_map(|(m, classes)| classes.keys().map(move |c| format!("{m}.{c}")))
            .collect::<Vec<_>>();
        f.debug_struct("SourceCatalog").field("sources", &names).finish()
    }
}

impl SourceCatalog {
    pub fn new() -> SourceCatalog {
        SourceCatalog::default()
    }

    pub fn with<F>(mut self, module: &str, class: &str, factory: F) -> SourceCatalog
    where
        F: Fn() -> Arc<dyn MenuSource> + Send + Sync + 'static,
    {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(class.to_string(), Arc::new(factory));
        self
    }

    pub fn resolve(&self, dotted: &str) -> Result<Arc<dyn MenuSource>, MenuError> {
        let (module, class) = dotted.rsplit_once('.').ok_or_else(|| {
            MenuError::Configuration(format!(
                "'{dotted}' isn't a dotted path to a menu source (expected module.Class)"
            ))
        })?;
        let classes = self.modules.get(module).ok_or_else(|| {
            MenuError::Configuration(format!(
                "Error importing menu source module '{module}' for '{dotted}': no such module"
            ))
        })?;
        let factory = classes.get(class).ok_or_else(|| {
            MenuError::Configuration(format!(
                "Module '{module}' does not define a '{class}' menu source"
            ))
        })?;
        Ok(factory())
    }
}

/// The set of menu sources available to a [MenuContext], keyed by [MenuSource::name].
#[derive(Clone, Default)]
pub struct MenuRegistry {
    sources: SourceMap,
}

impl Debug for MenuRegistry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.sources.keys()).finish()
    }
}

impl MenuRegistry {
    pub fn new() -> MenuRegistry {
        MenuRegistry::default()
    }

    pub fn register(&mut self, source: Arc<dyn MenuSource>) -> Result<(), MenuError> {
        let name = source.name();
        if self.sources.contains_key(&name) {
            return Err(MenuError::Configuration(format!(
                "a menu source named '{name}' is already registered"
            )));
        }
        tracing::debug!("[MenuRegistry] registered '{}'", name);
        self.sources.insert(name, source);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn MenuSource>> {
        self.sources.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn MenuSource>> {
        self.sources.get(name)
    }

    /// Registered sources, ordered by name.
    pub fn models(&self) -> Vec<Arc<dyn MenuSource>> {
        self.sources.values().cloned().collect()
    }

    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Resolve every configured handler, then add the config's static menus. Missing handler
    /// configuration is an error in strict mode and a warning otherwise.
    pub fn from_config(
        config: &MenuhinConfig,
        catalog: &SourceCatalog,
    ) -> Result<MenuRegistry, MenuError> {
        let mut registry = MenuRegistry::new();
        match &config.menu_handlers {
            Some(handlers) => {
                for dotted in handlers {
                    registry.register(catalog.resolve(dotted)?)?;
                }
            }
            None if config.strict => {
                return Err(MenuError::Configuration(
                    "menu_handlers is not set; list dotted paths to menu sources".to_string(),
                ));
            }
            None => tracing::warn!("menu_handlers is not set; no menus will be discovered"),
        }
        for menu in config.static_menus.iter() {
            registry.register(Arc::new(menu.clone()))?;
        }
        Ok(registry)
    }

    /// Make sure every source has a [MenuRecord] for `site`. Returns each record and
    /// whether it was created by this call.
    pub fn get_or_create<S: MenuStore>(
        &self,
        store: &mut S,
        site: SiteId,
    ) -> Result<Vec<(MenuRecord, bool)>, MenuError> {
        let mut records = Vec::with_capacity(self.sources.len());
        for source in self.sources.values() {
            let slug = menu_slug_for(source.as_ref());
            if let Some(record) = store.get_menu(site, &slug)? {
                records.push((record, false));
                continue;
            }
            let record = MenuRecord {
                site_id: site,
                slug,
                display_title: source
                    .verbose_name_plural()
                    .chars()
                    .take(MENU_TITLE_MAX_LENGTH)
                    .collect::<String>()
                    .trim()
                    .to_string(),
                is_published: false,
            };
            store.create_menu(record.clone())?;
            tracing::info!("created menu '{}' for site {}", record.slug, site);
            records.push((record, true));
        }
        Ok(records)
    }
}

/// Optional key-value cache. Every failure mode of a cache is a miss.
pub trait MenuCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String, timeout: Option<Duration>);
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    values: Mutex<BTreeMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }

    pub fn clear(&self) {
        self.values.lock().clear();
    }
}

impl MenuCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut values = self.values.lock();
        let expired = matches!(values.get(key), Some((_, Some(expires))) if *expires <= Instant::now());
        if expired {
            values.remove(key);
            return None;
        }
        values.get(key).map(|(value, _)| value.clone())
    }

    fn set(&self, key: &str, value: String, timeout: Option<Duration>) {
        let expires = timeout.map(|t| Instant::now() + t);
        self.values.lock().insert(key.to_string(), (value, expires));
    }
}

/// One breadcrumb step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub title: String,
    pub url: String,
    pub unique_id: String,
    pub depth: usize,
}

impl From<&MenuNode> for Crumb {
    fn from(node: &MenuNode) -> Crumb {
        Crumb {
            title: node.title().to_string(),
            url: node.url().to_string(),
            unique_id: node.unique_id().to_string(),
            depth: node.depth(),
        }
    }
}

/// Built menus plus everything needed to rebuild them.
pub struct MenuContext {
    registry: MenuRegistry,
    pipeline: Pipeline,
    cache: Option<Arc<dyn MenuCache>>,
    cache_timeout: Option<Duration>,
    menus: RwLock<BTreeMap<String, MenuCollection>>,
}

impl Debug for MenuContext {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("MenuContext")
            .field("registry", &self.registry)
            .field("pipeline", &self.pipeline.names())
            .field("cached", &self.cache.is_some())
            .field("menus", &self.menus.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MenuContext {
    pub fn new(registry: MenuRegistry, pipeline: Pipeline) -> MenuContext {
        MenuContext {
            registry,
            pipeline,
            cache: None,
            cache_timeout: None,
            menus: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn from_config(
        config: &MenuhinConfig,
        catalog: &SourceCatalog,
    ) -> Result<MenuContext, MenuError> {
        let registry = MenuRegistry::from_config(config, catalog)?;
        Ok(MenuContext::new(registry, config.pipeline()))
    }

    pub fn with_cache(mut self, cache: Arc<dyn MenuCache>, timeout: Option<Duration>) -> Self {
        self.cache = Some(cache);
        self.cache_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &MenuRegistry {
        &self.registry
    }

    pub fn is_loaded(&self) -> bool {
        !self.menus.read().is_empty()
    }

    /// Create a collection per registered source, with the custom items stored for `site`.
    /// A no-op once loaded; see [MenuContext::reload].
    #[tracing::instrument(skip(self, store))]
    pub fn load_menus<S: MenuStore>(&self, store: &S, site: SiteId) -> Result<usize, MenuError> {
        let mut menus = self.menus.write();
        if !menus.is_empty() {
            return Ok(menus.len());
        }
        for (name, source) in self.registry.sources() {
            let items = store.custom_items(site, &menu_slug_for(source.as_ref()))?;
            let collection = MenuCollection::new(source.clone(), self.pipeline.clone())
                .with_custom_items(items, self.registry.sources());
            menus.insert(name.clone(), collection);
        }
        tracing::debug!("[MenuContext] loaded {} menus", menus.len());
        Ok(menus.len())
    }

    /// Drop every built collection and load again.
    pub fn reload<S: MenuStore>(&self, store: &S, site: SiteId) -> Result<usize, MenuError> {
        self.menus.write().clear();
        self.load_menus(store, site)
    }

    /// The named collection, built. `None` when no such menu is loaded.
    pub fn menu(&self, key: &str) -> Result<Option<MenuCollection>, MenuError> {
        let mut menus = self.menus.write();
        let Some(collection) = menus.get_mut(key) else {
            return Ok(None);
        };
        collection.build()?;
        Ok(Some(collection.clone()))
    }

    /// Every loaded collection, built.
    pub fn all_menus(&self) -> Result<Vec<MenuCollection>, MenuError> {
        let mut menus = self.menus.write();
        let mut built = Vec::with_capacity(menus.len());
        for collection in menus.values_mut() {
            collection.build()?;
            built.push(collection.clone());
        }
        Ok(built)
    }

    fn cache_get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let raw = self.cache.as_ref()?.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("[MenuContext] discarding unreadable cache entry '{}': {}", key, e);
                None
            }
        }
    }

    fn cache_set<T: Serialize>(&self, key: &str, value: &T) {
        let Some(cache) = &self.cache else {
            return;
        };
        match serde_json::to_string(value) {
            Ok(raw) => cache.set(key, raw, self.cache_timeout),
            Err(e) => tracing::warn!("[MenuContext] not caching '{}': {}", key, e),
        }
    }

    /// Raw nodes come from the cache when possible; decoration always runs fresh against
    /// `request`.
    pub fn processed(
        &self,
        key: &str,
        request: Option<&MenuRequest>,
    ) -> Result<Option<MenuTree>, MenuError> {
        let Some(collection) = self.menus.read().get(key).cloned() else {
            return Ok(None);
        };
        let cache_key = format!(
            "menuhin_nodes_{}_{}",
            collection.name(),
            request.and_then(|r| r.user()).unwrap_or("anonymous")
        );
        let nodes = match self.cache_get::<Vec<MenuNode>>(&cache_key) {
            Some(nodes) => nodes,
            None => {
                let nodes = collection.get_nodes(request)?;
                self.cache_set(&cache_key, &nodes);
                nodes
            }
        };
        collection.decorate(nodes, request).map(Some)
    }

    /// Trail to the first active node for `request`, in `menu` or across every loaded menu.
    /// Cached per path, menu and user.
    pub fn breadcrumbs_for(
        &self,
        request: &MenuRequest,
        menu: Option<&str>,
    ) -> Result<Vec<Crumb>, MenuError> {
        let mut hasher = Sha256::new();
        hasher.update(request.full_path().as_bytes());
        hasher.update(b"|");
        hasher.update(menu.unwrap_or_default().as_bytes());
        hasher.update(b"|");
        hasher.update(request.user().unwrap_or("anonymous").as_bytes());
        let cache_key = format!("menuhin_crumbs_{}", hex::encode(hasher.finalize()));
        if let Some(crumbs) = self.cache_get::<Vec<Crumb>>(&cache_key) {
            return Ok(crumbs);
        }
        let keys = match menu {
            Some(key) => vec![key.to_string()],
            None => self.menus.read().keys().cloned().collect(),
        };
        let mut crumbs = Vec::new();
        for key in keys {
            if let Some(tree) = self.processed(&key, Some(request))? {
                crumbs = tree.breadcrumbs().into_iter().map(Crumb::from).collect();
                if !crumbs.is_empty() {
                    break;
                }
            }
        }
        self.cache_set(&cache_key, &crumbs);
        Ok(crumbs)
    }
}
