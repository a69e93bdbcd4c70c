use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display, Formatter},
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    collection::MenuSource,
    entry::SiteId,
    error::MenuError,
    node::MenuNode,
    processors::Pipeline,
    reconcile::{StalePolicy, UrlRegistry},
    request::MenuRequest,
    uri::{clean_title, StaticUrlSource, Uri, UrlSource},
};

fn default_site_id() -> SiteId {
    1
}

/// One entry of a menu declared in configuration. `parent` is the parent item's `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticItem {
    pub path: String,
    pub title: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// A menu declared in configuration rather than generated by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticMenu {
    pub name: String,
    #[serde(default)]
    pub verbose_name: Option<String>,
    #[serde(default)]
    pub items: Vec<StaticItem>,
}

impl MenuSource for StaticMenu {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn verbose_name(&self) -> String {
        self.verbose_name.clone().unwrap_or_else(|| self.name.clone())
    }

    fn get_nodes(&self, _request: Option<&MenuRequest>) -> Result<Vec<MenuNode>, MenuError> {
        self.items
            .iter()
            .map(|item| {
                MenuNode::new(
                    item.title.as_str(),
                    item.path.as_str(),
                    item.path.as_str(),
                    item.parent.as_deref(),
                )
            })
            .collect()
    }
}

impl UrlSource for StaticMenu {
    fn verbose_name(&self) -> String {
        MenuSource::verbose_name(self)
    }

    fn get_urls(&self) -> Result<Vec<Uri>, MenuError> {
        StaticUrlSource {
            verbose_name: UrlSource::verbose_name(self),
            urls: self
                .items
                .iter()
                .map(|i| Uri::new(i.path.as_str(), clean_title(&i.title)))
                .collect(),
        }
        .get_urls()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuhinConfig {
    /// Dotted `module.Class` names resolved against a [`crate::registry::SourceCatalog`].
    #[serde(default)]
    pub menu_handlers: Option<Vec<String>>,
    /// Treat missing handler configuration as an error instead of a warning.
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_site_id")]
    pub site_id: SiteId,
    #[serde(default)]
    pub compare_querystrings: bool,
    #[serde(default)]
    pub depth_start: usize,
    #[serde(default)]
    pub stale_policy: StalePolicy,
    #[serde(default)]
    pub cache_timeout_secs: Option<u64>,
    #[serde(default)]
    pub static_menus: Vec<StaticMenu>,
}

impl Default for MenuhinConfig {
    fn default() -> Self {
        MenuhinConfig {
            menu_handlers: None,
            strict: false,
            site_id: default_site_id(),
            compare_querystrings: false,
            depth_start: 0,
            stale_policy: StalePolicy::default(),
            cache_timeout_secs: None,
            static_menus: Vec::new(),
        }
    }
}

impl MenuhinConfig {
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::standard(self.depth_start, self.compare_querystrings)
    }

    pub fn cache_timeout(&self) -> Option<Duration> {
        self.cache_timeout_secs.map(Duration::from_secs)
    }

    pub fn url_registry(&self) -> UrlRegistry {
        let mut registry = UrlRegistry::new();
        for menu in self.static_menus.iter() {
            registry.register(Arc::new(menu.clone()));
        }
        registry
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<MenuhinConfig, MenuError>;
    fn set_config(&self, config: &MenuhinConfig) -> Result<(), MenuError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<MenuhinConfig, MenuError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(MenuhinConfig::default());
        }
        let content = get_content(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn set_config(&self, config: &MenuhinConfig) -> Result<(), MenuError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

pub fn get_content<P: AsRef<Path>>(path: P) -> Result<String, MenuError> {
    tracing::debug!("Reading {:?}", path.as_ref());
    Ok(read_to_string(path)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CheckLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckMessage {
    pub level: CheckLevel,
    pub id: &'static str,
    pub message: String,
    pub hint: Option<String>,
}

impl Display for CheckMessage {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "({}) {:?}: {}", self.id, self.level, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n\tHINT: {hint}")?;
        }
        Ok(())
    }
}

/// Startup sanity checks for a configuration.
pub fn check_settings(config: &MenuhinConfig) -> Vec<CheckMessage> {
    let mut messages = Vec::new();
    match &config.menu_handlers {
        None => messages.push(CheckMessage {
            level: CheckLevel::Error,
            id: "menuhin.E1",
            message: "menuhin can't discover any menus without `menu_handlers`".to_string(),
            hint: Some("list dotted paths to menu sources, e.g. [\"blog.Posts\"]".to_string()),
        }),
        Some(handlers) if handlers.is_empty() => messages.push(CheckMessage {
            level: CheckLevel::Warning,
            id: "menuhin.W1",
            message: "You haven't defined any handlers for menuhin".to_string(),
            hint: Some("make `menu_handlers` a list of dotted paths to menu sources".to_string()),
        }),
        Some(handlers) => {
            for bad in handlers.iter().filter(|h| !h.contains('.')) {
                messages.push(CheckMessage {
                    level: CheckLevel::Error,
                    id: "menuhin.E2",
                    message: format!("handler '{bad}' isn't a dotted path"),
                    hint: None,
                });
            }
        }
    }
    let mut seen = std::collections::BTreeSet::new();
    for menu in config.static_menus.iter() {
        if !seen.insert(menu.name.as_str()) {
            messages.push(CheckMessage {
                level: CheckLevel::Error,
                id: "menuhin.E3",
                message: format!("static menu '{}' is declared twice", menu.name),
                hint: None,
            });
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("menuhin.toml"));
        let config = provider.get_config().unwrap();
        assert_eq!(config, MenuhinConfig::default());
        assert_eq!(config.site_id, 1);
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("menuhin.toml"));
        let mut config = MenuhinConfig {
            menu_handlers: Some(vec!["blog.Posts".to_string()]),
            stale_policy: StalePolicy::Unpublish,
            ..Default::default()
        };
        config.static_menus.push(StaticMenu {
            name: "main".to_string(),
            verbose_name: None,
            items: vec![StaticItem {
                path: "/".to_string(),
                title: "Home".to_string(),
                parent: None,
            }],
        });
        provider.set_config(&config).unwrap();
        assert_eq!(provider.get_config().unwrap(), config);
    }

    #[test]
    fn test_parses_handwritten_toml() {
        let config: MenuhinConfig = toml::from_str(
            r#"
            menu_handlers = []
            stale_policy = "unpublish"

            [[static_menus]]
            name = "main"

            [[static_menus.items]]
            path = "/about/"
            title = "About"
            "#,
        )
        .unwrap();
        assert_eq!(config.stale_policy, StalePolicy::Unpublish);
        assert_eq!(config.static_menus[0].items[0].title, "About");
        let checks = check_settings(&config);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].level, CheckLevel::Warning);
    }

    #[test]
    fn test_check_settings_levels() {
        let checks = check_settings(&MenuhinConfig::default());
        assert_eq!(checks[0].level, CheckLevel::Error);

        let config = MenuhinConfig {
            menu_handlers: Some(vec!["nodots".to_string(), "a.B".to_string()]),
            ..Default::default()
        };
        let checks = check_settings(&config);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].id, "menuhin.E2");
    }
}
