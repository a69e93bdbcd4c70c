//! Menu sources and the per-source [MenuCollection] that decorates their nodes.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
};

use crate::{
    entry::SiteId,
    error::MenuError,
    node::MenuNode,
    processors::{MenuTree, Pipeline},
    request::MenuRequest,
    slug::{slugify, MENU_TITLE_MAX_LENGTH},
};

/// A pluggable producer of menu nodes.
pub trait MenuSource: Send + Sync {
    /// Registry key.
    fn name(&self) -> String;

    fn verbose_name(&self) -> String {
        self.name()
    }

    fn verbose_name_plural(&self) -> String {
        format!("{}s", self.verbose_name())
    }

    /// Flat and unordered; parents are referenced by `unique_id`.
    fn get_nodes(&self, request: Option<&MenuRequest>) -> Result<Vec<MenuNode>, MenuError>;
}

pub type SourceMap = BTreeMap<String, Arc<dyn MenuSource>>;

/// Stable slug of a source's persisted grouping record.
pub fn menu_slug_for(source: &dyn MenuSource) -> String {
    slugify(&source.verbose_name_plural())
        .chars()
        .take(MENU_TITLE_MAX_LENGTH)
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

/// Persisted grouping record for one source within one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuRecord {
    pub site_id: SiteId,
    pub slug: String,
    pub display_title: String,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Above,
    Below,
    Replacing,
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Position::Above => write!(f, "above"),
            Position::Below => write!(f, "below"),
            Position::Replacing => write!(f, "replacing"),
        }
    }
}

/// An editorial override attached to one node of a source, by `target_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMenuItem {
    pub site_id: SiteId,
    pub menu_slug: String,
    pub target_id: String,
    pub position: Position,
    /// Own node; only emitted when both title and url are set.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    /// Name of another source whose nodes are grafted under the target.
    #[serde(default)]
    pub attach: Option<String>,
}

impl CustomMenuItem {
    pub fn new(site_id: SiteId, menu_slug: &str, target_id: &str, position: Position) -> Self {
        CustomMenuItem {
            site_id,
            menu_slug: menu_slug.to_string(),
            target_id: target_id.to_string(),
            position,
            title: None,
            url: None,
            unique_id: None,
            attach: None,
        }
    }

    pub fn with_node<T: Into<String>, U: Into<String>>(mut self, title: T, url: U) -> Self {
        self.title = Some(title.into());
        self.url = Some(url.into());
        self
    }

    pub fn with_unique_id<I: Into<String>>(mut self, unique_id: I) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn attaching<N: Into<String>>(mut self, source_name: N) -> Self {
        self.attach = Some(source_name.into());
        self
    }

    /// A replacing node takes over its target's id unless it names its own.
    fn own_unique_id(&self) -> String {
        match (&self.unique_id, self.position) {
            (Some(id), _) => id.clone(),
            (None, Position::Replacing) => self.target_id.clone(),
            (None, position) => format!("custom-{}-{}", self.target_id, position),
        }
    }

    fn has_own_node(&self) -> bool {
        self.title.is_some() && self.url.is_some()
    }

    /// Nodes this item contributes in place of (or around) `target`.
    fn to_menu_nodes(
        &self,
        target: &MenuNode,
        attachment: Option<&Arc<dyn MenuSource>>,
        request: Option<&MenuRequest>,
    ) -> Result<Vec<MenuNode>, MenuError> {
        let mut nodes = Vec::new();
        let mut own_id = None;
        if let (Some(title), Some(url)) = (&self.title, &self.url) {
            let id = self.own_unique_id();
            nodes.push(MenuNode::new(title.as_str(), url.as_str(), id.as_str(), target.parent_id())?);
            own_id = Some(id);
        }
        match (&self.attach, attachment) {
            (Some(_), Some(source)) => {
                let anchor = match self.position {
                    Position::Replacing => own_id.as_deref().or(target.parent_id()),
                    Position::Above | Position::Below => Some(target.unique_id()),
                };
                let branch = source.get_nodes(request)?;
                let ids = branch
                    .iter()
                    .map(|n| n.unique_id().to_string())
                    .collect::<Vec<_>>();
                for node in branch {
                    let is_branch_root = node
                        .parent_id()
                        .map_or(true, |p| !ids.iter().any(|id| id == p));
                    if is_branch_root {
                        nodes.push(node.with_parent(anchor)?);
                    } else {
                        nodes.push(node);
                    }
                }
            }
            (Some(name), None) => {
                tracing::warn!(
                    "custom item on '{}' attaches unknown menu source '{}'",
                    self.target_id,
                    name
                );
            }
            _ => {}
        }
        Ok(nodes)
    }
}

/// One source plus its overrides and decoration pipeline.
#[derive(Clone)]
pub struct MenuCollection {
    source: Arc<dyn MenuSource>,
    pipeline: Pipeline,
    custom_items: BTreeMap<String, Vec<CustomMenuItem>>,
    attachments: SourceMap,
    tree: Option<MenuTree>,
}

impl Debug for MenuCollection {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("MenuCollection")
            .field("name", &self.source.name())
            .field("pipeline", &self.pipeline.names())
            .field(
                "custom_items",
                &self.custom_items.values().map(Vec::len).sum::<usize>(),
            )
            .field("built", &self.tree.is_some())
            .finish()
    }
}

impl MenuCollection {
    pub fn new(source: Arc<dyn MenuSource>, pipeline: Pipeline) -> MenuCollection {
        MenuCollection {
            source,
            pipeline,
            custom_items: BTreeMap::new(),
            attachments: SourceMap::new(),
            tree: None,
        }
    }

    /// Install overrides keyed by target, several per target in the given order. Attached sources are resolved against `sources`
    /// now; unknown names are skipped when nodes are generated.
    pub fn with_custom_items(mut self, items: Vec<CustomMenuItem>, sources: &SourceMap) -> Self {
        for item in items {
            if let Some(name) = &item.attach {
                if let Some(source) = sources.get(name) {
                    self.attachments.insert(name.clone(), source.clone());
                }
            }
            self.custom_items
                .entry(item.target_id.clone())
                .or_default()
                .push(item);
        }
        self.tree = None;
        self
    }

    pub fn name(&self) -> String {
        self.source.name()
    }

    pub fn verbose_name(&self) -> String {
        self.source.verbose_name()
    }

    pub fn slug(&self) -> String {
        menu_slug_for(self.source.as_ref())
    }

    pub fn source(&self) -> &Arc<dyn MenuSource> {
        &self.source
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Source nodes with custom items spliced in: `above` yields the overrides then the
    /// original, `below` the original then the overrides, `replacing` only the overrides.
    ///
    /// Children of a replaced node move to the replacing node, or to the replaced node's
    /// parent when the replacement brings no node of its own.
    pub fn get_nodes(&self, request: Option<&MenuRequest>) -> Result<Vec<MenuNode>, MenuError> {
        let nodes = self.source.get_nodes(request)?;
        if self.custom_items.is_empty() {
            return Ok(nodes);
        }
        let mut spliced = Vec::with_capacity(nodes.len());
        let mut handed_over: BTreeMap<String, Option<String>> = BTreeMap::new();
        for node in nodes {
            let Some(items) = self.custom_items.get(node.unique_id()) else {
                spliced.push(node);
                continue;
            };
            let mut above = Vec::new();
            let mut below = Vec::new();
            let mut replacing = Vec::new();
            let mut successor = None;
            for item in items {
                let attachment = item.attach.as_ref().and_then(|n| self.attachments.get(n));
                let overrides = item.to_menu_nodes(&node, attachment, request)?;
                match item.position {
                    Position::Above => above.extend(overrides),
                    Position::Below => below.extend(overrides),
                    Position::Replacing => {
                        if successor.is_none() {
                            successor = Some(if item.has_own_node() {
                                Some(item.own_unique_id())
                            } else {
                                node.parent_id().map(str::to_string)
                            });
                        }
                        replacing.extend(overrides);
                    }
                }
            }
            spliced.extend(above);
            match successor {
                None => spliced.push(node),
                Some(successor) => {
                    if successor.as_deref() != Some(node.unique_id()) {
                        handed_over.insert(node.unique_id().to_string(), successor);
                    }
                    spliced.extend(replacing);
                }
            }
            spliced.extend(below);
        }
        if handed_over.is_empty() {
            return Ok(spliced);
        }
        spliced
            .into_iter()
            .map(|node| {
                let mut parent = node.parent_id().map(str::to_string);
                let mut moved = false;
                // At most one hop per replaced node.
                for _ in 0..=handed_over.len() {
                    let Some(next) = parent.as_deref().and_then(|p| handed_over.get(p)) else {
                        break;
                    };
                    parent = next.clone();
                    moved = true;
                }
                if moved {
                    node.with_parent(parent.as_deref())
                } else {
                    Ok(node)
                }
            })
            .collect()
    }

    /// Decorate already generated nodes with this collection's pipeline.
    pub fn decorate(
        &self,
        nodes: Vec<MenuNode>,
        request: Option<&MenuRequest>,
    ) -> Result<MenuTree, MenuError> {
        self.pipeline.run(nodes, request)
    }

    pub fn get_processed_nodes(&self, request: Option<&MenuRequest>) -> Result<MenuTree, MenuError> {
        let nodes = self.get_nodes(request)?;
        self.decorate(nodes, request)
    }

    /// Processed nodes with `min_depth <= depth <= max_depth`. A missing lower bound is 0, a
    /// missing upper bound is unbounded; inverted bounds give an empty result.
    pub fn filter(
        &self,
        request: Option<&MenuRequest>,
        min_depth: Option<usize>,
        max_depth: Option<usize>,
    ) -> Result<Vec<MenuNode>, MenuError> {
        let tree = self.get_processed_nodes(request)?;
        Ok(filter_depth(tree.into_nodes(), min_depth, max_depth))
    }

    /// Build (once) the request-independent tree.
    pub fn build(&mut self) -> Result<&MenuTree, MenuError> {
        if self.tree.is_none() {
            self.tree = Some(self.get_processed_nodes(None)?);
        }
        self.tree
            .as_ref()
            .ok_or_else(|| MenuError::NotFound(format!("menu '{}' was not built", self.name())))
    }

    pub fn tree(&self) -> Option<&MenuTree> {
        self.tree.as_ref()
    }

    pub fn invalidate(&mut self) {
        self.tree = None;
    }
}

pub fn filter_depth(
    nodes: Vec<MenuNode>,
    min_depth: Option<usize>,
    max_depth: Option<usize>,
) -> Vec<MenuNode> {
    if min_depth.is_none() && max_depth.is_none() {
        return nodes;
    }
    let min = min_depth.unwrap_or(0);
    let max = max_depth.unwrap_or(usize::MAX);
    if min > max {
        return Vec::new();
    }
    nodes
        .into_iter()
        .filter(|n| n.depth() >= min && n.depth() <= max)
        .collect()
}
