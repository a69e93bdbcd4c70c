//! Shared test utilities for menu sources and persisted trees

use crate::{
    collection::MenuSource,
    entry::{EntryId, NewEntry, SiteId},
    error::MenuError,
    node::MenuNode,
    request::MenuRequest,
    store::{MemoryStore, MenuStore},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// `user_0 <- user_1 <- ... <- user_{len - 1}`
pub fn chain_nodes(len: usize) -> Vec<MenuNode> {
    (0..len)
        .map(|i| {
            let parent = (i > 0).then(|| format!("user_{}", i - 1));
            MenuNode::new(
                format!("User {i}"),
                format!("/users/{i}/"),
                format!("user_{i}"),
                parent.as_deref(),
            )
            .unwrap()
        })
        .collect()
}

/// A source that hands out a fixed node list.
#[derive(Debug, Clone)]
pub struct FixedSource {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub nodes: Vec<MenuNode>,
}

impl FixedSource {
    pub fn new(name: &'static str, nodes: Vec<MenuNode>) -> FixedSource {
        FixedSource {
            name,
            verbose_name: name,
            nodes,
        }
    }
}

impl MenuSource for FixedSource {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn verbose_name(&self) -> String {
        self.verbose_name.to_string()
    }

    fn get_nodes(&self, _request: Option<&MenuRequest>) -> Result<Vec<MenuNode>, MenuError> {
        Ok(self.nodes.clone())
    }
}

/// A source whose node generation always fails.
#[derive(Debug, Clone, Copy)]
pub struct BrokenSource;

impl MenuSource for BrokenSource {
    fn name(&self) -> String {
        "broken".to_string()
    }

    fn get_nodes(&self, _request: Option<&MenuRequest>) -> Result<Vec<MenuNode>, MenuError> {
        Err(MenuError::Store("backing table is gone".to_string()))
    }
}

pub struct BulkNode {
    pub title: &'static str,
    pub uri: &'static str,
    pub slug: &'static str,
    pub children: Vec<BulkNode>,
}

fn bulk(title: &'static str, uri: &'static str, slug: &'static str) -> BulkNode {
    BulkNode {
        title,
        uri,
        slug,
        children: Vec::new(),
    }
}

fn bulk_with(
    title: &'static str,
    uri: &'static str,
    slug: &'static str,
    children: Vec<BulkNode>,
) -> BulkNode {
    BulkNode {
        title,
        uri,
        slug,
        children,
    }
}

/// The reference site tree, every entry published:
///
/// ```text
/// /            root
/// /a/          default
///   /a/b/c/    abc
///   /d/        d
///   /e         e
///     /HI      hi
///   /x/        x
/// /sup         sup
/// /yo          yo
///   /hotdog/   hotdog
/// ```
pub fn bulk_data() -> Vec<BulkNode> {
    vec![
        bulk("1", "/", "root"),
        bulk_with(
            "2",
            "/a/",
            "default",
            vec![
                bulk("21", "/a/b/c/", "abc"),
                bulk("22", "/d/", "d"),
                bulk_with("23", "/e", "e", vec![bulk("231", "/HI", "hi")]),
                bulk("24", "/x/", "x"),
            ],
        ),
        bulk("3", "/sup", "sup"),
        bulk_with("4", "/yo", "yo", vec![bulk("41", "/hotdog/", "hotdog")]),
    ]
}

/// Insert `nodes` depth-first, so ids follow reading order.
pub fn load_bulk<S: MenuStore>(
    store: &mut S,
    site: SiteId,
    parent: Option<EntryId>,
    nodes: Vec<BulkNode>,
) -> Result<(), MenuError> {
    for node in nodes {
        let entry = NewEntry::new(node.title, node.uri)
            .with_slug(node.slug)
            .published(true);
        let stored = match parent {
            None => store.add_root(site, entry)?,
            Some(parent) => store.add_child(parent, entry)?,
        };
        load_bulk(store, site, Some(stored.id), node.children)?;
    }
    Ok(())
}

pub fn bulk_store(site: SiteId) -> MemoryStore {
    init_logging();
    let mut store = MemoryStore::new();
    load_bulk(&mut store, site, None, bulk_data()).unwrap();
    store
}
