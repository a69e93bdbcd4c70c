//! Decoration pipeline: turns a flat list of [MenuNode]s with parent pointers into a fully
//! cross-referenced tree (ancestors, descendants, depth, activity).
//!
//! # Execution order
//!
//! A [Pipeline] runs phase-complete: every node passes through the first processor before
//! any node reaches the second. Descendant lists are only whole once every node has its
//! ancestry, and activity marking reads both, so per-node interleaving would make results
//! depend on input order.
//!
//! The parent adjacency ([MenuTree::parent_of]) is fixed when the tree is built; processors
//! only ever write the computed fields of nodes.

use std::{collections::BTreeMap, collections::BTreeSet, fmt::Debug, sync::Arc};

use crate::{
    error::MenuError,
    node::{Activity, MenuNode},
    request::{query_multiset, split_query, MenuRequest},
};

/// The node set of one build cycle plus its `unique_id -> position` index.
#[derive(Debug, Clone, Default)]
pub struct MenuTree {
    nodes: Vec<MenuNode>,
    index: BTreeMap<String, usize>,
    parents: BTreeMap<String, Option<String>>,
}

impl MenuTree {
    /// Build the index. When two nodes share a `unique_id` the later one wins lookups.
    pub fn new(nodes: Vec<MenuNode>) -> MenuTree {
        let mut index = BTreeMap::new();
        let mut parents = BTreeMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            let id = node.unique_id().to_string();
            if index.insert(id.clone(), idx).is_some() {
                tracing::warn!("[MenuTree] duplicate unique_id '{}', keeping the later node", id);
            }
            parents.insert(id, node.parent_id().map(str::to_string));
        }
        MenuTree {
            nodes,
            index,
            parents,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[MenuNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<MenuNode> {
        self.nodes
    }

    pub fn get(&self, unique_id: &str) -> Option<&MenuNode> {
        self.index.get(unique_id).map(|idx| &self.nodes[*idx])
    }

    /// `None` both for unknown ids and for roots.
    pub fn parent_of(&self, unique_id: &str) -> Option<&str> {
        self.parents.get(unique_id)?.as_deref()
    }

    pub fn ancestors_of(&self, node: &MenuNode) -> Vec<&MenuNode> {
        node.ancestors().iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn descendants_of(&self, node: &MenuNode) -> Vec<&MenuNode> {
        node.descendants()
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn active(&self) -> Option<&MenuNode> {
        self.nodes.iter().find(|n| n.is_active())
    }

    /// Ancestors of the first active node followed by the node itself.
    pub fn breadcrumbs(&self) -> Vec<&MenuNode> {
        match self.active() {
            Some(active) => {
                let mut trail = self.ancestors_of(active);
                trail.push(active);
                trail
            }
            None => Vec::new(),
        }
    }

    /// False for a node shadowed by a later one with the same `unique_id`.
    fn is_indexed(&self, idx: usize) -> bool {
        self.index.get(self.nodes[idx].unique_id()) == Some(&idx)
    }

    fn node_mut(&mut self, unique_id: &str) -> Option<&mut MenuNode> {
        let idx = *self.index.get(unique_id)?;
        self.nodes.get_mut(idx)
    }

    /// Parent ids from the immediate parent up to the root. A parent missing from the tree
    /// ends the walk like a root would; revisiting an id is a cycle.
    fn parent_chain(&self, node: &MenuNode) -> Result<Vec<String>, MenuError> {
        let mut visited = BTreeSet::from([node.unique_id()]);
        let mut chain = Vec::new();
        let mut current = node.parent_id();
        while let Some(parent_id) = current {
            if !self.index.contains_key(parent_id) {
                break;
            }
            if !visited.insert(parent_id) {
                return Err(MenuError::Structural(format!(
                    "parent chain of menu node '{}' loops through '{}'",
                    node.unique_id(),
                    parent_id
                )));
            }
            chain.push(parent_id.to_string());
            current = self.parent_of(parent_id);
        }
        Ok(chain)
    }
}

/// Which structural role a processor plays; used to reject unsound pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    Ancestry,
    Descendants,
    /// Fused ancestry + descendants + depth.
    Hierarchy,
    Depth,
    Activity,
    Custom,
}

impl ProcessorKind {
    fn provides_ancestry(&self) -> bool {
        matches!(self, ProcessorKind::Ancestry | ProcessorKind::Hierarchy)
    }

    fn requires_ancestry(&self) -> bool {
        matches!(
            self,
            ProcessorKind::Descendants | ProcessorKind::Depth | ProcessorKind::Activity
        )
    }

    fn provides_descendants(&self) -> bool {
        matches!(self, ProcessorKind::Descendants | ProcessorKind::Hierarchy)
    }
}

pub trait Processor: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Custom
    }

    /// Apply this processor to every node of `tree`.
    fn process(&self, tree: &mut MenuTree, request: Option<&MenuRequest>)
        -> Result<(), MenuError>;
}

/// Fills `ancestors` in root-to-parent order by following `parent_id` pointers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AncestryCalculator;

impl Processor for AncestryCalculator {
    fn name(&self) -> &'static str {
        "ancestry"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Ancestry
    }

    fn process(&self, tree: &mut MenuTree, _request: Option<&MenuRequest>) -> Result<(), MenuError> {
        for idx in 0..tree.nodes.len() {
            let mut chain = tree.parent_chain(&tree.nodes[idx])?;
            chain.reverse();
            tree.nodes[idx].set_ancestors(chain);
        }
        Ok(())
    }
}

/// Registers each node with every one of its ancestors.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescendantCalculator;

impl Processor for DescendantCalculator {
    fn name(&self) -> &'static str {
        "descendants"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Descendants
    }

    fn process(&self, tree: &mut MenuTree, _request: Option<&MenuRequest>) -> Result<(), MenuError> {
        for idx in 0..tree.nodes.len() {
            if !tree.is_indexed(idx) {
                continue;
            }
            let id = tree.nodes[idx].unique_id().to_string();
            let ancestors = tree.nodes[idx].ancestors().to_vec();
            for ancestor in ancestors {
                if let Some(anc) = tree.node_mut(&ancestor) {
                    anc.push_descendant(&id);
                }
            }
        }
        Ok(())
    }
}

/// `depth = ancestors.len() + start`; `start` nests a sub-collection under an outside level.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthCalculator {
    pub start: usize,
}

impl Processor for DepthCalculator {
    fn name(&self) -> &'static str {
        "depth"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Depth
    }

    fn process(&self, tree: &mut MenuTree, _request: Option<&MenuRequest>) -> Result<(), MenuError> {
        for node in tree.nodes.iter_mut() {
            let depth = node.ancestors().len() + self.start;
            node.set_depth(depth);
        }
        Ok(())
    }
}

/// Ancestry, descendants and depth in one pass over the nodes. Use instead of the three
/// separate calculators, never alongside them.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyCalculator {
    pub start: usize,
}

impl Processor for HierarchyCalculator {
    fn name(&self) -> &'static str {
        "hierarchy"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Hierarchy
    }

    fn process(&self, tree: &mut MenuTree, _request: Option<&MenuRequest>) -> Result<(), MenuError> {
        for idx in 0..tree.nodes.len() {
            let mut chain = tree.parent_chain(&tree.nodes[idx])?;
            chain.reverse();
            if tree.is_indexed(idx) {
                let id = tree.nodes[idx].unique_id().to_string();
                for ancestor in chain.iter() {
                    if let Some(anc) = tree.node_mut(ancestor) {
                        anc.push_descendant(&id);
                    }
                }
            }
            let node = &mut tree.nodes[idx];
            node.set_depth(chain.len() + self.start);
            node.set_ancestors(chain);
        }
        Ok(())
    }
}

/// Marks the node whose url matches the request as active, its ancestors as
/// [Activity::Ancestor] and everything below it as [Activity::Descendant].
///
/// With `compare_querystrings` the paths must be equal and the query strings must hold the
/// same `(key, value)` multiset in any order; without it the stored url must equal the
/// request's full path exactly. Without a request this is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveCalculator {
    pub compare_querystrings: bool,
}

impl ActiveCalculator {
    pub fn matches(&self, url: &str, request: &MenuRequest) -> bool {
        if self.compare_querystrings {
            let (path, query) = split_query(url);
            path == request.path()
                && query_multiset(query) == query_multiset(request.query().unwrap_or_default())
        } else {
            url == request.full_path()
        }
    }
}

impl Processor for ActiveCalculator {
    fn name(&self) -> &'static str {
        "active"
    }

    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Activity
    }

    fn process(&self, tree: &mut MenuTree, request: Option<&MenuRequest>) -> Result<(), MenuError> {
        let Some(request) = request else {
            return Ok(());
        };
        let mut active = BTreeSet::new();
        for idx in 0..tree.nodes.len() {
            if !self.matches(tree.nodes[idx].url(), request) {
                continue;
            }
            tree.nodes[idx].mark(Activity::Active);
            active.insert(tree.nodes[idx].unique_id().to_string());
            let ancestors = tree.nodes[idx].ancestors().to_vec();
            for ancestor in ancestors {
                if let Some(anc) = tree.node_mut(&ancestor) {
                    anc.mark(Activity::Ancestor);
                }
            }
        }
        if active.is_empty() {
            return Ok(());
        }
        for node in tree.nodes.iter_mut() {
            if node.ancestors().iter().any(|a| active.contains(a)) {
                node.mark(Activity::Descendant);
            }
        }
        Ok(())
    }
}

/// An ordered, validated list of processors shared by every build of a collection.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    processors: Vec<Arc<dyn Processor>>,
}

impl Pipeline {
    pub fn new(processors: Vec<Arc<dyn Processor>>) -> Result<Pipeline, MenuError> {
        let kinds = processors.iter().map(|p| p.kind()).collect::<Vec<_>>();
        let fused = kinds.contains(&ProcessorKind::Hierarchy);
        let split = kinds
            .iter()
            .any(|k| matches!(k, ProcessorKind::Ancestry | ProcessorKind::Descendants));
        if fused && split {
            return Err(MenuError::Configuration(
                "HierarchyCalculator cannot be combined with the Ancestry or Descendant \
                 calculators; descendants would be counted twice"
                    .to_string(),
            ));
        }
        if kinds.iter().filter(|k| k.provides_descendants()).count() > 1 {
            return Err(MenuError::Configuration(
                "only one descendant-building processor may run per pipeline".to_string(),
            ));
        }
        let mut has_ancestry = false;
        for processor in processors.iter() {
            let kind = processor.kind();
            if kind.requires_ancestry() && !has_ancestry {
                return Err(MenuError::Configuration(format!(
                    "processor '{}' needs an ancestry processor earlier in the pipeline",
                    processor.name()
                )));
            }
            has_ancestry |= kind.provides_ancestry();
        }
        Ok(Pipeline { processors })
    }

    /// Ancestry, descendants, depth and activity, in that order.
    pub fn standard(start: usize, compare_querystrings: bool) -> Pipeline {
        Pipeline {
            processors: vec![
                Arc::new(AncestryCalculator),
                Arc::new(DescendantCalculator),
                Arc::new(DepthCalculator { start }),
                Arc::new(ActiveCalculator {
                    compare_querystrings,
                }),
            ],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Decorate `nodes` from scratch. On error the partially decorated set is dropped.
    #[tracing::instrument(skip(self, nodes, request), fields(nodes = nodes.len()))]
    pub fn run(
        &self,
        mut nodes: Vec<MenuNode>,
        request: Option<&MenuRequest>,
    ) -> Result<MenuTree, MenuError> {
        for node in nodes.iter_mut() {
            node.reset_decoration();
        }
        let mut tree = MenuTree::new(nodes);
        for processor in self.processors.iter() {
            tracing::debug!("[Pipeline] running '{}' over {} nodes", processor.name(), tree.len());
            processor.process(&mut tree, request)?;
        }
        Ok(tree)
    }
}
