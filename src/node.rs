//! Transient menu nodes produced by a [`crate::collection::MenuSource`] for one build cycle.
//!
//! A [MenuNode] only carries its own identity and a parent pointer when it leaves a source.
//! Depth, ancestry, descendants and activity are filled in by the decoration pipeline in
//! [`crate::processors`]; nodes are never persisted.

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
};

use crate::{error::MenuError, uri::ObjectRef};

/// Relationship of a node to the node matching the current request.
#[derive(EnumSetType, Debug, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
pub enum Activity {
    Active,
    Ancestor,
    Descendant,
}

/// The caller-supplied part of a node; the only part that survives serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub title: String,
    pub url: String,
    pub unique_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub extra_context: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "NodeRecord", into = "NodeRecord")]
pub struct MenuNode {
    title: String,
    url: String,
    unique_id: String,
    parent_id: Option<String>,
    extra_context: BTreeMap<String, Value>,
    depth: usize,
    /// Root-to-immediate-parent order.
    ancestors: Vec<String>,
    descendants: Vec<String>,
    activity: EnumSet<Activity>,
}

impl MenuNode {
    pub fn new<T, U, I>(
        title: T,
        url: U,
        unique_id: I,
        parent_id: Option<&str>,
    ) -> Result<MenuNode, MenuError>
    where
        T: Into<String>,
        U: Into<String>,
        I: Into<String>,
    {
        MenuNode::try_from(NodeRecord {
            title: title.into(),
            url: url.into(),
            unique_id: unique_id.into(),
            parent_id: parent_id.map(str::to_string),
            extra_context: BTreeMap::new(),
        })
    }

    pub fn with_extra<K: Into<String>>(mut self, key: K, value: Value) -> MenuNode {
        self.extra_context.insert(key.into(), value);
        self
    }

    /// Record the domain object this node was generated from.
    pub fn with_origin(self, origin: &ObjectRef) -> MenuNode {
        self.with_extra("content_type", Value::from(origin.content_type.clone()))
            .with_extra("object_id", Value::from(origin.object_id.clone()))
    }

    /// The same node hung under a different parent. Computed fields are dropped.
    pub fn with_parent(self, parent_id: Option<&str>) -> Result<MenuNode, MenuError> {
        let mut record = NodeRecord::from(self);
        record.parent_id = parent_id.map(str::to_string);
        MenuNode::try_from(record)
    }

    pub fn origin(&self) -> Option<ObjectRef> {
        let content_type = self.extra_context.get("content_type")?.as_str()?;
        let object_id = self.extra_context.get("object_id")?.as_str()?;
        Some(ObjectRef::new(content_type, object_id))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn extra_context(&self) -> &BTreeMap<String, Value> {
        &self.extra_context
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    pub fn descendants(&self) -> &[String] {
        &self.descendants
    }

    pub fn activity(&self) -> EnumSet<Activity> {
        self.activity
    }

    pub fn is_active(&self) -> bool {
        self.activity.contains(Activity::Active)
    }

    pub fn is_ancestor(&self) -> bool {
        self.activity.contains(Activity::Ancestor)
    }

    pub fn is_descendant(&self) -> bool {
        self.activity.contains(Activity::Descendant)
    }

    /// A node is only worth rendering when title, url and unique_id are all non-empty.
    pub fn is_complete(&self) -> bool {
        !self.title.is_empty() && !self.url.is_empty() && !self.unique_id.is_empty()
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub(crate) fn set_ancestors(&mut self, ancestors: Vec<String>) {
        self.ancestors = ancestors;
    }

    /// Callers start from a reset node and push each id once.
    pub(crate) fn push_descendant(&mut self, id: &str) {
        self.descendants.push(id.to_string());
    }

    pub(crate) fn mark(&mut self, activity: Activity) {
        self.activity.insert(activity);
    }

    /// Drop everything the decoration pipeline computed.
    pub(crate) fn reset_decoration(&mut self) {
        self.depth = 0;
        self.ancestors.clear();
        self.descendants.clear();
        self.activity.clear();
    }
}

impl TryFrom<NodeRecord> for MenuNode {
    type Error = MenuError;

    fn try_from(record: NodeRecord) -> Result<MenuNode, MenuError> {
        if record.parent_id.as_deref() == Some(record.unique_id.as_str()) {
            return Err(MenuError::Structural(format!(
                "menu node '{}' cannot be its own parent",
                record.unique_id
            )));
        }
        Ok(MenuNode {
            title: record.title,
            url: record.url,
            unique_id: record.unique_id,
            parent_id: record.parent_id,
            extra_context: record.extra_context,
            depth: 0,
            ancestors: Vec::new(),
            descendants: Vec::new(),
            activity: EnumSet::empty(),
        })
    }
}

impl From<MenuNode> for NodeRecord {
    fn from(node: MenuNode) -> NodeRecord {
        NodeRecord {
            title: node.title,
            url: node.url,
            unique_id: node.unique_id,
            parent_id: node.parent_id,
            extra_context: node.extra_context,
        }
    }
}

impl PartialEq for MenuNode {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id == other.unique_id
    }
}

impl Eq for MenuNode {}

impl Hash for MenuNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_id.hash(state);
    }
}

impl Display for MenuNode {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} ({}) -> {}", self.title, self.unique_id, self.url)
    }
}
