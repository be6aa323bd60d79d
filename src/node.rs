//! Game tree node
//!
//! A node is one record in a game line (usually a move) with an opaque
//! property payload and an ordered list of children. Child 0 is the main
//! line; later children are variations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Unique node identifier
pub type NodeId = u64;

/// Node payload — property name to ordered list of values
pub type NodeData = BTreeMap<String, Vec<String>>;

/// Selected child per node, used to follow the current variation
pub type Currents = HashMap<NodeId, NodeId>;

/// Game tree node
///
/// Once a node is attached to a [`GameTree`](crate::GameTree) it is never
/// mutated; trees share untouched subtrees through the `Arc` children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier within the tree
    pub id: NodeId,
    /// Property payload
    #[serde(default)]
    pub data: NodeData,
    /// Parent node ID, `None` for the root
    pub parent_id: Option<NodeId>,
    /// Ordered children, index 0 is the main line
    #[serde(default)]
    pub children: Vec<Arc<Node>>,
}

impl Node {
    pub fn new(id: NodeId, parent_id: Option<NodeId>) -> Self {
        Self {
            id,
            data: NodeData::new(),
            parent_id,
            children: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    /// Attach `child` as the last child, rewriting its `parent_id`.
    pub fn with_child(mut self, mut child: Node) -> Self {
        child.parent_id = Some(self.id);
        self.children.push(Arc::new(child));
        self
    }

    /// Add a single property value
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.data
            .entry(String::from(key))
            .or_default()
            .push(String::from(value));
        self
    }

    /// First child, the main-line continuation
    pub fn main_child(&self) -> Option<&Arc<Node>> {
        self.children.first()
    }

    /// Child with the given id, if it is a direct child
    pub fn child(&self, id: NodeId) -> Option<&Arc<Node>> {
        self.children.iter().find(|c| c.id == id)
    }

    /// Position of a direct child
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        self.children.iter().position(|c| c.id == id)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The child a line follows: `currents[self.id]` when it names a child,
    /// else the first child.
    pub fn selected_child(&self, currents: &Currents) -> Option<&Arc<Node>> {
        match currents.get(&self.id) {
            Some(&id) => self.child(id),
            None => self.main_child(),
        }
    }
}

/// Build a payload from `(key, value)` pairs
pub fn data_from<'a, I>(pairs: I) -> NodeData
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut data = NodeData::new();
    for (k, v) in pairs {
        data.entry(String::from(k)).or_default().push(String::from(v));
    }
    data
}
