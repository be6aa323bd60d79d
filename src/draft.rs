//! Copy-on-write draft
//!
//! A [`Draft`] is the only way to edit a tree. It starts as a view over
//! the base tree and copies a node (together with every ancestor up to
//! the root) the first time that node is written. Anything never written
//! stays the base tree's own `Arc`, so the finished root shares it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Result, TreeError};
use crate::index::IndexEntry;
use crate::node::{Node, NodeData, NodeId};
use crate::tree::GameTree;

/// Direction for [`Draft::shift_node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// One place towards index 0
    Left,
    /// One place towards the last index
    Right,
    /// Straight to index 0, the main line
    Main,
}

/// Options for [`Draft::append_node_with`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    /// Always append a new node, never ask the merger
    pub disable_merging: bool,
}

/// Child slot: untouched base subtree or a node copied into the draft
#[derive(Debug, Clone)]
enum Slot {
    Shared(Arc<Node>),
    Owned(NodeId),
}

impl Slot {
    fn id(&self) -> NodeId {
        match self {
            Slot::Shared(node) => node.id,
            Slot::Owned(id) => *id,
        }
    }
}

/// Writable copy of a node
#[derive(Debug, Clone)]
pub struct DraftNode {
    id: NodeId,
    data: NodeData,
    parent_id: Option<NodeId>,
    children: Vec<Slot>,
}

impl DraftNode {
    fn copy_of(node: &Node) -> Self {
        Self {
            id: node.id,
            data: node.data.clone(),
            parent_id: node.parent_id,
            children: node.children.iter().cloned().map(Slot::Shared).collect(),
        }
    }
}

/// Read-only view of a node as the draft currently sees it
#[derive(Debug, Clone)]
pub enum NodeView<'d> {
    /// Not written by this draft yet
    Shared(Arc<Node>),
    /// Copied or created by this draft
    Owned(&'d DraftNode),
}

impl NodeView<'_> {
    pub fn id(&self) -> NodeId {
        match self {
            NodeView::Shared(node) => node.id,
            NodeView::Owned(node) => node.id,
        }
    }

    pub fn data(&self) -> &NodeData {
        match self {
            NodeView::Shared(node) => &node.data,
            NodeView::Owned(node) => &node.data,
        }
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        match self {
            NodeView::Shared(node) => node.parent_id,
            NodeView::Owned(node) => node.parent_id,
        }
    }

    pub fn child_ids(&self) -> Vec<NodeId> {
        match self {
            NodeView::Shared(node) => node.children.iter().map(|c| c.id).collect(),
            NodeView::Owned(node) => node.children.iter().map(Slot::id).collect(),
        }
    }
}

/// What a finished draft hands to the tree it produces
#[derive(Debug)]
pub struct DraftOutcome {
    /// Whether the base tree's index stays valid for the new tree
    pub pass_on_node_cache: bool,
    /// Index entries for every node the draft wrote, plus absence markers
    pub nodes: HashMap<NodeId, IndexEntry>,
    pub aliases: HashMap<NodeId, NodeId>,
    pub height: Option<usize>,
    pub structure_hash: Option<String>,
}

/// Mutable builder over a [`GameTree`], driven by [`GameTree::mutate`]
pub struct Draft<'a> {
    base: &'a GameTree,
    root: Slot,
    /// Written nodes; `None` marks ids that are gone or never existed
    nodes: HashMap<NodeId, Option<DraftNode>>,
    aliases: HashMap<NodeId, NodeId>,
    height: Option<usize>,
    structure_hash: Option<String>,
    pass_on_node_cache: bool,
}

impl<'a> Draft<'a> {
    pub(crate) fn new(base: &'a GameTree) -> Self {
        Self {
            base,
            root: Slot::Shared(Arc::clone(base.root())),
            nodes: HashMap::new(),
            aliases: base.aliases().clone(),
            height: base.cache().cached_height(),
            structure_hash: base.cache().cached_structure_hash().map(String::from),
            pass_on_node_cache: true,
        }
    }

    /// The tree this draft edits
    pub fn base(&self) -> &GameTree {
        self.base
    }

    pub fn root_id(&self) -> NodeId {
        self.root.id()
    }

    fn resolve(&self, mut id: NodeId) -> NodeId {
        while let Some(&next) = self.aliases.get(&id) {
            id = next;
        }
        id
    }

    /// Current state of `id`, without copying anything
    pub fn get(&self, id: NodeId) -> Option<NodeView<'_>> {
        let id = self.resolve(id);
        match self.nodes.get(&id) {
            Some(Some(node)) => return Some(NodeView::Owned(node)),
            Some(None) => return None,
            None => {}
        }
        if !self.is_attached(id) {
            return None;
        }
        self.base.get(id).map(NodeView::Shared)
    }

    /// Whether an unwritten base node is still part of the draft's tree
    fn is_attached(&self, id: NodeId) -> bool {
        let mut node = match self.base.get(id) {
            Some(node) => node,
            None => return false,
        };
        loop {
            if node.id == self.root.id() {
                return true;
            }
            let parent_id = match node.parent_id {
                Some(parent_id) => parent_id,
                None => return false,
            };
            match self.nodes.get(&parent_id) {
                Some(Some(parent)) => return parent.children.iter().any(|c| c.id() == node.id),
                Some(None) => return false,
                None => {
                    node = match self.base.get(parent_id) {
                        Some(parent) => parent,
                        None => return false,
                    }
                }
            }
        }
    }

    /// Copy `id` and its ancestors into the draft. False if `id` is not in
    /// the draft's tree.
    fn touch(&mut self, id: NodeId) -> bool {
        match self.nodes.get(&id) {
            Some(Some(_)) => return true,
            Some(None) => return false,
            None => {}
        }
        if !self.is_attached(id) {
            return false;
        }
        let base = match self.base.get(id) {
            Some(node) => node,
            None => {
                self.nodes.insert(id, None);
                return false;
            }
        };

        if self.root.id() == id {
            self.root = Slot::Owned(id);
        } else if let Some(parent_id) = base.parent_id {
            if !self.touch(parent_id) {
                return false;
            }
            if let Some(Some(parent)) = self.nodes.get_mut(&parent_id) {
                for slot in parent.children.iter_mut() {
                    if slot.id() == id {
                        *slot = Slot::Owned(id);
                    }
                }
            }
        }
        self.nodes.insert(id, Some(DraftNode::copy_of(&base)));
        true
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut DraftNode> {
        self.nodes.get_mut(&id).and_then(Option::as_mut)
    }

    /// Depth of a written node, following written parents
    fn owned_level(&self, id: NodeId) -> Option<usize> {
        let mut level = 0;
        let mut node = self.nodes.get(&id)?.as_ref()?;
        while let Some(parent_id) = node.parent_id {
            node = self.nodes.get(&parent_id)?.as_ref()?;
            level += 1;
        }
        Some(level)
    }

    // ── Structure edits ───────────────────────────────────────────────

    /// Append `data` under `parent`, possibly merged into an existing
    /// child. Returns the id that now holds `data`.
    pub fn append_node(&mut self, parent: NodeId, data: NodeData) -> Option<NodeId> {
        self.append_node_with(parent, data, AppendOptions::default())
    }

    pub fn append_node_with(
        &mut self,
        parent: NodeId,
        data: NodeData,
        options: AppendOptions,
    ) -> Option<NodeId> {
        let id = self.base.next_id();
        if self.append_node_with_id(parent, id, data, options) {
            Some(self.resolve(id))
        } else {
            None
        }
    }

    /// Append with a caller-chosen id, which must be unused in the tree
    pub fn append_node_with_id(
        &mut self,
        parent: NodeId,
        id: NodeId,
        data: NodeData,
        options: AppendOptions,
    ) -> bool {
        if self.get(id).is_some()
            || matches!(self.nodes.get(&id), Some(Some(_)))
            || self.aliases.contains_key(&id)
        {
            tracing::debug!(id, "append rejected, id already in use");
            return false;
        }
        let parent = self.resolve(parent);
        let children = match self.get(parent) {
            Some(view) => view.child_ids(),
            None => return false,
        };

        if !options.disable_merging {
            let merger = Arc::clone(self.base.merger());
            let merged = children.into_iter().find_map(|child| {
                let view = self.get(child)?;
                merger.merge(view.data(), &data).map(|d| (child, d))
            });
            if let Some((target, merged)) = merged {
                if !self.touch(target) {
                    return false;
                }
                if let Some(node) = self.node_mut(target) {
                    node.data = merged;
                }
                self.aliases.insert(id, target);
                tracing::debug!(id, target, "merged appended node into existing child");
                return true;
            }
        }

        if !self.touch(parent) {
            return false;
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(Slot::Owned(id));
        }
        self.nodes.insert(
            id,
            Some(DraftNode {
                id,
                data,
                parent_id: Some(parent),
                children: Vec::new(),
            }),
        );

        self.structure_hash = None;
        if let Some(height) = self.height {
            self.height = self
                .owned_level(id)
                .map(|level| height.max(level + 1));
        }
        tracing::trace!(id, parent, "appended node");
        true
    }

    /// Detach `id` and its subtree. Returns `Ok(false)` for unknown ids.
    pub fn remove_node(&mut self, id: NodeId) -> Result<bool> {
        let id = self.resolve(id);
        let parent = match self.get(id) {
            Some(view) => match view.parent_id() {
                Some(parent) => parent,
                None => return Err(TreeError::RemoveRoot(id)),
            },
            None => return Ok(false),
        };
        if !self.touch(parent) {
            return Ok(false);
        }
        let removed = match self.node_mut(parent) {
            Some(node) => match node.children.iter().position(|c| c.id() == id) {
                Some(index) => node.children.remove(index),
                None => return Ok(false),
            },
            None => return Ok(false),
        };

        self.forget(&removed);
        self.pass_on_node_cache = false;
        self.height = None;
        self.structure_hash = None;
        tracing::debug!(id, parent, "removed subtree");
        Ok(true)
    }

    /// Mark a detached slot and every written node below it as gone
    fn forget(&mut self, slot: &Slot) {
        let mut stack = vec![slot.clone()];
        while let Some(slot) = stack.pop() {
            if let Slot::Owned(id) = slot {
                if let Some(Some(node)) = self.nodes.insert(id, None) {
                    stack.extend(node.children);
                }
            } else {
                self.nodes.insert(slot.id(), None);
            }
        }
    }

    /// Move `id` among its siblings. Returns the new index.
    pub fn shift_node(&mut self, id: NodeId, direction: Shift) -> Option<usize> {
        let id = self.resolve(id);
        let parent = self.get(id)?.parent_id()?;
        let siblings = self.get(parent)?.child_ids();
        let index = siblings.iter().position(|&c| c == id)?;
        let target = match direction {
            Shift::Left => index.saturating_sub(1),
            Shift::Right => (index + 1).min(siblings.len() - 1),
            Shift::Main => 0,
        };
        if target == index {
            return Some(index);
        }

        if !self.touch(parent) {
            return None;
        }
        let node = self.node_mut(parent)?;
        let slot = node.children.remove(index);
        node.children.insert(target, slot);
        self.structure_hash = None;
        tracing::trace!(id, from = index, to = target, "shifted node");
        Some(target)
    }

    /// Make the subtree at `id` the whole tree
    pub fn make_root(&mut self, id: NodeId) -> bool {
        let id = self.resolve(id);
        if self.root.id() == id {
            return true;
        }
        if !self.touch(id) {
            return false;
        }
        if let Some(node) = self.node_mut(id) {
            node.parent_id = None;
        }
        self.root = Slot::Owned(id);
        self.prune_unreachable();
        self.pass_on_node_cache = false;
        self.height = None;
        self.structure_hash = None;
        tracing::debug!(id, "made node the new root");
        true
    }

    /// Drop written nodes that the current root no longer reaches
    fn prune_unreachable(&mut self) {
        let mut reachable = HashSet::new();
        let mut stack = vec![self.root.id()];
        while let Some(id) = stack.pop() {
            reachable.insert(id);
            if let Some(Some(node)) = self.nodes.get(&id) {
                for child in &node.children {
                    if let Slot::Owned(child_id) = child {
                        stack.push(*child_id);
                    }
                }
            }
        }
        for (id, entry) in self.nodes.iter_mut() {
            if !reachable.contains(id) {
                *entry = None;
            }
        }
    }

    // ── Payload edits ─────────────────────────────────────────────────

    fn edit_data<F>(&mut self, id: NodeId, edit: F) -> bool
    where
        F: FnOnce(&mut NodeData),
    {
        let id = self.resolve(id);
        if !self.touch(id) {
            return false;
        }
        match self.node_mut(id) {
            Some(node) => {
                edit(&mut node.data);
                true
            }
            None => false,
        }
    }

    /// Append `value` to `property`, moving it to the end if present
    pub fn add_to_property(&mut self, id: NodeId, property: &str, value: &str) -> bool {
        let already_last = match self.get(id) {
            Some(view) => view
                .data()
                .get(property)
                .and_then(|values| values.last())
                .map_or(false, |last| last == value),
            None => return false,
        };
        if already_last {
            return true;
        }
        self.edit_data(id, |data| {
            let values = data.entry(String::from(property)).or_default();
            values.retain(|v| v != value);
            values.push(String::from(value));
        })
    }

    /// Remove `value` from `property`, dropping the property once empty
    pub fn remove_from_property(&mut self, id: NodeId, property: &str, value: &str) -> bool {
        let present = match self.get(id) {
            Some(view) => match view.data().get(property) {
                Some(values) => values.iter().any(|v| v == value),
                None => return false,
            },
            None => return false,
        };
        if !present {
            return true;
        }
        self.edit_data(id, |data| {
            if let Some(values) = data.get_mut(property) {
                values.retain(|v| v != value);
                if values.is_empty() {
                    data.remove(property);
                }
            }
        })
    }

    /// Replace all values of `property`; an empty list removes it
    pub fn update_property(&mut self, id: NodeId, property: &str, values: Vec<String>) -> bool {
        let unchanged = match self.get(id) {
            Some(view) => match view.data().get(property) {
                Some(current) => *current == values,
                None => values.is_empty(),
            },
            None => return false,
        };
        if unchanged {
            return true;
        }
        self.edit_data(id, |data| {
            if values.is_empty() {
                data.remove(property);
            } else {
                data.insert(String::from(property), values);
            }
        })
    }

    pub fn remove_property(&mut self, id: NodeId, property: &str) -> bool {
        self.update_property(id, property, Vec::new())
    }

    // ── Finalize ──────────────────────────────────────────────────────

    /// Freeze written nodes into a new root
    ///
    /// Returns the base root itself when nothing was written.
    pub(crate) fn finish(self) -> (Arc<Node>, DraftOutcome) {
        let Draft {
            base,
            root,
            mut nodes,
            aliases,
            height,
            structure_hash,
            pass_on_node_cache,
        } = self;

        let mut built = HashMap::new();
        let root = freeze(&root, &mut nodes, &mut built)
            .unwrap_or_else(|| Arc::clone(base.root()));

        // leftover entries are absence markers or unreachable copies
        for (id, entry) in nodes {
            if entry.is_none() {
                built.entry(id).or_insert(None);
            }
        }

        let outcome = DraftOutcome {
            pass_on_node_cache,
            nodes: built,
            aliases,
            height,
            structure_hash,
        };
        (root, outcome)
    }
}

fn freeze(
    slot: &Slot,
    nodes: &mut HashMap<NodeId, Option<DraftNode>>,
    built: &mut HashMap<NodeId, IndexEntry>,
) -> Option<Arc<Node>> {
    let id = match slot {
        Slot::Shared(node) => return Some(Arc::clone(node)),
        Slot::Owned(id) => *id,
    };
    let draft = nodes.remove(&id)??;
    let children = draft
        .children
        .iter()
        .filter_map(|child| freeze(child, nodes, built))
        .collect();
    let node = Arc::new(Node {
        id: draft.id,
        data: draft.data,
        parent_id: draft.parent_id,
        children,
    });
    built.insert(id, Some(Arc::clone(&node)));
    Some(node)
}
