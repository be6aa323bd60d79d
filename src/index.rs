//! Identifier index and alias table
//!
//! Memoized id -> node map filled lazily by depth-first search. Failed
//! lookups are memoized too, so asking twice for a missing id costs one
//! search. Aliases redirect ids that a mutation merged into another node.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::node::{Node, NodeId};

/// Memo entry: `None` marks an id known to be absent
pub type IndexEntry = Option<Arc<Node>>;

/// Per-instance identifier index
#[derive(Debug, Default)]
pub struct NodeIndex {
    memo: Mutex<HashMap<NodeId, IndexEntry>>,
    aliases: HashMap<NodeId, NodeId>,
}

impl NodeIndex {
    pub fn new(aliases: HashMap<NodeId, NodeId>) -> Self {
        Self::seeded(HashMap::new(), aliases)
    }

    /// Index starting from a memo inherited from a mutation
    pub fn seeded(memo: HashMap<NodeId, IndexEntry>, aliases: HashMap<NodeId, NodeId>) -> Self {
        Self {
            memo: Mutex::new(memo),
            aliases,
        }
    }

    /// Follow the alias chain to the current id
    pub fn resolve(&self, mut id: NodeId) -> NodeId {
        while let Some(&next) = self.aliases.get(&id) {
            id = next;
        }
        id
    }

    pub fn aliases(&self) -> &HashMap<NodeId, NodeId> {
        &self.aliases
    }

    /// Whether `id` has a memo entry (found or known absent)
    pub fn is_memoized(&self, id: NodeId) -> bool {
        self.memo.lock().contains_key(&id)
    }

    /// Copy of every memo entry, for handing on to a derived tree
    pub fn memo_snapshot(&self) -> HashMap<NodeId, IndexEntry> {
        self.memo.lock().clone()
    }

    /// Look up `id` in the tree under `root`
    ///
    /// The lock is held for the whole search so concurrent readers never
    /// observe a half-filled memo.
    pub fn get(&self, root: &Arc<Node>, id: NodeId) -> Option<Arc<Node>> {
        let id = self.resolve(id);
        let mut memo = self.memo.lock();

        let found = match memo.get(&id).cloned() {
            Some(entry) => entry,
            None => {
                tracing::trace!(id, "index miss, searching tree");
                search(root, id, &mut memo)
            }
        };

        match found {
            Some(node) => {
                for child in &node.children {
                    memo.insert(child.id, Some(Arc::clone(child)));
                }
                Some(node)
            }
            None => {
                tracing::trace!(id, "id not in tree, memoizing absence");
                memo.insert(id, None);
                None
            }
        }
    }
}

/// Pre-order search that memoizes every node it passes
fn search(root: &Arc<Node>, id: NodeId, memo: &mut HashMap<NodeId, IndexEntry>) -> IndexEntry {
    let mut stack = vec![Arc::clone(root)];
    while let Some(node) = stack.pop() {
        memo.insert(node.id, Some(Arc::clone(&node)));
        if node.id == id {
            return Some(node);
        }
        for child in node.children.iter().rev() {
            stack.push(Arc::clone(child));
        }
    }
    None
}
