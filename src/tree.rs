//! Persistent game tree
//!
//! A [`GameTree`] never changes after construction. Edits go through
//! [`GameTree::mutate`], which returns a new instance sharing every
//! untouched subtree with the old one, or the very same instance when
//! the edit changed nothing.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::cache::DerivedCache;
use crate::draft::Draft;
use crate::error::{check_step, Result};
use crate::id::{Counter, IdGenerator};
use crate::index::NodeIndex;
use crate::merge::{Merger, NoMerge};
use crate::node::{Currents, Node, NodeId};
use crate::traverse::{Horizontal, Nodes, Section, Sequence, Vertical};

/// Construction options for a [`GameTree`]
#[derive(Clone, Default)]
pub struct TreeConfig {
    id_generator: Option<Arc<dyn IdGenerator>>,
    merger: Option<Arc<dyn Merger>>,
    root: Option<Node>,
}

impl TreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    pub fn merger(mut self, merger: impl Merger + 'static) -> Self {
        self.merger = Some(Arc::new(merger));
        self
    }

    /// Start from an existing node graph instead of a fresh empty root
    pub fn root(mut self, root: Node) -> Self {
        self.root = Some(root);
        self
    }
}

struct TreeInner {
    root: Arc<Node>,
    id_generator: Arc<dyn IdGenerator>,
    merger: Arc<dyn Merger>,
    index: NodeIndex,
    cache: DerivedCache,
}

/// Immutable game tree with cached lookups and metrics
///
/// Cloning is cheap and yields the same instance; see [`GameTree::ptr_eq`].
#[derive(Clone)]
pub struct GameTree {
    inner: Arc<TreeInner>,
}

impl Default for GameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GameTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameTree")
            .field("root", &self.inner.root)
            .field("aliases", self.inner.index.aliases())
            .field("height", &self.inner.cache.cached_height())
            .field("structure_hash", &self.inner.cache.cached_structure_hash())
            .finish()
    }
}

impl Serialize for GameTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.inner.root.serialize(serializer)
    }
}

impl GameTree {
    /// Tree with a single empty root, ids from a counter starting at 0
    pub fn new() -> Self {
        Self::with_config(TreeConfig::new())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        let id_generator: Arc<dyn IdGenerator> = match (&config.id_generator, &config.root) {
            (Some(generator), _) => Arc::clone(generator),
            (None, Some(root)) => Arc::new(Counter::starting_at(first_free_id(root))),
            (None, None) => Arc::new(Counter::new()),
        };
        let root = match config.root {
            Some(root) => root,
            None => Node::new(id_generator.next_id(), None),
        };
        let merger = config.merger.unwrap_or_else(|| Arc::new(NoMerge));
        Self::from_parts(
            Arc::new(root),
            id_generator,
            merger,
            NodeIndex::default(),
            DerivedCache::new(),
        )
    }

    /// Wrap a plain node graph; fresh ids continue after its largest id
    pub fn from_root(root: Node) -> Self {
        Self::with_config(TreeConfig::new().root(root))
    }

    /// Rebuild a tree from its serialized root
    pub fn from_json(json: &str) -> Result<Self> {
        let root: Node = serde_json::from_str(json)?;
        Ok(Self::from_root(root))
    }

    /// Serialize as the plain `{id, data, parentId, children}` root
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.inner.root)?)
    }

    fn from_parts(
        root: Arc<Node>,
        id_generator: Arc<dyn IdGenerator>,
        merger: Arc<dyn Merger>,
        index: NodeIndex,
        cache: DerivedCache,
    ) -> Self {
        Self {
            inner: Arc::new(TreeInner {
                root,
                id_generator,
                merger,
                index,
                cache,
            }),
        }
    }

    /// Whether both handles are the same tree instance
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.inner.root
    }

    pub fn root_id(&self) -> NodeId {
        self.inner.root.id
    }

    pub fn id_generator(&self) -> &Arc<dyn IdGenerator> {
        &self.inner.id_generator
    }

    pub fn merger(&self) -> &Arc<dyn Merger> {
        &self.inner.merger
    }

    /// Redirects from merged ids to the ids that replaced them
    pub fn aliases(&self) -> &HashMap<NodeId, NodeId> {
        self.inner.index.aliases()
    }

    /// Next id from the lineage's generator
    pub fn next_id(&self) -> NodeId {
        self.inner.id_generator.next_id()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.list_nodes().count()
    }

    /// Always false, a tree has at least its root
    pub fn is_empty(&self) -> bool {
        false
    }

    #[cfg(test)]
    pub(crate) fn index(&self) -> &NodeIndex {
        &self.inner.index
    }

    pub(crate) fn cache(&self) -> &DerivedCache {
        &self.inner.cache
    }

    // ── Lookup ────────────────────────────────────────────────────────

    /// Node by id, following aliases; unknown ids yield `None`
    pub fn get(&self, id: NodeId) -> Option<Arc<Node>> {
        self.inner.index.get(&self.inner.root, id)
    }

    /// Nodes from `id` down its single-child chain
    pub fn get_sequence(&self, id: NodeId) -> Sequence {
        Sequence::new(self.get(id))
    }

    /// Move `step` edges from `id`: negative steps go up the parent chain,
    /// positive steps follow `currents` or the first child.
    pub fn navigate(&self, id: NodeId, step: i64, currents: &Currents) -> Option<Arc<Node>> {
        let mut node = self.get(id)?;
        let mut step = step;
        while step < 0 {
            node = self.get(node.parent_id?)?;
            step += 1;
        }
        while step > 0 {
            node = Arc::clone(node.selected_child(currents)?);
            step -= 1;
        }
        Some(node)
    }

    // ── Traversal ─────────────────────────────────────────────────────

    /// Every node, depth-first pre-order
    pub fn list_nodes(&self) -> Nodes {
        Nodes::new(&self.inner.root)
    }

    /// Depth of `id`, the root being level 0
    pub fn get_level(&self, id: NodeId) -> Option<usize> {
        let mut node = self.get(id)?;
        let mut level = 0;
        while let Some(parent) = node.parent_id.and_then(|id| self.get(id)) {
            node = parent;
            level += 1;
        }
        Some(level)
    }

    /// Nodes at exactly `level`, left to right
    pub fn get_section(&self, level: usize) -> Section {
        Section::new(&self.inner.root, level)
    }

    /// Walk sections sideways from `start`, continuing one level deeper
    /// (`step = 1`) or shallower (`step = -1`) when a section runs out.
    pub fn list_nodes_horizontally(&self, start: NodeId, step: i64) -> Result<Horizontal<'_>> {
        check_step(step)?;
        let step = step as isize;
        let walk = match self.get(start) {
            Some(node) => match self.get_level(node.id) {
                Some(level) => Horizontal::new(self, &node, level, step),
                None => Horizontal::empty(self, step),
            },
            None => Horizontal::empty(self, step),
        };
        Ok(walk)
    }

    /// Walk along a line from `start`, one `navigate` step at a time
    pub fn list_nodes_vertically<'a>(
        &'a self,
        start: NodeId,
        step: i64,
        currents: &'a Currents,
    ) -> Result<Vertical<'a>> {
        check_step(step)?;
        Ok(Vertical::new(self, self.get(start), step, Cow::Borrowed(currents)))
    }

    /// The current line from the root
    pub fn list_current_nodes<'a>(&'a self, currents: &'a Currents) -> Vertical<'a> {
        Vertical::new(self, Some(Arc::clone(&self.inner.root)), 1, Cow::Borrowed(currents))
    }

    /// The main line from the root
    pub fn list_main_nodes(&self) -> Vertical<'_> {
        Vertical::new(
            self,
            Some(Arc::clone(&self.inner.root)),
            1,
            Cow::Owned(Currents::new()),
        )
    }

    // ── Metrics ───────────────────────────────────────────────────────

    /// Length of the current line; not cached since `currents` varies
    pub fn get_current_height(&self, currents: &Currents) -> usize {
        let mut height = 0;
        let mut node = Some(&self.inner.root);
        while let Some(n) = node {
            height += 1;
            node = n.selected_child(currents);
        }
        height
    }

    /// Longest root-to-leaf path over all branches, memoized
    pub fn get_height(&self) -> usize {
        self.inner.cache.height(&self.inner.root)
    }

    /// Decimal fingerprint of ids and shape, memoized
    pub fn get_structure_hash(&self) -> &str {
        self.inner.cache.structure_hash(&self.inner.root)
    }

    // ── Line membership ───────────────────────────────────────────────

    /// Whether `id` lies on the line `currents` selects
    pub fn on_current_line(&self, id: NodeId, currents: &Currents) -> bool {
        let mut node = match self.get(id) {
            Some(node) => node,
            None => return false,
        };
        while let Some(parent_id) = node.parent_id {
            let parent = match self.get(parent_id) {
                Some(parent) => parent,
                None => return false,
            };
            if parent.selected_child(currents).map(|c| c.id) != Some(node.id) {
                return false;
            }
            node = parent;
        }
        true
    }

    /// Whether `id` lies on the main line
    pub fn on_main_line(&self, id: NodeId) -> bool {
        self.on_current_line(id, &Currents::new())
    }

    // ── Mutation ──────────────────────────────────────────────────────

    /// Apply `edit` to a draft of this tree
    ///
    /// Returns this same instance when the draft's root is untouched.
    pub fn mutate<F>(&self, edit: F) -> GameTree
    where
        F: FnOnce(&mut Draft<'_>),
    {
        self.mutate_with(edit).0
    }

    /// Like [`GameTree::mutate`], also returning the closure's result
    pub fn mutate_with<F, R>(&self, edit: F) -> (GameTree, R)
    where
        F: FnOnce(&mut Draft<'_>) -> R,
    {
        let mut draft = Draft::new(self);
        let output = edit(&mut draft);
        let (root, outcome) = draft.finish();

        if Arc::ptr_eq(&root, &self.inner.root) {
            tracing::trace!(root = root.id, "mutation left tree unchanged");
            return (self.clone(), output);
        }

        let memo = if outcome.pass_on_node_cache {
            let mut memo = self.inner.index.memo_snapshot();
            memo.extend(outcome.nodes);
            memo
        } else {
            HashMap::new()
        };
        tracing::debug!(
            root = root.id,
            passed_on = outcome.pass_on_node_cache,
            inherited_entries = memo.len(),
            aliases = outcome.aliases.len(),
            "mutation produced new tree"
        );

        let tree = Self::from_parts(
            root,
            Arc::clone(&self.inner.id_generator),
            Arc::clone(&self.inner.merger),
            NodeIndex::seeded(memo, outcome.aliases),
            DerivedCache::seeded(outcome.height, outcome.structure_hash),
        );
        (tree, output)
    }
}

/// Where the default counter starts for an existing graph
///
/// Normally one past the largest id. When that id is `u64::MAX`, the
/// counter starts at the widest run of unused ids instead.
fn first_free_id(root: &Node) -> NodeId {
    let mut ids = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        ids.push(node.id);
        stack.extend(node.children.iter().map(|c| &**c));
    }
    ids.sort_unstable();
    ids.dedup();

    let max = ids.last().copied().unwrap_or(0);
    if let Some(next) = max.checked_add(1) {
        return next;
    }

    // (start, length) of the widest gap, starting with the one below the smallest id
    let mut best = (0, ids[0]);
    for pair in ids.windows(2) {
        let len = pair[1] - pair[0] - 1;
        if len > best.1 {
            best = (pair[0] + 1, len);
        }
    }
    tracing::warn!(start = best.0, "largest id is u64::MAX, counting from widest unused range");
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;
    use crate::node::{data_from, NodeData};

    fn ids<I: Iterator<Item = Arc<Node>>>(it: I) -> Vec<NodeId> {
        it.map(|n| n.id).collect()
    }

    /// R(0) -> [A(1) -> [C(3)], B(2)]
    fn scenario() -> GameTree {
        GameTree::from_root(
            Node::new(0, None)
                .with_child(Node::new(1, None).with_child(Node::new(3, None)))
                .with_child(Node::new(2, None)),
        )
    }

    /// 0 -> [1 -> [3 -> [6], 4], 2 -> [5]]
    fn wide() -> GameTree {
        GameTree::from_root(
            Node::new(0, None)
                .with_child(
                    Node::new(1, None)
                        .with_child(Node::new(3, None).with_child(Node::new(6, None)))
                        .with_child(Node::new(4, None)),
                )
                .with_child(Node::new(2, None).with_child(Node::new(5, None))),
        )
    }

    #[test]
    fn test_new_tree_has_root_zero() {
        let tree = GameTree::new();
        assert_eq!(tree.root_id(), 0);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get_height(), 1);
        assert_eq!(tree.next_id(), 1);
    }

    #[test]
    fn test_from_root_continues_ids() {
        let tree = scenario();
        assert_eq!(tree.next_id(), 4);
    }

    #[test]
    fn test_custom_id_generator() {
        let tree = GameTree::with_config(TreeConfig::new().id_generator(Counter::starting_at(100)));
        assert_eq!(tree.root_id(), 100);
        assert_eq!(tree.next_id(), 101);
    }

    #[test]
    fn test_get_returns_matching_id() {
        let tree = scenario();
        for id in 0..4 {
            assert_eq!(tree.get(id).map(|n| n.id), Some(id));
        }
        assert!(tree.get(42).is_none());
    }

    #[test]
    fn test_scenario_height() {
        assert_eq!(scenario().get_height(), 3);
    }

    #[test]
    fn test_scenario_sequences() {
        let tree = scenario();
        assert_eq!(ids(tree.get_sequence(0)), vec![0]);
        assert_eq!(ids(tree.get_sequence(1)), vec![1, 3]);
        assert!(tree.get_sequence(9).next().is_none());
    }

    #[test]
    fn test_scenario_main_line() {
        let tree = scenario();
        assert_eq!(ids(tree.list_main_nodes()), vec![0, 1, 3]);
        assert!(tree.on_main_line(0));
        assert!(tree.on_main_line(3));
        assert!(!tree.on_main_line(2));
        assert!(!tree.on_main_line(99));
    }

    #[test]
    fn test_scenario_levels() {
        let tree = scenario();
        assert_eq!(tree.get_level(0), Some(0));
        assert_eq!(tree.get_level(2), Some(1));
        assert_eq!(tree.get_level(3), Some(2));
        assert_eq!(tree.get_level(7), None);
    }

    #[test]
    fn test_navigate_up() {
        let tree = scenario();
        let empty = Currents::new();
        assert_eq!(tree.navigate(3, -2, &empty).map(|n| n.id), Some(0));
        assert!(tree.navigate(3, -3, &empty).is_none());
        assert_eq!(tree.navigate(3, 0, &empty).map(|n| n.id), Some(3));
    }

    #[test]
    fn test_navigate_down_with_currents() {
        let tree = scenario();
        let mut currents = Currents::new();
        assert_eq!(tree.navigate(0, 2, &currents).map(|n| n.id), Some(3));
        currents.insert(0, 2);
        assert_eq!(tree.navigate(0, 1, &currents).map(|n| n.id), Some(2));
        assert!(tree.navigate(0, 2, &currents).is_none());
        assert!(tree.navigate(77, 1, &currents).is_none());
    }

    #[test]
    fn test_list_nodes_preorder() {
        assert_eq!(ids(wide().list_nodes()), vec![0, 1, 3, 6, 4, 2, 5]);
    }

    #[test]
    fn test_get_section() {
        let tree = wide();
        assert_eq!(ids(tree.get_section(2)), vec![3, 4, 5]);
        assert!(tree.get_section(4).next().is_none());
    }

    #[test]
    fn test_horizontal_forward_wraps_deeper() {
        let tree = wide();
        let walk = tree.list_nodes_horizontally(4, 1).unwrap();
        assert_eq!(ids(walk), vec![4, 5, 6]);
    }

    #[test]
    fn test_horizontal_backward_wraps_shallower() {
        let tree = wide();
        let walk = tree.list_nodes_horizontally(4, -1).unwrap();
        assert_eq!(ids(walk), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_horizontal_rejects_bad_step() {
        let tree = scenario();
        assert!(matches!(
            tree.list_nodes_horizontally(0, 2),
            Err(TreeError::InvalidStep(2))
        ));
        assert!(matches!(
            tree.list_nodes_horizontally(0, 0),
            Err(TreeError::InvalidStep(0))
        ));
    }

    #[test]
    fn test_horizontal_unknown_start_is_empty() {
        let tree = scenario();
        assert!(tree.list_nodes_horizontally(50, 1).unwrap().next().is_none());
    }

    #[test]
    fn test_vertical_walks() {
        let tree = wide();
        let empty = Currents::new();
        assert_eq!(ids(tree.list_nodes_vertically(6, -1, &empty).unwrap()), vec![6, 3, 1, 0]);
        assert_eq!(ids(tree.list_nodes_vertically(1, 1, &empty).unwrap()), vec![1, 3, 6]);
        assert!(matches!(
            tree.list_nodes_vertically(1, -2, &empty),
            Err(TreeError::InvalidStep(-2))
        ));
    }

    #[test]
    fn test_current_line() {
        let tree = wide();
        let mut currents = Currents::new();
        currents.insert(1, 4);
        assert_eq!(ids(tree.list_current_nodes(&currents)), vec![0, 1, 4]);
        assert_eq!(tree.get_current_height(&currents), 3);
        assert!(tree.on_current_line(4, &currents));
        assert!(!tree.on_current_line(3, &currents));
        assert!(!tree.on_current_line(5, &currents));

        currents.insert(0, 2);
        assert_eq!(ids(tree.list_current_nodes(&currents)), vec![0, 2, 5]);
        assert!(tree.on_current_line(5, &currents));
    }

    #[test]
    fn test_current_height_defaults_to_main_line() {
        let tree = wide();
        assert_eq!(tree.get_current_height(&Currents::new()), 4);
    }

    #[test]
    fn test_structure_hash_is_memoized() {
        let tree = scenario();
        assert_eq!(tree.cache().cached_structure_hash(), None);
        let first = tree.get_structure_hash().to_string();
        assert_eq!(tree.cache().cached_structure_hash(), Some(first.as_str()));
        assert_eq!(tree.get_structure_hash(), first);
    }

    #[test]
    fn test_structure_hash_sees_renamed_id() {
        let a = scenario();
        let b = GameTree::from_root(
            Node::new(0, None)
                .with_child(Node::new(1, None).with_child(Node::new(7, None)))
                .with_child(Node::new(2, None)),
        );
        assert_ne!(a.get_structure_hash(), b.get_structure_hash());
    }

    #[test]
    fn test_tree_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GameTree>();
        assert_send_sync::<Node>();
    }

    #[test]
    fn test_concurrent_reads_fill_caches_consistently() {
        let tree = Arc::new(wide());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tree = Arc::clone(&tree);
                std::thread::spawn(move || {
                    let found: Vec<Option<NodeId>> = (0..8).map(|id| tree.get(id).map(|n| n.id)).collect();
                    (found, tree.get_height(), tree.get_structure_hash().to_string())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let expected = wide();
        let want = (
            (0..8).map(|id| expected.get(id).map(|n| n.id)).collect::<Vec<_>>(),
            expected.get_height(),
            expected.get_structure_hash().to_string(),
        );
        for result in &results {
            assert_eq!(result, &want);
        }
        for id in 0..8 {
            assert!(tree.index().is_memoized(id));
        }
        for id in 0..=6 {
            assert_eq!(tree.get(id).unwrap().id, id);
        }
        assert!(tree.get(7).is_none());
    }

    #[test]
    fn test_structure_hash_ignores_payload() {
        let a = scenario();
        let b = GameTree::from_root(
            Node::new(0, None)
                .with_child(
                    Node::new(1, None)
                        .with_property("B", "dd")
                        .with_child(Node::new(3, None).with_property("W", "pp")),
                )
                .with_child(Node::new(2, None).with_property("C", "variation")),
        );
        assert_eq!(a.get_structure_hash(), b.get_structure_hash());
    }

    #[test]
    fn test_serialize_is_root() {
        let tree = scenario();
        let json = tree.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["id"], 0);
        assert_eq!(value["parentId"], serde_json::Value::Null);
        assert_eq!(value["children"][0]["children"][0]["id"], 3);
        assert!(value.get("aliases").is_none());
    }

    #[test]
    fn test_json_round_trip_keeps_structure() {
        let tree = wide();
        let back = GameTree::from_json(&tree.to_json().unwrap()).unwrap();
        assert_eq!(back.get_structure_hash(), tree.get_structure_hash());
        assert_eq!(back.next_id(), 7);
    }

    #[test]
    fn test_from_json_with_max_id_picks_free_range() {
        let tree = GameTree::from_json(r#"{"id":18446744073709551615,"children":[]}"#).unwrap();
        assert_eq!(tree.root_id(), u64::MAX);
        assert_eq!(tree.next_id(), 0);

        let json = r#"{"id":18446744073709551615,"children":[{"id":0,"parentId":18446744073709551615,"children":[]}]}"#;
        let tree = GameTree::from_json(json).unwrap();
        let fresh = tree.next_id();
        assert_eq!(fresh, 1);
        assert!(tree.get(fresh).is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(GameTree::from_json("{"), Err(TreeError::Json(_))));
    }

    // ── Mutation protocol ─────────────────────────────────────────────

    #[test]
    fn test_noop_mutation_returns_same_instance() {
        let tree = scenario();
        tree.get_height();
        let same = tree.mutate(|_| {});
        assert!(GameTree::ptr_eq(&tree, &same));
        assert_eq!(same.cache().cached_height(), Some(3));
    }

    #[test]
    fn test_failed_edits_are_noops() {
        let tree = scenario();
        let same = tree.mutate(|draft| {
            assert!(draft.append_node(99, NodeData::new()).is_none());
            assert!(!draft.add_to_property(99, "C", "x"));
            assert!(draft.shift_node(0, crate::draft::Shift::Left).is_none());
        });
        assert!(GameTree::ptr_eq(&tree, &same));
    }

    #[test]
    fn test_mutation_never_touches_original() {
        let tree = scenario();
        let hash = tree.get_structure_hash().to_string();
        let next = tree.mutate(|draft| {
            draft.append_node(3, data_from([("B", "aa")]));
        });
        assert!(!GameTree::ptr_eq(&tree, &next));
        assert_eq!(tree.len(), 4);
        assert_eq!(next.len(), 5);
        assert_eq!(tree.get_structure_hash(), hash);
        assert_ne!(next.get_structure_hash(), hash);
    }

    #[test]
    fn test_mutation_shares_untouched_subtrees() {
        let tree = wide();
        let next = tree.mutate(|draft| {
            draft.append_node(6, NodeData::new());
        });
        // 2 -> [5] sits off the edited path
        let old_b = tree.get(2).unwrap();
        let new_b = next.get(2).unwrap();
        assert!(Arc::ptr_eq(&old_b, &new_b));
        // 4 is a sibling of the edited path
        assert!(Arc::ptr_eq(&tree.get(4).unwrap(), &next.get(4).unwrap()));
        // the path itself is copied
        assert!(!Arc::ptr_eq(&tree.get(3).unwrap(), &next.get(3).unwrap()));
        assert!(!Arc::ptr_eq(tree.root(), next.root()));
    }

    #[test]
    fn test_mutation_inherits_generator_and_merger() {
        let tree = GameTree::with_config(
            TreeConfig::new().merger(crate::merge::PropertyMerger::new(["B", "W"])),
        );
        let next = tree.mutate(|draft| {
            draft.append_node(0, data_from([("B", "dd")]));
        });
        let (again, id) = next.mutate_with(|draft| draft.append_node(0, data_from([("B", "dd")])));
        assert_eq!(id, Some(1));
        assert_eq!(again.get(0).unwrap().children.len(), 1);
        // fresh ids keep counting across the lineage
        assert_eq!(again.next_id(), 3);
    }

    #[test]
    fn test_height_cache_grows_on_append() {
        let tree = scenario();
        assert_eq!(tree.get_height(), 3);
        let next = tree.mutate(|draft| {
            draft.append_node(3, NodeData::new());
        });
        assert_eq!(next.cache().cached_height(), Some(4));
        assert_eq!(next.cache().cached_structure_hash(), None);
        assert_eq!(next.get_height(), crate::cache::tree_height(next.root()));
    }

    #[test]
    fn test_remove_drops_node_cache() {
        let tree = scenario();
        tree.get(3);
        let next = tree.mutate(|draft| {
            draft.remove_node(1).unwrap();
        });
        assert!(!next.index().is_memoized(3));
        assert!(next.get(3).is_none());
        assert!(next.get(1).is_none());
        assert_eq!(next.get_height(), 2);
        assert!(tree.get(3).is_some());
    }

    #[test]
    fn test_append_passes_node_cache() {
        let tree = wide();
        tree.get(5);
        let (next, id) = tree.mutate_with(|draft| draft.append_node(6, NodeData::new()));
        let id = id.unwrap();
        assert!(next.index().is_memoized(id));
        assert!(next.index().is_memoized(5));
        assert_eq!(next.get(id).unwrap().parent_id, Some(6));
        assert!(Arc::ptr_eq(&next.get(5).unwrap(), &tree.get(5).unwrap()));
    }

    #[test]
    fn test_alias_after_merge() {
        let tree = GameTree::with_config(
            TreeConfig::new()
                .merger(crate::merge::PropertyMerger::new(["B", "W"]))
                .root(Node::new(0, None).with_child(Node::new(1, None).with_property("B", "dd"))),
        );
        let fresh = tree.next_id() + 1;
        let next = tree.mutate(|draft| {
            assert_eq!(draft.append_node(0, data_from([("B", "dd"), ("C", "hi")])), Some(1));
        });
        assert_eq!(next.aliases().get(&fresh), Some(&1));
        assert_eq!(next.get(fresh).map(|n| n.id), Some(1));
        assert_eq!(next.get(1).unwrap().data["C"], vec!["hi"]);
        assert_eq!(next.get_structure_hash(), tree.get_structure_hash());
    }
}
