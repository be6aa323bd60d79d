//! Lazy traversals
//!
//! Every walk over a [`GameTree`] is an iterator holding `Arc` handles or
//! a borrow of the tree. Dropping one half-way has no side effects other
//! than index entries the walk already memoized.

use std::borrow::Cow;
use std::sync::Arc;

use crate::node::{Currents, Node};
use crate::tree::GameTree;

/// Depth-first pre-order walk of every node
#[derive(Debug, Clone)]
pub struct Nodes {
    stack: Vec<Arc<Node>>,
}

impl Nodes {
    pub(crate) fn new(root: &Arc<Node>) -> Self {
        Self {
            stack: vec![Arc::clone(root)],
        }
    }
}

impl Iterator for Nodes {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev().cloned());
        Some(node)
    }
}

/// Run of nodes from a start node down its single-child chain
///
/// Ends after the first node that has zero or several children.
#[derive(Debug, Clone)]
pub struct Sequence {
    next: Option<Arc<Node>>,
}

impl Sequence {
    pub(crate) fn new(start: Option<Arc<Node>>) -> Self {
        Self { next: start }
    }
}

impl Iterator for Sequence {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next.take()?;
        if let [only] = node.children.as_slice() {
            self.next = Some(Arc::clone(only));
        }
        Some(node)
    }
}

/// All nodes at one depth, left to right
#[derive(Debug, Clone)]
pub struct Section {
    level: usize,
    stack: Vec<(Arc<Node>, usize)>,
}

impl Section {
    pub(crate) fn new(root: &Arc<Node>, level: usize) -> Self {
        Self {
            level,
            stack: vec![(Arc::clone(root), 0)],
        }
    }
}

impl Iterator for Section {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, depth)) = self.stack.pop() {
            if depth == self.level {
                return Some(node);
            }
            for child in node.children.iter().rev() {
                self.stack.push((Arc::clone(child), depth + 1));
            }
        }
        None
    }
}

/// Sibling-order walk that wraps to the next deeper or shallower section
#[derive(Debug)]
pub struct Horizontal<'a> {
    tree: &'a GameTree,
    section: Vec<Arc<Node>>,
    index: isize,
    level: isize,
    step: isize,
    done: bool,
}

impl<'a> Horizontal<'a> {
    /// `step` must already be validated as +1 or -1
    pub(crate) fn new(tree: &'a GameTree, start: &Arc<Node>, level: usize, step: isize) -> Self {
        let section: Vec<_> = tree.get_section(level).collect();
        let index = section.iter().position(|n| n.id == start.id);
        Self {
            tree,
            section,
            index: index.map_or(-1, |i| i as isize),
            level: level as isize,
            step,
            done: index.is_none(),
        }
    }

    pub(crate) fn empty(tree: &'a GameTree, step: isize) -> Self {
        Self {
            tree,
            section: Vec::new(),
            index: -1,
            level: 0,
            step,
            done: true,
        }
    }

    fn advance_section(&mut self) {
        self.level += self.step;
        self.section = if self.step > 0 {
            self.section
                .iter()
                .flat_map(|n| n.children.iter().cloned())
                .collect()
        } else if self.level < 0 {
            Vec::new()
        } else {
            self.tree.get_section(self.level as usize).collect()
        };
        self.index = if self.step > 0 {
            0
        } else {
            self.section.len() as isize - 1
        };
    }
}

impl Iterator for Horizontal<'_> {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let current = usize::try_from(self.index)
                .ok()
                .and_then(|i| self.section.get(i))
                .cloned();
            if let Some(node) = current {
                self.index += self.step;
                return Some(node);
            }
            self.advance_section();
            self.done = self.section.is_empty();
        }
        None
    }
}

/// Path walk repeatedly applying `navigate` with a fixed step
#[derive(Debug)]
pub struct Vertical<'a> {
    tree: &'a GameTree,
    next: Option<Arc<Node>>,
    step: i64,
    currents: Cow<'a, Currents>,
}

impl<'a> Vertical<'a> {
    /// `step` must already be validated as +1 or -1
    pub(crate) fn new(
        tree: &'a GameTree,
        start: Option<Arc<Node>>,
        step: i64,
        currents: Cow<'a, Currents>,
    ) -> Self {
        Self {
            tree,
            next: start,
            step,
            currents,
        }
    }
}

impl Iterator for Vertical<'_> {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next.take()?;
        self.next = self.tree.navigate(node.id, self.step, &self.currents);
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<I: Iterator<Item = Arc<Node>>>(it: I) -> Vec<u64> {
        it.map(|n| n.id).collect()
    }

    fn sample() -> Arc<Node> {
        // 0 -> [1 -> [3 -> [5]], 2 -> [4]]
        Arc::new(
            Node::new(0, None)
                .with_child(
                    Node::new(1, None).with_child(Node::new(3, None).with_child(Node::new(5, None))),
                )
                .with_child(Node::new(2, None).with_child(Node::new(4, None))),
        )
    }

    #[test]
    fn test_nodes_preorder() {
        assert_eq!(ids(Nodes::new(&sample())), vec![0, 1, 3, 5, 2, 4]);
    }

    #[test]
    fn test_sequence_follows_single_children() {
        let root = sample();
        let one = Arc::clone(&root.children[0]);
        assert_eq!(ids(Sequence::new(Some(one))), vec![1, 3, 5]);
    }

    #[test]
    fn test_sequence_stops_at_branch() {
        assert_eq!(ids(Sequence::new(Some(sample()))), vec![0]);
    }

    #[test]
    fn test_sequence_of_nothing() {
        assert!(Sequence::new(None).next().is_none());
    }

    #[test]
    fn test_section_levels() {
        let root = sample();
        assert_eq!(ids(Section::new(&root, 0)), vec![0]);
        assert_eq!(ids(Section::new(&root, 1)), vec![1, 2]);
        assert_eq!(ids(Section::new(&root, 2)), vec![3, 4]);
        assert_eq!(ids(Section::new(&root, 3)), vec![5]);
        assert!(Section::new(&root, 4).next().is_none());
    }

    #[test]
    fn test_nodes_can_be_abandoned() {
        let mut it = Nodes::new(&sample());
        assert_eq!(it.next().map(|n| n.id), Some(0));
        drop(it);
    }
}
