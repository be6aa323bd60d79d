//! Derived-metric caches
//!
//! Height and structure hash are expensive whole-tree walks, so each tree
//! instance computes them at most once. A mutation that cannot change
//! them hands the values on to the new instance.

use once_cell::sync::OnceCell;

use crate::node::Node;

const HASH_SEED: u32 = 5381;

/// Lazily filled height and structure hash of one tree instance
#[derive(Debug, Default)]
pub struct DerivedCache {
    height: OnceCell<usize>,
    structure_hash: OnceCell<String>,
}

impl DerivedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-filled with values carried over from a previous instance
    pub fn seeded(height: Option<usize>, structure_hash: Option<String>) -> Self {
        let cache = Self::new();
        if let Some(h) = height {
            let _ = cache.height.set(h);
        }
        if let Some(s) = structure_hash {
            let _ = cache.structure_hash.set(s);
        }
        cache
    }

    /// Height of the tree under `root`, computed on first call
    pub fn height(&self, root: &Node) -> usize {
        *self.height.get_or_init(|| tree_height(root))
    }

    /// Structure hash of the tree under `root`, computed on first call
    pub fn structure_hash(&self, root: &Node) -> &str {
        self.structure_hash
            .get_or_init(|| structure_hash(root).to_string())
    }

    pub fn cached_height(&self) -> Option<usize> {
        self.height.get().copied()
    }

    pub fn cached_structure_hash(&self) -> Option<&str> {
        self.structure_hash.get().map(String::as_str)
    }
}

/// Number of nodes on the longest root-to-leaf path (a lone root is 1)
pub fn tree_height(root: &Node) -> usize {
    let mut max = 0;
    let mut stack = vec![(root, 1usize)];
    while let Some((node, depth)) = stack.pop() {
        max = max.max(depth);
        for child in &node.children {
            stack.push((&**child, depth + 1));
        }
    }
    max
}

enum Visit<'a> {
    Enter(&'a Node),
    Exit,
}

/// Fingerprint of ids and shape, ignoring payloads
///
/// Pre-order walk emitting `[<id>` on entering a node and `]` on leaving
/// it; every character is folded as `h = h * 33 ^ c` from seed 5381.
pub fn structure_hash(root: &Node) -> u32 {
    let mut h = HASH_SEED;
    let mut stack = vec![Visit::Enter(root)];
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(node) => {
                fold(&mut h, '[');
                for c in node.id.to_string().chars() {
                    fold(&mut h, c);
                }
                stack.push(Visit::Exit);
                for child in node.children.iter().rev() {
                    stack.push(Visit::Enter(&**child));
                }
            }
            Visit::Exit => fold(&mut h, ']'),
        }
    }
    h
}

#[inline]
fn fold(h: &mut u32, c: char) {
    *h = h.wrapping_mul(33) ^ (c as u32);
}
