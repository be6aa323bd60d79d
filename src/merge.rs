//! Node merging
//!
//! When a draft appends a node under a parent, the merger decides whether
//! the new payload is really the same record as one of the existing
//! children. A merge replaces that child's payload instead of creating a
//! duplicate variation, and the fresh id becomes an alias of the child.

use crate::node::NodeData;

/// Conflict resolver consulted by [`Draft`](crate::Draft) on append
pub trait Merger: Send + Sync {
    /// Merged payload for `existing` absorbing `incoming`, or `None` to
    /// keep them as separate nodes.
    fn merge(&self, existing: &NodeData, incoming: &NodeData) -> Option<NodeData>;
}

impl<F> Merger for F
where
    F: Fn(&NodeData, &NodeData) -> Option<NodeData> + Send + Sync,
{
    fn merge(&self, existing: &NodeData, incoming: &NodeData) -> Option<NodeData> {
        self(existing, incoming)
    }
}

/// Never merges
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMerge;

impl Merger for NoMerge {
    fn merge(&self, _existing: &NodeData, _incoming: &NodeData) -> Option<NodeData> {
        None
    }
}

/// Merge nodes that agree on a set of identifying properties
///
/// With keys `["B", "W"]` playing the same move twice from one position
/// reuses the existing node. The incoming payload must carry at least one
/// key, and both payloads must hold identical values for every key.
#[derive(Debug, Clone)]
pub struct PropertyMerger {
    keys: Vec<String>,
}

impl PropertyMerger {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, existing: &NodeData, incoming: &NodeData) -> bool {
        let carries_key = self.keys.iter().any(|k| incoming.contains_key(k));
        carries_key
            && self
                .keys
                .iter()
                .all(|k| existing.get(k) == incoming.get(k))
    }
}

impl Merger for PropertyMerger {
    fn merge(&self, existing: &NodeData, incoming: &NodeData) -> Option<NodeData> {
        if !self.matches(existing, incoming) {
            return None;
        }
        let mut merged = existing.clone();
        for (key, values) in incoming {
            let slot = merged.entry(key.clone()).or_default();
            for v in values {
                if !slot.contains(v) {
                    slot.push(v.clone());
                }
            }
        }
        Some(merged)
    }
}
