//! Identifier generation
//!
//! Fresh ids come from a generator shared by every tree descended from
//! the same original through `mutate`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::node::NodeId;

/// Source of fresh node identifiers
pub trait IdGenerator: Send + Sync {
    /// Return an id this generator has never issued before
    fn next_id(&self) -> NodeId;
}

impl<F> IdGenerator for F
where
    F: Fn() -> NodeId + Send + Sync,
{
    fn next_id(&self) -> NodeId {
        self()
    }
}

/// Default generator: incrementing counter
#[derive(Debug, Default)]
pub struct Counter {
    next: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Counter whose first issued id is `start`
    pub fn starting_at(start: NodeId) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl IdGenerator for Counter {
    fn next_id(&self) -> NodeId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
