//! Error types
//!
//! Lookups of unknown ids are not errors; they yield `None` everywhere.
//! Only contract violations by the caller end up here.

use crate::node::NodeId;

/// Errors raised by traversal and editing operations
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Horizontal and vertical walks only accept a step of +1 or -1
    #[error("invalid navigation step {0}, expected 1 or -1")]
    InvalidStep(i64),

    /// The root cannot be detached from its own tree
    #[error("cannot remove root node {0}")]
    RemoveRoot(NodeId),

    /// Plain-data export or import failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate result alias
pub type Result<T> = std::result::Result<T, TreeError>;

/// Reject any step other than +1 / -1
pub(crate) fn check_step(step: i64) -> Result<()> {
    if step.abs() == 1 {
        Ok(())
    } else {
        Err(TreeError::InvalidStep(step))
    }
}
