//! Game Tree — persistent move trees for game records
//!
//! One root-to-leaf path per line, sibling branches as variations:
//! - Immutable tree instances with structural sharing between versions
//! - Memoized id lookup with alias redirection after merges
//! - Cached height and structure hash, carried over when still valid
//! - Lazy traversals: depth-first, by section, sideways, along a line
//! - Copy-on-write drafts as the single editing entry point
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`node`] | Node, payload and id types |
//! | [`tree`] | `GameTree` instance: lookup, navigation, metrics, `mutate` |
//! | [`draft`] | Copy-on-write builder used inside `mutate` |
//! | [`traverse`] | Lazy traversal iterators |
//! | [`index`] | Memoized id index and alias table |
//! | [`cache`] | Height and structure-hash caches |
//! | [`id`] | Identifier generators |
//! | [`merge`] | Merge strategies for appended nodes |
//! | [`error`] | Error type |
//!
//! # Quick Start
//!
//! ```
//! use game_tree::{data_from, GameTree};
//!
//! let tree = GameTree::new();
//! let root = tree.root_id();
//!
//! let (next, id) = tree.mutate_with(|draft| {
//!     let b = draft.append_node(root, data_from([("B", "pd")]))?;
//!     draft.append_node(b, data_from([("W", "dp")]))
//! });
//!
//! // The original tree is untouched
//! assert_eq!(tree.len(), 1);
//! assert_eq!(next.get_height(), 3);
//! assert!(next.on_main_line(id.unwrap()));
//! ```

pub mod cache;
pub mod draft;
pub mod error;
pub mod id;
pub mod index;
pub mod merge;
pub mod node;
pub mod traverse;
pub mod tree;

pub use draft::{AppendOptions, Draft, NodeView, Shift};
pub use error::{Result, TreeError};
pub use id::{Counter, IdGenerator};
pub use merge::{Merger, NoMerge, PropertyMerger};
pub use node::{data_from, Currents, Node, NodeData, NodeId};
pub use traverse::{Horizontal, Nodes, Section, Sequence, Vertical};
pub use tree::{GameTree, TreeConfig};
