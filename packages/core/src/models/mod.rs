//! Data Contracts
//!
//! This module defines the minimal shape a record must expose to participate
//! in a tree, plus a ready-made concrete record type:
//!
//! - `TreeKey` - key contract (equality, ordering, nullish predicate)
//! - `TreeNode` - node contract (key, parent key, optional sort key)
//! - `Node` - a concrete string-keyed record for embedders that do not bring
//!   their own entity type

pub mod key;
pub mod node;

pub use key::TreeKey;
pub use node::{Node, TreeNode};
