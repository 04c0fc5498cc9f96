//! Arbor Core
//!
//! This crate provides hierarchical ("tree") semantics over a collection of
//! flat, keyed records held in an external store. Each record carries a
//! primary key, a self-referencing parent key, and an optional sort key; the
//! crate turns that flat collection into a consistent, cycle-free tree.
//!
//! # Architecture
//!
//! - **Untrusted graph**: the store offers no foreign-key or acyclicity
//!   guarantee, so every traversal uses an explicit work list and visited set
//!   and terminates even on corrupt (cyclic) data
//! - **Coarse lookups only**: the store is reached through point lookup by
//!   key, lookup-all by parent key, and count by key; no recursive query
//!   support is assumed
//! - **Validate before write**: self-parenting, dangling parents, and cycles
//!   are rejected before any insert/update reaches the store
//!
//! # Modules
//!
//! - [`models`] - Node and key contracts ([`TreeNode`], [`TreeKey`])
//! - [`db`] - Record store abstraction, change events, in-memory reference store
//! - [`services`] - TreeService: traversal, validation, batch save, export

pub mod models;
pub mod db;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use db::*;
pub use services::*;
