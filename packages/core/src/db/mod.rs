//! Record Store Layer
//!
//! This module defines the coarse-grained interface the tree core uses to
//! reach its backing store, plus an in-memory reference implementation:
//!
//! - `RecordStore` - point lookup, lookup-all by parent, count by key,
//!   insert/update/delete, nesting-safe transactions, change feed
//! - `MemoryStore` - reference backend for tests and embedders without a
//!   real database
//! - `StoreChange` / `StoreOperation` - coarse store-wide change events
//!
//! The store is deliberately narrow: no recursive queries, no joins. All
//! tree structure is recovered in the service layer from these primitives,
//! which is what lets the same core run against any keyed backend.

mod error;
pub mod events;
mod memory_store;
mod store;

pub use error::StoreError;
pub use events::{StoreChange, StoreOperation};
pub use memory_store::MemoryStore;
pub use store::RecordStore;
