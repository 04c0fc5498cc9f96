//! RecordStore Trait - Store Abstraction Layer
//!
//! This module defines the `RecordStore` trait that abstracts the backing
//! store for tree records. The trait is the only way the tree core touches
//! persistent data, which keeps the structural algorithms independent of any
//! particular backend.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: all methods are async so both embedded and network
//!    backends fit behind the same trait
//! 2. **Coarse lookups only**: point lookup by key, lookup-all by parent
//!    value, count by key. No recursive-query support is assumed; the
//!    service layer reconstructs tree structure from these primitives
//! 3. **Nesting-safe transactions**: `begin`/`commit`/`rollback` carry a
//!    depth count, so a nested begin/commit pair never finalizes an outer
//!    transaction. Batch save relies on this when subtree saves nest
//! 4. **Synchronous generation counter**: every committed write bumps
//!    `generation()` before the async change event is published, so derived
//!    views can detect staleness without polling a channel
//!
//! # Caller responsibilities
//!
//! Concurrent transactions over overlapping subtrees are not coordinated
//! here; isolation is whatever the backend provides. The in-memory reference
//! store serializes writers and is safe for the single-writer pattern the
//! tree core itself needs.

use crate::db::{StoreChange, StoreError};
use crate::models::TreeNode;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Abstraction layer for flat keyed-record persistence.
///
/// Implementations must be `Send + Sync`; the tree service shares one store
/// behind an `Arc` across tasks.
#[async_trait]
pub trait RecordStore<N: TreeNode>: Send + Sync {
    //
    // LOOKUPS
    //

    /// Point lookup by primary key.
    ///
    /// Returns `Ok(None)` when no record carries the key (not an error).
    async fn find_by_key(&self, key: &N::Key) -> Result<Option<N>, StoreError>;

    /// All records whose parent key equals `parent`, in store order.
    ///
    /// Sibling ordering is a service-layer concern; implementations return
    /// whatever order is natural for the backend, as long as it is stable.
    async fn find_all_by_parent(&self, parent: &N::Key) -> Result<Vec<N>, StoreError>;

    /// Number of records whose primary key equals `key` (0 or 1 for a sane
    /// backend). Used by the validator's parent-existence probe, which must
    /// not materialize the row.
    async fn count_by_key(&self, key: &N::Key) -> Result<u64, StoreError>;

    //
    // WRITES
    //

    /// Insert a record, returning rows affected (1 on success).
    ///
    /// When the node's key is nullish the store assigns a generated key
    /// (see [`crate::models::TreeKey::generate`]) and writes it back through
    /// the `&mut` borrow, so callers observe the persisted identity.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] when a non-nullish key already exists.
    async fn insert(&self, node: &mut N) -> Result<u64, StoreError>;

    /// Update the record with the node's key, returning rows affected.
    ///
    /// # Errors
    ///
    /// [`StoreError::RowNotFound`] when no record carries the key.
    async fn update(&self, node: &N) -> Result<u64, StoreError>;

    /// Delete by key, returning rows affected (0 when absent; idempotent).
    async fn delete(&self, key: &N::Key) -> Result<u64, StoreError>;

    //
    // TRANSACTIONS
    //

    /// Open a transaction scope. Nesting increments a depth count.
    async fn begin(&self) -> Result<(), StoreError>;

    /// Close the innermost scope. Only the outermost commit makes writes
    /// durable and publishes buffered change events.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Abandon the innermost scope. When the depth unwinds to zero the
    /// store restores its pre-transaction state in full.
    async fn rollback(&self) -> Result<(), StoreError>;

    //
    // CHANGE FEED
    //

    /// Current data generation. Bumped synchronously on every committed
    /// write; any derived view stamped with an older generation is stale.
    fn generation(&self) -> u64;

    /// Subscribe to the coarse store-wide change feed.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
