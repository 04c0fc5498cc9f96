//! Store Change Events
//!
//! This module defines the coarse change notification a record store emits
//! whenever any committed write happens. The feed follows the observer
//! pattern so other parts of a host application can react to data changes
//! without coupling to the storage layer.
//!
//! # Event Flow
//!
//! 1. A write (insert, update, delete) commits
//! 2. The store bumps its generation counter, synchronously
//! 3. A `StoreChange` is published on a tokio broadcast channel
//! 4. All subscribers receive the event asynchronously
//!
//! The generation counter is the synchronous half of invalidation: derived
//! views (children caches, the root singleton) compare their stamped
//! generation against the store's current one and rebuild when stale. The
//! broadcast channel is the asynchronous half for external observers.
//!
//! Events are deliberately coarse. Any change may rewire any node's
//! ancestor or descendant set, so consumers are expected to treat every
//! event as "the whole tree may have changed".

use serde::{Deserialize, Serialize};

/// Kind of committed write that produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreOperation {
    Insert,
    Update,
    Delete,
}

/// Coarse store-wide change notification
///
/// `key` is the display form of the written record's primary key. It is
/// informational only; invalidation is store-wide regardless of which
/// record changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreChange {
    pub operation: StoreOperation,
    pub key: String,
}

impl StoreChange {
    pub fn new(operation: StoreOperation, key: impl ToString) -> Self {
        Self {
            operation,
            key: key.to_string(),
        }
    }

    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self.operation {
            StoreOperation::Insert => "record:inserted",
            StoreOperation::Update => "record:updated",
            StoreOperation::Delete => "record:deleted",
        }
    }
}
