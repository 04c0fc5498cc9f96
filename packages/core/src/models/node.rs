//! Node Contract and Reference Record
//!
//! `TreeNode` is the minimal shape a record must expose to participate in a
//! tree: a primary key, a self-referencing parent key, and an optional sort
//! key. A record may carry any number of additional fields; the structural
//! algorithms never look at them.
//!
//! The parent relation is the only structural relation. Node A is a child of
//! node B iff `A.parent_key() == B.key()`. Children, descendants, ancestors,
//! and root are all derived from it, never stored.
//!
//! `Node` is a ready-made string-keyed implementation for embedders that do
//! not bring their own entity type (and for the crate's own tests).

use crate::models::key::TreeKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contract for records that participate in a tree.
///
/// A nullish parent key (see [`TreeKey::is_nullish`]) means "no parent"; a
/// nullish primary key means the record has not been persisted yet.
///
/// # Sibling ordering
///
/// Children of one parent are ordered by descending `sort_key`, with ties
/// broken by ascending key. Nodes without a sort key sort after those with
/// one. Types with no ordering field at all can use `Sort = ()` and keep the
/// default `sort_key` of `None`, which degrades to deterministic ascending
/// key order.
pub trait TreeNode: Clone + Send + Sync + 'static {
    /// Primary key type.
    type Key: TreeKey;

    /// Sort key type. Any totally-ordered type works; use `()` when the
    /// record has no ordering field.
    type Sort: Ord + Clone + Send + Sync;

    /// Primary key of this record.
    fn key(&self) -> &Self::Key;

    /// Replace the primary key (the store writes back generated keys, and
    /// `clear_relation` zeroes keys on export snapshots).
    fn set_key(&mut self, key: Self::Key);

    /// Parent key. Nullish means this is a root-level record.
    fn parent_key(&self) -> &Self::Key;

    /// Replace the parent key (batch save repoints children at the parent's
    /// freshly persisted key).
    fn set_parent_key(&mut self, key: Self::Key);

    /// Optional sort key used to order siblings.
    fn sort_key(&self) -> Option<Self::Sort> {
        None
    }
}

/// Concrete string-keyed tree record.
///
/// Mirrors the usual flat-table shape: UUID primary key, parent reference,
/// sorting column, timestamps, and a JSON bag for everything else. The open
/// `properties` field is what the export hook's `{field}` URL templates
/// substitute from, alongside the named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Primary key (empty string until first insert assigns a UUID)
    pub id: String,

    /// Parent key (empty string = root level)
    pub parent_id: String,

    /// Display name
    pub name: String,

    /// Sibling ordering weight (higher sorts first)
    pub sorting: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,

    /// Entity-specific fields irrelevant to tree structure
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Node {
    /// Create a new unsaved node. The key stays empty until the store
    /// assigns one on insert.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            parent_id: String::new(),
            name: name.into(),
            sorting: 0,
            created_at: now,
            modified_at: now,
            properties: serde_json::Value::Null,
        }
    }

    /// Create a node with an explicit key (deterministic ids, test fixtures).
    pub fn new_with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        let mut node = Self::new(name);
        node.id = id.into();
        node
    }

    /// Builder-style parent assignment.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    /// Builder-style sorting weight.
    pub fn with_sorting(mut self, sorting: i64) -> Self {
        self.sorting = sorting;
        self
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new("")
    }
}

impl TreeNode for Node {
    type Key = String;
    type Sort = i64;

    fn key(&self) -> &String {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }

    fn parent_key(&self) -> &String {
        &self.parent_id
    }

    fn set_parent_key(&mut self, key: String) {
        self.parent_id = key;
    }

    fn sort_key(&self) -> Option<i64> {
        Some(self.sorting)
    }
}
