//! Service Layer Error Types
//!
//! This module defines error types for tree operations. The three structural
//! variants are non-retriable input errors raised by validation before any
//! write reaches the store; `Store` wraps failures from the record store
//! itself.

use crate::db::StoreError;
use thiserror::Error;

/// Tree operation errors
///
/// Key material is carried in display form so the error type stays free of
/// the node's generic key parameter.
#[derive(Error, Debug)]
pub enum TreeError {
    /// Parent key references a record that does not exist
    #[error("Invalid parent [{parent}]: no such record")]
    InvalidParent { parent: String },

    /// A node names itself as its parent
    #[error("Node [{key}] cannot be its own parent")]
    SelfParent { key: String },

    /// The proposed parent lies inside the node's own descendant set
    #[error("Proposed parent [{parent}] is a descendant of this node")]
    Cycle { parent: String },

    /// Record store operation failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl TreeError {
    /// Create an invalid parent error
    pub fn invalid_parent(parent: impl ToString) -> Self {
        Self::InvalidParent {
            parent: parent.to_string(),
        }
    }

    /// Create a self-parent error
    pub fn self_parent(key: impl ToString) -> Self {
        Self::SelfParent {
            key: key.to_string(),
        }
    }

    /// Create a cycle error
    pub fn cycle(parent: impl ToString) -> Self {
        Self::Cycle {
            parent: parent.to_string(),
        }
    }
}
