//! Store Error Types
//!
//! This module defines error types for record store operations, providing
//! clear error handling for key conflicts, missing rows, and transaction
//! misuse. Structural (tree) errors are handled by service-layer error types.

use thiserror::Error;

/// Record store operation errors
///
/// Covers the error cases of the narrow store interface. Backend
/// implementations wrap driver failures in `Backend`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Insert collided with an existing primary key
    #[error("Duplicate key: {key}")]
    DuplicateKey { key: String },

    /// Update or delete targeted a key with no matching row
    #[error("Row not found: {key}")]
    RowNotFound { key: String },

    /// Commit or rollback issued without a matching begin
    #[error("No active transaction")]
    NoActiveTransaction,

    /// Backend driver failure
    #[error("Store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Create a duplicate key error
    pub fn duplicate_key(key: impl ToString) -> Self {
        Self::DuplicateKey {
            key: key.to_string(),
        }
    }

    /// Create a row not found error
    pub fn row_not_found(key: impl ToString) -> Self {
        Self::RowNotFound {
            key: key.to_string(),
        }
    }
}
