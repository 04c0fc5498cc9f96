//! Business Services
//!
//! This module contains the tree operations built on top of the record
//! store:
//!
//! - `TreeService` - traversal (children, descendants, ancestors, paths),
//!   structural validation, transactional batch save, root singleton
//! - `ExportNode` / `ExportOptions` - hierarchy export for UI and
//!   serialization layers
//!
//! Services never own node instances beyond one call; derived views are
//! cached per service, stamped with the store generation, and recomputed
//! when the store reports any change.

pub mod error;
pub mod export;
pub mod tree_service;

pub use error::TreeError;
pub use export::{ExportFactory, ExportNode, ExportOptions};
pub use tree_service::TreeService;
