//! MemoryStore - In-Memory RecordStore Implementation
//!
//! Reference backend for tests and for embedders that have no database:
//! an ordered row vector plus a key index, with snapshot-based transactions
//! and the generation/change-feed contract of [`RecordStore`].
//!
//! # Transaction model
//!
//! The outermost `begin` snapshots the full row set. Nested begin/commit
//! pairs only move a depth counter; the snapshot is dropped when the
//! outermost commit lands and restored when the depth unwinds to zero
//! through `rollback`. Change events produced inside a transaction are
//! buffered and only published at the outermost commit, so observers never
//! see uncommitted state. A rollback that discards buffered writes publishes
//! nothing but still bumps the generation once, since reads made inside the
//! transaction saw row state that no longer exists.
//!
//! # Concurrency
//!
//! Rows live behind a `tokio::sync::RwLock`; individual operations are
//! atomic. The transaction scope is store-wide, so interleaving writers
//! inside one transaction is a caller responsibility, exactly as with a
//! shared connection to a real backend.

use crate::db::events::{StoreChange, StoreOperation};
use crate::db::{RecordStore, StoreError};
use crate::models::{TreeKey, TreeNode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::sync::RwLock;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Rows<N: TreeNode> {
    rows: Vec<N>,
    index: HashMap<N::Key, usize>,
    tx_depth: u32,
    snapshot: Option<Vec<N>>,
    pending_events: Vec<StoreChange>,
}

impl<N: TreeNode> Rows<N> {
    fn rebuild_index(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.key().clone(), i))
            .collect();
    }
}

/// In-memory [`RecordStore`] implementation
pub struct MemoryStore<N: TreeNode> {
    rows: RwLock<Rows<N>>,
    generation: AtomicU64,
    insert_seq: AtomicU64,
    events: broadcast::Sender<StoreChange>,
}

impl<N: TreeNode> Default for MemoryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: TreeNode> MemoryStore<N> {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            rows: RwLock::new(Rows {
                rows: Vec::new(),
                index: HashMap::new(),
                tx_depth: 0,
                snapshot: None,
                pending_events: Vec::new(),
            }),
            generation: AtomicU64::new(0),
            insert_seq: AtomicU64::new(0),
            events,
        }
    }

    /// Create a store pre-populated with `rows`. Key conflicts in the input
    /// surface as [`StoreError::DuplicateKey`], same as sequential inserts.
    pub async fn with_rows(rows: Vec<N>) -> Result<Self, StoreError> {
        let store = Self::new();
        for mut row in rows {
            let mut guard = store.rows.write().await;
            store.insert_locked(&mut guard, &mut row)?;
        }
        Ok(store)
    }

    /// Number of rows currently committed or pending in the open transaction.
    pub async fn len(&self) -> usize {
        self.rows.read().await.rows.len()
    }

    /// True when the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.rows.is_empty()
    }

    /// Record a write: publish immediately outside a transaction, buffer
    /// inside one. The generation bump is synchronous with the write so
    /// stale-view checks never race the event delivery.
    fn record_change(&self, guard: &mut Rows<N>, change: StoreChange) {
        if guard.tx_depth == 0 {
            self.generation.fetch_add(1, Ordering::AcqRel);
            let _ = self.events.send(change);
        } else {
            guard.pending_events.push(change);
        }
    }

    fn insert_locked(&self, guard: &mut Rows<N>, node: &mut N) -> Result<u64, StoreError> {
        if node.key().is_nullish() {
            // Autoincrement-style identity: advance the sequence until it
            // clears any explicitly assigned keys already present.
            loop {
                let seq = self.insert_seq.fetch_add(1, Ordering::AcqRel) + 1;
                let key = N::Key::generate(seq);
                if !guard.index.contains_key(&key) {
                    node.set_key(key);
                    break;
                }
            }
        } else if guard.index.contains_key(node.key()) {
            return Err(StoreError::duplicate_key(node.key()));
        }

        guard.index.insert(node.key().clone(), guard.rows.len());
        guard.rows.push(node.clone());
        self.record_change(
            guard,
            StoreChange::new(StoreOperation::Insert, node.key()),
        );
        Ok(1)
    }
}

#[async_trait]
impl<N: TreeNode> RecordStore<N> for MemoryStore<N> {
    async fn find_by_key(&self, key: &N::Key) -> Result<Option<N>, StoreError> {
        let guard = self.rows.read().await;
        Ok(guard.index.get(key).map(|&i| guard.rows[i].clone()))
    }

    async fn find_all_by_parent(&self, parent: &N::Key) -> Result<Vec<N>, StoreError> {
        let guard = self.rows.read().await;
        Ok(guard
            .rows
            .iter()
            .filter(|row| row.parent_key() == parent)
            .cloned()
            .collect())
    }

    async fn count_by_key(&self, key: &N::Key) -> Result<u64, StoreError> {
        let guard = self.rows.read().await;
        Ok(u64::from(guard.index.contains_key(key)))
    }

    async fn insert(&self, node: &mut N) -> Result<u64, StoreError> {
        let mut guard = self.rows.write().await;
        self.insert_locked(&mut guard, node)
    }

    async fn update(&self, node: &N) -> Result<u64, StoreError> {
        let mut guard = self.rows.write().await;
        let idx = match guard.index.get(node.key()) {
            Some(&i) => i,
            None => return Err(StoreError::row_not_found(node.key())),
        };
        guard.rows[idx] = node.clone();
        self.record_change(
            &mut guard,
            StoreChange::new(StoreOperation::Update, node.key()),
        );
        Ok(1)
    }

    async fn delete(&self, key: &N::Key) -> Result<u64, StoreError> {
        let mut guard = self.rows.write().await;
        let idx = match guard.index.get(key) {
            Some(&i) => i,
            None => return Ok(0),
        };
        guard.rows.remove(idx);
        guard.rebuild_index();
        self.record_change(&mut guard, StoreChange::new(StoreOperation::Delete, key));
        Ok(1)
    }

    async fn begin(&self) -> Result<(), StoreError> {
        let mut guard = self.rows.write().await;
        if guard.tx_depth == 0 {
            guard.snapshot = Some(guard.rows.clone());
            guard.pending_events.clear();
        }
        guard.tx_depth += 1;
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let mut guard = self.rows.write().await;
        if guard.tx_depth == 0 {
            return Err(StoreError::NoActiveTransaction);
        }
        guard.tx_depth -= 1;
        if guard.tx_depth == 0 {
            guard.snapshot = None;
            let events = std::mem::take(&mut guard.pending_events);
            self.generation
                .fetch_add(events.len() as u64, Ordering::AcqRel);
            for event in events {
                let _ = self.events.send(event);
            }
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        let mut guard = self.rows.write().await;
        if guard.tx_depth == 0 {
            return Err(StoreError::NoActiveTransaction);
        }
        guard.tx_depth -= 1;
        if guard.tx_depth == 0 {
            if let Some(snapshot) = guard.snapshot.take() {
                guard.rows = snapshot;
                guard.rebuild_index();
            }
            // Restoring the snapshot is itself a data change relative to any
            // read made inside the transaction, so the generation still
            // advances even though no event is published. Views stamped with
            // the pre-transaction generation would otherwise survive the
            // staleness check while holding rows that were never committed.
            if !guard.pending_events.is_empty() {
                guard.pending_events.clear();
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
        }
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Node;

    #[tokio::test]
    async fn insert_assigns_generated_key_when_nullish() {
        let store = MemoryStore::<Node>::new();
        let mut node = Node::new("Root");
        assert!(node.key().is_nullish());

        let affected = store.insert(&mut node).await.unwrap();
        assert_eq!(affected, 1);
        assert!(!node.key().is_nullish());
        assert!(store.find_by_key(node.key()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_keys() {
        let store = MemoryStore::<Node>::new();
        let mut first = Node::new_with_id("n1", "First");
        store.insert(&mut first).await.unwrap();

        let mut second = Node::new_with_id("n1", "Second");
        let err = store.insert(&mut second).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn update_missing_row_fails() {
        let store = MemoryStore::<Node>::new();
        let node = Node::new_with_id("ghost", "Ghost");
        let err = store.update(&node).await.unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::<Node>::new();
        let mut node = Node::new_with_id("n1", "First");
        store.insert(&mut node).await.unwrap();

        assert_eq!(store.delete(&"n1".to_string()).await.unwrap(), 1);
        assert_eq!(store.delete(&"n1".to_string()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rollback_restores_pre_transaction_state() {
        let store = MemoryStore::<Node>::new();
        let mut existing = Node::new_with_id("n1", "Existing");
        store.insert(&mut existing).await.unwrap();
        let mut receiver = store.subscribe();
        let generation_before = store.generation();

        store.begin().await.unwrap();
        let mut added = Node::new_with_id("n2", "Added");
        store.insert(&mut added).await.unwrap();
        existing.name = "Renamed".to_string();
        store.update(&existing).await.unwrap();
        store.rollback().await.unwrap();

        assert_eq!(store.len().await, 1);
        let restored = store.find_by_key(&"n1".to_string()).await.unwrap().unwrap();
        assert_eq!(restored.name, "Existing");
        assert!(store.find_by_key(&"n2".to_string()).await.unwrap().is_none());
        // Nothing committed, so observers saw no event; the generation still
        // advances once so reads made inside the transaction go stale.
        assert_eq!(store.generation(), generation_before + 1);
        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn rollback_without_writes_leaves_generation_unchanged() {
        let store = MemoryStore::<Node>::new();
        let mut node = Node::new_with_id("n1", "First");
        store.insert(&mut node).await.unwrap();
        let generation_before = store.generation();

        store.begin().await.unwrap();
        store.rollback().await.unwrap();

        assert_eq!(store.generation(), generation_before);
    }

    #[tokio::test]
    async fn nested_commit_does_not_finalize_outer_transaction() {
        let store = MemoryStore::<Node>::new();

        store.begin().await.unwrap();
        store.begin().await.unwrap();
        let mut inner = Node::new_with_id("inner", "Inner");
        store.insert(&mut inner).await.unwrap();
        store.commit().await.unwrap(); // inner commit, outer still open

        // Outer rollback discards the inner "committed" insert too
        store.rollback().await.unwrap();
        assert!(store
            .find_by_key(&"inner".to_string())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn commit_publishes_buffered_events_and_bumps_generation() {
        let store = MemoryStore::<Node>::new();
        let mut receiver = store.subscribe();
        let generation_before = store.generation();

        store.begin().await.unwrap();
        let mut node = Node::new_with_id("n1", "First");
        store.insert(&mut node).await.unwrap();
        assert_eq!(store.generation(), generation_before); // not yet visible
        store.commit().await.unwrap();

        assert_eq!(store.generation(), generation_before + 1);
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "record:inserted");
        assert_eq!(event.key, "n1");
    }

    #[tokio::test]
    async fn commit_without_begin_is_an_error() {
        let store = MemoryStore::<Node>::new();
        assert!(matches!(
            store.commit().await.unwrap_err(),
            StoreError::NoActiveTransaction
        ));
        assert!(matches!(
            store.rollback().await.unwrap_err(),
            StoreError::NoActiveTransaction
        ));
    }

    #[tokio::test]
    async fn generated_integer_style_keys_skip_existing() {
        #[derive(Debug, Clone, PartialEq)]
        struct Row {
            id: i64,
            parent: i64,
        }
        impl TreeNode for Row {
            type Key = i64;
            type Sort = ();
            fn key(&self) -> &i64 {
                &self.id
            }
            fn set_key(&mut self, key: i64) {
                self.id = key;
            }
            fn parent_key(&self) -> &i64 {
                &self.parent
            }
            fn set_parent_key(&mut self, key: i64) {
                self.parent = key;
            }
        }

        let store = MemoryStore::<Row>::new();
        let mut explicit = Row { id: 1, parent: 0 };
        store.insert(&mut explicit).await.unwrap();

        let mut auto = Row { id: 0, parent: 0 };
        store.insert(&mut auto).await.unwrap();
        assert_eq!(auto.id, 2); // seq 1 collided with the explicit row
    }
}
