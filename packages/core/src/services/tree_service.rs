//! TreeService - Traversal, Validation, and Batch Persistence
//!
//! `TreeService` turns the flat keyed records behind a [`RecordStore`] into a
//! tree: children, descendants, ancestors, full paths, structural validation,
//! and transactional whole-subtree saves.
//!
//! # Corrupt input
//!
//! The store offers no acyclicity guarantee, so every traversal here is
//! iterative with an explicit work list and visited set. Read paths never
//! fail on corrupt data: a repeated visit is a stopping condition, and the
//! result is a best-effort (possibly truncated) view. Write paths are the
//! opposite: validation rejects self-parenting, dangling parents, and
//! cycles before anything reaches the store.
//!
//! # Derived views
//!
//! Children views are cached per parent key, stamped with the store
//! generation at compute time. Any committed write bumps the generation, so
//! a stale stamp means recompute on next access. Racing readers may
//! recompute the same view redundantly; the first writer wins and no reader
//! ever observes a torn value.
//!
//! # Concurrency
//!
//! Reads are safe from any number of tasks. `batch_save` is the only
//! operation that mutates store state and runs inside one store transaction;
//! concurrent batch saves over overlapping subtrees are not coordinated here
//! and rely on the store's transaction isolation.

use crate::db::RecordStore;
use crate::models::{TreeKey, TreeNode};
use crate::services::TreeError;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type BoxedResult<'a, T> = Pin<Box<dyn Future<Output = Result<T, TreeError>> + Send + 'a>>;

/// Tree semantics over a [`RecordStore`].
///
/// Cheap to share: hold it in an `Arc` and clone the handle across tasks.
///
/// # Examples
///
/// ```rust
/// use arbor_core::{MemoryStore, Node, TreeService};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::<Node>::new());
/// let service = TreeService::new(store);
///
/// let mut root = Node::new_with_id("root", "Root");
/// service.insert(&mut root).await?;
/// let mut child = Node::new_with_id("child", "Child").with_parent("root");
/// service.insert(&mut child).await?;
///
/// assert_eq!(service.children(&root).await?.len(), 1);
/// assert_eq!(service.depth(&child).await?, 2);
/// # Ok(())
/// # }
/// ```
pub struct TreeService<N: TreeNode, S: RecordStore<N>> {
    store: Arc<S>,
    children_cache: RwLock<HashMap<N::Key, (u64, Arc<Vec<N>>)>>,
    root: Mutex<Option<(u64, Arc<N>)>>,
}

impl<N: TreeNode, S: RecordStore<N>> TreeService<N, S> {
    /// Create a service over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            children_cache: RwLock::new(HashMap::new()),
            root: Mutex::new(None),
        }
    }

    /// The underlying store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    //
    // TRAVERSAL
    //

    /// Ordered children of `node`. Empty when it has none. Never recurses.
    pub async fn children(&self, node: &N) -> Result<Vec<N>, TreeError> {
        self.children_of(node.key()).await
    }

    /// Ordered children of the record with key `parent`. A nullish key
    /// yields the root-level records.
    pub async fn children_of(&self, parent: &N::Key) -> Result<Vec<N>, TreeError> {
        // Stamp with the generation read *before* the store lookup; a write
        // landing mid-lookup then marks this entry stale rather than fresh.
        let generation = self.store.generation();

        {
            let cache = self.children_cache.read().await;
            if let Some((stamp, view)) = cache.get(parent) {
                if *stamp == generation {
                    return Ok(view.as_ref().clone());
                }
            }
        }

        let mut rows = self.store.find_all_by_parent(parent).await?;
        rows.sort_by(Self::sibling_order);
        tracing::debug!(parent = %parent, count = rows.len(), "children view computed");

        let view = Arc::new(rows);
        let mut cache = self.children_cache.write().await;
        let slot = cache
            .entry(parent.clone())
            .or_insert_with(|| (generation, view.clone()));
        if slot.0 != generation {
            *slot = (generation, view.clone());
        }
        // First writer wins: a fresh entry left by a racing reader is kept.
        Ok(slot.1.as_ref().clone())
    }

    /// Sibling order: descending sort key, ties broken by ascending key.
    /// Nodes without a sort key come after those with one, ordered by
    /// ascending key, so the order is deterministic even when no sort field exists.
    fn sibling_order(a: &N, b: &N) -> Ordering {
        match (a.sort_key(), b.sort_key()) {
            (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.key().cmp(b.key())),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.key().cmp(b.key()),
        }
    }

    /// All descendants of `node` in depth-first, parent-before-child order,
    /// excluding `node` itself.
    ///
    /// Iterative with an explicit LIFO work list: each record is visited at
    /// most once, so the traversal terminates on cyclic data and returns the
    /// reachable set instead of failing.
    pub async fn descendants(&self, node: &N) -> Result<Vec<N>, TreeError> {
        let mut result: Vec<N> = Vec::new();
        let mut visited: HashSet<N::Key> = HashSet::new();
        let mut queued: HashSet<N::Key> = HashSet::new();

        let mut stack: Vec<N> = vec![node.clone()];
        queued.insert(node.key().clone());

        while let Some(item) = stack.pop() {
            if visited.contains(item.key()) {
                continue;
            }
            visited.insert(item.key().clone());

            let children = self.children(&item).await?;
            result.push(item);

            // Push in reverse so the first child is popped first, keeping
            // the output in parent-before-child, sibling-ordered form.
            for child in children.iter().rev() {
                if visited.contains(child.key()) || queued.contains(child.key()) {
                    continue;
                }
                queued.insert(child.key().clone());
                stack.push(child.clone());
            }
        }

        // The seed node went in first; the result is descendants only.
        result.remove(0);
        Ok(result)
    }

    /// Ancestors of `node` from the root-most down to the immediate parent,
    /// excluding `node` itself. Empty when it has no parent.
    ///
    /// Follows parent keys iteratively; a lookup miss ends the chain, and a
    /// repeated key (a cycle in stored data) truncates it with a warning
    /// rather than failing the read.
    pub async fn ancestors(&self, node: &N) -> Result<Vec<N>, TreeError> {
        let mut chain: Vec<N> = Vec::new();
        let mut visited: HashSet<N::Key> = HashSet::new();

        let mut current = node.clone();
        loop {
            if visited.contains(current.key()) {
                tracing::warn!(
                    key = %current.key(),
                    "parent chain loops back on itself; truncating ancestor walk"
                );
                break;
            }
            visited.insert(current.key().clone());
            chain.push(current.clone());

            if current.parent_key().is_nullish() {
                break;
            }
            match self.store.find_by_key(current.parent_key()).await? {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // Drop the seed, then flip so the root-most ancestor comes first.
        chain.remove(0);
        chain.reverse();
        Ok(chain)
    }

    /// The ancestor chain of `node`, optionally extended with `node` itself.
    pub async fn full_path(&self, node: &N, include_self: bool) -> Result<Vec<N>, TreeError> {
        let mut path = self.ancestors(node).await?;
        if include_self {
            path.push(node.clone());
        }
        Ok(path)
    }

    /// Depth of `node`: 1 for root-level records, 1 + ancestor count otherwise.
    pub async fn depth(&self, node: &N) -> Result<usize, TreeError> {
        Ok(1 + self.ancestors(node).await?.len())
    }

    //
    // VALIDATION
    //

    /// Structural validation, run before every insert and update.
    ///
    /// Rejects, in order: a node naming itself as parent
    /// ([`TreeError::SelfParent`]); a non-nullish parent key with no matching
    /// record ([`TreeError::InvalidParent`]); a parent that lies inside the
    /// node's own pre-mutation descendant set ([`TreeError::Cycle`]). A fresh
    /// root-level record (nullish key and parent key) passes without touching
    /// the store.
    ///
    /// Pure read-then-decide: performs no writes and is safe to call
    /// repeatedly.
    pub async fn validate(&self, node: &N) -> Result<(), TreeError> {
        let key = node.key();
        let pkey = node.parent_key();

        // Self-parenting is decidable without the store, so it is reported
        // even when the offending key does not exist there yet.
        if !key.is_nullish() && !pkey.is_nullish() && pkey == key {
            return Err(TreeError::self_parent(key));
        }

        if !pkey.is_nullish() && self.store.count_by_key(pkey).await? == 0 {
            return Err(TreeError::invalid_parent(pkey));
        }

        // The cycle check only applies to updates of existing records; an
        // insert has no key yet and cannot reach itself through the store.
        if !key.is_nullish() && !pkey.is_nullish() {
            let descendants = self.descendants(node).await?;
            if descendants.iter().any(|d| d.key() == pkey) {
                return Err(TreeError::cycle(pkey));
            }
        }

        Ok(())
    }

    //
    // PERSISTENCE
    //

    /// Validate, then insert. Returns rows affected; the node's key is
    /// replaced with the store-generated one when it was nullish.
    pub async fn insert(&self, node: &mut N) -> Result<u64, TreeError> {
        self.validate(node).await?;
        Ok(self.store.insert(node).await?)
    }

    /// Validate, then update the record with the node's key.
    pub async fn update(&self, node: &N) -> Result<u64, TreeError> {
        self.validate(node).await?;
        Ok(self.store.update(node).await?)
    }

    /// Insert or update as appropriate: insert when the key is nullish or
    /// not yet present in the store, update otherwise.
    pub async fn save(&self, node: &mut N) -> Result<u64, TreeError> {
        if node.key().is_nullish() || self.store.count_by_key(node.key()).await? == 0 {
            self.insert(node).await
        } else {
            self.update(node).await
        }
    }

    /// Delete by key. No structural validation applies to deletes.
    pub async fn delete(&self, key: &N::Key) -> Result<u64, TreeError> {
        Ok(self.store.delete(key).await?)
    }

    /// Save `node` (when `save_self`) and its entire subtree inside one
    /// store transaction, repointing every child at its parent's persisted
    /// key on the way down. Returns the number of records written.
    ///
    /// All-or-nothing: any failure (including validation) rolls the
    /// transaction back in full and is re-raised unchanged.
    pub async fn batch_save(&self, node: &mut N, save_self: bool) -> Result<u64, TreeError> {
        self.store.begin().await?;
        match self.batch_save_subtree(node, save_self).await {
            Ok(count) => {
                self.store.commit().await?;
                tracing::debug!(count, "batch save committed");
                Ok(count)
            }
            Err(err) => {
                // The triggering failure outranks a failed rollback
                if let Err(rollback_err) = self.store.rollback().await {
                    tracing::error!(error = %rollback_err, "batch save rollback failed");
                }
                Err(err)
            }
        }
    }

    fn batch_save_subtree<'a>(&'a self, node: &'a mut N, save_self: bool) -> BoxedResult<'a, u64> {
        Box::pin(async move {
            // Capture the children view before persisting self: the save
            // bumps the store generation and shifts derived views under us.
            let children = self.children(node).await?;

            let mut count = 0;
            if save_self {
                count += self.save(node).await?;
            }
            for mut child in children {
                child.set_parent_key(node.key().clone());
                count += self.batch_save_subtree(&mut child, true).await?;
            }
            Ok(count)
        })
    }

    //
    // DERIVED-VIEW LIFECYCLE
    //

    /// Drop all cached derived views (children and root).
    ///
    /// Not required for correctness (every cached view is stamped with the
    /// store generation and recomputes when stale) but reclaims memory
    /// after large traversals over many distinct parents.
    pub async fn invalidate_views(&self) {
        self.children_cache.write().await.clear();
        *self.root.lock().await = None;
    }
}

impl<N: TreeNode + Default, S: RecordStore<N>> TreeService<N, S> {
    /// Cached sentinel root node, the anchor for whole-tree operations.
    ///
    /// Lazily constructed from `N::default()` and stamped with the store
    /// generation; any committed write makes the next access rebuild it.
    /// Concurrent readers observe either the previous instance or the fully
    /// built new one, never a partial value.
    pub async fn root(&self) -> Arc<N> {
        let generation = self.store.generation();
        let mut slot = self.root.lock().await;
        match slot.as_ref() {
            Some((stamp, root)) if *stamp == generation => root.clone(),
            _ => {
                let root = Arc::new(N::default());
                *slot = Some((generation, root.clone()));
                root
            }
        }
    }

    /// Explicitly discard the cached root; the next [`root`](Self::root)
    /// access reconstructs it.
    pub async fn reset_root(&self) {
        *self.root.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Node;

    fn service() -> TreeService<Node, MemoryStore<Node>> {
        TreeService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn sibling_order_sorts_descending_with_key_tiebreak() {
        let svc = service();
        for (id, sorting) in [("c", 1), ("a", 3), ("d", 2), ("b", 3)] {
            let mut node = Node::new_with_id(id, id).with_parent("p").with_sorting(sorting);
            svc.store().insert(&mut node).await.unwrap();
        }
        let mut parent = Node::new_with_id("p", "Parent");
        svc.store().insert(&mut parent).await.unwrap();

        let children = svc.children(&parent).await.unwrap();
        let ids: Vec<&str> = children.iter().map(|n| n.id.as_str()).collect();
        // sorting 3 ties between "a" and "b" break by ascending key
        assert_eq!(ids, vec!["a", "b", "d", "c"]);
    }

    #[tokio::test]
    async fn children_view_is_cached_until_store_changes() {
        let svc = service();
        let mut parent = Node::new_with_id("p", "Parent");
        svc.store().insert(&mut parent).await.unwrap();

        assert!(svc.children(&parent).await.unwrap().is_empty());

        // A committed write bumps the generation; the stale view recomputes.
        let mut child = Node::new_with_id("c", "Child").with_parent("p");
        svc.store().insert(&mut child).await.unwrap();
        assert_eq!(svc.children(&parent).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn depth_counts_from_one_at_root() {
        let svc = service();
        let mut a = Node::new_with_id("a", "A");
        svc.insert(&mut a).await.unwrap();
        let mut b = Node::new_with_id("b", "B").with_parent("a");
        svc.insert(&mut b).await.unwrap();
        let mut c = Node::new_with_id("c", "C").with_parent("b");
        svc.insert(&mut c).await.unwrap();

        assert_eq!(svc.depth(&a).await.unwrap(), 1);
        assert_eq!(svc.depth(&b).await.unwrap(), 2);
        assert_eq!(svc.depth(&c).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn root_singleton_rebuilds_after_store_change() {
        let svc = service();
        let first = svc.root().await;
        let again = svc.root().await;
        assert!(Arc::ptr_eq(&first, &again));

        let mut node = Node::new_with_id("n", "N");
        svc.insert(&mut node).await.unwrap();
        let rebuilt = svc.root().await;
        assert!(!Arc::ptr_eq(&first, &rebuilt));
    }

    #[tokio::test]
    async fn reset_root_discards_cached_instance() {
        let svc = service();
        let first = svc.root().await;
        svc.reset_root().await;
        let rebuilt = svc.root().await;
        assert!(!Arc::ptr_eq(&first, &rebuilt));
    }
}
