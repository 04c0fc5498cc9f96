//! Tree Export Hook
//!
//! Builds an externally consumable hierarchical representation from a list
//! of tree records: a serde-serializable [`ExportNode`] tree for UI widgets,
//! menus, or serialization layers. Construction of each output node is
//! either the built-in label/value/URL mapping or a caller-supplied factory
//! callback.
//!
//! The builder resolves children through the store, so the same node
//! appearing twice in the input (or a cycle already present in stored data)
//! is emitted once and never recursed into again.
//!
//! `clear_relation` is the companion export-preparation step: a descendant
//! snapshot with every key and parent key zeroed, so a subtree exported from
//! one store can be re-imported elsewhere without key collisions.

use crate::db::RecordStore;
use crate::models::TreeNode;
use crate::services::{TreeError, TreeService};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

/// One node of the exported hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNode {
    /// Human-readable label
    pub label: String,

    /// Display form of the record's key
    pub value: String,

    /// Navigation target, when a URL template was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Child nodes, in sibling order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportNode>,
}

impl ExportNode {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            url: None,
            children: Vec::new(),
        }
    }
}

/// Per-node construction callback; overrides the built-in mapping.
pub type ExportFactory<N> = Box<dyn Fn(&N) -> ExportNode + Send + Sync>;

/// Options for [`TreeService::make_tree`].
pub struct ExportOptions<N> {
    /// Field used for labels; defaults to `"name"` when present, otherwise
    /// the key's display form
    pub label_field: Option<String>,

    /// URL template with `{field}` placeholders substituted per node from
    /// its serialized fields; unknown placeholders are left untouched
    pub url_template: Option<String>,

    /// Custom per-node construction; when set, `label_field` and
    /// `url_template` are ignored
    pub factory: Option<ExportFactory<N>>,
}

impl<N> Default for ExportOptions<N> {
    fn default() -> Self {
        Self {
            label_field: None,
            url_template: None,
            factory: None,
        }
    }
}

impl<N> ExportOptions<N> {
    pub fn with_label_field(mut self, field: impl Into<String>) -> Self {
        self.label_field = Some(field.into());
        self
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    pub fn with_factory(mut self, factory: ExportFactory<N>) -> Self {
        self.factory = Some(factory);
        self
    }
}

/// Display form of one serialized field value. Strings pass through without
/// quotes; everything else uses its JSON rendering.
fn field_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{field}` placeholders from the node's serialized field map.
fn substitute_template(template: &str, fields: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut url = template.to_string();
    for (name, value) in fields {
        let placeholder = format!("{{{}}}", name);
        if url.contains(&placeholder) {
            url = url.replace(&placeholder, &field_display(value));
        }
    }
    url
}

impl<N, S> TreeService<N, S>
where
    N: TreeNode + Serialize,
    S: RecordStore<N>,
{
    /// Build an export hierarchy from `nodes`, resolving children through
    /// the store.
    ///
    /// Every record is emitted at most once (tracked by key across the whole
    /// call), so input containing duplicates, or stored data containing a
    /// cycle, terminates with each node appearing a single time.
    pub async fn make_tree(
        &self,
        nodes: &[N],
        options: &ExportOptions<N>,
    ) -> Result<Vec<ExportNode>, TreeError> {
        let mut emitted: HashSet<N::Key> = HashSet::new();
        self.make_tree_level(nodes, options, &mut emitted).await
    }

    fn make_tree_level<'a>(
        &'a self,
        nodes: &'a [N],
        options: &'a ExportOptions<N>,
        emitted: &'a mut HashSet<N::Key>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ExportNode>, TreeError>> + Send + 'a>> {
        Box::pin(async move {
            let mut out = Vec::new();
            for item in nodes {
                if !emitted.insert(item.key().clone()) {
                    continue;
                }

                let mut export = match &options.factory {
                    Some(factory) => factory(item),
                    None => self.default_export_node(item, options),
                };

                let children = self.children(item).await?;
                export.children = self.make_tree_level(&children, options, emitted).await?;
                out.push(export);
            }
            Ok(out)
        })
    }

    fn default_export_node(&self, node: &N, options: &ExportOptions<N>) -> ExportNode {
        let value = node.key().to_string();
        let fields = serde_json::to_value(node)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();

        let label_field = options.label_field.as_deref().unwrap_or("name");
        let label = fields
            .get(label_field)
            .map(field_display)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| value.clone());

        let mut export = ExportNode::new(label, value);
        if let Some(template) = &options.url_template {
            export.url = Some(substitute_template(template, &fields));
        }
        export
    }

    /// Snapshot of `node`'s descendants with every key and parent key
    /// zeroed. Pure in-memory: the store is read, never written. Used before
    /// exporting a subtree so keys do not collide on re-import elsewhere.
    pub async fn clear_relation(&self, node: &N) -> Result<Vec<N>, TreeError> {
        let mut snapshot = self.descendants(node).await?;
        for item in &mut snapshot {
            item.set_key(N::Key::default());
            item.set_parent_key(N::Key::default());
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Node;
    use std::sync::Arc;

    async fn seeded_service() -> (TreeService<Node, MemoryStore<Node>>, Node) {
        let service = TreeService::new(Arc::new(MemoryStore::new()));
        let mut root = Node::new_with_id("root", "Top");
        service.insert(&mut root).await.unwrap();
        let mut left = Node::new_with_id("left", "Left").with_parent("root").with_sorting(2);
        service.insert(&mut left).await.unwrap();
        let mut right = Node::new_with_id("right", "Right").with_parent("root").with_sorting(1);
        service.insert(&mut right).await.unwrap();
        let mut leaf = Node::new_with_id("leaf", "Leaf").with_parent("left");
        service.insert(&mut leaf).await.unwrap();
        (service, root)
    }

    #[tokio::test]
    async fn builds_nested_hierarchy_with_labels() {
        let (service, root) = seeded_service().await;
        let tree = service
            .make_tree(std::slice::from_ref(&root), &ExportOptions::default())
            .await
            .unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].label, "Top");
        assert_eq!(tree[0].value, "root");
        let children: Vec<&str> = tree[0].children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(children, vec!["Left", "Right"]);
        assert_eq!(tree[0].children[0].children[0].label, "Leaf");
    }

    #[tokio::test]
    async fn url_template_substitutes_fields() {
        let (service, root) = seeded_service().await;
        let options =
            ExportOptions::default().with_url_template("/browse/{id}?title={name}&x={missing}");
        let tree = service.make_tree(std::slice::from_ref(&root), &options).await.unwrap();

        assert_eq!(
            tree[0].url.as_deref(),
            Some("/browse/root?title=Top&x={missing}")
        );
        assert_eq!(
            tree[0].children[0].url.as_deref(),
            Some("/browse/left?title=Left&x={missing}")
        );
    }

    #[tokio::test]
    async fn factory_callback_overrides_default_mapping() {
        let (service, root) = seeded_service().await;
        let options = ExportOptions::default()
            .with_factory(Box::new(|n: &Node| {
                ExportNode::new(n.name.to_uppercase(), n.id.clone())
            }));
        let tree = service.make_tree(std::slice::from_ref(&root), &options).await.unwrap();

        assert_eq!(tree[0].label, "TOP");
        assert_eq!(tree[0].children[0].label, "LEFT");
    }

    #[tokio::test]
    async fn duplicate_input_nodes_are_emitted_once() {
        let (service, root) = seeded_service().await;
        let input = vec![root.clone(), root.clone()];
        let tree = service.make_tree(&input, &ExportOptions::default()).await.unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[tokio::test]
    async fn cyclic_store_data_terminates() {
        let service = TreeService::new(Arc::new(MemoryStore::<Node>::new()));
        // Write the cycle behind validation's back, straight to the store.
        let mut a = Node::new_with_id("a", "A").with_parent("b");
        service.store().insert(&mut a).await.unwrap();
        let mut b = Node::new_with_id("b", "B").with_parent("a");
        service.store().insert(&mut b).await.unwrap();

        let tree = service
            .make_tree(std::slice::from_ref(&a), &ExportOptions::default())
            .await
            .unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].label, "A");
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].label, "B");
        assert!(tree[0].children[0].children.is_empty());
    }

    #[tokio::test]
    async fn clear_relation_zeroes_descendant_keys() {
        let (service, root) = seeded_service().await;
        let snapshot = service.clear_relation(&root).await.unwrap();

        assert_eq!(snapshot.len(), 3);
        for item in &snapshot {
            assert!(item.id.is_empty());
            assert!(item.parent_id.is_empty());
        }
        // The store itself is untouched
        let stored = service.children(&root).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|n| !n.id.is_empty()));
    }
}
