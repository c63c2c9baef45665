use std::collections::HashMap;
use std::sync::Arc;

use crate::remote::types::TreeNode;

/// In-memory cache of the part of a project's hierarchy fetched so far.
///
/// `nodes` maps a path to its node; `children` maps a parent path (`""` for
/// the root) to its ordered child paths. A parent missing from `children` is
/// unloaded, which is different from loaded-and-empty.
#[derive(Debug, Default, Clone)]
pub struct TreeStore {
    nodes: HashMap<String, Arc<TreeNode>>,
    children: HashMap<String, Vec<String>>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, path: &str) -> Option<&Arc<TreeNode>> {
        self.nodes.get(path)
    }

    /// Ordered child paths of `parent`, or `None` if it was never loaded.
    pub fn children(&self, parent: &str) -> Option<&[String]> {
        self.children.get(parent).map(Vec::as_slice)
    }

    pub fn is_loaded(&self, parent: &str) -> bool {
        self.children.contains_key(parent)
    }

    /// Replace the listing of `parent` with `items` in one step.
    ///
    /// Every item is written into `nodes` (last write for a path wins) before
    /// the ordered child list is swapped in, so readers never observe a child
    /// path without its node. Callers must pass only direct children of
    /// `parent`; the loader validates this before committing.
    pub fn commit_children(&mut self, parent: &str, items: Vec<TreeNode>) {
        let mut paths = Vec::with_capacity(items.len());
        for node in items {
            paths.push(node.path.clone());
            self.nodes.insert(node.path.clone(), Arc::new(node));
        }
        self.children.insert(parent.to_string(), paths);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(paths: &[&str]) -> Vec<TreeNode> {
        paths.iter().map(|p| TreeNode::file(p, Some("id"))).collect()
    }

    #[test]
    fn unloaded_is_distinct_from_empty() {
        let mut store = TreeStore::new();
        assert!(!store.is_loaded("docs"));
        assert!(store.children("docs").is_none());

        store.commit_children("docs", Vec::new());
        assert!(store.is_loaded("docs"));
        assert_eq!(store.children("docs").unwrap().len(), 0);
    }

    #[test]
    fn commit_preserves_server_order() {
        let mut store = TreeStore::new();
        store.commit_children("", listing(&["b.md", "a.md", "c.md"]));
        assert_eq!(store.children("").unwrap(), ["b.md", "a.md", "c.md"]);
    }

    #[test]
    fn every_listed_child_has_a_node() {
        let mut store = TreeStore::new();
        store.commit_children("", vec![TreeNode::dir("docs"), TreeNode::file("x.md", None)]);
        store.commit_children("docs", listing(&["docs/a.md", "docs/b.md"]));
        for parent in ["", "docs"] {
            for child in store.children(parent).unwrap() {
                assert!(store.node(child).is_some(), "{} missing", child);
            }
        }
    }

    #[test]
    fn recommit_replaces_listing_and_overwrites_nodes() {
        let mut store = TreeStore::new();
        store.commit_children("", listing(&["a.md", "b.md"]));
        let mut renamed = TreeNode::file("a.md", Some("new-id"));
        renamed.badges.push("readme".into());
        store.commit_children("", vec![renamed]);

        assert_eq!(store.children("").unwrap(), ["a.md"]);
        let node = store.node("a.md").unwrap();
        assert_eq!(node.file_id.as_deref(), Some("new-id"));
        assert!(node.has_badge("readme"));
    }

    #[test]
    fn recommit_with_same_data_is_identical() {
        let mut store = TreeStore::new();
        store.commit_children("", listing(&["a.md", "b.md"]));
        let first = store.children("").unwrap().to_vec();
        store.commit_children("", listing(&["a.md", "b.md"]));
        assert_eq!(store.children("").unwrap(), first.as_slice());
        assert_eq!(store.len(), 2);
    }
}
