use std::collections::BTreeSet;
use std::sync::Arc;

use crate::remote::types::TreeNode;
use crate::tree::store::TreeStore;

/// One row of the flattened, currently visible tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub node: Arc<TreeNode>,
    /// Indentation level. In the hierarchy this is the nesting below the root
    /// (top level is 0); search hits carry the node's own depth.
    pub depth: usize,
}

impl VisibleRow {
    pub fn path(&self) -> &str {
        &self.node.path
    }
}

/// Flatten the tree into the rows to display.
///
/// With `search_results` present, the rows are exactly those results in
/// server order. Otherwise this is a pre-order walk from the root that
/// descends only into expanded directories with a loaded listing.
pub fn project_rows(
    store: &TreeStore,
    expanded: &BTreeSet<String>,
    search_results: Option<&[Arc<TreeNode>]>,
) -> Vec<VisibleRow> {
    if let Some(results) = search_results {
        return results
            .iter()
            .map(|node| VisibleRow {
                depth: node.depth,
                node: Arc::clone(node),
            })
            .collect();
    }

    let mut rows = Vec::new();
    let Some(top) = store.children("") else {
        return rows;
    };

    // Children are pushed in reverse so they pop in listing order.
    let mut stack: Vec<(&str, usize)> = top.iter().rev().map(|p| (p.as_str(), 0)).collect();
    while let Some((path, depth)) = stack.pop() {
        let Some(node) = store.node(path) else {
            continue;
        };
        rows.push(VisibleRow {
            node: Arc::clone(node),
            depth,
        });
        if node.is_dir() && expanded.contains(path) {
            if let Some(children) = store.children(path) {
                stack.extend(children.iter().rev().map(|p| (p.as_str(), depth + 1)));
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expanded(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn paths(rows: &[VisibleRow]) -> Vec<&str> {
        rows.iter().map(VisibleRow::path).collect()
    }

    fn sample_store() -> TreeStore {
        let mut store = TreeStore::new();
        store.commit_children(
            "",
            vec![
                TreeNode::dir("docs"),
                TreeNode::dir("empty"),
                TreeNode::file("README.md", Some("f0")),
            ],
        );
        store.commit_children(
            "docs",
            vec![
                TreeNode::dir("docs/guides"),
                TreeNode::file("docs/a.md", Some("f1")),
            ],
        );
        store.commit_children("docs/guides", vec![TreeNode::file("docs/guides/intro.md", Some("f2"))]);
        store
    }

    #[test]
    fn empty_store_projects_nothing() {
        let rows = project_rows(&TreeStore::new(), &expanded(&["docs"]), None);
        assert!(rows.is_empty());
    }

    #[test]
    fn collapsed_tree_shows_top_level_only() {
        let rows = project_rows(&sample_store(), &BTreeSet::new(), None);
        assert_eq!(paths(&rows), ["docs", "empty", "README.md"]);
        assert!(rows.iter().all(|r| r.depth == 0));
    }

    #[test]
    fn pre_order_through_expanded_directories() {
        let rows = project_rows(&sample_store(), &expanded(&["docs", "docs/guides"]), None);
        assert_eq!(
            paths(&rows),
            [
                "docs",
                "docs/guides",
                "docs/guides/intro.md",
                "docs/a.md",
                "empty",
                "README.md"
            ]
        );
        let depths: Vec<_> = rows.iter().map(|r| r.depth).collect();
        assert_eq!(depths, [0, 1, 2, 1, 0, 0]);
    }

    #[test]
    fn expanded_child_under_collapsed_parent_stays_hidden() {
        let rows = project_rows(&sample_store(), &expanded(&["docs/guides"]), None);
        assert_eq!(paths(&rows), ["docs", "empty", "README.md"]);
    }

    #[test]
    fn expanded_but_unloaded_directory_contributes_nothing() {
        let rows = project_rows(&sample_store(), &expanded(&["empty", "ghost"]), None);
        assert_eq!(paths(&rows), ["docs", "empty", "README.md"]);
    }

    #[test]
    fn every_row_is_reachable_through_expanded_ancestors() {
        let store = sample_store();
        let open = expanded(&["docs", "docs/guides"]);
        for row in project_rows(&store, &open, None) {
            for ancestor in crate::remote::types::ancestors(row.path()) {
                assert!(open.contains(&ancestor), "{} hidden by {}", row.path(), ancestor);
            }
        }
    }

    #[test]
    fn search_results_replace_the_hierarchy() {
        let mut hit = TreeNode::file("docs/guides/intro.md", Some("f2"));
        hit.depth = 3;
        let results = vec![Arc::new(hit), Arc::new(TreeNode::dir("docs"))];
        let rows = project_rows(&sample_store(), &expanded(&["docs"]), Some(results.as_slice()));
        assert_eq!(paths(&rows), ["docs/guides/intro.md", "docs"]);
        assert_eq!(rows[0].depth, 3);
        assert_eq!(rows[1].depth, 1);
    }

    #[test]
    fn deep_trees_do_not_recurse() {
        let mut store = TreeStore::new();
        let mut open = BTreeSet::new();
        let mut parent = String::new();
        for i in 0..1_000 {
            let path = if parent.is_empty() {
                format!("d{}", i)
            } else {
                format!("{}/d{}", parent, i)
            };
            store.commit_children(&parent, vec![TreeNode::dir(&path)]);
            open.insert(path.clone());
            parent = path;
        }
        let rows = project_rows(&store, &open, None);
        assert_eq!(rows.len(), 1_000);
        assert_eq!(rows.last().map(|r| r.depth), Some(999));
    }
}
