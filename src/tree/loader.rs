//! Cursor-paginated fetching of directory listings and search results.
//!
//! Nothing here touches the tree store: a listing is fetched and validated
//! in full, then handed back for the event loop to commit in one step.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{AppError, Result};
use crate::remote::client::TreeSource;
use crate::remote::types::{PageRequest, TreeNode};

/// Fetch every page of `parent`'s listing (`""` for the root).
///
/// Stops when the server reports no further cursor. Any failure, including
/// a page that fails validation, aborts the whole listing.
pub async fn fetch_directory(
    source: &dyn TreeSource,
    project_id: &str,
    parent: &str,
) -> Result<Vec<TreeNode>> {
    collect_pages(source, project_id, parent)
        .await
        .map_err(|e| AppError::load(parent, e))
}

async fn collect_pages(
    source: &dyn TreeSource,
    project_id: &str,
    parent: &str,
) -> Result<Vec<TreeNode>> {
    let mut items = Vec::new();
    let mut seen_paths = HashSet::new();
    let mut seen_cursors = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let request = PageRequest::listing(parent, cursor.take());
        let page = source.fetch_tree_page(project_id, &request).await?;
        pages += 1;

        for node in page.items {
            if node.parent_path() != parent {
                return Err(AppError::InvalidPage(format!(
                    "'{}' listed under '{}'",
                    node.path, parent
                )));
            }
            if !seen_paths.insert(node.path.clone()) {
                return Err(AppError::InvalidPage(format!(
                    "'{}' listed twice",
                    node.path
                )));
            }
            items.push(node);
        }

        match page.next_cursor {
            Some(next) => {
                if !seen_cursors.insert(next.clone()) {
                    return Err(AppError::InvalidPage(format!(
                        "cursor '{}' repeated",
                        next
                    )));
                }
                cursor = Some(next);
            }
            None => break,
        }
    }

    debug!(parent, pages, items = items.len(), "directory fetched");
    Ok(items)
}

/// Run a flat search across the whole project.
///
/// Result order is the server's. Matches come back flat in a single page,
/// each carrying its own depth.
pub async fn search_tree(
    source: &dyn TreeSource,
    project_id: &str,
    query: &str,
) -> Result<Vec<TreeNode>> {
    let page = source
        .fetch_tree_page(project_id, &PageRequest::search(query))
        .await
        .map_err(|e| AppError::search(query, e))?;
    debug!(query, hits = page.items.len(), "search completed");
    Ok(page.items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeTreeSource;
    use crate::remote::types::TreePage;

    fn files(paths: &[&str]) -> Vec<TreeNode> {
        paths.iter().map(|p| TreeNode::file(p, Some(p))).collect()
    }

    #[tokio::test]
    async fn aggregates_all_pages_in_order() {
        let source = FakeTreeSource::new();
        source.set_listing(
            "",
            vec![
                files(&["a.md", "b.md"]),
                files(&["c.md"]),
                files(&["d.md", "e.md"]),
            ],
        );

        let items = fetch_directory(&source, "p1", "").await.unwrap();
        let paths: Vec<_> = items.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, ["a.md", "b.md", "c.md", "d.md", "e.md"]);
        assert_eq!(source.listing_calls_for(""), 3);
    }

    #[tokio::test]
    async fn two_page_directory_is_complete() {
        let source = FakeTreeSource::new();
        source.set_listing(
            "docs",
            vec![files(&["docs/a.md", "docs/b.md"]), files(&["docs/c.md"])],
        );
        let items = fetch_directory(&source, "p1", "docs").await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].path, "docs/c.md");
    }

    #[tokio::test]
    async fn empty_directory_is_an_empty_listing() {
        let source = FakeTreeSource::new();
        source.set_listing("empty", vec![Vec::new()]);
        let items = fetch_directory(&source, "p1", "empty").await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn failure_is_wrapped_with_the_path() {
        let source = FakeTreeSource::new();
        source.fail_listing("docs", true);
        let err = fetch_directory(&source, "p1", "docs").await.unwrap_err();
        match err {
            AppError::Load { path, .. } => assert_eq!(path, "docs"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_items_under_another_parent() {
        let source = FakeTreeSource::new();
        source.set_listing("docs", vec![files(&["other/a.md"])]);
        let err = fetch_directory(&source, "p1", "docs").await.unwrap_err();
        assert!(err.to_string().contains("listed under"), "{err}");
    }

    #[tokio::test]
    async fn rejects_duplicates_across_pages() {
        let source = FakeTreeSource::new();
        source.set_listing("", vec![files(&["a.md"]), files(&["a.md"])]);
        let err = fetch_directory(&source, "p1", "").await.unwrap_err();
        assert!(err.to_string().contains("listed twice"), "{err}");
    }

    #[tokio::test]
    async fn rejects_a_looping_cursor() {
        let source = FakeTreeSource::new();
        source.set_pages(
            "",
            vec![
                TreePage {
                    items: files(&["a.md"]),
                    next_cursor: Some("c1".into()),
                    total: 3,
                },
                TreePage {
                    items: files(&["b.md"]),
                    next_cursor: Some("c1".into()),
                    total: 3,
                },
            ],
        );
        let err = fetch_directory(&source, "p1", "").await.unwrap_err();
        assert!(err.to_string().contains("repeated"), "{err}");
    }

    #[tokio::test]
    async fn repeated_fetch_yields_identical_listing() {
        let source = FakeTreeSource::new();
        source.set_listing("", vec![files(&["a.md"]), files(&["b.md"])]);
        let first = fetch_directory(&source, "p1", "").await.unwrap();
        let second = fetch_directory(&source, "p1", "").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn search_keeps_server_order_and_depths() {
        let source = FakeTreeSource::new();
        let mut deep = TreeNode::file("docs/guides/intro.md", Some("f2"));
        deep.depth = 3;
        source.set_search("intro", vec![deep.clone(), TreeNode::dir("intro")]);

        let hits = search_tree(&source, "p1", "intro").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], deep);
        assert!(hits[1].is_dir());
    }

    #[tokio::test]
    async fn search_failure_names_the_query() {
        let source = FakeTreeSource::new();
        source.fail_search(true);
        let err = search_tree(&source, "p1", "intro").await.unwrap_err();
        assert!(matches!(err, AppError::Search { ref query, .. } if query == "intro"));
    }
}
