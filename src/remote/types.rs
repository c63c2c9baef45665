//! Wire records exchanged with the document server, validated at the fetch
//! boundary so that nothing malformed ever reaches the tree store.

use serde::Deserialize;

use crate::error::{AppError, Result};

// ── Tree nodes ───────────────────────────────────────────────────────────────

/// Kind of entry in a project's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Dir,
    File,
}

/// One directory or file entry of a project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Slash-delimited path; the synthetic root is `""`.
    pub path: String,
    /// Display name (last path segment).
    pub name: String,
    pub kind: NodeKind,
    /// Number of path segments, or the server-reported depth for search hits.
    pub depth: usize,
    /// Backing document id. Always `None` for directories.
    pub file_id: Option<String>,
    /// UI-only decorations such as `"readme"`.
    pub badges: Vec<String>,
}

impl TreeNode {
    /// Build a directory node with depth derived from its path.
    pub fn dir(path: &str) -> Self {
        Self {
            path: path.to_string(),
            name: last_segment(path).to_string(),
            kind: NodeKind::Dir,
            depth: segment_count(path),
            file_id: None,
            badges: Vec::new(),
        }
    }

    /// Build a file node with depth derived from its path.
    pub fn file(path: &str, file_id: Option<&str>) -> Self {
        Self {
            path: path.to_string(),
            name: last_segment(path).to_string(),
            kind: NodeKind::File,
            depth: segment_count(path),
            file_id: file_id.map(str::to_string),
            badges: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Path of the directory containing this node (`""` for top-level entries).
    pub fn parent_path(&self) -> &str {
        parent_of(&self.path)
    }

    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.iter().any(|b| b == badge)
    }
}

#[derive(Debug, Deserialize)]
struct WireNode {
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default)]
    name: String,
    path: String,
    #[serde(default)]
    depth: Option<usize>,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    badges: Vec<String>,
}

impl TryFrom<WireNode> for TreeNode {
    type Error = AppError;

    fn try_from(wire: WireNode) -> Result<Self> {
        validate_path(&wire.path)?;
        let name = if wire.name.is_empty() {
            last_segment(&wire.path).to_string()
        } else {
            wire.name
        };
        let file_id = match wire.kind {
            NodeKind::File => wire.file_id.filter(|id| !id.is_empty()),
            NodeKind::Dir => None,
        };
        Ok(TreeNode {
            depth: wire.depth.unwrap_or_else(|| segment_count(&wire.path)),
            path: wire.path,
            name,
            kind: wire.kind,
            file_id,
            badges: wire.badges,
        })
    }
}

// ── Pages ────────────────────────────────────────────────────────────────────

/// One page of a cursor-paginated tree listing.
#[derive(Debug, Clone, Default)]
pub struct TreePage {
    pub items: Vec<TreeNode>,
    /// Opaque token for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
struct WirePage {
    items: Vec<WireNode>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    total: u64,
}

impl TreePage {
    /// Decode and validate a page from a JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let wire: WirePage = serde_json::from_slice(body)?;
        let items = wire
            .items
            .into_iter()
            .map(TreeNode::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            items,
            next_cursor: wire.next_cursor.filter(|c| !c.is_empty()),
            total: wire.total,
        })
    }
}

/// Parameters of one `/projects/{id}/tree` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Directory to list; `None` for the root.
    pub parent: Option<String>,
    pub cursor: Option<String>,
    /// Present only for search, switching the server to flat-match mode.
    pub query: Option<String>,
}

impl PageRequest {
    /// Listing request for `parent` (root when empty).
    pub fn listing(parent: &str, cursor: Option<String>) -> Self {
        Self {
            parent: (!parent.is_empty()).then(|| parent.to_string()),
            cursor,
            query: None,
        }
    }

    /// Flat search request.
    pub fn search(query: &str) -> Self {
        Self {
            parent: None,
            cursor: None,
            query: Some(query.to_string()),
        }
    }
}

// ── Other records ────────────────────────────────────────────────────────────

/// Read-only preview of one file's content.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FilePreview {
    pub id: String,
    pub project_id: String,
    pub path: String,
    pub title: String,
    pub size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// The slice of the project summary the explorer cares about.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub readme_path: Option<String>,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub directory_count: u64,
}

/// A server push message from the project event stream.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProjectEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub project_id: String,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl ProjectEvent {
    /// Parse one event frame. Anything that is not a well-formed event is
    /// reported as `MalformedEvent`.
    pub fn parse(raw: &str) -> Result<Self> {
        let event: ProjectEvent =
            serde_json::from_str(raw).map_err(|e| AppError::MalformedEvent(e.to_string()))?;
        if event.kind.is_empty() {
            return Err(AppError::MalformedEvent("empty event type".into()));
        }
        Ok(event)
    }

    /// Whether this event may have changed the project's hierarchy.
    pub fn touches_tree(&self) -> bool {
        self.kind.starts_with("file.")
            || self.kind.starts_with("dir.")
            || self.kind == "files.batch_moved"
    }

    /// String field from the payload, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}

// ── Path helpers ─────────────────────────────────────────────────────────────

/// Parent path of `path`; `""` for top-level entries and for the root itself.
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of `path`.
pub fn last_segment(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Number of segments in `path` (0 for the root).
pub fn segment_count(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// Every proper ancestor directory of `path`, outermost first, root excluded.
///
/// `"a/b/c.md"` yields `["a", "a/b"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut end = 0;
    while let Some(offset) = path[end..].find('/') {
        end += offset;
        out.push(path[..end].to_string());
        end += 1;
    }
    out
}

/// Reject paths that cannot name a node: empty, leading/trailing slash or an
/// empty segment.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AppError::InvalidPage("node with empty path".into()));
    }
    if path.split('/').any(str::is_empty) {
        return Err(AppError::InvalidPage(format!("malformed path '{}'", path)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_strips_last_segment() {
        assert_eq!(parent_of("docs/guides/intro.md"), "docs/guides");
        assert_eq!(parent_of("README.md"), "");
        assert_eq!(parent_of(""), "");
    }

    #[test]
    fn ancestors_are_outermost_first() {
        assert_eq!(ancestors("a/b/c.md"), vec!["a".to_string(), "a/b".to_string()]);
        assert!(ancestors("top.md").is_empty());
        assert!(ancestors("").is_empty());
    }

    #[test]
    fn segment_count_matches_depth() {
        assert_eq!(segment_count(""), 0);
        assert_eq!(segment_count("a"), 1);
        assert_eq!(segment_count("a/b/c"), 3);
    }

    #[test]
    fn page_decodes_and_derives_missing_fields() {
        let body = br#"{
            "items": [
                {"type": "dir", "name": "docs", "path": "docs"},
                {"type": "file", "path": "docs/readme.md", "file_id": "f1", "badges": ["readme"]}
            ],
            "next_cursor": "abc",
            "total": 2
        }"#;
        let page = TreePage::from_json(body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
        let file = &page.items[1];
        assert_eq!(file.name, "readme.md");
        assert_eq!(file.depth, 2);
        assert_eq!(file.file_id.as_deref(), Some("f1"));
        assert!(file.has_badge("readme"));
    }

    #[test]
    fn page_treats_empty_cursor_as_last_page() {
        let page = TreePage::from_json(br#"{"items": [], "next_cursor": ""}"#).unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn page_rejects_unknown_node_type() {
        let body = br#"{"items": [{"type": "symlink", "path": "x"}]}"#;
        assert!(matches!(TreePage::from_json(body), Err(AppError::Decode(_))));
    }

    #[test]
    fn page_rejects_malformed_paths() {
        for path in ["", "/abs", "trailing/", "a//b"] {
            let body = format!(r#"{{"items": [{{"type": "file", "path": "{}"}}]}}"#, path);
            assert!(
                matches!(TreePage::from_json(body.as_bytes()), Err(AppError::InvalidPage(_))),
                "path {:?} should be rejected",
                path
            );
        }
    }

    #[test]
    fn directories_never_carry_file_ids() {
        let body = br#"{"items": [{"type": "dir", "path": "docs", "file_id": "oops"}]}"#;
        let page = TreePage::from_json(body).unwrap();
        assert!(page.items[0].file_id.is_none());
    }

    #[test]
    fn event_parse_and_relevance() {
        let ev = ProjectEvent::parse(r#"{"type":"file.moved","project_id":"p1"}"#).unwrap();
        assert!(ev.touches_tree());
        let ev = ProjectEvent::parse(r#"{"type":"files.batch_moved","project_id":"p1"}"#).unwrap();
        assert!(ev.touches_tree());
        let ev = ProjectEvent::parse(
            r#"{"type":"commit.failed","project_id":"p1","payload":{"code":"conflict"}}"#,
        )
        .unwrap();
        assert!(!ev.touches_tree());
        assert_eq!(ev.payload_str("code"), Some("conflict"));
    }

    #[test]
    fn malformed_events_are_reported() {
        assert!(matches!(
            ProjectEvent::parse("not json"),
            Err(AppError::MalformedEvent(_))
        ));
        assert!(matches!(
            ProjectEvent::parse(r#"{"type":"","project_id":"p1"}"#),
            Err(AppError::MalformedEvent(_))
        ));
        assert!(matches!(
            ProjectEvent::parse(r#"{"project_id":"p1"}"#),
            Err(AppError::MalformedEvent(_))
        ));
    }

    #[test]
    fn listing_request_for_root_has_no_parent() {
        assert_eq!(PageRequest::listing("", None).parent, None);
        assert_eq!(
            PageRequest::listing("docs", Some("c1".into())),
            PageRequest {
                parent: Some("docs".into()),
                cursor: Some("c1".into()),
                query: None
            }
        );
    }
}
