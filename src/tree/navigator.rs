//! Native-explorer keyboard semantics over the visible rows.
//!
//! `navigate` only decides what a key means; the explorer carries the
//! resulting action out (moving focus, loading, persisting).

use std::collections::BTreeSet;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tree::projector::VisibleRow;

/// Keys the tree understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

impl TreeKey {
    /// Map a terminal key event. Vim-style `j`/`k`/`h`/`l` are accepted too.
    pub fn from_key_event(key: KeyEvent) -> Option<Self> {
        if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return None;
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(TreeKey::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(TreeKey::Down),
            KeyCode::Left | KeyCode::Char('h') => Some(TreeKey::Left),
            KeyCode::Right | KeyCode::Char('l') => Some(TreeKey::Right),
            KeyCode::Enter => Some(TreeKey::Enter),
            _ => None,
        }
    }
}

/// What a key press resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    None,
    /// Move focus to `path`; files become the selection as well.
    Focus { path: String, select: bool },
    /// Expand a collapsed directory (loading it if needed). Focus stays.
    Expand(String),
    /// Collapse an expanded directory. Focus stays.
    Collapse(String),
    /// Same as clicking the row in the hierarchy.
    Activate(String),
    /// Choose a search result.
    ChooseResult(String),
}

fn focus_row(row: &VisibleRow) -> NavAction {
    NavAction::Focus {
        path: row.path().to_string(),
        select: row.node.is_file(),
    }
}

/// Resolve `key` against the current rows.
///
/// The focused index is looked up by path; when nothing is focused (or the
/// focused path is not visible) Up and Down both land on the first row.
pub fn navigate(
    rows: &[VisibleRow],
    focused_path: Option<&str>,
    expanded: &BTreeSet<String>,
    search_mode: bool,
    key: TreeKey,
) -> NavAction {
    if rows.is_empty() {
        return NavAction::None;
    }
    let current = focused_path.and_then(|path| rows.iter().position(|r| r.path() == path));
    let last = rows.len() - 1;

    match key {
        TreeKey::Down => {
            let next = current.map_or(0, |i| (i + 1).min(last));
            focus_row(&rows[next])
        }
        TreeKey::Up => {
            let next = current.map_or(0, |i| i.saturating_sub(1));
            focus_row(&rows[next])
        }
        TreeKey::Right => {
            let Some(index) = current.filter(|_| !search_mode) else {
                return NavAction::None;
            };
            let row = &rows[index];
            if !row.node.is_dir() {
                return NavAction::None;
            }
            if !expanded.contains(row.path()) {
                return NavAction::Expand(row.path().to_string());
            }
            match rows.get(index + 1) {
                Some(next) => focus_row(next),
                None => NavAction::None,
            }
        }
        TreeKey::Left => {
            let Some(index) = current.filter(|_| !search_mode) else {
                return NavAction::None;
            };
            let row = &rows[index];
            if row.node.is_dir() && expanded.contains(row.path()) {
                return NavAction::Collapse(row.path().to_string());
            }
            let parent = row.node.parent_path();
            if parent.is_empty() {
                NavAction::None
            } else {
                NavAction::Focus {
                    path: parent.to_string(),
                    select: false,
                }
            }
        }
        TreeKey::Enter => {
            let Some(index) = current else {
                return NavAction::None;
            };
            let path = rows[index].path().to_string();
            if search_mode {
                NavAction::ChooseResult(path)
            } else {
                NavAction::Activate(path)
            }
        }
    }
}
