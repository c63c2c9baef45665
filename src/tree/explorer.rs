//! The explorer owns every piece of tree state for the open project and is
//! only ever mutated from the main loop.
//!
//! Slow work (listing fetches, searches, timers) runs in spawned tasks that
//! report back as [`TreeUpdate`]s over the application event channel. Each
//! update carries the generation it was started under; opening another
//! project bumps the generation so late answers for the old one are dropped.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::KeyEvent;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::event::Event;
use crate::live::refresh::{RefreshCoalescer, DEFAULT_REFRESH_DELAY};
use crate::remote::client::TreeSource;
use crate::remote::types::{ancestors, segment_count, ProjectEvent, ProjectSummary, TreeNode};
use crate::tree::loader;
use crate::tree::navigator::{navigate, NavAction, TreeKey};
use crate::tree::observer::TreeObserver;
use crate::tree::persistence::{self, SessionStorage};
use crate::tree::projector::{project_rows, VisibleRow};
use crate::tree::search::{QueryChange, SearchOverlay, DEFAULT_DEBOUNCE};
use crate::tree::store::TreeStore;
use crate::tree::viewport::{Viewport, DEFAULT_OVERSCAN};

/// Why a listing was fetched; decides how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Root and restored expansion when a project opens.
    Open,
    /// Requested by the user (expanding a directory).
    OnDemand,
    /// Making a path visible (search result, README, `--open`).
    Reveal,
    /// Live refresh after server-side changes.
    Refresh,
}

/// Result of background tree work, applied on the main loop.
#[derive(Debug)]
pub enum TreeUpdate {
    DirectoryLoaded {
        generation: u64,
        parent: String,
        origin: LoadOrigin,
        result: Result<Vec<TreeNode>>,
    },
    /// All listings needed to show `path` have been delivered.
    PathRevealed {
        generation: u64,
        path: String,
        select: bool,
    },
    /// The search debounce timer for `query` went off.
    SearchDue { generation: u64, query: String },
    SearchCompleted {
        generation: u64,
        query: String,
        result: Result<Vec<TreeNode>>,
    },
    /// The coalesced live refresh is due.
    RefreshDue { generation: u64 },
    SummaryLoaded {
        generation: u64,
        result: Result<ProjectSummary>,
    },
}

impl TreeUpdate {
    fn generation(&self) -> u64 {
        match self {
            TreeUpdate::DirectoryLoaded { generation, .. }
            | TreeUpdate::PathRevealed { generation, .. }
            | TreeUpdate::SearchDue { generation, .. }
            | TreeUpdate::SearchCompleted { generation, .. }
            | TreeUpdate::RefreshDue { generation }
            | TreeUpdate::SummaryLoaded { generation, .. } => *generation,
        }
    }
}

/// The selected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub path: String,
    pub file_id: Option<String>,
}

/// Tunables taken from the configuration.
#[derive(Debug, Clone)]
pub struct ExplorerSettings {
    pub search_debounce: Duration,
    pub refresh_delay: Duration,
    pub auto_open_readme: bool,
    pub overscan: usize,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            search_debounce: DEFAULT_DEBOUNCE,
            refresh_delay: DEFAULT_REFRESH_DELAY,
            auto_open_readme: true,
            overscan: DEFAULT_OVERSCAN,
        }
    }
}

/// Expanded paths ordered so every directory comes after its ancestors.
fn in_restore_order(expanded: &BTreeSet<String>) -> Vec<String> {
    let mut ordered: Vec<&String> = expanded.iter().filter(|p| !p.is_empty()).collect();
    ordered.sort_by(|a, b| {
        segment_count(a)
            .cmp(&segment_count(b))
            .then_with(|| a.cmp(b))
    });
    ordered.into_iter().cloned().collect()
}

pub struct Explorer {
    source: Arc<dyn TreeSource>,
    tx: UnboundedSender<Event>,
    storage: SessionStorage,
    settings: ExplorerSettings,

    project_id: String,
    generation: u64,
    summary: Option<ProjectSummary>,

    store: TreeStore,
    expanded: BTreeSet<String>,
    /// Directories whose expansion waits on their first listing.
    pending_expand: HashSet<String>,
    focused: Option<String>,
    selection: Option<Selection>,
    /// A path was revealed explicitly since the project opened; it beats
    /// the README.
    reveal_requested: bool,
    search: SearchOverlay,
    coalescer: RefreshCoalescer,

    rows: Vec<VisibleRow>,
    pub viewport: Viewport,

    observers: Vec<Box<dyn TreeObserver>>,
    toasts: Vec<String>,
}

impl Explorer {
    pub fn new(
        source: Arc<dyn TreeSource>,
        tx: UnboundedSender<Event>,
        storage: SessionStorage,
        settings: ExplorerSettings,
    ) -> Self {
        Self {
            source,
            tx,
            storage,
            search: SearchOverlay::new(settings.search_debounce),
            coalescer: RefreshCoalescer::new(settings.refresh_delay),
            settings,
            project_id: String::new(),
            generation: 0,
            summary: None,
            store: TreeStore::new(),
            expanded: BTreeSet::new(),
            pending_expand: HashSet::new(),
            focused: None,
            selection: None,
            reveal_requested: false,
            rows: Vec::new(),
            viewport: Viewport::default(),
            observers: Vec::new(),
            toasts: Vec::new(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn summary(&self) -> Option<&ProjectSummary> {
        self.summary.as_ref()
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn rows(&self) -> &[VisibleRow] {
        &self.rows
    }

    pub fn overscan(&self) -> usize {
        self.settings.overscan
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    /// Whether `path` is waiting for its first listing before expanding.
    pub fn is_pending(&self, path: &str) -> bool {
        self.pending_expand.contains(path)
    }

    pub fn focused_path(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn focused_index(&self) -> Option<usize> {
        let focused = self.focused.as_deref()?;
        self.rows.iter().position(|r| r.path() == focused)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn search(&self) -> &SearchOverlay {
        &self.search
    }

    pub fn in_search_mode(&self) -> bool {
        self.search.is_active()
    }

    pub fn add_observer(&mut self, observer: Box<dyn TreeObserver>) {
        self.observers.push(observer);
    }

    /// Messages for the status bar produced since the last call.
    pub fn take_toasts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.toasts)
    }

    // ── Project lifecycle ────────────────────────────────────────────────────

    /// Switch to `project_id` with an empty store, restoring the saved
    /// expansion and focus, and start loading the root and every restored
    /// directory.
    pub fn open_project(&mut self, project_id: &str) {
        self.generation += 1;
        self.project_id = project_id.to_string();
        self.summary = None;
        self.store = TreeStore::new();
        self.pending_expand.clear();
        self.selection = None;
        self.reveal_requested = false;
        self.search.clear();
        self.coalescer.cancel();
        self.viewport.offset = 0;
        self.expanded = persistence::load_expansion(&self.storage, project_id);
        self.focused = persistence::load_focus(&self.storage, project_id);
        self.reproject();

        info!(
            project_id,
            generation = self.generation,
            expanded = self.expanded.len(),
            "project opened"
        );

        let mut parents = vec![String::new()];
        parents.extend(in_restore_order(&self.expanded));
        self.spawn_loads(parents, LoadOrigin::Open, None);
        self.spawn_summary();
    }

    /// Fetch `parent`'s listing in the background and commit it when done.
    pub fn load_directory(&self, parent: &str) {
        self.spawn_loads(vec![parent.to_string()], LoadOrigin::OnDemand, None);
    }

    /// Reload the root and every expanded directory, parents first.
    ///
    /// Expansion, focus, selection and search are left alone.
    pub fn refresh(&mut self) {
        let mut parents = vec![String::new()];
        parents.extend(in_restore_order(&self.expanded));
        debug!(listings = parents.len(), "refreshing tree");
        self.spawn_loads(parents, LoadOrigin::Refresh, None);
    }

    /// React to a live event. Tree-changing events for this project schedule
    /// one coalesced refresh.
    pub fn handle_project_event(&mut self, event: &ProjectEvent) {
        if event.project_id != self.project_id || !event.touches_tree() {
            return;
        }
        let tx = self.tx.clone();
        let generation = self.generation;
        let armed = self.coalescer.request(move |delay| {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Event::Tree(TreeUpdate::RefreshDue { generation }));
            })
        });
        if armed {
            debug!(kind = %event.kind, "refresh scheduled");
        }
    }

    // ── Applying background results ──────────────────────────────────────────

    pub fn apply(&mut self, update: TreeUpdate) {
        if update.generation() != self.generation {
            debug!(stale = update.generation(), current = self.generation, "dropping stale update");
            return;
        }
        match update {
            TreeUpdate::DirectoryLoaded {
                parent,
                origin,
                result,
                ..
            } => self.on_directory_loaded(parent, origin, result),
            TreeUpdate::PathRevealed { path, select, .. } => {
                if select {
                    self.select_path(&path);
                }
                self.scroll_to_focus();
            }
            TreeUpdate::SearchDue { query, .. } => self.on_search_due(query),
            TreeUpdate::SearchCompleted { query, result, .. } => {
                self.on_search_completed(&query, result)
            }
            TreeUpdate::RefreshDue { .. } => {
                self.coalescer.fire();
                self.refresh();
            }
            TreeUpdate::SummaryLoaded { result, .. } => self.on_summary(result),
        }
    }

    fn on_directory_loaded(&mut self, parent: String, origin: LoadOrigin, result: Result<Vec<TreeNode>>) {
        match result {
            Ok(items) => {
                debug!(parent = %parent, items = items.len(), ?origin, "listing committed");
                self.store.commit_children(&parent, items);
                if self.pending_expand.remove(&parent) {
                    self.set_expanded(&parent, true);
                }
            }
            Err(e) => {
                self.pending_expand.remove(&parent);
                match origin {
                    LoadOrigin::Refresh => warn!(error = %e, "refresh listing failed"),
                    // Restored expansion may name directories that are gone.
                    LoadOrigin::Open if !parent.is_empty() => {
                        debug!(parent = %parent, error = %e, "restored directory not loaded")
                    }
                    _ => {
                        warn!(error = %e, "listing failed");
                        self.toasts.push(e.to_string());
                    }
                }
            }
        }
        self.reproject();
    }

    fn on_summary(&mut self, result: Result<ProjectSummary>) {
        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "project summary unavailable");
                return;
            }
        };
        let readme = summary.readme_path.clone().filter(|p| !p.is_empty());
        self.summary = Some(summary);
        if let Some(readme) = readme {
            if self.settings.auto_open_readme
                && !self.reveal_requested
                && self.focused.is_none()
                && self.selection.is_none()
            {
                debug!(path = %readme, "auto-opening README");
                self.reveal(&readme);
            }
        }
    }

    // ── Navigation ───────────────────────────────────────────────────────────

    /// Handle a key aimed at the tree. Returns whether the key was used.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let Some(key) = TreeKey::from_key_event(key) else {
            return false;
        };
        let action = navigate(
            &self.rows,
            self.focused.as_deref(),
            &self.expanded,
            self.search.is_active(),
            key,
        );
        let used = action != NavAction::None;
        self.perform(action);
        used
    }

    fn perform(&mut self, action: NavAction) {
        match action {
            NavAction::None => return,
            NavAction::Focus { path, select } => match self.row_node(&path) {
                Some(node) if select => self.select_node(&node),
                _ => self.set_focus(&path),
            },
            NavAction::Expand(path) | NavAction::Collapse(path) => self.toggle_directory(&path),
            NavAction::Activate(path) => self.activate(&path),
            NavAction::ChooseResult(path) => self.select_search_result(&path),
        }
        self.scroll_to_focus();
    }

    /// Expand a collapsed directory or collapse an expanded one.
    ///
    /// An unloaded directory is fetched first and only expands once its
    /// listing arrived; on failure it stays collapsed. Does nothing in
    /// search mode or while the directory is already being fetched.
    pub fn toggle_directory(&mut self, path: &str) {
        if self.search.is_active() || self.pending_expand.contains(path) {
            return;
        }
        if self.expanded.contains(path) {
            self.set_expanded(path, false);
        } else if self.store.is_loaded(path) {
            self.set_expanded(path, true);
        } else {
            self.pending_expand.insert(path.to_string());
            self.load_directory(path);
            return;
        }
        self.reproject();
    }

    /// Click semantics: a directory toggles, a file becomes the selection.
    /// In search mode the row is chosen as a result instead.
    pub fn activate(&mut self, path: &str) {
        if self.search.is_active() {
            self.select_search_result(path);
            return;
        }
        let Some(node) = self.store.node(path).cloned() else {
            return;
        };
        if node.is_dir() {
            self.toggle_directory(path);
        } else {
            self.select_node(&node);
        }
    }

    /// Mouse click on the row at `index`: focus it, then activate it.
    pub fn click_row(&mut self, index: usize) {
        let Some(path) = self.rows.get(index).map(|r| r.path().to_string()) else {
            return;
        };
        self.set_focus(&path);
        self.activate(&path);
        self.scroll_to_focus();
    }

    /// Focus the first or last row.
    pub fn jump(&mut self, to_end: bool) {
        let row = if to_end { self.rows.last() } else { self.rows.first() };
        let Some(row) = row else {
            return;
        };
        let select = row.node.is_file();
        let path = row.path().to_string();
        self.perform(NavAction::Focus { path, select });
    }

    /// Scroll the viewport without moving focus.
    pub fn scroll(&mut self, delta: isize) {
        self.viewport.scroll_by(delta, self.rows.len());
    }

    // ── Search ───────────────────────────────────────────────────────────────

    /// Update the search text. Blank text leaves search mode at once;
    /// anything else is searched after the debounce delay.
    pub fn set_search_query(&mut self, value: &str) {
        match self.search.update_query(value) {
            QueryChange::Cleared => self.reproject(),
            QueryChange::Debounce(query) => {
                let tx = self.tx.clone();
                let generation = self.generation;
                let delay = self.search.delay;
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Event::Tree(TreeUpdate::SearchDue { generation, query }));
                });
                self.search.arm(timer);
            }
        }
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
        self.reproject();
        self.scroll_to_focus();
    }

    fn on_search_due(&mut self, query: String) {
        if !self.search.is_current(&query) {
            return;
        }
        self.search.begin_request();
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let project_id = self.project_id.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = loader::search_tree(source.as_ref(), &project_id, &query).await;
            let _ = tx.send(Event::Tree(TreeUpdate::SearchCompleted {
                generation,
                query,
                result,
            }));
        });
    }

    fn on_search_completed(&mut self, query: &str, result: Result<Vec<TreeNode>>) {
        match self.search.complete(query, result) {
            None => debug!(query, "dropping stale search answer"),
            Some(Ok(hits)) => {
                debug!(query, hits, "search results shown");
                self.viewport.offset = 0;
            }
            Some(Err(e)) => {
                warn!(error = %e, "search failed");
                self.toasts.push("Search failed".to_string());
            }
        }
        self.reproject();
    }

    /// Leave search mode and bring the chosen result into the hierarchy.
    ///
    /// A directory ends up expanded, loaded and focused; a file ends up
    /// selected and focused with all of its ancestors expanded.
    pub fn select_search_result(&mut self, path: &str) {
        let Some(node) = self
            .search
            .results()
            .and_then(|results| results.iter().find(|n| n.path == path))
            .cloned()
        else {
            return;
        };
        self.search.clear();
        if node.is_dir() {
            self.ensure_visible_path(&node.path, true);
        } else {
            self.ensure_visible_path(&node.path, false);
            self.select_node(&node);
        }
        self.reproject();
        self.scroll_to_focus();
    }

    // ── Revealing paths ──────────────────────────────────────────────────────

    /// Expand every ancestor of `path` and load, root first, each listing on
    /// the way that is not loaded yet. With `auto_select_dir`, `path` names a
    /// directory that is expanded, loaded and focused as well.
    pub fn ensure_visible_path(&mut self, path: &str, auto_select_dir: bool) {
        self.expose(path, auto_select_dir, false);
    }

    /// Make `path` visible, then focus it (selecting it if it is a file).
    pub fn reveal(&mut self, path: &str) {
        self.expose(path, false, true);
    }

    fn expose(&mut self, path: &str, auto_select_dir: bool, select: bool) {
        if path.is_empty() {
            return;
        }
        self.reveal_requested = true;
        let mut to_open = ancestors(path);
        if auto_select_dir {
            to_open.push(path.to_string());
        }

        let mut listings = vec![String::new()];
        listings.extend(to_open.iter().cloned());
        listings.retain(|p| !self.store.is_loaded(p));

        let mut changed = false;
        for dir in &to_open {
            self.pending_expand.remove(dir);
            if self.expanded.insert(dir.clone()) {
                changed = true;
                self.notify_toggled(dir, true);
            }
        }
        if changed {
            self.persist_expansion();
        }
        if auto_select_dir {
            self.set_focus(path);
        }
        self.reproject();

        if listings.is_empty() {
            if select {
                self.select_path(path);
            }
            self.scroll_to_focus();
        } else {
            debug!(path, listings = listings.len(), "revealing path");
            self.spawn_loads(listings, LoadOrigin::Reveal, Some((path.to_string(), select)));
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn spawn_loads(&self, parents: Vec<String>, origin: LoadOrigin, reveal: Option<(String, bool)>) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let project_id = self.project_id.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            for parent in parents {
                let result = loader::fetch_directory(source.as_ref(), &project_id, &parent).await;
                let failed = result.is_err();
                let update = TreeUpdate::DirectoryLoaded {
                    generation,
                    parent,
                    origin,
                    result,
                };
                if tx.send(Event::Tree(update)).is_err() {
                    return;
                }
                // Deeper listings of a path cannot validate once an ancestor failed.
                if failed && origin == LoadOrigin::Reveal {
                    return;
                }
            }
            if let Some((path, select)) = reveal {
                let _ = tx.send(Event::Tree(TreeUpdate::PathRevealed {
                    generation,
                    path,
                    select,
                }));
            }
        });
    }

    fn spawn_summary(&self) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let project_id = self.project_id.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = source.fetch_project_summary(&project_id).await;
            let _ = tx.send(Event::Tree(TreeUpdate::SummaryLoaded { generation, result }));
        });
    }

    fn reproject(&mut self) {
        self.rows = project_rows(&self.store, &self.expanded, self.search.results());
        self.viewport.clamp(self.rows.len());
    }

    fn scroll_to_focus(&mut self) {
        if let Some(index) = self.focused_index() {
            self.viewport.ensure_visible(index);
        }
    }

    fn row_node(&self, path: &str) -> Option<Arc<TreeNode>> {
        self.rows
            .iter()
            .find(|r| r.path() == path)
            .map(|r| Arc::clone(&r.node))
            .or_else(|| self.store.node(path).cloned())
    }

    fn set_expanded(&mut self, path: &str, open: bool) {
        let changed = if open {
            self.expanded.insert(path.to_string())
        } else {
            self.expanded.remove(path)
        };
        if changed {
            self.persist_expansion();
            self.notify_toggled(path, open);
        }
    }

    fn set_focus(&mut self, path: &str) {
        if self.focused.as_deref() == Some(path) {
            return;
        }
        self.focused = Some(path.to_string());
        if let Err(e) = persistence::save_focus(&mut self.storage, &self.project_id, Some(path)) {
            warn!(error = %e, "could not save focus");
        }
    }

    /// Select and focus the node at `path` if it is known; a directory is
    /// only focused.
    fn select_path(&mut self, path: &str) {
        match self.row_node(path) {
            Some(node) if node.is_file() => self.select_node(&node),
            Some(_) => self.set_focus(path),
            None => debug!(path, "revealed path is not in the tree"),
        }
    }

    fn select_node(&mut self, node: &TreeNode) {
        self.selection = Some(Selection {
            path: node.path.clone(),
            file_id: node.file_id.clone(),
        });
        self.set_focus(&node.path);
        for observer in &self.observers {
            observer.node_selected(&node.path, node.file_id.as_deref());
        }
    }

    fn notify_toggled(&self, path: &str, expanded: bool) {
        for observer in &self.observers {
            observer.directory_toggled(path, expanded);
        }
    }

    fn persist_expansion(&mut self) {
        if let Err(e) = persistence::save_expansion(&mut self.storage, &self.project_id, &self.expanded) {
            warn!(error = %e, "could not save expansion");
        }
    }
}
