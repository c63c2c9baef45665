use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::event::Event;
use crate::live::hub::{ConnectionState, EventHub};
use crate::live::notify::{Notice, NoticeLevel};
use crate::live::LiveLink;
use crate::remote::client::TreeSource;
use crate::remote::types::FilePreview;
use crate::theme::ThemeColors;
use crate::tree::{Explorer, TreeObserver};

/// How long a toast stays in the status bar.
const TOAST_TTL: Duration = Duration::from_secs(3);

/// Which pane receives typed keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Tree,
    SearchInput,
}

/// A transient status bar message.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: NoticeLevel,
    pub created: Instant,
}

/// Preview pane content for one file.
#[derive(Debug)]
pub struct PreviewState {
    pub file_id: String,
    pub result: Result<FilePreview, String>,
}

/// Fetches the preview of every newly selected file and reports it back
/// to the main loop.
struct PreviewLoader {
    source: Arc<dyn TreeSource>,
    tx: UnboundedSender<Event>,
}

impl TreeObserver for PreviewLoader {
    fn node_selected(&self, _path: &str, file_id: Option<&str>) {
        let Some(file_id) = file_id else {
            return;
        };
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let file_id = file_id.to_string();
        tokio::spawn(async move {
            let result = source.fetch_file_preview(&file_id).await;
            let _ = tx.send(Event::Preview { file_id, result });
        });
    }
}

/// Main application state.
pub struct App {
    pub explorer: Explorer,
    pub should_quit: bool,
    pub focus: Focus,
    pub projects: Vec<String>,
    project_index: usize,
    pub preview: Option<PreviewState>,
    pub toast: Option<Toast>,
    /// `None` while the live stream is disabled.
    pub connection: Option<ConnectionState>,
    pub theme: ThemeColors,
    pub use_icons: bool,
    /// Inner area of the tree panel as last drawn, for mouse hit-testing.
    pub tree_area: Rect,
    hub: Option<EventHub>,
    live: Option<LiveLink>,
    tx: UnboundedSender<Event>,
}

impl App {
    /// Create the app for `projects` (at least one). Nothing is loaded until
    /// [`App::start`].
    pub fn new(
        mut explorer: Explorer,
        projects: Vec<String>,
        source: Arc<dyn TreeSource>,
        hub: Option<EventHub>,
        tx: UnboundedSender<Event>,
        theme: ThemeColors,
        use_icons: bool,
    ) -> Self {
        explorer.add_observer(Box::new(PreviewLoader {
            source,
            tx: tx.clone(),
        }));
        Self {
            explorer,
            should_quit: false,
            focus: Focus::Tree,
            projects,
            project_index: 0,
            preview: None,
            toast: None,
            connection: None,
            theme,
            use_icons,
            tree_area: Rect::default(),
            hub,
            live: None,
            tx,
        }
    }

    /// Open the first project, optionally revealing `open_path` in it.
    pub fn start(&mut self, open_path: Option<&str>) {
        self.open_current_project();
        if let Some(path) = open_path {
            self.explorer.reveal(path);
        }
    }

    pub fn current_project(&self) -> &str {
        self.projects
            .get(self.project_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Cycle to the next configured project.
    pub fn next_project(&mut self) {
        if self.projects.len() < 2 {
            return;
        }
        self.project_index = (self.project_index + 1) % self.projects.len();
        self.open_current_project();
    }

    fn open_current_project(&mut self) {
        let project_id = self.current_project().to_string();
        // Release the old project's connection before opening the new one.
        self.live = None;
        self.preview = None;
        self.focus = Focus::Tree;
        self.explorer.open_project(&project_id);
        if let Some(hub) = &self.hub {
            self.connection = Some(ConnectionState::Connecting);
            self.live = Some(LiveLink::connect(hub, &project_id, self.tx.clone()));
        }
    }

    /// Route one event from the main loop.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => crate::handler::handle_key_event(self, key),
            Event::Mouse(mouse) => crate::handler::handle_mouse_event(self, mouse),
            Event::Tick => self.clear_expired_toast(),
            Event::Resize(_, _) => {}
            Event::Tree(update) => self.explorer.apply(update),
            Event::Project(event) => {
                let current = self.live.as_ref().map(LiveLink::project_id);
                if current == Some(event.project_id.as_str()) {
                    self.explorer.handle_project_event(&event);
                } else {
                    debug!(project_id = %event.project_id, "event for a closed project ignored");
                }
            }
            Event::Connection(state) => {
                if self.live.is_some() {
                    self.connection = Some(state);
                }
            }
            Event::Notice(notice) => self.show_notice(notice),
            Event::Preview { file_id, result } => self.on_preview(file_id, result),
        }
        for message in self.explorer.take_toasts() {
            self.set_toast(message, NoticeLevel::Error);
        }
    }

    fn on_preview(&mut self, file_id: String, result: Result<FilePreview, AppError>) {
        let selected = self
            .explorer
            .selection()
            .and_then(|s| s.file_id.as_deref());
        if selected != Some(file_id.as_str()) {
            debug!(file_id = %file_id, "dropping preview for a file no longer selected");
            return;
        }
        let result = result.map_err(|e| {
            warn!(file_id = %file_id, error = %e, "preview failed");
            e.to_string()
        });
        self.preview = Some(PreviewState { file_id, result });
    }

    /// Preview of the selected file, if it has arrived.
    pub fn current_preview(&self) -> Option<&PreviewState> {
        let selected = self.explorer.selection()?.file_id.as_deref()?;
        self.preview.as_ref().filter(|p| p.file_id == selected)
    }

    // ── Toasts ───────────────────────────────────────────────────────────────

    pub fn set_toast(&mut self, message: String, level: NoticeLevel) {
        self.toast = Some(Toast {
            message,
            level,
            created: Instant::now(),
        });
    }

    fn show_notice(&mut self, notice: Notice) {
        self.set_toast(notice.message, notice.level);
    }

    /// Clear the toast once it has been shown for more than three seconds.
    pub fn clear_expired_toast(&mut self) {
        if let Some(toast) = &self.toast {
            if toast.created.elapsed() > TOAST_TTL {
                self.toast = None;
            }
        }
    }

    // ── Search input ─────────────────────────────────────────────────────────

    pub fn focus_search(&mut self) {
        self.focus = Focus::SearchInput;
    }

    pub fn leave_search_input(&mut self) {
        self.focus = Focus::Tree;
    }

    pub fn search_input_char(&mut self, c: char) {
        let mut query = self.explorer.search().query().to_string();
        query.push(c);
        self.explorer.set_search_query(&query);
    }

    pub fn search_delete_char(&mut self) {
        let mut query = self.explorer.search().query().to_string();
        if query.pop().is_some() {
            self.explorer.set_search_query(&query);
        }
    }

    /// Quit the application.
    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
