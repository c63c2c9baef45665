use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, Focus};
use crate::components::preview::{PreviewContent, PreviewWidget};
use crate::components::search::SearchBarWidget;
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;

/// Render the application UI.
pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let [main, status] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .areas(area);
    let [left, right] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .areas(main);
    let [search_area, tree_area] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .areas(left);

    let border = |focused: bool| {
        let fg = if focused {
            app.theme.border_focused_fg
        } else {
            app.theme.border_fg
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(fg))
    };

    let search_block = border(app.focus == Focus::SearchInput).title(" Search ");
    let tree_title = if app.explorer.in_search_mode() {
        " Results ".to_string()
    } else {
        format!(" {} ", project_title(app))
    };
    let tree_block = border(app.focus == Focus::Tree).title(tree_title);
    let preview_block = border(false).title(" Preview ");

    // The explorer needs the panel height for paging and keeping focus in view.
    let inner = tree_block.inner(tree_area);
    app.tree_area = inner;
    app.explorer.viewport.height = inner.height as usize;
    let row_count = app.explorer.rows().len();
    app.explorer.viewport.clamp(row_count);

    frame.render_widget(
        SearchBarWidget::new(app.explorer.search(), &app.theme, app.focus == Focus::SearchInput)
            .block(search_block),
        search_area,
    );
    frame.render_widget(
        TreeWidget::new(&app.explorer, &app.theme, app.use_icons).block(tree_block),
        tree_area,
    );
    render_preview(app, frame, preview_block, right);

    let focused = app.explorer.focused_path().unwrap_or("");
    let mut bar = StatusBarWidget::new(app.current_project(), focused, &app.theme)
        .connection(app.connection);
    if let Some(toast) = &app.toast {
        bar = bar.toast(&toast.message, toast.level);
    }
    frame.render_widget(bar, status);
}

fn project_title(app: &App) -> &str {
    app.explorer
        .summary()
        .map(|s| s.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| app.current_project())
}

fn render_preview(app: &App, frame: &mut Frame, block: Block<'_>, area: Rect) {
    let has_file = app
        .explorer
        .selection()
        .is_some_and(|s| s.file_id.is_some());
    let content = match app.current_preview() {
        Some(state) => PreviewContent::Ready(state),
        None if has_file => PreviewContent::Loading,
        None => PreviewContent::Empty,
    };
    frame.render_widget(PreviewWidget::new(content, &app.theme).block(block), area);
}
