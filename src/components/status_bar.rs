use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::live::hub::ConnectionState;
use crate::live::notify::NoticeLevel;
use crate::theme::ThemeColors;

const KEY_HINTS: &str = " /:search  r:refresh  ^N:project  q:quit ";

/// Status bar: project, live state and focused path, or a toast when one
/// is showing.
pub struct StatusBarWidget<'a> {
    project: &'a str,
    path: &'a str,
    theme: &'a ThemeColors,
    connection: Option<ConnectionState>,
    toast: Option<(&'a str, NoticeLevel)>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(project: &'a str, path: &'a str, theme: &'a ThemeColors) -> Self {
        Self {
            project,
            path,
            theme,
            connection: None,
            toast: None,
        }
    }

    pub fn connection(mut self, state: Option<ConnectionState>) -> Self {
        self.connection = state;
        self
    }

    pub fn toast(mut self, message: &'a str, level: NoticeLevel) -> Self {
        self.toast = Some((message, level));
        self
    }

    fn connection_style(&self, state: ConnectionState) -> Style {
        let fg = match state {
            ConnectionState::Connected => self.theme.success_fg,
            ConnectionState::Connecting => self.theme.info_fg,
            ConnectionState::Disconnected => self.theme.error_fg,
        };
        Style::default().fg(fg).add_modifier(Modifier::BOLD)
    }
}

/// Keep the tail of `text` within `budget` columns, marking the cut.
fn truncate_left(text: &str, budget: usize) -> String {
    let count = text.chars().count();
    if count <= budget {
        return text.to_string();
    }
    if budget <= 3 {
        return text.chars().take(budget).collect();
    }
    let tail: String = text.chars().skip(count - (budget - 3)).collect();
    format!("...{}", tail)
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let width = area.width as usize;

        if let Some((msg, level)) = self.toast {
            let style = match level {
                NoticeLevel::Error => Style::default()
                    .bg(self.theme.error_fg)
                    .fg(self.theme.status_bg),
                NoticeLevel::Success => Style::default().fg(self.theme.success_fg),
                NoticeLevel::Info => Style::default().fg(self.theme.info_fg),
            };
            let shown: String = msg.chars().take(width).collect();
            let display = format!("{:<width$}", shown, width = width);
            buf.set_line(area.x, area.y, &Line::from(Span::styled(display, style)), area.width);
            return;
        }

        let base = Style::default().bg(self.theme.status_bg).fg(self.theme.status_fg);
        let mut spans = vec![Span::styled(
            format!(" {} ", self.project),
            base.fg(self.theme.accent_fg).add_modifier(Modifier::BOLD),
        )];
        if let Some(state) = self.connection {
            spans.push(Span::styled(
                format!("[{}] ", state.label()),
                self.connection_style(state).bg(self.theme.status_bg),
            ));
        }

        let used: usize = spans.iter().map(|s| s.width()).sum();
        let hints_len = KEY_HINTS.len();
        let path_budget = width.saturating_sub(used + hints_len);
        let path = truncate_left(self.path, path_budget);
        let gap = path_budget.saturating_sub(path.chars().count());
        spans.push(Span::styled(path, base));
        spans.push(Span::styled(" ".repeat(gap), base));
        spans.push(Span::styled(
            KEY_HINTS,
            base.fg(self.theme.dim_fg).add_modifier(Modifier::DIM),
        ));

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}
