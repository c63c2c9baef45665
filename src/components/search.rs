use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::tree::search::SearchOverlay;
use crate::theme::ThemeColors;

/// One-line search box shown above the tree.
pub struct SearchBarWidget<'a> {
    overlay: &'a SearchOverlay,
    theme: &'a ThemeColors,
    editing: bool,
    block: Option<Block<'a>>,
}

impl<'a> SearchBarWidget<'a> {
    pub fn new(overlay: &'a SearchOverlay, theme: &'a ThemeColors, editing: bool) -> Self {
        Self {
            overlay,
            theme,
            editing,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    fn status(&self) -> Option<String> {
        if self.overlay.is_searching() {
            return Some("Searching…".to_string());
        }
        let count = self.overlay.results()?.len();
        Some(format!("{} result{}", count, if count == 1 { "" } else { "s" }))
    }
}

impl<'a> Widget for SearchBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let prompt_style = Style::default()
            .fg(self.theme.accent_fg)
            .add_modifier(Modifier::BOLD);
        let mut spans = vec![Span::styled("/ ", prompt_style)];

        let query = self.overlay.query();
        if query.is_empty() && !self.editing {
            spans.push(Span::styled(
                "Search files (/)",
                Style::default().fg(self.theme.dim_fg),
            ));
        } else {
            spans.push(Span::styled(query, Style::default().fg(self.theme.tree_fg)));
            if self.editing {
                spans.push(Span::styled(
                    " ",
                    Style::default().bg(self.theme.tree_fg),
                ));
            }
        }
        buf.set_line(inner.x, inner.y, &Line::from(spans), inner.width);

        // Result count, right-aligned.
        if let Some(status) = self.status() {
            let width = status.chars().count() as u16;
            if width + 4 < inner.width {
                let x = inner.x + inner.width - width;
                let line = Line::from(Span::styled(status, Style::default().fg(self.theme.info_fg)));
                buf.set_line(x, inner.y, &line, width);
            }
        }
    }
}
