use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::app::PreviewState;
use crate::theme::ThemeColors;

/// What the preview pane should show.
#[derive(Clone, Copy)]
pub enum PreviewContent<'a> {
    /// No file is selected.
    Empty,
    /// A file is selected but its preview has not arrived.
    Loading,
    Ready(&'a PreviewState),
}

/// Plain-text preview of the selected file. Markdown is shown as raw text.
pub struct PreviewWidget<'a> {
    content: PreviewContent<'a>,
    theme: &'a ThemeColors,
    block: Option<Block<'a>>,
}

impl<'a> PreviewWidget<'a> {
    pub fn new(content: PreviewContent<'a>, theme: &'a ThemeColors) -> Self {
        Self {
            content,
            theme,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = block.into();
        self
    }

    fn placeholder(&self, msg: &'a str, area: Rect, buf: &mut Buffer) {
        let line = Line::from(Span::styled(msg, Style::default().fg(self.theme.dim_fg)));
        buf.set_line(area.x, area.y, &line, area.width);
    }
}

impl<'a> Widget for PreviewWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let state = match self.content {
            PreviewContent::Empty => return self.placeholder("Select a file to preview", inner, buf),
            PreviewContent::Loading => return self.placeholder("Loading preview…", inner, buf),
            PreviewContent::Ready(state) => state,
        };
        let preview = match &state.result {
            Ok(preview) => preview,
            Err(e) => {
                let line = Line::from(Span::styled(
                    format!("Preview unavailable: {}", e),
                    Style::default().fg(self.theme.error_fg),
                ));
                buf.set_line(inner.x, inner.y, &line, inner.width);
                return;
            }
        };

        let title_style = Style::default()
            .fg(self.theme.accent_fg)
            .add_modifier(Modifier::BOLD);
        buf.set_line(
            inner.x,
            inner.y,
            &Line::from(Span::styled(preview.path.as_str(), title_style)),
            inner.width,
        );

        let text_style = Style::default().fg(self.theme.preview_fg);
        let body = preview.content.as_deref().unwrap_or("");
        let mut y = inner.y + 1;
        let bottom = inner.y + inner.height;
        for text in body.lines() {
            if y >= bottom {
                break;
            }
            buf.set_line(inner.x, y, &Line::from(Span::styled(text, text_style)), inner.width);
            y += 1;
        }
        if preview.is_truncated && y < bottom {
            let marker = Line::from(Span::styled(
                "(truncated)",
                Style::default()
                    .fg(self.theme.dim_fg)
                    .add_modifier(Modifier::ITALIC),
            ));
            buf.set_line(inner.x, y, &marker, inner.width);
        }
    }
}
