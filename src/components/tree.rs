use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};

use crate::tree::projector::VisibleRow;
use crate::tree::Explorer;
use crate::theme::ThemeColors;

/// Badge that marks a project's README.
const README_BADGE: &str = "readme";

/// Virtualized tree panel. Only the rows inside the viewport (plus
/// overscan) are touched, so drawing cost follows the panel height rather
/// than the size of the tree.
pub struct TreeWidget<'a> {
    explorer: &'a Explorer,
    theme: &'a ThemeColors,
    use_icons: bool,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(explorer: &'a Explorer, theme: &'a ThemeColors, use_icons: bool) -> Self {
        Self {
            explorer,
            theme,
            use_icons,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = block.into();
        self
    }

    /// Expansion marker for directories, type icon for files.
    fn item_indicator(&self, row: &VisibleRow) -> &'static str {
        let path = row.path();
        if row.node.is_dir() {
            let pending = self.explorer.is_pending(path);
            let expanded = self.explorer.is_expanded(path);
            match (self.use_icons, pending, expanded) {
                (_, true, _) => "… ",
                (true, false, true) => "\u{f07c} ",
                (true, false, false) => "\u{f07b} ",
                (false, false, true) => "▾ ",
                (false, false, false) => "▸ ",
            }
        } else if self.use_icons {
            Self::file_icon_by_ext(&row.node.name)
        } else {
            "  "
        }
    }

    /// Nerd Font icon for the document types the server stores.
    fn file_icon_by_ext(name: &str) -> &'static str {
        let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "md" | "markdown" | "mdx" => "\u{f48a} ",
            "txt" | "rst" => "\u{f15c} ",
            "json" => "\u{e60b} ",
            "toml" | "yaml" | "yml" => "\u{e615} ",
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" => "\u{f1c5} ",
            "pdf" => "\u{f1c1} ",
            _ => "\u{f15b} ",
        }
    }

    fn empty_message(&self) -> &'static str {
        if self.explorer.in_search_mode() {
            "No results"
        } else if self.explorer.store().is_loaded("") {
            "No files"
        } else {
            "Loading…"
        }
    }

    fn row_style(&self, row: &VisibleRow, focused: bool, selected: bool) -> Style {
        let mut style = if selected {
            Style::default()
                .fg(self.theme.tree_selected_fg)
                .add_modifier(Modifier::BOLD)
        } else if row.node.is_dir() {
            Style::default()
                .fg(self.theme.tree_dir_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.theme.tree_fg)
        };
        if focused {
            style = style.bg(self.theme.tree_focused_bg);
        }
        style
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let rows = self.explorer.rows();
        let height = inner_area.height as usize;
        if height == 0 || inner_area.width == 0 {
            return;
        }
        if rows.is_empty() {
            let line = Line::from(Span::styled(
                self.empty_message(),
                Style::default().fg(self.theme.dim_fg),
            ));
            buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);
            return;
        }

        let mut viewport = self.explorer.viewport;
        viewport.height = height;
        viewport.clamp(rows.len());
        let offset = viewport.offset;
        let range = viewport.range(rows.len(), self.explorer.overscan());
        let focused = self.explorer.focused_path();
        let selected = self.explorer.selection().map(|s| s.path.as_str());
        let scrollable = range.total_height > height;
        let text_width = if scrollable {
            inner_area.width.saturating_sub(1)
        } else {
            inner_area.width
        };

        for (index, row) in rows[range.start..range.end].iter().enumerate() {
            // One cell per row, so a row's list offset is also its line.
            let line = range.start_offset + index;
            // Overscan rows fall outside the panel.
            if line < offset || line >= offset + height {
                continue;
            }
            let y = inner_area.y + (line - offset) as u16;
            let is_focused = focused == Some(row.path());
            let style = self.row_style(row, is_focused, selected == Some(row.path()));

            let mut spans = vec![
                Span::raw("  ".repeat(row.depth)),
                Span::styled(self.item_indicator(row), style),
                Span::styled(row.node.name.clone(), style),
            ];
            if row.node.has_badge(README_BADGE) {
                spans.push(Span::styled(
                    " [README]",
                    Style::default().fg(self.theme.badge_fg),
                ));
            }
            if is_focused {
                // Stretch the highlight across the row.
                let used: usize = spans.iter().map(|s| s.width()).sum();
                let pad = (text_width as usize).saturating_sub(used);
                spans.push(Span::styled(" ".repeat(pad), style));
            }
            buf.set_line(inner_area.x, y, &Line::from(spans), text_width);
        }

        if scrollable {
            let mut state = ScrollbarState::new(range.total_height.saturating_sub(height))
                .position(offset)
                .viewport_content_length(height);
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None)
                .style(Style::default().fg(self.theme.border_fg))
                .render(inner_area, buf, &mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use ratatui::widgets::Borders;
    use tokio::sync::mpsc;

    use crate::remote::fake::FakeTreeSource;
    use crate::remote::types::TreeNode;
    use crate::theme;
    use crate::tree::explorer::ExplorerSettings;
    use crate::tree::persistence::SessionStorage;

    fn row_text(buf: &Buffer, y: u16, width: u16) -> String {
        (0..width)
            .map(|x| buf.cell((x, y)).map(|c| c.symbol().to_string()).unwrap_or_default())
            .collect()
    }

    async fn explorer_with(items: Vec<TreeNode>) -> Explorer {
        let source = Arc::new(FakeTreeSource::new());
        source.set_listing("", vec![items]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut explorer = Explorer::new(
            source,
            tx,
            SessionStorage::in_memory(),
            ExplorerSettings::default(),
        );
        explorer.open_project("p1");
        let deadline = tokio::time::Instant::now() + Duration::from_millis(50);
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
            if let crate::event::Event::Tree(update) = event {
                explorer.apply(update);
            }
        }
        explorer
    }

    #[tokio::test(start_paused = true)]
    async fn empty_project_shows_no_files() {
        let explorer = explorer_with(Vec::new()).await;
        let tc = theme::dark_theme();
        let area = Rect::new(0, 0, 30, 5);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&explorer, &tc, false)
            .block(Block::default().borders(Borders::ALL))
            .render(area, &mut buf);
        assert!(row_text(&buf, 1, 30).contains("No files"));
    }

    #[tokio::test(start_paused = true)]
    async fn rows_render_with_markers_and_badge() {
        let mut readme = TreeNode::file("README.md", Some("f1"));
        readme.badges.push("readme".into());
        let explorer = explorer_with(vec![TreeNode::dir("docs"), readme]).await;
        let tc = theme::dark_theme();
        let area = Rect::new(0, 0, 30, 4);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&explorer, &tc, false).render(area, &mut buf);

        assert!(row_text(&buf, 0, 30).starts_with("▸ docs"));
        let second = row_text(&buf, 1, 30);
        assert!(second.contains("README.md [README]"));
        assert_eq!(buf.cell((0, 0)).unwrap().fg, tc.tree_dir_fg);
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_viewport_is_drawn() {
        let items: Vec<TreeNode> = (0..500)
            .map(|i| TreeNode::file(&format!("f{:03}.md", i), None))
            .collect();
        let mut explorer = explorer_with(items).await;
        explorer.viewport.height = 5;
        explorer.viewport.offset = 200;
        let tc = theme::dark_theme();
        let area = Rect::new(0, 0, 20, 5);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&explorer, &tc, false).render(area, &mut buf);

        assert!(row_text(&buf, 0, 20).contains("f200.md"));
        assert!(row_text(&buf, 4, 20).contains("f204.md"));
        // Scrollbar occupies the last column.
        assert_ne!(buf.cell((19, 0)).unwrap().symbol(), " ");
    }

    #[tokio::test(start_paused = true)]
    async fn scrollbar_follows_the_list_height() {
        let items: Vec<TreeNode> = (0..4)
            .map(|i| TreeNode::file(&format!("f{}.md", i), None))
            .collect();
        let explorer = explorer_with(items).await;
        let tc = theme::dark_theme();

        // Four rows fit a four-line panel: no scrollbar, text keeps the last column.
        let area = Rect::new(0, 0, 10, 4);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&explorer, &tc, false).render(area, &mut buf);
        assert!(row_text(&buf, 3, 10).contains("f3.md"));
        assert_eq!(buf.cell((9, 0)).unwrap().symbol(), " ");

        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&explorer, &tc, false).render(area, &mut buf);
        assert_ne!(buf.cell((9, 0)).unwrap().symbol(), " ");
        assert!(!row_text(&buf, 2, 10).contains("f3"));
    }

    #[tokio::test(start_paused = true)]
    async fn focused_row_is_highlighted() {
        let mut explorer = explorer_with(vec![TreeNode::dir("a"), TreeNode::dir("b")]).await;
        explorer.jump(true);
        let tc = theme::dark_theme();
        let area = Rect::new(0, 0, 20, 3);
        let mut buf = Buffer::empty(area);
        TreeWidget::new(&explorer, &tc, false).render(area, &mut buf);

        assert_eq!(buf.cell((10, 1)).unwrap().bg, tc.tree_focused_bg);
        assert_ne!(buf.cell((10, 0)).unwrap().bg, tc.tree_focused_bg);
    }
}
