//! Windowing math for the virtualized tree list.

/// Default number of extra rows rendered above and below the viewport.
pub const DEFAULT_OVERSCAN: usize = 1;

/// Slice of rows to materialize for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualRange {
    /// First row index to render (inclusive).
    pub start: usize,
    /// One past the last row index to render.
    pub end: usize,
    /// Height of the full list, in the same unit as `row_height`.
    pub total_height: usize,
    /// Offset of row `start` from the top of the full list.
    pub start_offset: usize,
}

impl VirtualRange {
    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// Compute which rows intersect the viewport, padded by `overscan` rows on
/// each side. Constant time in `row_count`.
pub fn visible_range(
    row_count: usize,
    row_height: usize,
    scroll_offset: usize,
    viewport_height: usize,
    overscan: usize,
) -> VirtualRange {
    if row_count == 0 || row_height == 0 {
        return VirtualRange::default();
    }
    let total_height = row_count * row_height;
    let first_visible = (scroll_offset / row_height).min(row_count);
    let visible_rows = viewport_height.div_ceil(row_height);
    let start = first_visible.saturating_sub(overscan);
    let end = (first_visible + visible_rows + overscan).min(row_count);
    VirtualRange {
        start,
        end,
        total_height,
        start_offset: start * row_height,
    }
}

/// Scroll position of the tree panel, in rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub offset: usize,
    /// Rows that fit in the panel, updated on every draw.
    pub height: usize,
}

impl Viewport {
    /// Scroll just enough to bring `index` into view.
    pub fn ensure_visible(&mut self, index: usize) {
        if self.height == 0 {
            return;
        }
        if index < self.offset {
            self.offset = index;
        } else if index >= self.offset + self.height {
            self.offset = index + 1 - self.height;
        }
    }

    /// Scroll by `delta` rows, keeping the last page full when possible.
    pub fn scroll_by(&mut self, delta: isize, row_count: usize) {
        let target = if delta < 0 {
            self.offset.saturating_sub(delta.unsigned_abs())
        } else {
            self.offset.saturating_add(delta as usize)
        };
        self.offset = target.min(self.max_offset(row_count));
    }

    /// Pull the offset back after the row list shrank.
    pub fn clamp(&mut self, row_count: usize) {
        self.offset = self.offset.min(self.max_offset(row_count));
    }

    fn max_offset(&self, row_count: usize) -> usize {
        row_count.saturating_sub(self.height.max(1))
    }

    /// Rows to render this frame.
    pub fn range(&self, row_count: usize, overscan: usize) -> VirtualRange {
        visible_range(row_count, 1, self.offset, self.height, overscan)
    }
}
