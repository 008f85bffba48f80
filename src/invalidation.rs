// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

/// A rectangle in cell coordinates, half-open on both axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellRect {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl CellRect {
    pub fn new(left: u16, top: u16, right: u16, bottom: u16) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }
}

/// The "nothing to redraw" sentinel: top above bottom, so that
/// min/max union converges to a real interval as soon as any range is
/// added, and emptiness is a single comparison.
const ROWS_NONE: (u16, u16) = (u16::MAX, u16::MIN);

/// Accumulates dirty rows, a scroll delta and the cursor area between
/// presents. Every operation is idempotent and unions with prior
/// state; `clear` runs exactly once, after a successful present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirtyTracker {
    /// (top, bottom) as a half-open row interval.
    rows: (u16, u16),
    scroll: i16,
    cursor: Option<CellRect>,
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self {
            rows: ROWS_NONE,
            scroll: 0,
            cursor: None,
        }
    }
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate_rows(&mut self, top: u16, bottom: u16) {
        if top >= bottom {
            return;
        }
        self.rows.0 = self.rows.0.min(top);
        self.rows.1 = self.rows.1.max(bottom);
    }

    /// Converts a pixel rectangle to a row range by dividing by the
    /// cell height (rounding the bottom up).
    pub fn invalidate_rect(&mut self, top_px: u32, bottom_px: u32, cell_height: u16) {
        if cell_height == 0 || top_px >= bottom_px {
            return;
        }
        let h = cell_height as u32;
        let top = (top_px / h).min(u16::MAX as u32) as u16;
        let bottom = (bottom_px.div_ceil(h)).min(u16::MAX as u32) as u16;
        self.invalidate_rows(top, bottom);
    }

    pub fn invalidate_all(&mut self, grid_rows: u16) {
        self.invalidate_rows(0, grid_rows.max(1));
        self.scroll = 0;
    }

    /// Records a signed row shift for the present-time scroll-blit
    /// path. The shifted-in rows are dirtied as well, so correctness
    /// holds even when the presenter ignores the scroll hint.
    /// A shift covering the whole grid, on its own or accumulated,
    /// leaves nothing to blit and degrades to a full invalidation.
    pub fn invalidate_scroll(&mut self, delta: i16, grid_rows: u16) {
        let merged = self.scroll.saturating_add(delta);
        if delta.unsigned_abs() >= grid_rows || merged.unsigned_abs() >= grid_rows {
            self.invalidate_all(grid_rows);
            return;
        }
        self.scroll = merged;
        if delta < 0 {
            self.invalidate_rows(grid_rows - delta.unsigned_abs(), grid_rows);
        } else if delta > 0 {
            self.invalidate_rows(0, delta as u16);
        }
    }

    pub fn invalidate_cursor(&mut self, rect: CellRect) {
        if rect.is_empty() {
            return;
        }
        self.invalidate_rows(rect.top, rect.bottom);
        self.cursor = Some(match self.cursor {
            Some(prev) => CellRect::new(
                prev.left.min(rect.left),
                prev.top.min(rect.top),
                prev.right.max(rect.right),
                prev.bottom.max(rect.bottom),
            ),
            None => rect,
        });
    }

    /// The minimal row interval covering all invalidations since the
    /// last `clear`, plus the accumulated scroll delta.
    pub fn compute_dirty(&self) -> DirtyRegion {
        DirtyRegion {
            rows: if self.rows.0 < self.rows.1 {
                Some((self.rows.0, self.rows.1))
            } else {
                None
            },
            scroll: self.scroll,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.0 >= self.rows.1
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Moves the accumulated state out, leaving the tracker empty.
    pub fn take(&mut self) -> DirtyTracker {
        std::mem::take(self)
    }

    /// Re-unions previously taken state, used when a frame fails
    /// after the hand-off already consumed the tracker.
    pub fn merge(&mut self, other: &DirtyTracker) {
        if other.rows.0 < other.rows.1 {
            self.invalidate_rows(other.rows.0, other.rows.1);
        }
        self.scroll = self.scroll.saturating_add(other.scroll);
        if let Some(rect) = other.cursor {
            self.invalidate_cursor(rect);
        }
    }
}

/// Computed redraw region read by the presentation step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRegion {
    /// Half-open dirty row interval; `None` means nothing to redraw.
    pub rows: Option<(u16, u16)>,
    pub scroll: i16,
}

impl DirtyRegion {
    pub fn covers(&self, grid_rows: u16) -> bool {
        matches!(self.rows, Some((top, bottom)) if top == 0 && bottom >= grid_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_yields_smallest_covering_interval() {
        let mut t = DirtyTracker::new();
        t.invalidate_rows(4, 6);
        t.invalidate_rows(10, 12);
        t.invalidate_rows(5, 7);
        assert_eq!(t.compute_dirty().rows, Some((4, 12)));
    }

    #[test]
    fn empty_interval_is_ignored() {
        let mut t = DirtyTracker::new();
        t.invalidate_rows(3, 3);
        assert!(t.is_empty());
    }

    #[test]
    fn clear_returns_to_sentinel() {
        let mut t = DirtyTracker::new();
        t.invalidate_rows(0, 24);
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.compute_dirty().rows, None);
        assert_eq!(t.compute_dirty().scroll, 0);
    }

    #[test]
    fn rect_rounds_to_covering_rows() {
        let mut t = DirtyTracker::new();
        // 16px cells: pixels 20..50 touch rows 1..4.
        t.invalidate_rect(20, 50, 16);
        assert_eq!(t.compute_dirty().rows, Some((1, 4)));
    }

    #[test]
    fn scroll_dirties_shifted_in_rows() {
        let mut t = DirtyTracker::new();
        t.invalidate_scroll(3, 24);
        assert_eq!(t.compute_dirty(), DirtyRegion { rows: Some((0, 3)), scroll: 3 });

        let mut t = DirtyTracker::new();
        t.invalidate_scroll(-2, 24);
        assert_eq!(t.compute_dirty(), DirtyRegion { rows: Some((22, 24)), scroll: -2 });
    }

    #[test]
    fn reversing_scroll_past_grid_height_degrades_to_full() {
        let mut t = DirtyTracker::new();
        t.invalidate_scroll(10, 24);
        // One call shifts everything out even though the accumulated
        // total lands back inside the grid.
        t.invalidate_scroll(-30, 24);
        let dirty = t.compute_dirty();
        assert!(dirty.covers(24));
        assert_eq!(dirty.scroll, 0);
    }

    #[test]
    fn whole_grid_scroll_degrades_to_full() {
        let mut t = DirtyTracker::new();
        t.invalidate_scroll(30, 24);
        let dirty = t.compute_dirty();
        assert!(dirty.covers(24));
        assert_eq!(dirty.scroll, 0);
    }

    #[test]
    fn invalidate_all_covers() {
        let mut t = DirtyTracker::new();
        t.invalidate_rows(3, 5);
        t.invalidate_all(24);
        assert!(t.compute_dirty().covers(24));
    }

    #[test]
    fn cursor_area_unions() {
        let mut t = DirtyTracker::new();
        t.invalidate_cursor(CellRect::new(2, 5, 3, 6));
        t.invalidate_cursor(CellRect::new(7, 1, 8, 2));
        assert_eq!(t.compute_dirty().rows, Some((1, 6)));
    }

    #[test]
    fn merge_restores_taken_state() {
        let mut t = DirtyTracker::new();
        t.invalidate_rows(2, 4);
        let taken = t.take();
        assert!(t.is_empty());
        t.invalidate_rows(8, 9);
        t.merge(&taken);
        assert_eq!(t.compute_dirty().rows, Some((2, 9)));
    }
}
