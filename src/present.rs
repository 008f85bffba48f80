// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//
// Presentation layer: translates the per-frame dirty region into a
// swap-chain present request and paces frame production against
// presentation.

use crate::error::Result;
use crate::invalidation::DirtyRegion;
use std::time::Duration;

/// Upper bound on a frame-pacing wait. A stalled or destroyed
/// swap chain must never block the render thread indefinitely.
pub const PRESENT_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// A rectangle in target pixels, half-open.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }
}

/// What to hand the swap chain. A `None` dirty rect requests a full
/// present; otherwise only `dirty` changed since the previous frame,
/// and `scroll` additionally lets the presenter blit the unchanged
/// content instead of re-reading it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PresentInfo {
    pub dirty: Option<PixelRect>,
    /// (region that scrolled, vertical pixel offset). Positive offset
    /// moves content down.
    pub scroll: Option<(PixelRect, i32)>,
}

impl PresentInfo {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.dirty.is_none()
    }

    /// Derives the present request from the accumulated dirty region.
    /// Degrades to a full present when the region covers the grid,
    /// when there is nothing useful to clip to, or when the dirty rows
    /// extend past the target (fractional trailing cell row).
    pub fn from_dirty(
        region: &DirtyRegion,
        cell_height: u16,
        target_size: [u32; 2],
        grid_rows: u16,
    ) -> Self {
        if cell_height == 0 || region.covers(grid_rows) {
            return Self::full();
        }
        let Some((top, bottom)) = region.rows else {
            // Nothing changed; an empty dirty rect is still a valid
            // present (it keeps the swap chain's frame cadence).
            return Self {
                dirty: Some(PixelRect::default()),
                scroll: None,
            };
        };

        let h = cell_height as u32;
        let dirty = PixelRect {
            left: 0,
            top: (top as u32 * h).min(target_size[1]),
            right: target_size[0],
            bottom: (bottom as u32 * h).min(target_size[1]),
        };
        let scroll = if region.scroll != 0 {
            Some((
                PixelRect {
                    left: 0,
                    top: 0,
                    right: target_size[0],
                    bottom: grid_rows as u32 * h,
                },
                region.scroll as i32 * h as i32,
            ))
        } else {
            None
        };
        Self {
            dirty: Some(dirty),
            scroll,
        }
    }
}

/// Swap-chain facade implemented by the display backend.
pub trait Presenter {
    /// Queues the rendered frame for display.
    fn present(&mut self, info: &PresentInfo) -> Result<()>;

    /// Blocks until the previously presented frame has been consumed,
    /// or until `timeout` elapses. Returns `false` on timeout.
    fn wait_for_present(&mut self, timeout: Duration) -> bool;
}

/// Paces rendering against presentation. The wait runs at the start
/// of a frame rather than after `present`, so input processing and
/// frame building overlap with the display consuming the previous
/// frame. It only ever blocks when a present is actually outstanding;
/// the first frame and any frame after a failed present start
/// immediately.
#[derive(Default, Debug)]
pub struct PresentGate {
    outstanding: bool,
}

impl PresentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the top of each frame.
    pub fn wait_until_can_render<P: Presenter + ?Sized>(&mut self, presenter: &mut P) {
        if !self.outstanding {
            return;
        }
        self.outstanding = false;
        if !presenter.wait_for_present(PRESENT_WAIT_TIMEOUT) {
            tracing::warn!(
                timeout_ms = PRESENT_WAIT_TIMEOUT.as_millis() as u64,
                "frame wait timed out, rendering anyway"
            );
        }
    }

    /// Call after a successful `present`.
    pub fn mark_presented(&mut self) {
        self.outstanding = true;
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingPresenter {
        waits: u32,
        signal: bool,
    }

    impl Presenter for RecordingPresenter {
        fn present(&mut self, _: &PresentInfo) -> Result<()> {
            Ok(())
        }

        fn wait_for_present(&mut self, _: Duration) -> bool {
            self.waits += 1;
            self.signal
        }
    }

    #[test]
    fn gate_waits_only_with_a_present_outstanding() {
        let mut gate = PresentGate::new();
        let mut presenter = RecordingPresenter {
            waits: 0,
            signal: true,
        };

        gate.wait_until_can_render(&mut presenter);
        assert_eq!(presenter.waits, 0);

        gate.mark_presented();
        gate.wait_until_can_render(&mut presenter);
        assert_eq!(presenter.waits, 1);

        // Consumed: a second frame without an intervening present
        // does not wait again.
        gate.wait_until_can_render(&mut presenter);
        assert_eq!(presenter.waits, 1);
    }

    #[test]
    fn gate_recovers_from_timeout() {
        let mut gate = PresentGate::new();
        let mut presenter = RecordingPresenter {
            waits: 0,
            signal: false,
        };
        gate.mark_presented();
        gate.wait_until_can_render(&mut presenter);
        assert_eq!(presenter.waits, 1);
        assert!(!gate.is_outstanding());
    }

    #[test]
    fn full_region_requests_full_present() {
        let region = DirtyRegion {
            rows: Some((0, 24)),
            scroll: 0,
        };
        let info = PresentInfo::from_dirty(&region, 16, [640, 384], 24);
        assert!(info.is_full());
    }

    #[test]
    fn partial_region_maps_rows_to_pixels() {
        let region = DirtyRegion {
            rows: Some((2, 5)),
            scroll: 0,
        };
        let info = PresentInfo::from_dirty(&region, 16, [640, 384], 24);
        assert_eq!(
            info.dirty,
            Some(PixelRect {
                left: 0,
                top: 32,
                right: 640,
                bottom: 80
            })
        );
        assert_eq!(info.scroll, None);
    }

    #[test]
    fn scroll_produces_blit_hint() {
        let region = DirtyRegion {
            rows: Some((0, 3)),
            scroll: 3,
        };
        let info = PresentInfo::from_dirty(&region, 16, [640, 384], 24);
        let (rect, offset) = info.scroll.unwrap();
        assert_eq!(offset, 48);
        assert_eq!(rect.bottom, 384);
    }

    #[test]
    fn empty_region_presents_empty_rect() {
        let region = DirtyRegion {
            rows: None,
            scroll: 0,
        };
        let info = PresentInfo::from_dirty(&region, 16, [640, 384], 24);
        assert!(!info.is_full());
        assert!(info.dirty.unwrap().is_empty());
    }
}
