// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//
// Producer/renderer hand-off. The producer (terminal grid owner)
// mutates the shared state under a mutex through `TijucaHandle`; the
// renderer snapshots it at the top of each frame and then works
// lock-free. The lock is held only for the snapshot copy, never
// across rasterization, composition or presentation.

use crate::cell::CellGrid;
use crate::invalidation::{CellRect, DirtyTracker};
use crate::settings::{
    CursorSettings, FontSettings, Generational, MiscSettings, Settings, TargetSettings,
};
use crate::shaped::ShapedRow;
use parking_lot::Mutex;
use std::sync::Arc;

/// Everything the compositor needs for one frame besides settings.
#[derive(Clone, Debug, Default)]
pub struct FramePayload {
    pub cells: CellGrid,
    pub rows: Vec<ShapedRow>,
    pub cursor: Option<CellRect>,
}

struct Shared {
    settings: Generational<Settings>,
    payload: FramePayload,
    dirty: DirtyTracker,
}

/// The shared channel between exactly one producer and one renderer.
pub struct FrameChannel {
    inner: Arc<Mutex<Shared>>,
}

impl FrameChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Shared {
                settings: Settings::invalidated(),
                payload: FramePayload::default(),
                dirty: DirtyTracker::new(),
            })),
        }
    }

    /// The producer-side handle; cheap to clone.
    pub fn handle(&self) -> TijucaHandle {
        TijucaHandle {
            inner: self.inner.clone(),
        }
    }

    /// Snapshots the shared state into the renderer's private buffers
    /// and drains the dirty tracker. `clone_from` reuses the buffers'
    /// capacity; the settings copy is skipped entirely when the
    /// aggregate generation has not moved. The drained tracker must be
    /// given back through `restore_dirty` if the frame fails.
    pub fn acquire(
        &self,
        settings: &mut Generational<Settings>,
        payload: &mut FramePayload,
    ) -> DirtyTracker {
        let mut shared = self.inner.lock();
        if settings.generation() != shared.settings.generation() {
            settings.clone_from(&shared.settings);
        }
        payload.clone_from(&shared.payload);
        shared.dirty.take()
    }

    /// Re-unions a drained tracker after a failed frame, preserving
    /// any invalidations the producer recorded in the meantime.
    pub fn restore_dirty(&self, taken: &DirtyTracker) {
        self.inner.lock().dirty.merge(taken);
    }

    /// True when there is anything to redraw. Lets the render loop
    /// skip frame acquisition entirely on idle ticks.
    pub fn has_work(&self) -> bool {
        let shared = self.inner.lock();
        !shared.dirty.is_empty()
    }
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer-side API. Every settings mutation bumps the owning
/// section's generation and records the matching invalidation, so the
/// renderer's next snapshot both sees the change and redraws enough to
/// make it visible.
#[derive(Clone)]
pub struct TijucaHandle {
    inner: Arc<Mutex<Shared>>,
}

impl TijucaHandle {
    pub fn update_target(&self, f: impl FnOnce(&mut TargetSettings)) {
        let mut shared = self.inner.lock();
        f(shared.settings.target_mut());
        let rows = shared.settings.cell_count[1];
        shared.dirty.invalidate_all(rows);
    }

    /// Font changes invalidate everything; the renderer additionally
    /// resets the glyph atlas when it observes the new generation.
    pub fn update_font(&self, f: impl FnOnce(&mut FontSettings)) {
        let mut shared = self.inner.lock();
        f(shared.settings.font_mut());
        Self::refit_grid(&mut *shared);
        let rows = shared.settings.cell_count[1];
        shared.dirty.invalidate_all(rows);
    }

    pub fn update_cursor(&self, f: impl FnOnce(&mut CursorSettings)) {
        let mut shared = self.inner.lock();
        f(shared.settings.cursor_mut());
        if let Some(rect) = shared.payload.cursor {
            shared.dirty.invalidate_cursor(rect);
        }
    }

    pub fn update_misc(&self, f: impl FnOnce(&mut MiscSettings)) {
        let mut shared = self.inner.lock();
        f(shared.settings.misc_mut());
        let rows = shared.settings.cell_count[1];
        shared.dirty.invalidate_all(rows);
    }

    /// Resizes the render target, rederiving the cell count and
    /// refitting the grid. A no-op when the size is unchanged.
    pub fn set_target_size(&self, size: [u32; 2]) {
        let mut shared = self.inner.lock();
        let cell = shared.settings.font.cell_size;
        let cell_count = [
            (size[0] / cell[0].max(1) as u32).min(u16::MAX as u32) as u16,
            (size[1] / cell[1].max(1) as u32).min(u16::MAX as u32) as u16,
        ];
        if shared.settings.target_size == size && shared.settings.cell_count == cell_count {
            return;
        }
        shared.settings.set_target_size(size, cell_count);
        Self::refit_grid(&mut *shared);
        shared.dirty.invalidate_all(cell_count[1]);
    }

    fn refit_grid(shared: &mut Shared) {
        let [cols, rows] = shared.settings.cell_count;
        shared.payload.cells.resize(cols, rows);
        shared
            .payload
            .rows
            .resize_with(rows as usize, ShapedRow::default);
        shared.payload.cursor = None;
    }

    /// Grants the producer write access to the frame payload together
    /// with the dirty tracker, under one lock acquisition. The
    /// producer is expected to invalidate exactly the rows it rewrote.
    pub fn with_frame(&self, f: impl FnOnce(&mut FramePayload, &mut DirtyTracker)) {
        let mut shared = self.inner.lock();
        let shared = &mut *shared;
        f(&mut shared.payload, &mut shared.dirty);
    }

    pub fn invalidate_rows(&self, top: u16, bottom: u16) {
        self.inner.lock().dirty.invalidate_rows(top, bottom);
    }

    pub fn invalidate_all(&self) {
        let mut shared = self.inner.lock();
        let rows = shared.settings.cell_count[1];
        shared.dirty.invalidate_all(rows);
    }

    /// Records a scroll of the visible buffer by `delta` rows.
    pub fn scroll(&self, delta: i16) {
        let mut shared = self.inner.lock();
        let rows = shared.settings.cell_count[1];
        shared.dirty.invalidate_scroll(delta, rows);
    }

    /// Moves the cursor, dirtying both its old and new cell area.
    pub fn set_cursor(&self, rect: Option<CellRect>) {
        let mut shared = self.inner.lock();
        if let Some(prev) = shared.payload.cursor.take() {
            shared.dirty.invalidate_cursor(prev);
        }
        if let Some(rect) = rect {
            shared.dirty.invalidate_cursor(rect);
        }
        shared.payload.cursor = rect;
    }
}
