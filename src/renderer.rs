// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//
// The renderer. Owns every per-frame cache (glyph atlas, face cache,
// decoration metrics, display list) and drives the frame pipeline:
//
//   wait -> acquire snapshot -> observe settings -> compose
//        -> upload/submit/present -> clear dirty
//
// Staleness is resolved through generation comparison: each settings
// section's generation is shadowed here, and a mismatch triggers
// exactly the rebuild that section requires. The dirty tracker is
// drained at acquire time and restored on any failure, so no
// invalidation is ever lost and each is cleared exactly once, by the
// frame that presented it.

use crate::atlas::{AtlasError, AtlasEvent, GlyphAtlas};
use crate::compositor::display_list::DisplayList;
use crate::compositor::Compositor;
use crate::error::{RenderError, Result, Warning, WarningSink};
use crate::font::{FaceCache, FontFace, FontResolver};
use crate::handoff::{FrameChannel, FramePayload, TijucaHandle};
use crate::invalidation::DirtyTracker;
use crate::present::{PresentGate, PresentInfo, Presenter};
use crate::raster::GlyphScaler;
use crate::settings::{AntialiasingMode, Generation, Generational, Settings};

/// Display backend contract. One render target, one atlas texture,
/// one instance buffer; the backend owns the device objects and maps
/// the display-list commands onto them.
pub trait DisplayBackend: Presenter {
    /// Applies pending atlas texture copies, in order.
    fn upload_atlas(&mut self, events: &[AtlasEvent]) -> Result<()>;

    /// Executes the display list against the render target.
    fn submit(&mut self, list: &DisplayList) -> Result<()>;

    /// Installs a custom post-processing pixel shader. Returning
    /// `false` (compile rejection or no support) keeps rendering
    /// alive without it.
    fn install_custom_shader(&mut self, bytecode: &[u8]) -> bool {
        let _ = bytecode;
        false
    }

    fn supports_subpixel(&self) -> bool {
        true
    }
}

/// Per-section generations as last observed by the renderer. The
/// zero default compares unequal to any published section, which is
/// what forces the full first-frame rebuild.
#[derive(Default, Clone, Copy)]
struct ObservedGenerations {
    aggregate: Generation,
    target: Generation,
    font: Generation,
    cursor: Generation,
    misc: Generation,
}

pub struct Tijuca {
    channel: FrameChannel,
    settings: Generational<Settings>,
    payload: FramePayload,
    observed: ObservedGenerations,
    resolver: Box<dyn FontResolver>,
    scaler: Box<dyn GlyphScaler>,
    faces: FaceCache,
    atlas: GlyphAtlas,
    compositor: Compositor,
    list: DisplayList,
    gate: PresentGate,
    warnings: Option<WarningSink>,
    subpixel_warned: bool,
}

impl Tijuca {
    pub fn new(resolver: Box<dyn FontResolver>, scaler: Box<dyn GlyphScaler>) -> Self {
        Self {
            channel: FrameChannel::new(),
            settings: Settings::invalidated(),
            payload: FramePayload::default(),
            observed: ObservedGenerations::default(),
            resolver,
            scaler,
            faces: FaceCache::default(),
            atlas: GlyphAtlas::new(),
            compositor: Compositor::new(),
            list: DisplayList::new(),
            gate: PresentGate::new(),
            warnings: None,
            subpixel_warned: false,
        }
    }

    /// The producer-side handle for the terminal grid owner.
    pub fn handle(&self) -> TijucaHandle {
        self.channel.handle()
    }

    pub fn set_warning_callback(&mut self, sink: WarningSink) {
        self.warnings = Some(sink);
    }

    fn warn(&mut self, warning: Warning) {
        tracing::debug!(?warning, "render warning");
        if let Some(sink) = &mut self.warnings {
            sink(warning);
        }
    }

    /// Resolves the concrete face for a (bold, italic) pair against
    /// the renderer's current font settings, memoized until the font
    /// section changes.
    pub fn resolve_face(&mut self, bold: bool, italic: bool) -> FontFace {
        self.faces.revalidate(self.settings.font.generation());
        self.faces
            .get(&mut *self.resolver, &self.settings.font, bold, italic)
    }

    /// True when a call to `render` would have something to draw.
    pub fn has_work(&self) -> bool {
        self.channel.has_work()
    }

    /// Renders and presents one frame. Returns `Ok(false)` when
    /// nothing was dirty and the frame was skipped entirely. On error
    /// the drained invalidations are merged back, so the next call
    /// redraws at least as much as this one attempted.
    pub fn render(&mut self, backend: &mut dyn DisplayBackend) -> Result<bool> {
        self.gate.wait_until_can_render(backend);

        let mut dirty = self.channel.acquire(&mut self.settings, &mut self.payload);
        self.observe_settings(backend, &mut dirty);
        if dirty.is_empty() {
            return Ok(false);
        }

        let antialiasing = self.resolve_antialiasing(backend);
        if let Err(error) = self.compose_frame(antialiasing, &mut dirty) {
            return Err(self.fail(dirty, error));
        }

        let events: Vec<AtlasEvent> = self.atlas.drain_events().collect();
        let region = dirty.compute_dirty();
        let info = PresentInfo::from_dirty(
            &region,
            self.settings.font.cell_size[1],
            self.settings.target_size,
            self.settings.cell_count[1],
        );

        let presented = backend
            .upload_atlas(&events)
            .and_then(|_| backend.submit(&self.list))
            .and_then(|_| backend.present(&info));
        match presented {
            Ok(()) => {
                // The dirty state dies here, with the frame that
                // carried it to the screen.
                self.gate.mark_presented();
                Ok(true)
            }
            Err(error) => Err(self.fail(dirty, error)),
        }
    }

    /// Reconciles every cache keyed on a settings section with the
    /// published generations.
    fn observe_settings(&mut self, backend: &mut dyn DisplayBackend, dirty: &mut DirtyTracker) {
        if self.observed.aggregate == self.settings.generation() {
            return;
        }
        self.observed.aggregate = self.settings.generation();
        let grid_rows = self.settings.cell_count[1];

        if self.observed.font != self.settings.font.generation() {
            self.observed.font = self.settings.font.generation();
            self.compositor.update_metrics(&self.settings.font);
            self.faces.revalidate(self.settings.font.generation());
            // Glyphs were rasterized under the old metrics.
            self.atlas.reset();
            dirty.invalidate_all(grid_rows);
        }
        if self.observed.target != self.settings.target.generation() {
            self.observed.target = self.settings.target.generation();
            dirty.invalidate_all(grid_rows);
        }
        if self.observed.misc != self.settings.misc.generation() {
            self.observed.misc = self.settings.misc.generation();
            let rejected = match &self.settings.misc.custom_shader {
                Some(bytecode) => !backend.install_custom_shader(bytecode),
                None => false,
            };
            if rejected {
                self.warn(Warning::ShaderCompileFailed);
            }
            dirty.invalidate_all(grid_rows);
        }
        if self.observed.cursor != self.settings.cursor.generation() {
            self.observed.cursor = self.settings.cursor.generation();
            if let Some(rect) = self.payload.cursor {
                dirty.invalidate_cursor(rect);
            }
        }
    }

    fn resolve_antialiasing(&mut self, backend: &dyn DisplayBackend) -> AntialiasingMode {
        let mode = self.settings.resolved_antialiasing();
        if mode == AntialiasingMode::Subpixel && !backend.supports_subpixel() {
            if !self.subpixel_warned {
                self.subpixel_warned = true;
                self.warn(Warning::SubpixelUnavailable);
            }
            return AntialiasingMode::Grayscale;
        }
        mode
    }

    /// Builds the display list, retrying once through a full atlas
    /// reset on overflow. After a reset the same glyph either packs
    /// into the empty atlas or fails fatally, so one retry suffices.
    fn compose_frame(
        &mut self,
        antialiasing: AntialiasingMode,
        dirty: &mut DirtyTracker,
    ) -> Result<()> {
        let mut overflowed = false;
        loop {
            let atlas = &mut self.atlas;
            let scaler = &mut *self.scaler;
            let result = self.compositor.compose(
                &mut self.list,
                &self.settings,
                &self.payload.cells,
                &self.payload.rows,
                self.payload.cursor,
                antialiasing,
                &mut |face, glyph, em_size| {
                    let (entry, inserted) = atlas.find_or_insert(face, glyph);
                    if !inserted {
                        return Ok(entry);
                    }
                    let raster = scaler.rasterize(face, glyph, em_size);
                    atlas.rasterize_and_pack(face, glyph, raster.as_ref())
                },
            );
            match result {
                Ok(_) => return Ok(()),
                Err(AtlasError::Overflow) if !overflowed => {
                    overflowed = true;
                    self.atlas.reset();
                    self.warn(Warning::AtlasReset);
                    let grid_rows = self.settings.cell_count[1];
                    dirty.invalidate_all(grid_rows);
                }
                Err(AtlasError::Overflow) => return Err(RenderError::OutOfMemory),
                Err(AtlasError::Fatal(error)) => return Err(error),
            }
        }
    }

    /// Failure unwinding: give the drained invalidations back and, on
    /// device loss, drop every device-derived cache so the next frame
    /// after the host recreates the backend rebuilds from scratch.
    fn fail(&mut self, dirty: DirtyTracker, error: RenderError) -> RenderError {
        self.channel.restore_dirty(&dirty);
        if matches!(error, RenderError::DeviceLost) {
            self.atlas.reset();
            self.observed = ObservedGenerations::default();
            self.warn(Warning::DeviceRecovery);
        }
        tracing::error!(%error, "frame failed");
        error
    }
}
