// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//
// Glyph atlas cache: maps (font face, glyph index) to a packed
// rectangle inside a single large texture. The state machine is
// Empty -> Populated -> (overflow or font change) -> Reset -> Empty;
// there is no partial eviction and no incremental growth.

mod allocator;

pub use allocator::ShelfPacker;

use crate::error::RenderError;
use crate::raster::{padded_pixel_box, GlyphContent, RasterizedGlyph};
use crate::shaped::FontFaceId;
use rustc_hash::FxHashMap;

/// Side length of the square atlas texture in pixels.
pub const ATLAS_SIZE: u16 = 1024;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
struct GlyphKey {
    face: FontFaceId,
    glyph: u16,
}

/// Cached placement of one glyph. Entries are value types copied into
/// the instance stream; a zero `size` marks a glyph without ink.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GlyphEntry {
    /// Top-left corner inside the atlas texture.
    pub origin: [u16; 2],
    pub size: [u16; 2],
    /// Offset of the padded pixel box relative to the baseline
    /// origin; applied when positioning the quad.
    pub offset: [i16; 2],
    pub is_color: bool,
}

impl GlyphEntry {
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.size != [0, 0]
    }
}

/// Pending CPU->GPU texture copy, drained by the display backend
/// after compositing.
#[derive(Clone, Debug)]
pub enum AtlasEvent {
    /// Discard the texture contents; follows every reset.
    Clear,
    /// Upload `data` (row-major, tightly packed) at the given
    /// rectangle. `content` fixes the pixel format: 1 byte of
    /// coverage per pixel for `Mask`, 4 bytes RGBA for `Color`.
    Upload {
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        content: GlyphContent,
        data: Vec<u8>,
    },
}

/// Packing failed. `Overflow` is a hard reset signal for a populated
/// atlas; the caller discards the cache and retries with everything
/// marked dirty. `Fatal` means even an empty atlas cannot hold the
/// glyph.
#[derive(Debug)]
pub enum AtlasError {
    Overflow,
    Fatal(RenderError),
}

pub struct GlyphAtlas {
    entries: FxHashMap<GlyphKey, GlyphEntry>,
    packer: ShelfPacker,
    events: Vec<AtlasEvent>,
}

impl GlyphAtlas {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            packer: ShelfPacker::new(ATLAS_SIZE, ATLAS_SIZE),
            events: vec![AtlasEvent::Clear],
        }
    }

    /// Looks up the cache slot for `(face, glyph)`, reserving an
    /// empty one on a miss. The returned flag tells the caller
    /// whether the glyph still has to be rasterized and packed.
    /// Idempotent: a second call without an intervening reset returns
    /// the same entry with `inserted == false`.
    pub fn find_or_insert(&mut self, face: FontFaceId, glyph: u16) -> (GlyphEntry, bool) {
        let key = GlyphKey { face, glyph };
        match self.entries.get(&key) {
            Some(entry) => (*entry, false),
            None => {
                let entry = GlyphEntry::default();
                self.entries.insert(key, entry);
                (entry, true)
            }
        }
    }

    /// Assigns atlas coordinates to a freshly inserted glyph and
    /// queues the pixel upload. `None` raster (no ink) leaves the
    /// reserved zero-size entry in place so later frames skip the
    /// rasterizer.
    pub fn rasterize_and_pack(
        &mut self,
        face: FontFaceId,
        glyph: u16,
        raster: Option<&RasterizedGlyph>,
    ) -> Result<GlyphEntry, AtlasError> {
        let key = GlyphKey { face, glyph };
        let Some(raster) = raster else {
            return Ok(self.entries.get(&key).copied().unwrap_or_default());
        };
        let Some(pixel_box) = padded_pixel_box(&raster.ink) else {
            return Ok(self.entries.get(&key).copied().unwrap_or_default());
        };

        let width = pixel_box.width();
        let height = pixel_box.height();
        let was_empty = self.packer.is_empty();
        let Some((x, y)) = self.packer.pack(width, height) else {
            if was_empty {
                // A single glyph larger than the whole atlas: not a
                // staleness condition, surface it as a diagnostic.
                tracing::error!(
                    face = face.0,
                    glyph,
                    width,
                    height,
                    "glyph does not fit an empty atlas"
                );
                return Err(AtlasError::Fatal(RenderError::GlyphTooLarge {
                    face: face.0,
                    glyph,
                    atlas_size: ATLAS_SIZE,
                }));
            }
            return Err(AtlasError::Overflow);
        };

        debug_assert_eq!(
            raster.data.len(),
            width as usize * height as usize * raster.content.bytes_per_pixel(),
            "raster payload does not match its padded pixel box"
        );
        self.events.push(AtlasEvent::Upload {
            x,
            y,
            width,
            height,
            content: raster.content,
            data: raster.data.clone(),
        });

        let entry = GlyphEntry {
            origin: [x, y],
            size: [width, height],
            offset: [pixel_box.left as i16, pixel_box.top as i16],
            is_color: raster.content == GlyphContent::Color,
        };
        self.entries.insert(key, entry);
        Ok(entry)
    }

    /// Full reset: cache table, packer state and texture contents are
    /// all discarded. Runs on font/size changes and on overflow.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.packer.reset();
        self.events.clear();
        self.events.push(AtlasEvent::Clear);
    }

    /// Pending texture copies for the display backend; draining them
    /// is part of issuing the frame.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, AtlasEvent> {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for GlyphAtlas {
    fn default() -> Self {
        Self::new()
    }
}
