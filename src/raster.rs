// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::shaped::FontFaceId;

/// Pixel payload kind of a rasterized glyph.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GlyphContent {
    /// Single-channel coverage mask, tinted by the foreground color.
    Mask,
    /// RGBA color glyph (emoji, embedded bitmap/SVG). Drawn with
    /// straight alpha blending, never subpixel-corrected.
    Color,
}

impl GlyphContent {
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            GlyphContent::Mask => 1,
            GlyphContent::Color => 4,
        }
    }
}

/// One glyph rendered to a scratch surface by the font-metric
/// backend, with its tight ink bounding box in device pixels
/// (fractional, relative to the baseline origin).
#[derive(Clone, Debug)]
pub struct RasterizedGlyph {
    /// left, top, right, bottom. top/bottom are negative above the
    /// baseline.
    pub ink: [f32; 4],
    pub content: GlyphContent,
    /// Pixel rows of the padded pixel box, tightly packed; 1 byte per
    /// pixel for `Mask`, 4 for `Color`.
    pub data: Vec<u8>,
}

/// Glyph rasterization backend. Returns `None` for glyphs without ink
/// (whitespace); such glyphs still occupy a cache slot so repeated
/// lookups stay O(1).
pub trait GlyphScaler {
    fn rasterize(
        &mut self,
        face: FontFaceId,
        glyph: u16,
        em_size: f32,
    ) -> Option<RasterizedGlyph>;
}

/// Integer pixel box of a glyph within the atlas, relative to the
/// baseline origin.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelBox {
    #[inline]
    pub fn width(&self) -> u16 {
        (self.right - self.left) as u16
    }

    #[inline]
    pub fn height(&self) -> u16 {
        (self.bottom - self.top) as u16
    }
}

/// Rounds an ink box to whole device pixels and expands it by one
/// pixel on each side, so antialiased edges cannot bleed into
/// neighboring atlas entries when sampled. Returns `None` for an
/// empty or inverted box.
pub fn padded_pixel_box(ink: &[f32; 4]) -> Option<PixelBox> {
    let [left, top, right, bottom] = *ink;
    if left >= right || top >= bottom {
        return None;
    }
    Some(PixelBox {
        left: left.round() as i32 - 1,
        top: top.round() as i32 - 1,
        right: right.round() as i32 + 1,
        bottom: bottom.round() as i32 + 1,
    })
}
