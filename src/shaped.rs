// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use smallvec::SmallVec;

/// Opaque handle to a concrete font face, produced by the font
/// resolution backend. Identity is all the core needs: it keys the
/// glyph cache and is handed back to the rasterizer on misses.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FontFaceId(pub u64);

/// Maps a contiguous run of glyphs within a row to the face that
/// shaped them.
#[derive(Clone, Debug, PartialEq)]
pub struct FontMapping {
    pub face: FontFaceId,
    pub em_size: f32,
    /// Index range into the row's parallel glyph arrays.
    pub glyphs_from: u32,
    pub glyphs_to: u32,
}

/// Output of the (external) shaping step for one logical row, ready
/// for direct consumption by the compositor. The arrays are parallel:
/// `glyph_ids`, `advances`, `offsets` and `colors` all have one entry
/// per glyph. Order is shaped order, which for bidi text is not
/// visual column order; reordering is the shaper's responsibility.
#[derive(Clone, Debug, Default)]
pub struct ShapedRow {
    pub mappings: SmallVec<[FontMapping; 4]>,
    pub glyph_ids: Vec<u16>,
    pub advances: Vec<f32>,
    /// (advance offset, ascender offset) per glyph.
    pub offsets: Vec<[f32; 2]>,
    /// Foreground color per glyph, RGBA with `r` in the low byte.
    pub colors: Vec<u32>,
    /// Selected column range, half-open; empty when `from >= to`.
    pub selection_from: u16,
    pub selection_to: u16,
}

impl ShapedRow {
    /// Empties the row while retaining capacity; rows are reused
    /// across frames to avoid reallocation.
    pub fn clear(&mut self) {
        self.mappings.clear();
        self.glyph_ids.clear();
        self.advances.clear();
        self.offsets.clear();
        self.colors.clear();
        self.selection_from = 0;
        self.selection_to = 0;
    }

    #[inline]
    pub fn has_selection(&self) -> bool {
        self.selection_to > self.selection_from
    }

    /// Appends a run of glyphs under one face, keeping the parallel
    /// arrays in sync.
    pub fn push_run(
        &mut self,
        face: FontFaceId,
        em_size: f32,
        glyphs: impl IntoIterator<Item = (u16, f32, [f32; 2], u32)>,
    ) {
        let from = self.glyph_ids.len() as u32;
        for (id, advance, offset, color) in glyphs {
            self.glyph_ids.push(id);
            self.advances.push(advance);
            self.offsets.push(offset);
            self.colors.push(color);
        }
        let to = self.glyph_ids.len() as u32;
        if to > from {
            self.mappings.push(FontMapping {
                face,
                em_size,
                glyphs_from: from,
                glyphs_to: to,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_run_keeps_arrays_parallel() {
        let mut row = ShapedRow::default();
        row.push_run(
            FontFaceId(1),
            16.0,
            [(33, 8.0, [0.0, 0.0], 0xffff_ffff), (34, 8.0, [0.0, 0.0], 0xffff_ffff)],
        );
        row.push_run(FontFaceId(2), 16.0, [(7, 8.0, [0.5, 0.0], 0xff00_00ff)]);

        assert_eq!(row.glyph_ids.len(), 3);
        assert_eq!(row.advances.len(), 3);
        assert_eq!(row.offsets.len(), 3);
        assert_eq!(row.colors.len(), 3);
        assert_eq!(row.mappings.len(), 2);
        assert_eq!(row.mappings[1].glyphs_from, 2);
        assert_eq!(row.mappings[1].glyphs_to, 3);
    }

    #[test]
    fn empty_run_adds_no_mapping() {
        let mut row = ShapedRow::default();
        row.push_run(FontFaceId(1), 16.0, std::iter::empty());
        assert!(row.mappings.is_empty());
    }

    #[test]
    fn clear_retains_capacity() {
        let mut row = ShapedRow::default();
        row.push_run(FontFaceId(1), 16.0, [(1, 8.0, [0.0, 0.0], 0)]);
        let cap = row.glyph_ids.capacity();
        row.selection_from = 1;
        row.selection_to = 3;
        row.clear();
        assert!(row.glyph_ids.is_empty());
        assert!(!row.has_selection());
        assert_eq!(row.glyph_ids.capacity(), cap);
    }
}
