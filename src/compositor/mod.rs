// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//
// Frame compositor: turns {cell grid, shaped rows, cursor, selection}
// into an ordered instance stream with four logical layers drawn in a
// fixed order: background, glyphs+decorations, cursor, selection.
//
// The inverting cursor uses logic ops on an integer render-target
// view, which forces a pass split:
// * cursors sit "in between" text and selection
// * the selection is re-drawn after the cursor pass, so an overlapped
//   cursor never inverts the selection highlight away.

pub mod display_list;

use crate::atlas::{AtlasError, GlyphEntry};
use crate::cell::{CellFlags, CellGrid};
use crate::invalidation::CellRect;
use crate::settings::{AntialiasingMode, CursorSettings, CursorShape, FontSettings, Settings};
use crate::shaped::{FontFaceId, ShapedRow};
use display_list::{Command, DisplayList, Pipeline, QuadInstance, ShadingType, TargetView};

/// Decoration geometry in f32 pixels, derived from the font settings
/// once per font generation and cached; decoration quads never look
/// at individual glyphs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DecorationMetrics {
    pub cell: [f32; 2],
    pub baseline: f32,
    pub underline_pos: f32,
    pub underline_width: f32,
    pub strikethrough_pos: f32,
    pub strikethrough_width: f32,
    pub double_underline_pos: [f32; 2],
    pub thin_line_width: f32,
}

impl DecorationMetrics {
    pub fn from_font(font: &FontSettings) -> Self {
        Self {
            cell: [font.cell_size[0] as f32, font.cell_size[1] as f32],
            baseline: font.baseline as f32,
            underline_pos: font.underline_pos as f32,
            underline_width: font.underline_width.max(1) as f32,
            strikethrough_pos: font.strikethrough_pos as f32,
            strikethrough_width: font.strikethrough_width.max(1) as f32,
            double_underline_pos: [
                font.double_underline_pos[0] as f32,
                font.double_underline_pos[1] as f32,
            ],
            thin_line_width: font.thin_line_width.max(1) as f32,
        }
    }
}

/// Instance index ranges of the non-background layers, used to issue
/// the pass-split draws and asserted on by tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerRanges {
    pub text: (u32, u32),
    pub cursor: (u32, u32),
    pub selection: (u32, u32),
}

/// Resolves a glyph to its atlas entry, rasterizing and packing on a
/// cache miss. Provided by the renderer; the compositor itself never
/// touches the atlas directly.
pub type GlyphResolve<'a> =
    dyn FnMut(FontFaceId, u16, f32) -> Result<GlyphEntry, AtlasError> + 'a;

pub struct Compositor {
    metrics: DecorationMetrics,
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            metrics: DecorationMetrics::default(),
        }
    }

    /// Recomputes the cached decoration metrics; called when the font
    /// section's generation changes.
    pub fn update_metrics(&mut self, font: &FontSettings) {
        self.metrics = DecorationMetrics::from_font(font);
    }

    pub fn metrics(&self) -> &DecorationMetrics {
        &self.metrics
    }

    /// Builds the full frame. Returns the layer ranges on success;
    /// an `AtlasError` aborts mid-frame and leaves the display list
    /// in an undefined (discarded) state.
    pub fn compose(
        &mut self,
        list: &mut DisplayList,
        settings: &Settings,
        cells: &CellGrid,
        rows: &[ShapedRow],
        cursor: Option<CellRect>,
        antialiasing: AntialiasingMode,
        glyphs: &mut GlyphResolve<'_>,
    ) -> Result<LayerRanges, AtlasError> {
        list.clear();
        let m = self.metrics;
        let mut ranges = LayerRanges::default();

        // Layer 1: one full-surface quad sampling the per-cell color
        // lookup texture.
        list.push(QuadInstance {
            rect: [
                0.0,
                0.0,
                settings.target_size[0] as f32,
                settings.target_size[1] as f32,
            ],
            tex: [
                0.0,
                0.0,
                settings.target_size[0] as f32 / m.cell[0].max(1.0),
                settings.target_size[1] as f32 / m.cell[1].max(1.0),
            ],
            color: 0,
            shading: ShadingType::Passthrough as u32,
        });

        // Layer 2: glyph quads in shaped order, then decoration quads
        // positioned purely from grid coordinates and font metrics.
        let text_start = list.mark();
        for (y, row) in rows.iter().enumerate() {
            self.push_row_glyphs(list, row, y as u16, glyphs)?;
        }
        self.push_decorations(list, cells);
        ranges.text = (text_start, list.mark());

        // Layer 3: the cursor, drawn in its own XOR pass.
        let cursor_start = list.mark();
        if let Some(rect) = cursor {
            if !rect.is_empty() {
                self.push_cursor(list, rect, &settings.cursor);
            }
        }
        ranges.cursor = (cursor_start, list.mark());

        // Layer 4: selection, emitted after the cursor so the
        // re-draw pass keeps it visually on top.
        let selection_start = list.mark();
        for (y, row) in rows.iter().enumerate() {
            if row.has_selection() {
                list.push(QuadInstance::solid(
                    [
                        m.cell[0] * row.selection_from as f32,
                        m.cell[1] * y as f32,
                        m.cell[0] * (row.selection_to - row.selection_from) as f32,
                        m.cell[1],
                    ],
                    settings.misc.selection_color,
                ));
            }
        }
        ranges.selection = (selection_start, list.mark());

        self.push_commands(list, settings, antialiasing, &ranges);
        Ok(ranges)
    }

    fn push_row_glyphs(
        &self,
        list: &mut DisplayList,
        row: &ShapedRow,
        y: u16,
        glyphs: &mut GlyphResolve<'_>,
    ) -> Result<(), AtlasError> {
        let baseline_y = self.metrics.cell[1] * y as f32 + self.metrics.baseline;
        // The pen advances across the whole row; run boundaries only
        // switch the face.
        let mut advance = 0.0f32;
        for mapping in &row.mappings {
            for i in mapping.glyphs_from as usize..mapping.glyphs_to as usize {
                let entry = glyphs(mapping.face, row.glyph_ids[i], mapping.em_size)?;
                if entry.is_visible() {
                    let offset = row.offsets[i];
                    list.push(QuadInstance {
                        rect: [
                            advance + offset[0] + entry.offset[0] as f32,
                            baseline_y - offset[1] + entry.offset[1] as f32,
                            entry.size[0] as f32,
                            entry.size[1] as f32,
                        ],
                        tex: [
                            entry.origin[0] as f32,
                            entry.origin[1] as f32,
                            entry.size[0] as f32,
                            entry.size[1] as f32,
                        ],
                        color: row.colors[i],
                        shading: if entry.is_color {
                            ShadingType::Passthrough as u32
                        } else {
                            ShadingType::GlyphMask as u32
                        },
                    });
                }
                advance += row.advances[i];
            }
        }
        Ok(())
    }

    /// One quad per decoration edge per flagged cell; a double
    /// underline emits two quads at distinct vertical offsets.
    fn push_decorations(&self, list: &mut DisplayList, cells: &CellGrid) {
        let m = self.metrics;
        for y in 0..cells.rows() {
            for (x, cell) in cells.row(y).iter().enumerate() {
                let flags = cell.flags;
                if flags.is_empty() {
                    continue;
                }
                let left = m.cell[0] * x as f32;
                let top = m.cell[1] * y as f32;
                let color = cell.fg;

                if flags.contains(CellFlags::BORDER_LEFT) {
                    list.push(QuadInstance::solid(
                        [left, top, m.thin_line_width, m.cell[1]],
                        color,
                    ));
                }
                if flags.contains(CellFlags::BORDER_TOP) {
                    list.push(QuadInstance::solid(
                        [left, top, m.cell[0], m.thin_line_width],
                        color,
                    ));
                }
                if flags.contains(CellFlags::BORDER_RIGHT) {
                    list.push(QuadInstance::solid(
                        [
                            left + m.cell[0] - m.thin_line_width,
                            top,
                            m.thin_line_width,
                            m.cell[1],
                        ],
                        color,
                    ));
                }
                if flags.contains(CellFlags::BORDER_BOTTOM) {
                    list.push(QuadInstance::solid(
                        [
                            left,
                            top + m.cell[1] - m.thin_line_width,
                            m.cell[0],
                            m.thin_line_width,
                        ],
                        color,
                    ));
                }
                if flags.contains(CellFlags::UNDERLINE) {
                    list.push(QuadInstance::solid(
                        [left, top + m.underline_pos, m.cell[0], m.underline_width],
                        color,
                    ));
                }
                if flags.contains(CellFlags::UNDERLINE_DOTTED) {
                    // Dotted underlines alternate one thin-line-width
                    // dot per gap. The phase comes from the absolute
                    // pixel position, so the pattern stays continuous
                    // across cells for any cell width; dots straddling
                    // a cell edge are clipped, not dropped.
                    let dot = m.thin_line_width;
                    let period = dot * 2.0;
                    let mut dx = -left.rem_euclid(period);
                    while dx < m.cell[0] {
                        let start = dx.max(0.0);
                        let end = (dx + dot).min(m.cell[0]);
                        if end > start {
                            list.push(QuadInstance::solid(
                                [
                                    left + start,
                                    top + m.underline_pos,
                                    end - start,
                                    m.underline_width,
                                ],
                                color,
                            ));
                        }
                        dx += period;
                    }
                }
                if flags.contains(CellFlags::UNDERLINE_DOUBLE) {
                    for pos in m.double_underline_pos {
                        list.push(QuadInstance::solid(
                            [left, top + pos, m.cell[0], m.thin_line_width],
                            color,
                        ));
                    }
                }
                if flags.contains(CellFlags::STRIKETHROUGH) {
                    list.push(QuadInstance::solid(
                        [
                            left,
                            top + m.strikethrough_pos,
                            m.cell[0],
                            m.strikethrough_width,
                        ],
                        color,
                    ));
                }
            }
        }
    }

    fn push_cursor(&self, list: &mut DisplayList, rect: CellRect, cursor: &CursorSettings) {
        let m = self.metrics;
        let left = m.cell[0] * rect.left as f32;
        let top = m.cell[1] * rect.top as f32;
        let width = m.cell[0] * (rect.right - rect.left) as f32;
        let height = m.cell[1] * (rect.bottom - rect.top) as f32;
        // XOR cursors ignore the instance color; colored cursors are
        // drawn with it through the text blend state.
        let color = cursor.color.unwrap_or(0);

        match cursor.shape {
            CursorShape::Block => {
                list.push(QuadInstance::solid([left, top, width, height], color));
            }
            CursorShape::HollowBlock => {
                let t = m.thin_line_width;
                list.push(QuadInstance::solid([left, top, width, t], color));
                list.push(QuadInstance::solid(
                    [left, top + height - t, width, t],
                    color,
                ));
                list.push(QuadInstance::solid([left, top + t, t, height - 2.0 * t], color));
                list.push(QuadInstance::solid(
                    [left + width - t, top + t, t, height - 2.0 * t],
                    color,
                ));
            }
            CursorShape::Underline => {
                let h = (height * cursor.height_percentage.min(100) as f32 / 100.0).max(1.0);
                list.push(QuadInstance::solid([left, top + height - h, width, h], color));
            }
            CursorShape::Caret => {
                list.push(QuadInstance::solid(
                    [left, top, m.thin_line_width, height],
                    color,
                ));
            }
        }
    }

    /// Issues the draw commands with their blend-state transitions.
    /// With an inverting cursor present the frame needs three passes;
    /// otherwise text and selection collapse into one draw, since
    /// their instances are contiguous.
    fn push_commands(
        &self,
        list: &mut DisplayList,
        settings: &Settings,
        antialiasing: AntialiasingMode,
        ranges: &LayerRanges,
    ) {
        let text_pipeline = match antialiasing {
            AntialiasingMode::Subpixel => Pipeline::TextSubpixel,
            AntialiasingMode::Grayscale | AntialiasingMode::Aliased => Pipeline::TextGrayscale,
        };

        list.command(Command::BindPipeline(Pipeline::Background));
        list.command(Command::Draw { start: 0, count: 1 });

        let has_cursor = ranges.cursor.1 > ranges.cursor.0;
        if has_cursor {
            if ranges.text.1 > ranges.text.0 {
                list.command(Command::BindPipeline(text_pipeline));
                list.command(Command::BindAtlas);
                list.draw_range(ranges.text.0, ranges.text.1);
            }

            if settings.cursor.color.is_none() {
                list.command(Command::SetRenderTarget(TargetView::Uint));
                list.command(Command::BindPipeline(Pipeline::CursorInvert));
                list.draw_range(ranges.cursor.0, ranges.cursor.1);
                list.command(Command::SetRenderTarget(TargetView::Unorm));
            } else {
                list.command(Command::BindPipeline(text_pipeline));
                list.draw_range(ranges.cursor.0, ranges.cursor.1);
            }

            if ranges.selection.1 > ranges.selection.0 {
                list.command(Command::BindPipeline(text_pipeline));
                list.command(Command::BindAtlas);
                list.draw_range(ranges.selection.0, ranges.selection.1);
            }
        } else if ranges.selection.1 > ranges.text.0 {
            list.command(Command::BindPipeline(text_pipeline));
            list.command(Command::BindAtlas);
            list.draw_range(ranges.text.0, ranges.selection.1);
        }
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn test_settings() -> Settings {
        let mut s = crate::settings::Settings::invalidated();
        s.set_target_size([640, 384], [80, 24]);
        // Unwrap the generational layer; compose reads plain settings.
        (*s).clone()
    }

    fn compose_with(
        cells: &CellGrid,
        rows: &[ShapedRow],
        cursor: Option<CellRect>,
        settings: &Settings,
    ) -> (DisplayList, LayerRanges) {
        let mut compositor = Compositor::new();
        compositor.update_metrics(&settings.font);
        let mut list = DisplayList::new();
        let entry = GlyphEntry {
            origin: [0, 0],
            size: [6, 10],
            offset: [1, -9],
            is_color: false,
        };
        let ranges = compositor
            .compose(
                &mut list,
                settings,
                cells,
                rows,
                cursor,
                settings.resolved_antialiasing(),
                &mut |_, _, _| Ok(entry),
            )
            .unwrap();
        (list, ranges)
    }

    #[test]
    fn background_is_always_first() {
        let settings = test_settings();
        let cells = CellGrid::new(80, 24);
        let (list, _) = compose_with(&cells, &[], None, &settings);
        assert_eq!(list.instances()[0].shading, ShadingType::Passthrough as u32);
        assert_eq!(
            list.commands()[0],
            Command::BindPipeline(Pipeline::Background)
        );
    }

    #[test]
    fn double_underline_emits_two_quads() {
        let settings = test_settings();
        let mut cells = CellGrid::new(80, 24);
        cells.get_mut(3, 1).unwrap().flags = CellFlags::UNDERLINE_DOUBLE;
        cells.get_mut(3, 1).unwrap().fg = 0xff;
        let (list, ranges) = compose_with(&cells, &[], None, &settings);

        let deco: Vec<_> = list.instances()[ranges.text.0 as usize..ranges.text.1 as usize]
            .iter()
            .collect();
        assert_eq!(deco.len(), 2);
        assert_ne!(deco[0].rect[1], deco[1].rect[1]);
        assert_eq!(deco[0].rect[0], deco[1].rect[0]);
    }

    #[test]
    fn dotted_underline_phase_is_continuous_across_cells() {
        let mut settings = test_settings();
        // An odd cell width would break any per-cell parity scheme.
        settings.font.write().cell_size = [9, 18];
        let mut cells = CellGrid::new(80, 24);
        for x in 0..2 {
            let cell = cells.get_mut(x, 0).unwrap();
            cell.flags = CellFlags::UNDERLINE_DOTTED;
            cell.fg = 0xff;
        }
        let (list, ranges) = compose_with(&cells, &[], None, &settings);

        let starts: Vec<f32> = list.instances()[ranges.text.0 as usize..ranges.text.1 as usize]
            .iter()
            .map(|q| q.rect[0])
            .collect();
        assert_eq!(starts[0], 0.0);
        // One dot per two pixels over the whole 18px span, no phase
        // jump at the 9px cell boundary.
        for pair in starts.windows(2) {
            assert_eq!(pair[1] - pair[0], 2.0);
        }
    }

    #[test]
    fn selection_layer_follows_cursor_layer() {
        let settings = test_settings();
        let cells = CellGrid::new(80, 24);
        let mut row = ShapedRow::default();
        row.selection_from = 2;
        row.selection_to = 6;
        let rows = vec![row];
        let cursor = Some(CellRect::new(3, 0, 4, 1));

        let (list, ranges) = compose_with(&cells, &rows, cursor, &settings);
        assert!(ranges.cursor.0 < ranges.selection.0);

        // The command stream draws cursor (XOR pass) before selection.
        let commands = list.commands();
        let cursor_draw = commands
            .iter()
            .position(|c| matches!(c, Command::Draw { start, .. } if *start == ranges.cursor.0))
            .unwrap();
        let selection_draw = commands
            .iter()
            .position(|c| matches!(c, Command::Draw { start, .. } if *start == ranges.selection.0))
            .unwrap();
        assert!(cursor_draw < selection_draw);
        assert_eq!(
            commands[cursor_draw - 1],
            Command::BindPipeline(Pipeline::CursorInvert)
        );
        assert_eq!(
            commands[cursor_draw - 2],
            Command::SetRenderTarget(TargetView::Uint)
        );
    }

    #[test]
    fn no_cursor_collapses_text_and_selection_into_one_draw() {
        let settings = test_settings();
        let cells = CellGrid::new(80, 24);
        let mut row = ShapedRow::default();
        row.push_run(FontFaceId(1), 16.0, [(5, 8.0, [0.0, 0.0], 0xffff_ffff)]);
        row.selection_from = 0;
        row.selection_to = 1;
        let rows = vec![row];

        let (list, ranges) = compose_with(&cells, &rows, None, &settings);
        let draws: Vec<_> = list
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .collect();
        // Background + one combined text/selection draw.
        assert_eq!(draws.len(), 2);
        assert_eq!(
            *draws[1],
            Command::Draw {
                start: ranges.text.0,
                count: ranges.selection.1 - ranges.text.0
            }
        );
    }

    #[test]
    fn transparent_background_selects_grayscale_pipeline() {
        let mut settings = test_settings();
        let cells = CellGrid::new(80, 24);
        let mut row = ShapedRow::default();
        row.push_run(FontFaceId(1), 16.0, [(5, 8.0, [0.0, 0.0], 0xffff_ffff)]);
        let rows = vec![row.clone()];

        let (list, _) = compose_with(&cells, &rows, None, &settings);
        assert!(list
            .commands()
            .contains(&Command::BindPipeline(Pipeline::TextSubpixel)));

        settings.target.write().transparent_background = true;
        let (list, _) = compose_with(&cells, &rows, None, &settings);
        assert!(list
            .commands()
            .contains(&Command::BindPipeline(Pipeline::TextGrayscale)));
    }

    #[test]
    fn decorations_do_not_depend_on_glyphs() {
        let settings = test_settings();
        let mut cells = CellGrid::new(80, 24);
        let cell = Cell {
            bg: 0,
            fg: 0xff00_ff00,
            flags: CellFlags::STRIKETHROUGH,
        };
        *cells.get_mut(10, 5).unwrap() = cell;
        let (list, ranges) = compose_with(&cells, &[], None, &settings);

        let quad = &list.instances()[ranges.text.0 as usize];
        let m = DecorationMetrics::from_font(&settings.font);
        assert_eq!(quad.rect[0], m.cell[0] * 10.0);
        assert_eq!(quad.rect[1], m.cell[1] * 5.0 + m.strikethrough_pos);
    }
}
