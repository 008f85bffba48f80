// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// Monotonically increasing version counter for a settings section.
///
/// Generations never decrease and never wrap within a process
/// lifetime; 64 bits are enough to bump once per nanosecond for
/// centuries.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
pub struct Generation(u64);

impl Generation {
    fn bump(&mut self) {
        self.0 += 1;
    }
}

/// A value paired with its generation.
///
/// Reads go through `Deref`; the only way to obtain a mutable
/// reference is `write()`, which bumps the generation first. Consumers
/// keep a private "last observed" `Generation` per section and skip
/// recomputation when it matches `generation()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Generational<T> {
    generation: Generation,
    value: T,
}

impl<T> Generational<T> {
    pub fn new(value: T) -> Self {
        Self {
            generation: Generation(1),
            value,
        }
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    pub fn write(&mut self) -> &mut T {
        self.generation.bump();
        &mut self.value
    }
}

impl<T> Deref for Generational<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

/// Window/transparency properties of the render target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSettings {
    pub transparent_background: bool,
}

/// An OpenType feature setting, e.g. ("calt", 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontFeature {
    pub tag: String,
    pub value: u16,
}

/// A variable font axis setting, e.g. ("wght", 600.0).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontAxis {
    pub tag: String,
    pub value: f32,
}

/// Resolved font metrics in device pixels.
///
/// All decoration geometry (underline, strikethrough, borders) is
/// derived from these fixed metrics, never from individual glyphs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontSettings {
    /// Size of one terminal cell in pixels.
    pub cell_size: [u16; 2],
    /// Distance from the cell top to the text baseline.
    pub baseline: u16,
    pub underline_pos: u16,
    pub underline_width: u16,
    pub strikethrough_pos: u16,
    pub strikethrough_width: u16,
    /// Vertical offsets of the two lines of a double underline.
    pub double_underline_pos: [u16; 2],
    /// Width used for borders, dotted and double underlines.
    pub thin_line_width: u16,
    pub font_features: Vec<FontFeature>,
    pub font_axes: Vec<FontAxis>,
    pub dpi: u16,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            cell_size: [8, 16],
            baseline: 12,
            underline_pos: 13,
            underline_width: 1,
            strikethrough_pos: 7,
            strikethrough_width: 1,
            double_underline_pos: [12, 14],
            thin_line_width: 1,
            font_features: Vec::new(),
            font_axes: Vec::new(),
            dpi: 96,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorShape {
    #[default]
    Block,
    HollowBlock,
    Underline,
    Caret,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorSettings {
    /// RGBA color, `r` in the low byte. `None` selects XOR inversion
    /// over whatever is already in the target.
    pub color: Option<u32>,
    pub shape: CursorShape,
    pub height_percentage: u8,
}

impl Default for CursorSettings {
    fn default() -> Self {
        Self {
            color: None,
            shape: CursorShape::Block,
            height_percentage: 20,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AntialiasingMode {
    /// ClearType-style subpixel antialiasing. Requires an opaque
    /// backdrop; demoted to `Grayscale` on transparent targets.
    #[default]
    Subpixel,
    Grayscale,
    Aliased,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MiscSettings {
    pub background_color: u32,
    pub selection_color: u32,
    pub antialiasing_mode: AntialiasingMode,
    /// Pre-compiled custom pixel shader bytecode, supplied at startup.
    #[serde(skip)]
    pub custom_shader: Option<Arc<[u8]>>,
    pub retro_terminal_effect: bool,
}

impl Default for MiscSettings {
    fn default() -> Self {
        Self {
            background_color: 0xff00_0000,
            selection_color: 0x7fff_ffff,
            antialiasing_mode: AntialiasingMode::default(),
            custom_shader: None,
            retro_terminal_effect: false,
        }
    }
}

/// The full settings snapshot handed from the producer to the
/// renderer. Each section carries its own generation so consumers can
/// rebuild only what actually changed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    pub target: Generational<TargetSettings>,
    pub font: Generational<FontSettings>,
    pub cursor: Generational<CursorSettings>,
    pub misc: Generational<MiscSettings>,
    /// Render target size in pixels.
    pub target_size: [u32; 2],
    /// Visible grid size in cells, caches `target_size / cell_size`.
    pub cell_count: [u16; 2],
}

impl Settings {
    /// The initial snapshot: every section at generation 1, so a
    /// renderer whose shadow copies start at the default generation 0
    /// rebuilds everything on its first frame.
    pub fn invalidated() -> Generational<Settings> {
        Generational::new(Settings {
            target: Generational::new(TargetSettings::default()),
            font: Generational::new(FontSettings::default()),
            cursor: Generational::new(CursorSettings::default()),
            misc: Generational::new(MiscSettings::default()),
            target_size: [0, 0],
            cell_count: [0, 0],
        })
    }

    /// Subpixel blending assumes a known opaque backdrop; a
    /// transparent target forces grayscale.
    pub fn resolved_antialiasing(&self) -> AntialiasingMode {
        match self.misc.antialiasing_mode {
            AntialiasingMode::Subpixel if self.target.transparent_background => {
                AntialiasingMode::Grayscale
            }
            mode => mode,
        }
    }
}

impl Generational<Settings> {
    /// Mutates the target section, bumping its generation and the
    /// aggregate generation.
    pub fn target_mut(&mut self) -> &mut TargetSettings {
        self.generation.bump();
        self.value.target.write()
    }

    pub fn font_mut(&mut self) -> &mut FontSettings {
        self.generation.bump();
        self.value.font.write()
    }

    pub fn cursor_mut(&mut self) -> &mut CursorSettings {
        self.generation.bump();
        self.value.cursor.write()
    }

    pub fn misc_mut(&mut self) -> &mut MiscSettings {
        self.generation.bump();
        self.value.misc.write()
    }

    /// Target size and cell count live on the snapshot itself; a
    /// change bumps only the aggregate generation.
    pub fn set_target_size(&mut self, size: [u32; 2], cell_count: [u16; 2]) {
        if self.value.target_size != size || self.value.cell_count != cell_count {
            self.generation.bump();
            self.value.target_size = size;
            self.value.cell_count = cell_count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_strictly_increases_per_section() {
        let mut s = Settings::invalidated();
        let font_before = s.font.generation();
        let cursor_before = s.cursor.generation();
        let aggregate_before = s.generation();

        s.font_mut().cell_size = [10, 20];

        assert!(s.font.generation() > font_before);
        assert!(s.generation() > aggregate_before);
        // Unrelated sections are untouched.
        assert_eq!(s.cursor.generation(), cursor_before);
    }

    #[test]
    fn repeated_writes_keep_increasing() {
        let mut s = Settings::invalidated();
        let mut last = s.misc.generation();
        for _ in 0..5 {
            s.misc_mut().retro_terminal_effect ^= true;
            assert!(s.misc.generation() > last);
            last = s.misc.generation();
        }
    }

    #[test]
    fn set_target_size_is_idempotent() {
        let mut s = Settings::invalidated();
        s.set_target_size([640, 384], [80, 24]);
        let g = s.generation();
        s.set_target_size([640, 384], [80, 24]);
        assert_eq!(s.generation(), g);
    }

    #[test]
    fn transparent_target_forces_grayscale() {
        let mut s = Settings::invalidated();
        assert_eq!(s.resolved_antialiasing(), AntialiasingMode::Subpixel);
        s.target_mut().transparent_background = true;
        assert_eq!(s.resolved_antialiasing(), AntialiasingMode::Grayscale);
        // Explicit aliased mode is left alone.
        s.misc_mut().antialiasing_mode = AntialiasingMode::Aliased;
        assert_eq!(s.resolved_antialiasing(), AntialiasingMode::Aliased);
    }
}
