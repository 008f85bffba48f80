// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use bytemuck::{Pod, Zeroable};

/// Shading selector carried per instance.
///
/// The numeric values are shared with the pixel shader and must be
/// kept in lockstep with the constants declared there; there is no
/// automatic sync.
///
/// ```text
/// 0  glyph mask sampled from the atlas, AA-corrected, tinted by color
/// 1  texture passthrough (background cell lookup, color glyphs)
/// 2  solid color (decorations, selection, colored cursors)
/// ```
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShadingType {
    GlyphMask = 0,
    Passthrough = 1,
    Solid = 2,
}

/// One quad of the per-frame instance stream.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod)]
pub struct QuadInstance {
    /// x, y, width, height in target pixels.
    pub rect: [f32; 4],
    /// x, y, width, height in texture pixels.
    pub tex: [f32; 4],
    /// RGBA, `r` in the low byte.
    pub color: u32,
    /// A `ShadingType` as u32, for Pod-ability.
    pub shading: u32,
}

impl QuadInstance {
    pub fn solid(rect: [f32; 4], color: u32) -> Self {
        Self {
            rect,
            tex: [0.0; 4],
            color,
            shading: ShadingType::Solid as u32,
        }
    }
}

/// Render pipelines a display list can bind. Each implies a pixel
/// shader variant and a blend state.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Pipeline {
    /// Per-cell background lookup, no blending.
    Background,
    /// Glyph quads with premultiplied straight-alpha blending.
    TextGrayscale,
    /// Glyph quads with dual-source subpixel blending. Only valid
    /// over an opaque backdrop.
    TextSubpixel,
    /// Logical XOR inversion. Requires the `Uint` render-target view;
    /// inversion needs integer logic ops, not blending.
    CursorInvert,
}

/// Which view of the render target is bound. The XOR cursor pass
/// needs the target reinterpreted as unsigned integers.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TargetView {
    Unorm,
    Uint,
}

/// Command in a display list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    BindPipeline(Pipeline),
    /// Bind the glyph atlas texture to the pipeline's sampler slot.
    BindAtlas,
    SetRenderTarget(TargetView),
    /// Draw a contiguous range of instances.
    Draw { start: u32, count: u32 },
}

/// The instance stream plus the commands that consume it, rebuilt
/// every frame with capacity retained.
#[derive(Default, Debug, Clone)]
pub struct DisplayList {
    instances: Vec<QuadInstance>,
    commands: Vec<Command>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, instance: QuadInstance) -> u32 {
        let index = self.instances.len() as u32;
        self.instances.push(instance);
        index
    }

    #[inline]
    pub fn mark(&self) -> u32 {
        self.instances.len() as u32
    }

    #[inline]
    pub fn command(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Emits a draw for `start..end`, skipping empty ranges.
    pub fn draw_range(&mut self, start: u32, end: u32) {
        if end > start {
            self.commands.push(Command::Draw {
                start,
                count: end - start,
            });
        }
    }

    #[inline]
    pub fn instances(&self) -> &[QuadInstance] {
        &self.instances
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Raw bytes of the instance stream, for direct upload into a
    /// GPU vertex/structured buffer.
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_range_skips_empty() {
        let mut list = DisplayList::new();
        list.draw_range(3, 3);
        assert!(list.commands().is_empty());
        list.draw_range(3, 5);
        assert_eq!(list.commands(), &[Command::Draw { start: 3, count: 2 }]);
    }

    #[test]
    fn instance_stream_is_pod() {
        let mut list = DisplayList::new();
        list.push(QuadInstance::solid([1.0, 2.0, 3.0, 4.0], 0xff00_00ff));
        assert_eq!(
            list.instance_bytes().len(),
            std::mem::size_of::<QuadInstance>()
        );
    }
}
