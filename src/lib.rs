// Copyright (c) 2023-present, Raphael Amorim.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! tijuca is the text-rendering core of a GPU terminal display
//! engine. It owns the CPU side of the frame: a generational settings
//! store, a glyph atlas cache, dirty-region accumulation, and a
//! compositor that turns the visible grid into an ordered instance
//! stream with background, text, cursor and selection layers. Fonts,
//! shaping and the GPU device itself stay behind the [`FontResolver`],
//! [`GlyphScaler`] and [`DisplayBackend`] traits.
//!
//! The crate is split along the producer/renderer thread boundary:
//! the terminal grid owner talks to [`TijucaHandle`], the render loop
//! drives [`Tijuca::render`], and the two only ever meet inside the
//! hand-off mutex.

pub mod atlas;
pub mod cell;
pub mod compositor;
pub mod error;
pub mod font;
pub mod handoff;
pub mod invalidation;
pub mod present;
pub mod raster;
mod renderer;
pub mod settings;
pub mod shaped;

pub use crate::error::{RenderError, Result, Warning, WarningSink};
pub use crate::font::{FontFace, FontResolver};
pub use crate::handoff::{FramePayload, TijucaHandle};
pub use crate::raster::{GlyphScaler, RasterizedGlyph};
pub use crate::renderer::{DisplayBackend, Tijuca};
