//! Renderer error taxonomy.
//!
//! Recoverable staleness (generation mismatch, atlas overflow) never
//! shows up here; it is internal control flow that triggers rebuilds.
//! `RenderError` is reserved for failures the caller must react to by
//! tearing the renderer down and recreating it.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RenderError {
    #[error("gpu device lost")]
    DeviceLost,
    #[error("out of memory on a required allocation")]
    OutOfMemory,
    /// A single glyph failed to pack into a freshly reset, empty
    /// atlas. Retrying cannot help; the configured atlas size is too
    /// small for the font.
    #[error("glyph {glyph} of face {face} does not fit an empty {atlas_size}x{atlas_size} atlas")]
    GlyphTooLarge {
        face: u64,
        glyph: u16,
        atlas_size: u16,
    },
    #[error("presentation failed: {0}")]
    PresentFailed(&'static str),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Non-fatal conditions reported through the warning sink. The core
/// never logs these on its own behalf beyond `tracing` diagnostics;
/// the host decides what to surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// The custom pixel shader was rejected; rendering continues
    /// without it.
    ShaderCompileFailed,
    /// The backend cannot do subpixel antialiasing; grayscale is used
    /// instead.
    SubpixelUnavailable,
    /// The glyph atlas overflowed and was rebuilt from empty.
    AtlasReset,
    /// The device was lost and a recovery was triggered.
    DeviceRecovery,
}

/// Single callback taking an error-code-like value, mirroring the
/// warning callback of the presentation layer.
pub type WarningSink = Box<dyn FnMut(Warning) + Send>;
