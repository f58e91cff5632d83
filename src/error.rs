//! Error taxonomy.
//!
//! Only invalid-input shapes and balanced-stack violations raise; missing
//! dependencies and unimplemented opcodes/gstate keys/mesh shadings are
//! `log::warn!` call sites that let interpretation continue, scattered
//! through [`crate::interpreter`], [`crate::pattern`], and [`crate::image`]
//! rather than living here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid viewport: width={width}, height={height}")]
    InvalidViewport { width: f64, height: f64 },

    #[error("unknown shading kind: {0}")]
    UnknownShadingKind(String),

    #[error("unsupported bitmap-backed image mask")]
    UnsupportedBitmapMask,

    #[error("png encoding failed: {0}")]
    PngEncode(String),

    #[error("image data does not match its declared width/height/pixel-kind: {0}")]
    InvalidImageData(String),

    #[error("graphics state stack imbalance: popped an empty stack")]
    StackImbalance,
}

pub type Result<T> = std::result::Result<T, Error>;
