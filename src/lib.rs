//! Renders a flattened PDF operator list into a standalone SVG document.
//!
//! The crate has no PDF parser of its own: [`driver::render_page`] takes an
//! already-decoded operator list (as a real upstream content-stream
//! producer would emit it) plus an [`objects::ObjectStore`] for font and
//! image lookups, and returns a [`svgtree::Document`] ready to serialize.

pub mod counters;
pub mod driver;
pub mod error;
pub mod format;
#[cfg(feature = "images")]
pub mod image;
pub mod interpreter;
pub mod matrix;
pub mod objects;
pub mod oplist;
#[cfg(feature = "images")]
pub mod opjson;
pub mod path;
pub mod pattern;
pub mod state;
pub mod svgtree;
pub mod text;

pub use driver::{render_page, RenderOptions};
pub use error::{Error, Result};
