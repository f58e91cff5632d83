//! Graphics state: the per-save-level snapshot threaded through the
//! interpreter, plus the small value types its fields are built from.
//!
//! Grounded on the PDF graphics-state reference in this pack
//! (`other_examples/...graphics_state.rs`): the same enum shapes
//! (`LineCap`, `LineJoin`, `FillRule`) and "`save` clones, writes replace
//! fields" discipline, adapted from a PDF content-stream writer's state to
//! an SVG emitter's state (spec.md §3 "Graphics state (per save level)").

use std::sync::Arc;

use crate::matrix::Matrix;
use crate::objects::FontObject;
use crate::svgtree::Node;

/// PDF `J` line-cap styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn as_svg(&self) -> &'static str {
        match self {
            LineCap::Butt => "butt",
            LineCap::Round => "round",
            LineCap::Square => "square",
        }
    }
}

/// PDF `j` line-join styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn as_svg(&self) -> &'static str {
        match self {
            LineJoin::Miter => "miter",
            LineJoin::Round => "round",
            LineJoin::Bevel => "bevel",
        }
    }
}

/// Text rendering mode (PDF `Tr`), masked against `FILL_STROKE_MASK = 3`
/// for fill/stroke decisions (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRenderingMode {
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    AddToPath,
}

impl TextRenderingMode {
    pub const FILL_STROKE_MASK: u8 = 3;

    /// Maps a raw PDF `Tr` mode number (0-7) to one of the five named
    /// behaviors spec.md §4.6 describes. Bits 0-1 (masked by
    /// `FILL_STROKE_MASK`) select fill/stroke/both/invisible; mode 7 (the
    /// clip-only mode, no bits 0-1 set meaningfully since it never paints)
    /// is the one case mapped to `AddToPath` rather than its masked base.
    pub fn from_mode_number(n: i32) -> TextRenderingMode {
        if n == 7 {
            return TextRenderingMode::AddToPath;
        }
        match n & (TextRenderingMode::FILL_STROKE_MASK as i32) {
            0 => TextRenderingMode::Fill,
            1 => TextRenderingMode::Stroke,
            2 => TextRenderingMode::FillStroke,
            3 => TextRenderingMode::Invisible,
            _ => unreachable!("n & 3 is in 0..=3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
    Black,
}

impl FontWeight {
    pub fn as_svg(&self) -> &'static str {
        match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
            FontWeight::Black => "900",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

impl FontStyle {
    pub fn as_svg(&self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
        }
    }
}

/// One element of a `showText` argument sequence (spec.md §4.6).
#[derive(Debug, Clone)]
pub enum GlyphItem {
    /// A `null` entry: word break, advances by word spacing only.
    WordBreak,
    /// A positioning adjustment in thousandths of text space.
    Adjust(f64),
    Glyph {
        is_space: bool,
        is_in_font: bool,
        font_char: String,
        width: f64,
        /// `[width, vx, vy]` vertical metrics, present only for vertical
        /// fonts.
        vmetric: Option<[f64; 3]>,
    },
}

/// Decoded `paintInlineImageXObject`/`paintImageXObject` payload.
#[derive(Debug, Clone)]
pub struct ImageArgs {
    pub width: u32,
    pub height: u32,
    pub kind: PixelKind,
    pub data: Vec<u8>,
    pub is_mask: bool,
    /// Set when the source was an off-screen-canvas bitmap rather than raw
    /// pixel data; `paintImageMaskXObject` rejects these (spec.md §4.9
    /// "Bitmap-backed masks ... are unsupported").
    pub is_bitmap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelKind {
    Grayscale1Bpp = 1,
    Rgb24Bpp = 2,
    Rgba32Bpp = 3,
}

/// Decoded tiling-pattern payload (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct TilingPatternArgs {
    /// Uncolored-pattern fill color (paintType 2 only).
    pub color: Option<(u8, u8, u8)>,
    pub ops: Vec<crate::oplist::Operator>,
    pub matrix: [f64; 6],
    pub bbox: [f64; 4],
    pub xstep: f64,
    pub ystep: f64,
    pub paint_type: u8,
}

/// Small-vector-free dash array; cloned on save like every other field.
pub type DashArray = Vec<f64>;

/// The per-save-level graphics state. `save` clones this (shallow: `Node`
/// handles and `Vec`s are cheap `Rc`/heap clones, not shared mutable
/// references), and every mutation replaces a field rather than mutating
/// through a shared reference, so cloned snapshots never observe later
/// writes.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    // Current user-space point.
    pub x: f64,
    pub y: f64,

    // Text state.
    pub text_matrix: Matrix,
    pub line_matrix: Matrix,
    pub text_matrix_scale: f64,
    pub font_matrix: Matrix,
    pub font_size: f64,
    pub font_size_scale: f64,
    pub font_family: String,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_direction: f64,
    pub font: Option<Arc<FontObject>>,

    // Text formatting.
    pub leading: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    pub text_hscale: f64,
    pub text_rise: f64,
    pub text_rendering_mode: TextRenderingMode,

    // Text line origin.
    pub line_x: f64,
    pub line_y: f64,

    // In-progress text.
    pub pending_tspan: Option<Node>,
    pub xcoords: Vec<f64>,
    pub ycoords: Vec<f64>,
    pub text_node: Option<Node>,
    pub text_group: Option<Node>,

    // Style.
    pub fill_color: String,
    pub stroke_color: String,
    pub fill_alpha: f64,
    pub stroke_alpha: f64,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub dash_array: DashArray,
    pub dash_phase: f64,

    // Path.
    pub path: Option<Node>,
    pub element: Option<Node>,
    pub mask_id: Option<String>,
}

impl Default for GraphicsState {
    fn default() -> GraphicsState {
        GraphicsState {
            x: 0.0,
            y: 0.0,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            text_matrix_scale: 1.0,
            font_matrix: Matrix::FONT_IDENTITY,
            font_size: 0.0,
            font_size_scale: 1.0,
            font_family: String::new(),
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_direction: 1.0,
            font: None,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_hscale: 1.0,
            text_rise: 0.0,
            text_rendering_mode: TextRenderingMode::Fill,
            line_x: 0.0,
            line_y: 0.0,
            pending_tspan: None,
            xcoords: Vec::new(),
            ycoords: Vec::new(),
            text_node: None,
            text_group: None,
            fill_color: "#000000".to_string(),
            stroke_color: "#000000".to_string(),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash_array: Vec::new(),
            dash_phase: 0.0,
            path: None,
            element: None,
            mask_id: None,
        }
    }
}

impl GraphicsState {
    /// Resets the in-progress-text buffers; called at `beginText`,
    /// `moveText`, `setTextMatrix`, and — per the preserved Open Question
    /// in spec.md §9 — at `setFillRGBColor` too.
    pub fn reset_text_buffers(&mut self) {
        self.xcoords.clear();
        self.ycoords.clear();
        self.pending_tspan = None;
    }
}
