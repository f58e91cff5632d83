//! JSON deserialization for the CLI's operator-list input file.
//!
//! The driver and interpreter never see `serde` types directly: everything
//! in this module exists only to turn a JSON document into the same
//! `Vec<Operator>` / `Viewport` / `ObjectStore` shapes a real upstream
//! operator-list producer would hand the driver (spec.md §6 "Driver
//! inputs"). An operator name this input format doesn't recognize fails
//! deserialization of the whole document; once an operator list is decoded
//! into `OpCode`s, an opcode the *interpreter* doesn't recognize is instead
//! logged and skipped there (spec.md §7 "Unimplemented opcode").

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use crate::objects::{FontObject, ObjectStore};
use crate::oplist::{Args, GStateValue, OpCode, Operator, PathOp};
use crate::pattern::{ColorStop, ShadingArgs, ShadingKind};
use crate::path::Viewport;
use crate::state::{GlyphItem, ImageArgs, PixelKind, TilingPatternArgs};

/// A document is one or more pages sharing a single document-wide
/// (`g_`-prefixed) object store, matching the `common_objs`/`page_objs`
/// split `render_page` takes (spec.md §6 "Driver inputs").
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentJson {
    #[serde(default)]
    pub common_objects: HashMap<String, ObjectEntryJson>,
    pub pages: Vec<PageJson>,
}

#[derive(Debug, Deserialize)]
pub struct PageJson {
    pub viewport: ViewportJson,
    pub operators: Vec<OperatorJson>,
    #[serde(default)]
    pub objects: HashMap<String, ObjectEntryJson>,
}

#[derive(Debug, Deserialize)]
pub struct ViewportJson {
    pub width: f64,
    pub height: f64,
    #[serde(default = "identity_matrix")]
    pub transform: [f64; 6],
}

fn identity_matrix() -> [f64; 6] {
    [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
}

impl From<ViewportJson> for Viewport {
    fn from(v: ViewportJson) -> Viewport {
        let m = v.transform;
        Viewport {
            width: v.width,
            height: v.height,
            transform: crate::matrix::Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5]),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathOpJson {
    Rectangle,
    MoveTo,
    LineTo,
    CurveTo,
    CurveTo2,
    CurveTo3,
    ClosePath,
}

impl From<&PathOpJson> for PathOp {
    fn from(op: &PathOpJson) -> PathOp {
        match op {
            PathOpJson::Rectangle => PathOp::Rectangle,
            PathOpJson::MoveTo => PathOp::MoveTo,
            PathOpJson::LineTo => PathOp::LineTo,
            PathOpJson::CurveTo => PathOp::CurveTo,
            PathOpJson::CurveTo2 => PathOp::CurveTo2,
            PathOpJson::CurveTo3 => PathOp::CurveTo3,
            PathOpJson::ClosePath => PathOp::ClosePath,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GlyphItemJson {
    WordBreak,
    Adjust { value: f64 },
    Glyph {
        is_space: bool,
        is_in_font: bool,
        font_char: String,
        width: f64,
        #[serde(default)]
        vmetric: Option<[f64; 3]>,
    },
}

impl From<GlyphItemJson> for GlyphItem {
    fn from(item: GlyphItemJson) -> GlyphItem {
        match item {
            GlyphItemJson::WordBreak => GlyphItem::WordBreak,
            GlyphItemJson::Adjust { value } => GlyphItem::Adjust(value),
            GlyphItemJson::Glyph { is_space, is_in_font, font_char, width, vmetric } => {
                GlyphItem::Glyph { is_space, is_in_font, font_char, width, vmetric }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "key", rename_all = "camelCase")]
pub enum GStateEntryJson {
    #[serde(rename = "LW")]
    LineWidth { value: f64 },
    #[serde(rename = "LC")]
    LineCap { value: f64 },
    #[serde(rename = "LJ")]
    LineJoin { value: f64 },
    #[serde(rename = "ML")]
    MiterLimit { value: f64 },
    #[serde(rename = "D")]
    Dash { array: Vec<f64>, phase: f64 },
    #[serde(rename = "RI")]
    RenderingIntent { value: f64 },
    #[serde(rename = "FL")]
    Flatness { value: f64 },
    #[serde(rename = "Font")]
    Font { name: String, size: f64 },
    #[serde(rename = "CA")]
    StrokeAlpha { value: f64 },
    #[serde(rename = "ca")]
    FillAlpha { value: f64 },
}

impl From<GStateEntryJson> for (String, GStateValue) {
    fn from(entry: GStateEntryJson) -> (String, GStateValue) {
        match entry {
            GStateEntryJson::LineWidth { value } => ("LW".to_string(), GStateValue::F64(value)),
            GStateEntryJson::LineCap { value } => ("LC".to_string(), GStateValue::F64(value)),
            GStateEntryJson::LineJoin { value } => ("LJ".to_string(), GStateValue::F64(value)),
            GStateEntryJson::MiterLimit { value } => ("ML".to_string(), GStateValue::F64(value)),
            GStateEntryJson::Dash { array, phase } => {
                ("D".to_string(), GStateValue::Dash { array, phase })
            }
            GStateEntryJson::RenderingIntent { value } => ("RI".to_string(), GStateValue::F64(value)),
            GStateEntryJson::Flatness { value } => ("FL".to_string(), GStateValue::F64(value)),
            GStateEntryJson::Font { name, size } => ("Font".to_string(), GStateValue::Font { name, size }),
            GStateEntryJson::StrokeAlpha { value } => ("CA".to_string(), GStateValue::F64(value)),
            GStateEntryJson::FillAlpha { value } => ("ca".to_string(), GStateValue::F64(value)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ShadingKindJson {
    Axial { x1: f64, y1: f64, x2: f64, y2: f64 },
    Radial { cx: f64, cy: f64, r: f64, fx: f64, fy: f64, fr: f64 },
    Mesh,
    Dummy,
    Unknown { name: String },
}

impl From<ShadingKindJson> for ShadingKind {
    fn from(kind: ShadingKindJson) -> ShadingKind {
        match kind {
            ShadingKindJson::Axial { x1, y1, x2, y2 } => ShadingKind::Axial { x1, y1, x2, y2 },
            ShadingKindJson::Radial { cx, cy, r, fx, fy, fr } => {
                ShadingKind::Radial { cx, cy, r, fx, fy, fr }
            }
            ShadingKindJson::Mesh => ShadingKind::Mesh,
            ShadingKindJson::Dummy => ShadingKind::Dummy,
            ShadingKindJson::Unknown { name } => ShadingKind::Unknown(name),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ColorStopJson {
    pub offset: f64,
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct ShadingArgsJson {
    #[serde(flatten)]
    pub kind: ShadingKindJson,
    #[serde(default)]
    pub stops: Vec<ColorStopJson>,
}

impl From<ShadingArgsJson> for ShadingArgs {
    fn from(args: ShadingArgsJson) -> ShadingArgs {
        ShadingArgs {
            kind: args.kind.into(),
            stops: args
                .stops
                .into_iter()
                .map(|s| ColorStop { offset: s.offset, color: s.color })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PixelKindJson {
    Grayscale1Bpp,
    Rgb24Bpp,
    Rgba32Bpp,
}

impl From<&PixelKindJson> for PixelKind {
    fn from(kind: &PixelKindJson) -> PixelKind {
        match kind {
            PixelKindJson::Grayscale1Bpp => PixelKind::Grayscale1Bpp,
            PixelKindJson::Rgb24Bpp => PixelKind::Rgb24Bpp,
            PixelKindJson::Rgba32Bpp => PixelKind::Rgba32Bpp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageArgsJson {
    pub width: u32,
    pub height: u32,
    pub kind: PixelKindJson,
    /// Base64-encoded packed pixel bytes.
    pub data_base64: String,
    #[serde(default)]
    pub is_mask: bool,
    #[serde(default)]
    pub is_bitmap: bool,
}

impl ImageArgsJson {
    fn decode(&self) -> anyhow::Result<ImageArgs> {
        let data = base64::engine::general_purpose::STANDARD.decode(&self.data_base64)?;
        Ok(ImageArgs {
            width: self.width,
            height: self.height,
            kind: (&self.kind).into(),
            data,
            is_mask: self.is_mask,
            is_bitmap: self.is_bitmap,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TilingPatternArgsJson {
    #[serde(default)]
    pub color: Option<(u8, u8, u8)>,
    pub ops: Vec<OperatorJson>,
    pub matrix: [f64; 6],
    pub bbox: [f64; 4],
    pub xstep: f64,
    pub ystep: f64,
    pub paint_type: u8,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ColorNJson {
    Rgb { r: u8, g: u8, b: u8 },
    Shading { shading: ShadingArgsJson },
    Tiling { tiling: TilingPatternArgsJson },
}

/// One operator as it appears in the JSON input. Named after the PDF
/// content-stream operator it carries, not the internal opcode id, so a
/// hand-written fixture file reads like a content stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum OperatorJson {
    Dependency { id: String },
    Save,
    Restore,
    #[serde(rename = "cm")]
    Transform { matrix: [f64; 6] },
    ConstructPath { path_ops: Vec<PathOpJson>, args: Vec<f64> },
    Fill,
    Stroke,
    FillStroke,
    EoFill,
    EoFillStroke,
    CloseStroke,
    CloseFillStroke,
    CloseEoFillStroke,
    EndPath,
    Clip,
    EoClip,
    BeginText,
    EndText,
    SetCharSpacing { value: f64 },
    SetWordSpacing { value: f64 },
    SetHScale { value: f64 },
    SetLeading { value: f64 },
    SetFont { name: String, size: f64 },
    SetTextRenderingMode { mode: f64 },
    SetTextRise { value: f64 },
    MoveText { tx: f64, ty: f64 },
    SetLeadingMoveText { tx: f64, ty: f64 },
    SetTextMatrix { matrix: [f64; 6] },
    NextLine,
    ShowText { items: Vec<GlyphItemJson> },
    SetFillGray { value: f64 },
    SetStrokeGray { value: f64 },
    SetFillRgbColor { r: u8, g: u8, b: u8 },
    SetStrokeRgbColor { r: u8, g: u8, b: u8 },
    SetFillCmykColor { c: u8, m: u8, y: u8, k: u8 },
    SetStrokeCmykColor { c: u8, m: u8, y: u8, k: u8 },
    SetLineWidth { value: f64 },
    SetLineCap { value: f64 },
    SetLineJoin { value: f64 },
    SetMiterLimit { value: f64 },
    SetDash { array: Vec<f64>, phase: f64 },
    SetGState { entries: Vec<GStateEntryJson> },
    ShadingFill { shading: ShadingArgsJson },
    PaintSolidColorImageMask,
    PaintInlineImageXObject { image: ImageArgsJson },
    PaintImageXObject { id: String },
    PaintImageMaskXObject { image: ImageArgsJson },
    PaintFormXObjectBegin {
        #[serde(default)]
        matrix: Option<[f64; 6]>,
        #[serde(default)]
        bbox: Option<[f64; 4]>,
    },
    PaintFormXObjectEnd,
    BeginMarkedContent,
    EndMarkedContent,
    #[serde(rename = "scn")]
    SetFillColorN {
        #[serde(flatten)]
        color: ColorNJson,
    },
    #[serde(rename = "SCN")]
    SetStrokeColorN {
        #[serde(flatten)]
        color: ColorNJson,
    },
}

fn color_n_args(color: ColorNJson) -> anyhow::Result<Args> {
    Ok(match color {
        ColorNJson::Rgb { r, g, b } => Args::Rgb(r, g, b),
        ColorNJson::Shading { shading } => Args::Shading(shading.into()),
        ColorNJson::Tiling { tiling } => Args::TilingPattern(Box::new(TilingPatternArgs {
            color: tiling.color,
            ops: into_operators(tiling.ops)?,
            matrix: tiling.matrix,
            bbox: tiling.bbox,
            xstep: tiling.xstep,
            ystep: tiling.ystep,
            paint_type: tiling.paint_type,
        })),
    })
}

fn try_into_operator(json: OperatorJson) -> anyhow::Result<Option<Operator>> {
    let operator = match json {
        OperatorJson::Dependency { id } => Operator::new(OpCode::Dependency, Args::ImageRef(id)),
        OperatorJson::Save => Operator::new(OpCode::Save, Args::Unit),
        OperatorJson::Restore => Operator::new(OpCode::Restore, Args::Unit),
        OperatorJson::Transform { matrix } => Operator::new(OpCode::Transform, Args::Transform(matrix)),
        OperatorJson::ConstructPath { path_ops, args } => Operator::new(
            OpCode::ConstructPath,
            Args::ConstructPath { ops: path_ops.iter().map(PathOp::from).collect(), args },
        ),
        OperatorJson::Fill => Operator::new(OpCode::Fill, Args::Unit),
        OperatorJson::Stroke => Operator::new(OpCode::Stroke, Args::Unit),
        OperatorJson::FillStroke => Operator::new(OpCode::FillStroke, Args::Unit),
        OperatorJson::EoFill => Operator::new(OpCode::EoFill, Args::Unit),
        OperatorJson::EoFillStroke => Operator::new(OpCode::EoFillStroke, Args::Unit),
        OperatorJson::CloseStroke => Operator::new(OpCode::CloseStroke, Args::Unit),
        OperatorJson::CloseFillStroke => Operator::new(OpCode::CloseFillStroke, Args::Unit),
        OperatorJson::CloseEoFillStroke => Operator::new(OpCode::CloseEOFillStroke, Args::Unit),
        OperatorJson::EndPath => Operator::new(OpCode::EndPath, Args::Unit),
        OperatorJson::Clip => Operator::new(OpCode::Clip, Args::Unit),
        OperatorJson::EoClip => Operator::new(OpCode::EoClip, Args::Unit),
        OperatorJson::BeginText => Operator::new(OpCode::BeginText, Args::Unit),
        OperatorJson::EndText => Operator::new(OpCode::EndText, Args::Unit),
        OperatorJson::SetCharSpacing { value } => Operator::new(OpCode::SetCharSpacing, Args::F64(value)),
        OperatorJson::SetWordSpacing { value } => Operator::new(OpCode::SetWordSpacing, Args::F64(value)),
        OperatorJson::SetHScale { value } => Operator::new(OpCode::SetHScale, Args::F64(value)),
        OperatorJson::SetLeading { value } => Operator::new(OpCode::SetLeading, Args::F64(value)),
        OperatorJson::SetFont { name, size } => {
            Operator::new(OpCode::SetFont, Args::FontRef { name, size })
        }
        OperatorJson::SetTextRenderingMode { mode } => {
            Operator::new(OpCode::SetTextRenderingMode, Args::F64(mode))
        }
        OperatorJson::SetTextRise { value } => Operator::new(OpCode::SetTextRise, Args::F64(value)),
        OperatorJson::MoveText { tx, ty } => Operator::new(OpCode::MoveText, Args::Point(tx, ty)),
        OperatorJson::SetLeadingMoveText { tx, ty } => {
            Operator::new(OpCode::SetLeadingMoveText, Args::Point(tx, ty))
        }
        OperatorJson::SetTextMatrix { matrix } => {
            Operator::new(OpCode::SetTextMatrix, Args::TextMatrix(matrix))
        }
        OperatorJson::NextLine => Operator::new(OpCode::NextLine, Args::Unit),
        OperatorJson::ShowText { items } => Operator::new(
            OpCode::ShowText,
            Args::ShowText(items.into_iter().map(GlyphItem::from).collect()),
        ),
        OperatorJson::SetFillGray { value } => Operator::new(OpCode::SetFillGray, Args::F64(value)),
        OperatorJson::SetStrokeGray { value } => Operator::new(OpCode::SetStrokeGray, Args::F64(value)),
        OperatorJson::SetFillRgbColor { r, g, b } => {
            Operator::new(OpCode::SetFillRGBColor, Args::Rgb(r, g, b))
        }
        OperatorJson::SetStrokeRgbColor { r, g, b } => {
            Operator::new(OpCode::SetStrokeRGBColor, Args::Rgb(r, g, b))
        }
        OperatorJson::SetFillCmykColor { c, m, y, k } => {
            Operator::new(OpCode::SetFillCMYKColor, Args::Cmyk(c, m, y, k))
        }
        OperatorJson::SetStrokeCmykColor { c, m, y, k } => {
            Operator::new(OpCode::SetStrokeCMYKColor, Args::Cmyk(c, m, y, k))
        }
        OperatorJson::SetLineWidth { value } => Operator::new(OpCode::SetLineWidth, Args::F64(value)),
        OperatorJson::SetLineCap { value } => Operator::new(OpCode::SetLineCap, Args::F64(value)),
        OperatorJson::SetLineJoin { value } => Operator::new(OpCode::SetLineJoin, Args::F64(value)),
        OperatorJson::SetMiterLimit { value } => Operator::new(OpCode::SetMiterLimit, Args::F64(value)),
        OperatorJson::SetDash { array, phase } => {
            Operator::new(OpCode::SetDash, Args::Dash { array, phase })
        }
        OperatorJson::SetGState { entries } => Operator::new(
            OpCode::SetGState,
            Args::GState(entries.into_iter().map(<(String, GStateValue)>::from).collect()),
        ),
        OperatorJson::ShadingFill { shading } => {
            Operator::new(OpCode::ShadingFill, Args::Shading(shading.into()))
        }
        OperatorJson::PaintSolidColorImageMask => {
            Operator::new(OpCode::PaintSolidColorImageMask, Args::Unit)
        }
        OperatorJson::PaintInlineImageXObject { image } => Operator::new(
            OpCode::PaintInlineImageXObject,
            Args::Image(Box::new(image.decode()?)),
        ),
        OperatorJson::PaintImageXObject { id } => {
            Operator::new(OpCode::PaintImageXObject, Args::ImageRef(id))
        }
        OperatorJson::PaintImageMaskXObject { image } => Operator::new(
            OpCode::PaintImageMaskXObject,
            Args::Image(Box::new(image.decode()?)),
        ),
        OperatorJson::PaintFormXObjectBegin { matrix, bbox } => {
            Operator::new(OpCode::PaintFormXObjectBegin, Args::FormXObject { matrix, bbox })
        }
        OperatorJson::PaintFormXObjectEnd => Operator::new(OpCode::PaintFormXObjectEnd, Args::Unit),
        OperatorJson::BeginMarkedContent => Operator::new(OpCode::BeginMarkedContent, Args::Unit),
        OperatorJson::EndMarkedContent => Operator::new(OpCode::EndMarkedContent, Args::Unit),
        OperatorJson::SetFillColorN { color } => {
            Operator::new(OpCode::SetFillColorN, color_n_args(color)?)
        }
        OperatorJson::SetStrokeColorN { color } => {
            Operator::new(OpCode::SetStrokeColorN, color_n_args(color)?)
        }
    };
    Ok(Some(operator))
}

/// Converts a JSON operator list into the flat [`Operator`] vector the
/// driver expects, in order.
pub fn into_operators(json: Vec<OperatorJson>) -> anyhow::Result<Vec<Operator>> {
    let mut out = Vec::with_capacity(json.len());
    for operator in json {
        if let Some(operator) = try_into_operator(operator)? {
            out.push(operator);
        }
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObjectEntryJson {
    Font {
        loaded_name: String,
        #[serde(default)]
        font_matrix: Option<[f64; 6]>,
        #[serde(default)]
        vertical: bool,
        #[serde(default)]
        bold: bool,
        #[serde(default)]
        black: bool,
        #[serde(default)]
        italic: bool,
        #[serde(default)]
        default_v_metrics: Option<[f64; 3]>,
        #[serde(default)]
        missing_file: bool,
        #[serde(default)]
        data_base64: Option<String>,
        #[serde(default)]
        mimetype: Option<String>,
    },
    Image(ImageArgsJson),
}

/// An in-memory [`ObjectStore`] backed by a JSON document's `"objects"` map.
/// Lookups never actually await anything — the whole store was already
/// decoded up front — but the trait is async so this plugs into
/// [`crate::driver::render_page`] exactly like a real PDF-backed store
/// would.
pub struct JsonObjectStore {
    fonts: HashMap<String, FontObject>,
    images: HashMap<String, ImageArgs>,
}

impl JsonObjectStore {
    pub fn from_map(objects: HashMap<String, ObjectEntryJson>) -> anyhow::Result<JsonObjectStore> {
        let mut fonts = HashMap::new();
        let mut images = HashMap::new();
        for (id, entry) in objects {
            match entry {
                ObjectEntryJson::Font {
                    loaded_name,
                    font_matrix,
                    vertical,
                    bold,
                    black,
                    italic,
                    default_v_metrics,
                    missing_file,
                    data_base64,
                    mimetype,
                } => {
                    let data = data_base64
                        .map(|b64| base64::engine::general_purpose::STANDARD.decode(b64))
                        .transpose()?;
                    fonts.insert(
                        id,
                        FontObject {
                            loaded_name,
                            font_matrix,
                            vertical,
                            bold,
                            black,
                            italic,
                            default_v_metrics,
                            missing_file,
                            data,
                            mimetype,
                        },
                    );
                }
                ObjectEntryJson::Image(image) => {
                    images.insert(id, image.decode()?);
                }
            }
        }
        Ok(JsonObjectStore { fonts, images })
    }
}

#[async_trait]
impl ObjectStore for JsonObjectStore {
    async fn get_font(&self, id: &str) -> Option<FontObject> {
        self.fonts.get(id).cloned()
    }

    async fn get_image(&self, id: &str) -> Option<ImageArgs> {
        self.images.get(id).cloned()
    }
}
