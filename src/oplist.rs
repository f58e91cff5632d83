//! Opcode ids and the save/restore flattener.
//!
//! The operator list arrives as two parallel arrays, `fnArray`/`argsArray`
//! in the driver's terms; here that is a `Vec<Op>` where each [`Op`] pairs
//! an opcode with its already-decoded argument payload (see
//! [`crate::interpreter`] for how each `Args` variant is consumed).

use crate::error::{Error, Result};
use crate::state::{GlyphItem, ImageArgs, TilingPatternArgs};

/// Stable opcode ids. Never renumber — operator-list producers depend on
/// these staying fixed across versions. `Dependency` is 1; `Group` (92) is
/// synthetic, emitted only by [`flatten`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Dependency = 1,
    Save = 2,
    Restore = 3,
    Transform = 4,
    ConstructPath = 5,
    Fill = 6,
    Stroke = 7,
    FillStroke = 8,
    EoFill = 9,
    EoFillStroke = 10,
    CloseStroke = 11,
    CloseFillStroke = 12,
    CloseEOFillStroke = 13,
    EndPath = 14,
    Clip = 15,
    EoClip = 16,
    BeginText = 17,
    EndText = 18,
    SetCharSpacing = 19,
    SetWordSpacing = 20,
    SetHScale = 21,
    SetLeading = 22,
    SetFont = 23,
    SetTextRenderingMode = 24,
    SetTextRise = 25,
    MoveText = 26,
    SetLeadingMoveText = 27,
    SetTextMatrix = 28,
    NextLine = 29,
    ShowText = 30,
    SetFillGray = 31,
    SetStrokeGray = 32,
    SetFillRGBColor = 33,
    SetStrokeRGBColor = 34,
    SetFillCMYKColor = 35,
    SetStrokeCMYKColor = 36,
    SetLineWidth = 37,
    SetLineCap = 38,
    SetLineJoin = 39,
    SetMiterLimit = 40,
    SetDash = 41,
    SetGState = 42,
    ShadingFill = 43,
    PaintSolidColorImageMask = 44,
    PaintInlineImageXObject = 45,
    PaintImageXObject = 46,
    PaintImageMaskXObject = 47,
    PaintFormXObjectBegin = 48,
    PaintFormXObjectEnd = 49,
    BeginMarkedContent = 50,
    EndMarkedContent = 51,
    /// `scn`: sets the fill color to a plain color, a shading pattern, or a
    /// tiling pattern (spec.md §4.7); carries `Args::Rgb`, `Args::Shading`
    /// or `Args::TilingPattern` depending on which was specified.
    SetFillColorN = 52,
    /// `SCN`, the stroke-color counterpart of [`OpCode::SetFillColorN`].
    SetStrokeColorN = 53,
    /// Synthetic: wraps a balanced save/restore range. Emitted only by
    /// [`flatten`], never by an operator-list producer.
    Group = 92,
}

/// Path construction sub-opcodes consumed inside a single `ConstructPath`
/// operator's argument payload (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOp {
    Rectangle,
    MoveTo,
    LineTo,
    CurveTo,
    CurveTo2,
    CurveTo3,
    ClosePath,
}

/// Decoded arguments for one operator. One variant per spec.md opcode
/// family; operators with no payload (e.g. `fill`) carry `Unit`.
#[derive(Debug, Clone)]
pub enum Args {
    Unit,
    Transform([f64; 6]),
    ConstructPath { ops: Vec<PathOp>, args: Vec<f64> },
    F64(f64),
    Point(f64, f64),
    Bool(bool),
    FontRef { name: String, size: f64 },
    TextMatrix([f64; 6]),
    ShowText(Vec<GlyphItem>),
    Rgb(u8, u8, u8),
    Cmyk(u8, u8, u8, u8),
    Dash { array: Vec<f64>, phase: f64 },
    GState(Vec<(String, GStateValue)>),
    Shading(crate::pattern::ShadingArgs),
    TilingPattern(Box<TilingPatternArgs>),
    Image(Box<ImageArgs>),
    ImageRef(String),
    FormXObject { matrix: Option<[f64; 6]>, bbox: Option<[f64; 4]> },
    Children(Vec<Operator>),
}

/// One value in a `setGState` parameter dictionary (spec.md §4.8).
#[derive(Debug, Clone)]
pub enum GStateValue {
    F64(f64),
    Dash { array: Vec<f64>, phase: f64 },
    Font { name: String, size: f64 },
}

/// A single flattened operator: an opcode plus its decoded arguments.
#[derive(Debug, Clone)]
pub struct Operator {
    pub op: OpCode,
    pub args: Args,
}

impl Operator {
    pub fn new(op: OpCode, args: Args) -> Operator {
        Operator { op, args }
    }
}

/// Consumes a flat operator-list (with balanced `save`/`restore` markers)
/// and produces a tree: every `save...restore` range becomes a synthetic
/// [`OpCode::Group`] operator wrapping its children (spec.md §4.1).
///
/// Unbalanced trailing `save`s are tolerated: any group left open at the
/// end of the input is closed implicitly, matching the policy note in
/// spec.md §4.1 that the upstream producer emits balanced streams and this
/// is a defensive fallback, not the expected path.
///
/// A `restore` with no matching `save` (popping the root list itself) is a
/// balanced-stack violation and is fatal (spec.md §7 "programmer error;
/// treat as fatal"), reported rather than panicked on.
pub fn flatten(flat: Vec<Operator>) -> Result<Vec<Operator>> {
    let mut stack: Vec<Vec<Operator>> = vec![Vec::new()];

    for operator in flat {
        match operator.op {
            OpCode::Save => {
                stack.push(Vec::new());
            }
            OpCode::Restore => {
                if stack.len() < 2 {
                    return Err(Error::StackImbalance);
                }
                let children = stack.pop().unwrap();
                let parent = stack.last_mut().unwrap();
                parent.push(Operator::new(OpCode::Group, Args::Children(children)));
            }
            _ => {
                stack.last_mut().unwrap().push(operator);
            }
        }
    }

    // Tolerant close of any groups left open by unbalanced trailing saves.
    while stack.len() > 1 {
        let children = stack.pop().unwrap();
        let parent = stack.last_mut().unwrap();
        parent.push(Operator::new(OpCode::Group, Args::Children(children)));
    }

    Ok(stack.pop().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(code: OpCode) -> Operator {
        Operator::new(code, Args::Unit)
    }

    #[test]
    fn flattens_two_sibling_groups() {
        // save A restore save B restore
        let flat = vec![
            op(OpCode::Save),
            op(OpCode::Fill), // stand-in for "A"
            op(OpCode::Restore),
            op(OpCode::Save),
            op(OpCode::Stroke), // stand-in for "B"
            op(OpCode::Restore),
        ];
        let tree = flatten(flat).unwrap();
        assert_eq!(tree.len(), 2);
        for operator in &tree {
            assert_eq!(operator.op, OpCode::Group);
        }
        match &tree[0].args {
            Args::Children(children) => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].op, OpCode::Fill);
            }
            _ => panic!("expected Children"),
        }
        match &tree[1].args {
            Args::Children(children) => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].op, OpCode::Stroke);
            }
            _ => panic!("expected Children"),
        }
    }

    #[test]
    fn top_level_operators_without_save_stay_flat() {
        let flat = vec![op(OpCode::Fill), op(OpCode::Stroke)];
        let tree = flatten(flat).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].op, OpCode::Fill);
        assert_eq!(tree[1].op, OpCode::Stroke);
    }

    #[test]
    fn nested_save_restore_produces_nested_groups() {
        let flat = vec![
            op(OpCode::Save),
            op(OpCode::Fill),
            op(OpCode::Save),
            op(OpCode::Stroke),
            op(OpCode::Restore),
            op(OpCode::Restore),
        ];
        let tree = flatten(flat).unwrap();
        assert_eq!(tree.len(), 1);
        match &tree[0].args {
            Args::Children(outer) => {
                assert_eq!(outer.len(), 2);
                assert_eq!(outer[0].op, OpCode::Fill);
                assert_eq!(outer[1].op, OpCode::Group);
            }
            _ => panic!("expected Children"),
        }
    }

    #[test]
    fn unbalanced_trailing_save_is_closed_tolerantly() {
        let flat = vec![op(OpCode::Save), op(OpCode::Fill)];
        let tree = flatten(flat).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].op, OpCode::Group);
    }

    #[test]
    fn restore_without_matching_save_is_a_stack_imbalance_error() {
        let flat = vec![op(OpCode::Fill), op(OpCode::Restore)];
        let result = flatten(flat);
        assert!(matches!(result, Err(Error::StackImbalance)));
    }
}
