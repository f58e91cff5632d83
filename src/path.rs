//! Path construction and painting (spec.md §4.5).

use crate::format::pf;
use crate::matrix::{Matrix, Rect};
use crate::oplist::PathOp;
use crate::state::GraphicsState;
use crate::svgtree::{Document, Node};

/// The viewport the page renders into: size plus its base transform
/// (spec.md §3 "viewport").
#[derive(Debug, Clone)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub transform: Matrix,
}

/// Builds SVG path-data tokens from a `constructPath` sub-opcode sequence,
/// tracking the running current point the way PDF path construction does.
///
/// Returns the `d`-fragment and the new current point.
fn build_path_data(ops: &[PathOp], args: &[f64], start: (f64, f64)) -> (String, (f64, f64)) {
    let mut d = String::new();
    let mut i = 0usize;
    let (mut x, mut y) = start;

    for op in ops {
        match op {
            PathOp::Rectangle => {
                let (rx, ry, w, h) = (args[i], args[i + 1], args[i + 2], args[i + 3]);
                i += 4;
                d.push_str(&format!(
                    "M {} {} L {} {} L {} {} L {} {} Z ",
                    pf(rx),
                    pf(ry),
                    pf(rx + w),
                    pf(ry),
                    pf(rx + w),
                    pf(ry + h),
                    pf(rx),
                    pf(ry + h)
                ));
                x = rx;
                y = ry;
            }
            PathOp::MoveTo => {
                x = args[i];
                y = args[i + 1];
                i += 2;
                d.push_str(&format!("M {} {} ", pf(x), pf(y)));
            }
            PathOp::LineTo => {
                x = args[i];
                y = args[i + 1];
                i += 2;
                d.push_str(&format!("L {} {} ", pf(x), pf(y)));
            }
            PathOp::CurveTo => {
                let (x1, y1, x2, y2, x3, y3) =
                    (args[i], args[i + 1], args[i + 2], args[i + 3], args[i + 4], args[i + 5]);
                i += 6;
                d.push_str(&format!(
                    "C {} {} {} {} {} {} ",
                    pf(x1),
                    pf(y1),
                    pf(x2),
                    pf(y2),
                    pf(x3),
                    pf(y3)
                ));
                x = x3;
                y = y3;
            }
            PathOp::CurveTo2 => {
                // First control point equals the current point.
                let (x2, y2, x3, y3) = (args[i], args[i + 1], args[i + 2], args[i + 3]);
                i += 4;
                d.push_str(&format!("C {} {} {} {} {} {} ", pf(x), pf(y), pf(x2), pf(y2), pf(x3), pf(y3)));
                x = x3;
                y = y3;
            }
            PathOp::CurveTo3 => {
                // Second control point equals the endpoint.
                let (x1, y1, x3, y3) = (args[i], args[i + 1], args[i + 2], args[i + 3]);
                i += 4;
                d.push_str(&format!("C {} {} {} {} {} {} ", pf(x1), pf(y1), pf(x3), pf(y3), pf(x3), pf(y3)));
                x = x3;
                y = y3;
            }
            PathOp::ClosePath => {
                d.push_str("Z ");
            }
        }
    }

    (d.trim_end().to_string(), (x, y))
}

/// Handles one `constructPath` operator: creates a fresh `<path>` node, or
/// concatenates onto the existing one when the new sub-path continues it
/// (spec.md §4.5 "If a path node already exists...").
pub fn construct_path(doc: &Document, state: &mut GraphicsState, ops: &[PathOp], args: &[f64]) {
    let (fragment, (nx, ny)) = build_path_data(ops, args, (state.x, state.y));
    state.x = nx;
    state.y = ny;

    let starts_fresh = matches!(ops.first(), Some(PathOp::Rectangle) | Some(PathOp::MoveTo));

    match (&state.path, starts_fresh) {
        (Some(existing), false) => {
            let d = existing.get_attr("d").unwrap_or_default();
            existing.set_attr("d", format!("{} {}", d, fragment));
        }
        _ => {
            let node = doc.create_element("path");
            node.set_attr("d", fragment);
            state.path = Some(node.clone());
            state.element = Some(node);
        }
    }
}

/// Which paint operator finished the path (spec.md §4.5 "Paint
/// operators").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintKind {
    Fill,
    Stroke,
    FillStroke,
    EoFill,
    EoFillStroke,
}

/// Appends `Z` to the in-progress path's `d`, for the `close*` operator
/// variants (spec.md §4.5 "close* variants").
pub fn close_current_subpath(state: &GraphicsState) {
    if let Some(path) = &state.element {
        let d = path.get_attr("d").unwrap_or_default();
        path.set_attr("d", format!("{} Z", d));
    }
}

/// Paints (fills/strokes) the current path and appends it to `parent`
/// unless overlay suppression drops it, or the path was never painted at
/// all (spec.md §4.5 "Overlay suppression", "Stroke attributes"). Clears
/// `state.path`/`state.element` afterward (`endPath`).
///
/// `kind == None` is the `endPath` operator (`n`): a path built purely to
/// establish a clip region (`re W n`) with no `fill`/`stroke` of its own.
/// Such a path carries no paint attributes, and an SVG `<path>` with no
/// `fill` defaults to `fill:black`, so it must be discarded rather than
/// appended unpainted.
pub fn end_path(
    doc: &Document,
    parent: &Node,
    state: &mut GraphicsState,
    kind: Option<PaintKind>,
    ctm: &Matrix,
    viewport: &Viewport,
    in_text_stroke_scale: Option<f64>,
) {
    let Some(element) = state.element.take() else {
        state.path = None;
        return;
    };
    state.path = None;

    let Some(kind) = kind else {
        return;
    };

    apply_paint(doc, &element, state, kind, in_text_stroke_scale);

    if should_suppress_overlay(&element, ctm, viewport) {
        return;
    }

    parent.append_child(&element);
}

/// Applies the full `stroke-*` attribute set (spec.md §4.5 "Stroke
/// attributes"), shared between path strokes and stroked text (spec.md
/// §4.6: "STROKE adds stroke attributes with `lineWidthScale = 1/
/// textMatrixScale`"). `scale` multiplies line-width and dash values; a
/// path stroke passes `1.0`, a text stroke passes `1/textMatrixScale`.
pub(crate) fn apply_stroke_attrs(element: &Node, state: &GraphicsState, scale: f64) {
    element.set_attr("fill", "none");
    element.set_attr("stroke", state.stroke_color.clone());
    element.set_attr("stroke-opacity", pf(state.stroke_alpha));
    element.set_attr("stroke-miterlimit", pf(state.miter_limit));
    element.set_attr("stroke-linecap", state.line_cap.as_svg());
    element.set_attr("stroke-linejoin", state.line_join.as_svg());
    element.set_attr("stroke-width", pf(state.line_width * scale));
    if !state.dash_array.is_empty() {
        let scaled: Vec<String> = state.dash_array.iter().map(|v| pf(v * scale)).collect();
        element.set_attr("stroke-dasharray", scaled.join(" "));
        element.set_attr("stroke-dashoffset", pf(state.dash_phase * scale));
    }
}

fn apply_paint(
    _doc: &Document,
    element: &Node,
    state: &GraphicsState,
    kind: PaintKind,
    in_text_stroke_scale: Option<f64>,
) {
    let stroke_scale = in_text_stroke_scale.unwrap_or(1.0);

    let set_fill_attrs = |element: &Node| {
        element.set_attr("fill", state.fill_color.clone());
        element.set_attr("fill-opacity", pf(state.fill_alpha));
    };

    match kind {
        PaintKind::Fill => set_fill_attrs(element),
        PaintKind::Stroke => apply_stroke_attrs(element, state, stroke_scale),
        PaintKind::FillStroke => {
            // Order matters: stroke first forces fill=none, fill then
            // overwrites it (spec.md §4.5 "fillStroke").
            apply_stroke_attrs(element, state, stroke_scale);
            set_fill_attrs(element);
        }
        PaintKind::EoFill => {
            element.set_attr("fill-rule", "evenodd");
            set_fill_attrs(element);
        }
        PaintKind::EoFillStroke => {
            element.set_attr("fill-rule", "evenodd");
            apply_stroke_attrs(element, state, stroke_scale);
            set_fill_attrs(element);
        }
    }
}

/// Computes a conservative (control-point-superset) bounding box of the
/// path's `d` attribute and checks whether it covers the viewport to
/// within one user unit. A superset bbox can only make suppression *more*
/// conservative, never drop a path that a tight curve-extrema bbox
/// wouldn't also have dropped for a background-sized rectangle, which is
/// the only shape this heuristic targets in practice.
///
/// Only ever called for a path that has a paint `kind` (an unpainted,
/// `endPath`-only path is discarded before reaching here, see
/// [`end_path`]).
fn should_suppress_overlay(element: &Node, ctm: &Matrix, viewport: &Viewport) -> bool {
    let Some(d) = element.get_attr("d") else { return false };
    let points = parse_path_points(&d);
    if points.is_empty() {
        return false;
    }

    // spec.md §4.5: "transform the current path through `viewport.transform
    // ∘ transformMatrix`" — under this crate's `Matrix::compose` convention
    // (`self` applied first, `other` second), that's the CTM applied first,
    // the viewport's base transform second.
    let full = ctm.compose(&viewport.transform);
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (x, y) in points {
        let (tx, ty) = full.apply(x, y);
        min_x = min_x.min(tx);
        min_y = min_y.min(ty);
        max_x = max_x.max(tx);
        max_y = max_y.max(ty);
    }
    let bbox = Rect::new(min_x, min_y, max_x, max_y);
    let viewport_rect = Rect::new(0.0, 0.0, viewport.width, viewport.height);
    bbox.covers(&viewport_rect, 1.0)
}

fn parse_path_points(d: &str) -> Vec<(f64, f64)> {
    let mut points = Vec::new();
    let tokens: Vec<&str> = d.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "M" | "L" => {
                if i + 2 < tokens.len() {
                    if let (Ok(x), Ok(y)) =
                        (tokens[i + 1].parse::<f64>(), tokens[i + 2].parse::<f64>())
                    {
                        points.push((x, y));
                    }
                }
                i += 3;
            }
            "C" => {
                if i + 6 < tokens.len() {
                    for pair in 0..3 {
                        if let (Ok(x), Ok(y)) = (
                            tokens[i + 1 + pair * 2].parse::<f64>(),
                            tokens[i + 2 + pair * 2].parse::<f64>(),
                        ) {
                            points.push((x, y));
                        }
                    }
                }
                i += 7;
            }
            "Z" => {
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new(100.0, 100.0)
    }

    #[test]
    fn rectangle_expands_to_move_line_line_line_close() {
        let d = Document::new(100.0, 100.0);
        let mut state = GraphicsState::default();
        construct_path(&d, &mut state, &[PathOp::Rectangle], &[10.0, 20.0, 30.0, 40.0]);
        let path = state.element.as_ref().unwrap();
        assert_eq!(path.get_attr("d").unwrap(), "M 10 20 L 40 20 L 40 60 L 10 60 Z");
    }

    #[test]
    fn continuing_subpath_concatenates_onto_existing_path() {
        let d = doc();
        let mut state = GraphicsState::default();
        construct_path(&d, &mut state, &[PathOp::MoveTo], &[0.0, 0.0]);
        let first_node = state.path.clone().unwrap();
        construct_path(&d, &mut state, &[PathOp::LineTo], &[10.0, 10.0]);
        let second_node = state.path.clone().unwrap();
        assert!(first_node.ptr_eq(&second_node));
        assert_eq!(second_node.get_attr("d").unwrap(), "M 0 0 L 10 10");
    }

    #[test]
    fn fill_sets_color_and_opacity() {
        let d = doc();
        let mut state = GraphicsState::default();
        state.fill_color = "#ff0000".to_string();
        construct_path(&d, &mut state, &[PathOp::Rectangle], &[10.0, 20.0, 30.0, 40.0]);
        let viewport =
            Viewport { width: 100.0, height: 100.0, transform: Matrix::IDENTITY };
        end_path(&d, &d.root, &mut state, Some(PaintKind::Fill), &Matrix::IDENTITY, &viewport, None);
        let path = d.root.first_child().unwrap();
        assert_eq!(path.get_attr("fill").unwrap(), "#ff0000");
        assert_eq!(path.get_attr("fill-opacity").unwrap(), "1");
    }

    #[test]
    fn full_viewport_path_is_suppressed() {
        let d = doc();
        let mut state = GraphicsState::default();
        construct_path(&d, &mut state, &[PathOp::Rectangle], &[0.0, 0.0, 100.0, 100.0]);
        let viewport =
            Viewport { width: 100.0, height: 100.0, transform: Matrix::IDENTITY };
        end_path(&d, &d.root, &mut state, Some(PaintKind::Fill), &Matrix::IDENTITY, &viewport, None);
        assert_eq!(d.root.child_count(), 0);
    }

    #[test]
    fn small_path_is_not_suppressed() {
        let d = doc();
        let mut state = GraphicsState::default();
        construct_path(&d, &mut state, &[PathOp::Rectangle], &[10.0, 10.0, 20.0, 20.0]);
        let viewport =
            Viewport { width: 100.0, height: 100.0, transform: Matrix::IDENTITY };
        end_path(&d, &d.root, &mut state, Some(PaintKind::Fill), &Matrix::IDENTITY, &viewport, None);
        assert_eq!(d.root.child_count(), 1);
    }

    #[test]
    fn unpainted_end_path_is_discarded_not_appended() {
        // `endPath` (PDF `n`), as used after `re W n` to set up a clip
        // region: the path carries no fill/stroke and must never reach the
        // output, or it would render as a spurious solid-black shape.
        let d = doc();
        let mut state = GraphicsState::default();
        construct_path(&d, &mut state, &[PathOp::Rectangle], &[10.0, 10.0, 20.0, 20.0]);
        let viewport = Viewport { width: 100.0, height: 100.0, transform: Matrix::IDENTITY };
        end_path(&d, &d.root, &mut state, None, &Matrix::IDENTITY, &viewport, None);
        assert_eq!(d.root.child_count(), 0);
        assert!(state.element.is_none());
    }

    #[test]
    fn full_viewport_path_is_suppressed_under_non_identity_viewport() {
        // A Y-flipping viewport transform, the common case: a page-sized
        // rectangle in user space must still be recognized as covering the
        // device-space viewport once both the CTM and the viewport's own
        // transform are applied in the right order.
        let d = doc();
        let mut state = GraphicsState::default();
        construct_path(&d, &mut state, &[PathOp::Rectangle], &[0.0, 0.0, 100.0, 100.0]);
        let viewport = Viewport {
            width: 100.0,
            height: 100.0,
            transform: Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, 100.0),
        };
        end_path(&d, &d.root, &mut state, Some(PaintKind::Fill), &Matrix::IDENTITY, &viewport, None);
        assert_eq!(d.root.child_count(), 0);
    }
}
