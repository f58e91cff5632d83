//! Text emission: the `beginText`/`moveText`/`setFont`/`showText`/
//! `setTextMatrix` state machine (spec.md §4.6).

use base64::Engine;

use crate::format::{pf, pm};
use crate::matrix::Matrix;
use crate::objects::FontObject;
use crate::path;
use crate::state::{FontStyle, FontWeight, GraphicsState, TextRenderingMode};
use crate::svgtree::{Document, Node};

/// `beginText`, `moveText` (`Td`) and `setTextMatrix` (`Tm`) all reset the
/// in-progress tspan buffers (spec.md §4.6 "Begin/move/setMatrix").
pub fn begin_text(state: &mut GraphicsState) {
    state.reset_text_buffers();
    state.text_node = None;
}

/// `Td`: `line_matrix' = translate(tx, ty) ∘ line_matrix`; `text_matrix`
/// follows it.
pub fn move_text(state: &mut GraphicsState, tx: f64, ty: f64) {
    state.reset_text_buffers();
    let translation = Matrix::new(1.0, 0.0, 0.0, 1.0, tx, ty);
    state.line_matrix = translation.compose(&state.line_matrix);
    state.text_matrix = state.line_matrix;
    state.line_x = tx;
    state.line_y = ty;
}

/// `TD` (`setLeadingMoveText`): leading is set to `-ty`, then behaves like
/// `Td`.
pub fn set_leading_move_text(state: &mut GraphicsState, tx: f64, ty: f64) {
    state.leading = -ty;
    move_text(state, tx, ty);
}

/// `TL` (`setLeading`): stores the negated value (spec.md §8 invariant 14,
/// §9 Open Question — preserved exactly as observed).
pub fn set_leading(state: &mut GraphicsState, leading: f64) {
    state.leading = -leading;
}

/// `T*` (`nextLine`) is `moveText(0, leading)` using the already-negated
/// stored leading value, with no further negation.
pub fn next_line(state: &mut GraphicsState) {
    move_text(state, 0.0, state.leading);
}

/// `Tm` (`setTextMatrix`): stores the matrix directly and zeroes text/line
/// origin.
pub fn set_text_matrix(state: &mut GraphicsState, m: [f64; 6]) {
    state.reset_text_buffers();
    let matrix = Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5]);
    state.text_matrix = matrix;
    state.line_matrix = matrix;
    state.text_matrix_scale = m[0].hypot(m[1]);
    state.line_x = 0.0;
    state.line_y = 0.0;
}

/// `Tf` (`setFont`): resolves weight/style/direction from the font object.
/// Negative `size` flips `font_direction` to `-1` and stores `|size|`
/// (spec.md §8 invariant 11).
pub fn set_font(state: &mut GraphicsState, font: std::sync::Arc<FontObject>, size: f64) {
    state.font_direction = if size < 0.0 { -1.0 } else { 1.0 };
    state.font_size = size.abs();
    state.font_size_scale = state.font_size;
    if let Some(matrix) = font.font_matrix {
        state.font_matrix =
            Matrix::new(matrix[0], matrix[1], matrix[2], matrix[3], matrix[4], matrix[5]);
    } else {
        state.font_matrix = Matrix::FONT_IDENTITY;
    }
    state.font_family = font.loaded_name.clone();
    state.font_weight = if font.black {
        FontWeight::Black
    } else if font.bold {
        FontWeight::Bold
    } else {
        FontWeight::Normal
    };
    state.font_style = if font.italic { FontStyle::Italic } else { FontStyle::Normal };
    state.font = Some(font);
}

/// Embeds a `@font-face` rule for `font` into `defs` as a `<style>` child,
/// using a base64 `data:` URI for the font program (spec.md §4.6
/// "Optionally embed a `@font-face` rule").
pub fn embed_font_face(doc: &Document, defs: &Node, font: &FontObject) {
    let (Some(data), Some(mimetype)) = (&font.data, &font.mimetype) else { return };
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    let style = doc.create_element("style");
    style.set_text(format!(
        "@font-face {{ font-family: \"{}\"; src: url(data:{};base64,{}); }}",
        font.loaded_name, mimetype, encoded
    ));
    defs.append_child(&style);
}

use crate::state::GlyphItem;

/// Runs one `showText` operator: appends glyph advances to the pending
/// `<tspan>`, then finalizes and appends the `<text>` element to `parent`
/// (the current transform group) if this is the first `showText` in the
/// current text object (spec.md §4.6 "showText").
pub fn show_text(doc: &Document, state: &mut GraphicsState, parent: &Node, items: &[GlyphItem]) {
    let vertical = state.font.as_ref().map(|f| f.vertical).unwrap_or(false);
    let spacing_dir = if vertical { 1.0 } else { -1.0 };
    let width_advance_scale = state.font_size * state.font_matrix.a;
    let missing_file = state.font.as_ref().map(|f| f.missing_file).unwrap_or(true);

    let tspan = state.pending_tspan.clone().unwrap_or_else(|| doc.create_element("tspan"));
    state.pending_tspan = Some(tspan.clone());

    let mut x = 0.0f64;
    let mut text_content = String::new();

    for item in items {
        match item {
            GlyphItem::WordBreak => {
                x += state.font_direction * state.word_spacing;
            }
            GlyphItem::Adjust(k) => {
                x += spacing_dir * k * state.font_size / 1000.0;
            }
            GlyphItem::Glyph { is_space, is_in_font, font_char, width, vmetric } => {
                let spacing = (if *is_space { state.word_spacing } else { 0.0 }) + state.char_spacing;
                let (scaled_x, scaled_y, char_width);
                if !vertical {
                    scaled_x = x / state.font_size_scale;
                    scaled_y = 0.0;
                    char_width = width * width_advance_scale + spacing * state.font_direction;
                } else {
                    // A glyph missing its own vmetric falls back to the font's
                    // default before falling back further to the half-width/
                    // zero/width literal defaults below.
                    let vm = vmetric.or_else(|| state.font.as_ref().and_then(|f| f.default_v_metrics));
                    let vx = -(vm.map(|v| v[1]).unwrap_or(width * 0.5)) * width_advance_scale;
                    let vy = vm.map(|v| v[2]).unwrap_or(0.0) * width_advance_scale;
                    scaled_x = vx / state.font_size_scale;
                    scaled_y = (x + vy) / state.font_size_scale;
                    let effective_width = -(vm.map(|v| v[0]).unwrap_or(*width));
                    char_width = effective_width * width_advance_scale - spacing * state.font_direction;
                }

                if *is_in_font || missing_file {
                    state.xcoords.push(state.x + scaled_x);
                    if vertical {
                        state.ycoords.push(-state.y + scaled_y);
                    }
                    text_content.push_str(font_char);
                }

                x += char_width;
            }
        }
    }

    tspan.set_attr("x", state.xcoords.iter().map(|v| pf(*v)).collect::<Vec<_>>().join(" "));
    if vertical {
        tspan.set_attr("y", state.ycoords.iter().map(|v| pf(*v)).collect::<Vec<_>>().join(" "));
    } else {
        tspan.set_attr("y", pf(-state.y));
    }
    if !text_content.is_empty() {
        let existing = tspan.get_text().unwrap_or_default();
        tspan.set_text(format!("{}{}", existing, text_content));
    }

    if vertical {
        state.y -= x;
    } else {
        state.x += x * state.text_hscale;
    }

    let text_node = match state.text_node.clone() {
        Some(node) => node,
        None => {
            let node = doc.create_element("text");
            state.text_node = Some(node.clone());
            node
        }
    };
    if text_node.child_count() == 0 {
        text_node.append_child(&tspan);
    }

    text_node.set_attr("font-family", state.font_family.clone());
    text_node.set_attr("font-size", pf(state.font_size));
    if state.font_style == FontStyle::Italic {
        text_node.set_attr("font-style", state.font_style.as_svg());
    }
    if state.font_weight != FontWeight::Normal {
        text_node.set_attr("font-weight", state.font_weight.as_svg());
    }

    match state.text_rendering_mode {
        TextRenderingMode::Fill => {
            text_node.set_attr("fill", state.fill_color.clone());
        }
        TextRenderingMode::Stroke => {
            apply_text_stroke(&text_node, state);
        }
        TextRenderingMode::FillStroke => {
            apply_text_stroke(&text_node, state);
            text_node.set_attr("fill", state.fill_color.clone());
        }
        TextRenderingMode::AddToPath => {
            text_node.set_attr("fill", "transparent");
        }
        TextRenderingMode::Invisible => {
            text_node.set_attr("fill", "none");
        }
    }

    let mut matrix = state.text_matrix;
    if state.text_rise != 0.0 {
        matrix.f += state.text_rise;
    }
    text_node.set_attr(
        "transform",
        format!("{} scale({} -1)", pm(&matrix), pf(state.text_hscale)),
    );
    text_node.set_attr("xml:space", "preserve");

    if !text_node.has_parent() {
        parent.append_child(&text_node);
    }
}

/// Stroked text uses the same full stroke-attribute set as a stroked path
/// (spec.md §4.5 "Stroke attributes", reused per §4.6's "STROKE adds stroke
/// attributes with `lineWidthScale = 1/textMatrixScale`"), scaled by the
/// inverse text-matrix scale instead of `1.0`.
fn apply_text_stroke(text_node: &Node, state: &GraphicsState) {
    let line_width_scale =
        if state.text_matrix_scale != 0.0 { 1.0 / state.text_matrix_scale } else { 1.0 };
    path::apply_stroke_attrs(text_node, state, line_width_scale);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LineCap, LineJoin};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn font(vertical: bool) -> Arc<FontObject> {
        font_with_default_v_metrics(vertical, None)
    }

    fn font_with_default_v_metrics(vertical: bool, default_v_metrics: Option<[f64; 3]>) -> Arc<FontObject> {
        Arc::new(FontObject {
            loaded_name: "F1".to_string(),
            font_matrix: None,
            vertical,
            bold: false,
            black: false,
            italic: false,
            default_v_metrics,
            missing_file: false,
            data: None,
            mimetype: None,
        })
    }

    #[test]
    fn negative_font_size_flips_direction() {
        let mut state = GraphicsState::default();
        set_font(&mut state, font(false), -12.0);
        assert_eq!(state.font_direction, -1.0);
        assert_eq!(state.font_size, 12.0);
    }

    #[test]
    fn set_leading_stores_negated_value_and_next_line_uses_it() {
        let mut state = GraphicsState::default();
        set_leading(&mut state, 14.0);
        assert_eq!(state.leading, -14.0);
        next_line(&mut state);
        // moveText(0, -14) shifted the line matrix's f by -14.
        assert_eq!(state.line_matrix.f, -14.0);
    }

    #[test]
    fn horizontal_show_text_appends_text_node_once() {
        let doc = Document::new(100.0, 100.0);
        let mut state = GraphicsState::default();
        set_font(&mut state, font(false), 12.0);
        begin_text(&mut state);
        set_text_matrix(&mut state, [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

        let items = vec![GlyphItem::Glyph {
            is_space: false,
            is_in_font: true,
            font_char: "A".to_string(),
            width: 500.0,
            vmetric: None,
        }];
        show_text(&doc, &mut state, &doc.root, &items);
        assert_eq!(doc.root.child_count(), 1);
        let text_node = doc.root.first_child().unwrap();
        assert_eq!(text_node.tag(), "text");

        // A second showText call in the same text object must not append
        // the <text> node again.
        show_text(&doc, &mut state, &doc.root, &items);
        assert_eq!(doc.root.child_count(), 1);
    }

    #[test]
    fn vertical_glyph_uses_vmetric_for_positioning() {
        let doc = Document::new(100.0, 100.0);
        let mut state = GraphicsState::default();
        set_font(&mut state, font(true), 12.0);
        begin_text(&mut state);
        set_text_matrix(&mut state, [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

        let items = vec![GlyphItem::Glyph {
            is_space: false,
            is_in_font: true,
            font_char: "\u{3042}".to_string(),
            width: 1000.0,
            vmetric: Some([1000.0, 500.0, 880.0]),
        }];
        show_text(&doc, &mut state, &doc.root, &items);
        let tspan = doc.root.first_child().unwrap().first_child().unwrap();
        assert_eq!(tspan.get_text().unwrap(), "\u{3042}");
        assert!(!tspan.get_attr("x").unwrap().is_empty());
        assert!(!tspan.get_attr("y").unwrap().is_empty());
    }

    #[test]
    fn vertical_glyph_without_its_own_vmetric_falls_back_to_font_default() {
        let doc = Document::new(100.0, 100.0);
        let mut state = GraphicsState::default();
        set_font(&mut state, font_with_default_v_metrics(true, Some([1000.0, 500.0, 880.0])), 12.0);
        begin_text(&mut state);
        set_text_matrix(&mut state, [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

        let with_font_default = vec![GlyphItem::Glyph {
            is_space: false,
            is_in_font: true,
            font_char: "\u{3042}".to_string(),
            width: 1000.0,
            vmetric: None,
        }];
        show_text(&doc, &mut state, &doc.root, &with_font_default);
        let tspan_a = doc.root.first_child().unwrap().first_child().unwrap();
        let (x_a, y_a) = (tspan_a.get_attr("x").unwrap(), tspan_a.get_attr("y").unwrap());

        let doc_b = Document::new(100.0, 100.0);
        let mut state_b = GraphicsState::default();
        set_font(&mut state_b, font(true), 12.0);
        begin_text(&mut state_b);
        set_text_matrix(&mut state_b, [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

        let with_explicit_vmetric = vec![GlyphItem::Glyph {
            is_space: false,
            is_in_font: true,
            font_char: "\u{3042}".to_string(),
            width: 1000.0,
            vmetric: Some([1000.0, 500.0, 880.0]),
        }];
        show_text(&doc_b, &mut state_b, &doc_b.root, &with_explicit_vmetric);
        let tspan_b = doc_b.root.first_child().unwrap().first_child().unwrap();
        let (x_b, y_b) = (tspan_b.get_attr("x").unwrap(), tspan_b.get_attr("y").unwrap());

        // Leaving the glyph's own vmetric unset but giving the font a default
        // must position the glyph identically to passing that vmetric explicitly.
        assert_eq!(x_a, x_b);
        assert_eq!(y_a, y_b);
    }

    #[test]
    fn stroked_text_gets_the_full_stroke_attribute_set() {
        let doc = Document::new(100.0, 100.0);
        let mut state = GraphicsState::default();
        set_font(&mut state, font(false), 12.0);
        state.text_rendering_mode = TextRenderingMode::Stroke;
        state.line_cap = LineCap::Round;
        state.line_join = LineJoin::Bevel;
        state.miter_limit = 4.0;
        state.dash_array = vec![3.0, 1.0];
        state.dash_phase = 2.0;
        begin_text(&mut state);
        set_text_matrix(&mut state, [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

        let items = vec![GlyphItem::Glyph {
            is_space: false,
            is_in_font: true,
            font_char: "A".to_string(),
            width: 500.0,
            vmetric: None,
        }];
        show_text(&doc, &mut state, &doc.root, &items);

        let text_node = doc.root.first_child().unwrap();
        assert_eq!(text_node.get_attr("stroke-linecap").unwrap(), "round");
        assert_eq!(text_node.get_attr("stroke-linejoin").unwrap(), "bevel");
        assert_eq!(text_node.get_attr("stroke-miterlimit").unwrap(), "4");
        assert!(!text_node.get_attr("stroke-dasharray").unwrap().is_empty());
        assert!(!text_node.get_attr("stroke-dashoffset").unwrap().is_empty());
    }
}
