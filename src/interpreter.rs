//! The dispatch core: opcode dispatch table, save/restore/transform stacks,
//! and the current-transform-group lifecycle (spec.md §4.3, §4.4, §4.8,
//! §4.10).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::counters::Counters;
use crate::error::{Error, Result};
use crate::format::{hex_cmyk, hex_gray, hex_rgb, pm};
#[cfg(feature = "images")]
use crate::image;
use crate::matrix::Matrix;
use crate::objects::FontObject;
use crate::oplist::{Args, GStateValue, OpCode, Operator};
use crate::pattern::{self, tiling};
use crate::path::{self, PaintKind, Viewport};
use crate::state::{GraphicsState, ImageArgs, LineCap, LineJoin};
use crate::svgtree::{Document, Node};
use crate::text;

/// The graphics-interpreter, holding exactly the state spec.md §3
/// "Interpreter state" describes. One instance renders one page.
pub struct Interpreter {
    pub(crate) doc: Document,
    pub(crate) defs: Node,
    /// The current output parent: the root content group, or — while
    /// recursively evaluating a tiling pattern — the pattern's scratch
    /// sub-canvas (spec.md §3 "svg").
    pub(crate) svg: Node,
    /// The current transform group, created lazily and destroyed when
    /// empty (spec.md §4.4 "ensureTransformGroup"/"endTransformGroup").
    pub(crate) tgrp: Option<Node>,
    pub(crate) transform_matrix: Matrix,
    transform_stack: Vec<Matrix>,
    extra_stack: Vec<GraphicsState>,
    pub(crate) state: GraphicsState,
    viewport: Viewport,
    pub(crate) counters: Counters,
    fonts: HashMap<String, Arc<FontObject>>,
    images: HashMap<String, ImageArgs>,
    embedded_fonts: HashSet<String>,
    embed_fonts: bool,
    force_data_uri: bool,
}

impl Interpreter {
    /// `root_group` is the `<g transform=pm(viewport.transform)>` the
    /// driver already appended to the document root (spec.md §6 "SVG
    /// output"); `fonts`/`images` are the pre-resolved dependency caches the
    /// barrier in [`crate::driver`] built before interpretation starts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        doc: Document,
        defs: Node,
        root_group: Node,
        viewport: Viewport,
        counters: Counters,
        fonts: HashMap<String, Arc<FontObject>>,
        images: HashMap<String, ImageArgs>,
        embed_fonts: bool,
        force_data_uri: bool,
    ) -> Interpreter {
        Interpreter {
            doc,
            defs,
            svg: root_group,
            tgrp: None,
            transform_matrix: Matrix::IDENTITY,
            transform_stack: Vec::new(),
            extra_stack: Vec::new(),
            state: GraphicsState::default(),
            viewport,
            counters,
            fonts,
            images,
            embedded_fonts: HashSet::new(),
            embed_fonts,
            force_data_uri,
        }
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Returns the current transform group, creating and appending it to
    /// `svg` if absent (spec.md §4.4 "ensureTransformGroup").
    pub(crate) fn ensure_transform_group(&mut self) -> Node {
        if let Some(tgrp) = &self.tgrp {
            return tgrp.clone();
        }
        let g = self.doc.create_element("g");
        g.set_attr("transform", pm(&self.transform_matrix));
        self.svg.append_child(&g);
        self.tgrp = Some(g.clone());
        g
    }

    /// Drops `tgrp` from `svg` if it ended up with no children, then clears
    /// the cache so the next emission creates a fresh group at the current
    /// CTM (spec.md §4.4 "endTransformGroup").
    pub(crate) fn end_transform_group(&mut self) {
        if let Some(tgrp) = self.tgrp.take() {
            if tgrp.child_count() == 0 {
                self.svg.remove_child(&tgrp);
            }
        }
    }

    /// `save`: pushes `transformMatrix` and the current graphics state
    /// (spec.md §4.4).
    fn save(&mut self) {
        self.transform_stack.push(self.transform_matrix);
        self.extra_stack.push(self.state.clone());
    }

    /// `restore`: pops both stacks, then ends the current transform group
    /// (spec.md §4.4).
    fn restore(&mut self) -> Result<()> {
        self.transform_matrix = self.transform_stack.pop().ok_or(Error::StackImbalance)?;
        self.state = self.extra_stack.pop().ok_or(Error::StackImbalance)?;
        self.end_transform_group();
        Ok(())
    }

    /// `transform(a,b,c,d,e,f)`: right-composes the operand into the CTM —
    /// the operand is applied to points first, the prior CTM second,
    /// matching [`crate::text::move_text`]'s established composition order
    /// — then ends the current transform group (spec.md §4.4).
    fn transform(&mut self, m: [f64; 6]) {
        let operand = Matrix::new(m[0], m[1], m[2], m[3], m[4], m[5]);
        self.transform_matrix = operand.compose(&self.transform_matrix);
        self.end_transform_group();
    }

    fn resolve_font(&self, name: &str) -> Option<Arc<FontObject>> {
        self.fonts.get(name).cloned()
    }

    fn set_font(&mut self, name: &str, size: f64) {
        match self.resolve_font(name) {
            Some(font) => {
                if self.embed_fonts
                    && font.data.is_some()
                    && !self.embedded_fonts.contains(&font.loaded_name)
                {
                    text::embed_font_face(&self.doc, &self.defs, &font);
                    self.embedded_fonts.insert(font.loaded_name.clone());
                }
                text::set_font(&mut self.state, font, size);
            }
            None => log::warn!("setFont: font object {:?} was not preloaded, skipping", name),
        }
    }

    fn set_gstate(&mut self, entries: &[(String, GStateValue)]) {
        for (key, value) in entries {
            match (key.as_str(), value) {
                ("LW", GStateValue::F64(v)) => self.state.line_width = *v,
                ("LC", GStateValue::F64(v)) => {
                    self.state.line_cap = match *v as i32 {
                        1 => LineCap::Round,
                        2 => LineCap::Square,
                        _ => LineCap::Butt,
                    }
                }
                ("LJ", GStateValue::F64(v)) => {
                    self.state.line_join = match *v as i32 {
                        1 => LineJoin::Round,
                        2 => LineJoin::Bevel,
                        _ => LineJoin::Miter,
                    }
                }
                ("ML", GStateValue::F64(v)) => self.state.miter_limit = *v,
                ("D", GStateValue::Dash { array, phase }) => {
                    self.state.dash_array = array.clone();
                    self.state.dash_phase = *phase;
                }
                ("RI", _) | ("FL", _) => {
                    // setRenderingIntent / setFlatness: accepted, ignored.
                }
                ("Font", GStateValue::Font { name, size }) => self.set_font(name, *size),
                ("CA", GStateValue::F64(v)) => self.state.stroke_alpha = *v,
                ("ca", GStateValue::F64(v)) => self.state.fill_alpha = *v,
                (other, _) => log::warn!("setGState: unimplemented key {:?}, skipping", other),
            }
        }
    }

    fn paint(&mut self, kind: PaintKind) {
        let parent = self.ensure_transform_group();
        let ctm = self.transform_matrix;
        path::end_path(&self.doc, &parent, &mut self.state, Some(kind), &ctm, &self.viewport, None);
    }

    fn close_and_paint(&mut self, kind: PaintKind) {
        path::close_current_subpath(&self.state);
        self.paint(kind);
    }

    fn shading_fill(&mut self, args: &pattern::ShadingArgs) -> Result<()> {
        let Some(url) = pattern::shading_fill(&self.doc, &self.defs, &self.counters, args)? else {
            return Ok(());
        };
        let parent = self.ensure_transform_group();
        // spec.md §4.5: `viewport.transform ∘ transformMatrix`, i.e. the CTM
        // applied first, the viewport's base transform second, under this
        // crate's `Matrix::compose` convention (see `matrix.rs`'s doc
        // comment).
        let full = self.transform_matrix.compose(&self.viewport.transform);
        let bounds = match full.invert() {
            Some(inv) => inv.transform_bbox(0.0, 0.0, self.viewport.width, self.viewport.height),
            None => crate::matrix::Rect::new(0.0, 0.0, self.viewport.width, self.viewport.height),
        };
        let rect = self.doc.create_element("rect");
        rect.set_attr("x", crate::format::pf(bounds.x0));
        rect.set_attr("y", crate::format::pf(bounds.y0));
        rect.set_attr("width", crate::format::pf(bounds.width()));
        rect.set_attr("height", crate::format::pf(bounds.height()));
        rect.set_attr("fill", url);
        parent.append_child(&rect);
        Ok(())
    }

    /// Evaluates a tree of operators (spec.md §4.1's `group`-tagged tree,
    /// or a nested tiling-pattern operator list). `OpCode::Group` recurses
    /// depth-first, fully completing before the next sibling (spec.md §5
    /// "Ordering").
    pub fn convert_op_list(&mut self, ops: &[Operator]) -> Result<()> {
        for operator in ops {
            self.dispatch(operator)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, operator: &Operator) -> Result<()> {
        match (&operator.op, &operator.args) {
            (OpCode::Dependency, _) => {}
            (OpCode::Save, _) => self.save(),
            (OpCode::Restore, _) => self.restore()?,
            (OpCode::Transform, Args::Transform(m)) => self.transform(*m),
            (OpCode::ConstructPath, Args::ConstructPath { ops, args }) => {
                path::construct_path(&self.doc, &mut self.state, ops, args)
            }
            (OpCode::Fill, _) => self.paint(PaintKind::Fill),
            (OpCode::Stroke, _) => self.paint(PaintKind::Stroke),
            (OpCode::FillStroke, _) => self.paint(PaintKind::FillStroke),
            (OpCode::EoFill, _) => self.paint(PaintKind::EoFill),
            (OpCode::EoFillStroke, _) => self.paint(PaintKind::EoFillStroke),
            (OpCode::CloseStroke, _) => self.close_and_paint(PaintKind::Stroke),
            (OpCode::CloseFillStroke, _) => self.close_and_paint(PaintKind::FillStroke),
            (OpCode::CloseEOFillStroke, _) => self.close_and_paint(PaintKind::EoFillStroke),
            (OpCode::EndPath, _) => {
                let parent = self.ensure_transform_group();
                let ctm = self.transform_matrix;
                path::end_path(&self.doc, &parent, &mut self.state, None, &ctm, &self.viewport, None);
            }
            (OpCode::Clip, _) | (OpCode::EoClip, _) | (OpCode::EndText, _) => {}
            (OpCode::BeginText, _) => text::begin_text(&mut self.state),
            (OpCode::SetCharSpacing, Args::F64(v)) => self.state.char_spacing = *v,
            (OpCode::SetWordSpacing, Args::F64(v)) => self.state.word_spacing = *v,
            (OpCode::SetHScale, Args::F64(v)) => self.state.text_hscale = v / 100.0,
            (OpCode::SetLeading, Args::F64(v)) => text::set_leading(&mut self.state, *v),
            (OpCode::SetFont, Args::FontRef { name, size }) => self.set_font(name, *size),
            (OpCode::SetTextRenderingMode, Args::F64(v)) => {
                self.state.text_rendering_mode =
                    crate::state::TextRenderingMode::from_mode_number(*v as i32)
            }
            (OpCode::SetTextRise, Args::F64(v)) => self.state.text_rise = *v,
            (OpCode::MoveText, Args::Point(tx, ty)) => text::move_text(&mut self.state, *tx, *ty),
            (OpCode::SetLeadingMoveText, Args::Point(tx, ty)) => {
                text::set_leading_move_text(&mut self.state, *tx, *ty)
            }
            (OpCode::SetTextMatrix, Args::TextMatrix(m)) => text::set_text_matrix(&mut self.state, *m),
            (OpCode::NextLine, _) => text::next_line(&mut self.state),
            (OpCode::ShowText, Args::ShowText(items)) => {
                let parent = self.ensure_transform_group();
                text::show_text(&self.doc, &mut self.state, &parent, items);
            }
            (OpCode::SetFillGray, Args::F64(v)) => {
                self.state.fill_color = hex_gray(*v);
                self.state.reset_text_buffers();
            }
            (OpCode::SetStrokeGray, Args::F64(v)) => self.state.stroke_color = hex_gray(*v),
            (OpCode::SetFillRGBColor, Args::Rgb(r, g, b)) => {
                // Open Question (spec.md §9): setFillRGBColor also resets
                // the pending tspan/glyph buffers. Preserved as specified.
                self.state.fill_color = hex_rgb(*r, *g, *b);
                self.state.reset_text_buffers();
            }
            (OpCode::SetStrokeRGBColor, Args::Rgb(r, g, b)) => {
                self.state.stroke_color = hex_rgb(*r, *g, *b)
            }
            (OpCode::SetFillCMYKColor, Args::Cmyk(c, m, y, k)) => {
                self.state.fill_color = hex_cmyk(*c, *m, *y, *k);
                self.state.reset_text_buffers();
            }
            (OpCode::SetStrokeCMYKColor, Args::Cmyk(c, m, y, k)) => {
                self.state.stroke_color = hex_cmyk(*c, *m, *y, *k)
            }
            (OpCode::SetLineWidth, Args::F64(v)) => self.state.line_width = *v,
            (OpCode::SetLineCap, Args::F64(v)) => {
                self.state.line_cap = match *v as i32 {
                    1 => LineCap::Round,
                    2 => LineCap::Square,
                    _ => LineCap::Butt,
                }
            }
            (OpCode::SetLineJoin, Args::F64(v)) => {
                self.state.line_join = match *v as i32 {
                    1 => LineJoin::Round,
                    2 => LineJoin::Bevel,
                    _ => LineJoin::Miter,
                }
            }
            (OpCode::SetMiterLimit, Args::F64(v)) => self.state.miter_limit = *v,
            (OpCode::SetDash, Args::Dash { array, phase }) => {
                self.state.dash_array = array.clone();
                self.state.dash_phase = *phase;
            }
            (OpCode::SetGState, Args::GState(entries)) => self.set_gstate(entries),
            (OpCode::ShadingFill, Args::Shading(args)) => self.shading_fill(args)?,
            (OpCode::SetFillColorN, Args::Rgb(r, g, b)) => self.state.fill_color = hex_rgb(*r, *g, *b),
            (OpCode::SetFillColorN, Args::Shading(args)) => {
                if let Some(url) = pattern::shading_fill(&self.doc, &self.defs, &self.counters, args)? {
                    self.state.fill_color = url;
                }
            }
            (OpCode::SetFillColorN, Args::TilingPattern(args)) => {
                self.state.fill_color = tiling::make_tiling_pattern(self, args)?;
            }
            (OpCode::SetStrokeColorN, Args::Rgb(r, g, b)) => {
                self.state.stroke_color = hex_rgb(*r, *g, *b)
            }
            (OpCode::SetStrokeColorN, Args::Shading(args)) => {
                if let Some(url) = pattern::shading_fill(&self.doc, &self.defs, &self.counters, args)? {
                    self.state.stroke_color = url;
                }
            }
            (OpCode::SetStrokeColorN, Args::TilingPattern(args)) => {
                self.state.stroke_color = tiling::make_tiling_pattern(self, args)?;
            }
            #[cfg(feature = "images")]
            (OpCode::PaintSolidColorImageMask, _) => {
                let parent = self.ensure_transform_group();
                image::paint_solid_color_image_mask(&self.doc, &parent, &self.state);
            }
            #[cfg(feature = "images")]
            (OpCode::PaintInlineImageXObject, Args::Image(img)) => {
                let parent = self.ensure_transform_group();
                image::paint_inline_image_xobject(&self.doc, img, None, &parent, self.force_data_uri)?;
            }
            #[cfg(feature = "images")]
            (OpCode::PaintImageXObject, Args::ImageRef(id)) => match self.images.get(id).cloned() {
                Some(img) => {
                    let parent = self.ensure_transform_group();
                    image::paint_inline_image_xobject(&self.doc, &img, None, &parent, self.force_data_uri)?;
                }
                None => log::warn!("paintImageXObject: {:?} was not preloaded, skipping", id),
            },
            #[cfg(feature = "images")]
            (OpCode::PaintImageMaskXObject, Args::Image(img)) => {
                let parent = self.ensure_transform_group();
                image::paint_image_mask_xobject(
                    &self.doc,
                    &self.defs,
                    &parent,
                    &self.state,
                    &self.counters,
                    img,
                    self.force_data_uri,
                )?;
            }
            (OpCode::PaintFormXObjectBegin, Args::FormXObject { matrix, .. }) => {
                // No implicit `save` here: the upstream operator producer is
                // responsible for emitting one beforehand (spec.md §9 Open
                // Question).
                if let Some(m) = matrix {
                    self.transform(*m);
                }
            }
            (OpCode::PaintFormXObjectEnd, _) => {}
            (OpCode::BeginMarkedContent, _) | (OpCode::EndMarkedContent, _) => {}
            (OpCode::Group, Args::Children(children)) => {
                self.save();
                let result = self.convert_op_list(children);
                self.restore()?;
                result?;
            }
            (op, _) => log::warn!("unimplemented opcode {:?}, skipping", op),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplist::PathOp;
    use pretty_assertions::assert_eq;

    fn new_interpreter(width: f64, height: f64) -> Interpreter {
        let doc = Document::new(width, height);
        let defs = doc.create_element("defs");
        doc.root.append_child(&defs);
        let root_group = doc.create_element("g");
        doc.root.append_child(&root_group);
        let viewport = Viewport { width, height, transform: Matrix::IDENTITY };
        Interpreter::new(
            doc,
            defs,
            root_group,
            viewport,
            Counters::new(),
            HashMap::new(),
            HashMap::new(),
            false,
            true,
        )
    }

    fn rect_fill(interp: &mut Interpreter, x: f64, y: f64, w: f64, h: f64) {
        interp
            .dispatch(&Operator::new(
                OpCode::ConstructPath,
                Args::ConstructPath { ops: vec![PathOp::Rectangle], args: vec![x, y, w, h] },
            ))
            .unwrap();
        interp.dispatch(&Operator::new(OpCode::Fill, Args::Unit)).unwrap();
    }

    // S1 — single rectangle, identity viewport.
    #[test]
    fn s1_single_rectangle_fill() {
        let mut interp = new_interpreter(100.0, 100.0);
        interp.dispatch(&Operator::new(OpCode::SetFillRGBColor, Args::Rgb(255, 0, 0))).unwrap();
        rect_fill(&mut interp, 10.0, 20.0, 30.0, 40.0);

        let root_group = interp.svg.clone();
        assert_eq!(root_group.get_attr("transform").unwrap(), "");
        let tgrp = root_group.first_child().unwrap();
        assert_eq!(tgrp.get_attr("transform").unwrap(), "");
        let path = tgrp.first_child().unwrap();
        assert_eq!(path.get_attr("d").unwrap(), "M 10 20 L 40 20 L 40 60 L 10 60 Z");
        assert_eq!(path.get_attr("fill").unwrap(), "#ff0000");
        assert_eq!(path.get_attr("fill-opacity").unwrap(), "1");
    }

    // S2 — save/restore isolation.
    #[test]
    fn s2_save_restore_isolates_color_and_transform() {
        let mut interp = new_interpreter(100.0, 100.0);
        interp.dispatch(&Operator::new(OpCode::Save, Args::Unit)).unwrap();
        interp.dispatch(&Operator::new(OpCode::SetFillRGBColor, Args::Rgb(0, 255, 0))).unwrap();
        interp
            .dispatch(&Operator::new(OpCode::Transform, Args::Transform([1.0, 0.0, 0.0, 1.0, 5.0, 5.0])))
            .unwrap();
        rect_fill(&mut interp, 0.0, 0.0, 1.0, 1.0);
        interp.dispatch(&Operator::new(OpCode::Restore, Args::Unit)).unwrap();
        rect_fill(&mut interp, 0.0, 0.0, 1.0, 1.0);

        let root_group = interp.svg.clone();
        assert_eq!(root_group.child_count(), 2);
        let second_group = root_group.nth_child(1).unwrap();
        let second_path = second_group.first_child().unwrap();
        assert_eq!(second_path.get_attr("fill").unwrap(), "#000000");
        assert_eq!(second_group.get_attr("transform").unwrap(), "");
    }

    // S4 — vertical text.
    #[test]
    fn s4_vertical_text_positions_glyph_with_vmetric() {
        use crate::objects::FontObject;
        use crate::state::GlyphItem;
        use std::sync::Arc as StdArc;

        let mut interp = new_interpreter(100.0, 100.0);
        let font = StdArc::new(FontObject {
            loaded_name: "F1".to_string(),
            font_matrix: None,
            vertical: true,
            bold: false,
            black: false,
            italic: false,
            default_v_metrics: None,
            missing_file: false,
            data: None,
            mimetype: None,
        });
        interp.fonts.insert("F1".to_string(), font);
        interp.dispatch(&Operator::new(OpCode::BeginText, Args::Unit)).unwrap();
        interp
            .dispatch(&Operator::new(
                OpCode::SetFont,
                Args::FontRef { name: "F1".to_string(), size: 12.0 },
            ))
            .unwrap();
        interp
            .dispatch(&Operator::new(
                OpCode::SetTextMatrix,
                Args::TextMatrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
            ))
            .unwrap();
        let items = vec![GlyphItem::Glyph {
            is_space: false,
            is_in_font: true,
            font_char: "\u{3042}".to_string(),
            width: 1000.0,
            vmetric: Some([1000.0, 500.0, 880.0]),
        }];
        interp.dispatch(&Operator::new(OpCode::ShowText, Args::ShowText(items))).unwrap();

        assert!(interp.state.y < 0.0);
    }

    // S5 — overlay suppression.
    #[test]
    fn s5_full_viewport_path_is_dropped() {
        let mut interp = new_interpreter(200.0, 300.0);
        rect_fill(&mut interp, 0.0, 0.0, 200.0, 300.0);
        let tgrp = interp.svg.first_child();
        // Either the group was never kept (dropped as empty) or has no path
        // children.
        if let Some(tgrp) = tgrp {
            assert_eq!(tgrp.child_count(), 0);
        }
    }

    // S3 — axial gradient shading fill.
    #[test]
    fn s3_shading_fill_emits_gradient_and_rect() {
        let mut interp = new_interpreter(100.0, 100.0);
        let args = pattern::ShadingArgs {
            kind: pattern::ShadingKind::Axial { x1: 0.0, y1: 0.0, x2: 100.0, y2: 0.0 },
            stops: vec![
                pattern::ColorStop { offset: 0.0, color: "#ff0000".to_string() },
                pattern::ColorStop { offset: 1.0, color: "#0000ff".to_string() },
            ],
        };
        interp.dispatch(&Operator::new(OpCode::ShadingFill, Args::Shading(args))).unwrap();
        assert_eq!(interp.defs.child_count(), 1);
        let rect = interp.svg.first_child().unwrap().first_child().unwrap();
        assert_eq!(rect.get_attr("fill").unwrap(), "url(#shading0)");
    }

    #[test]
    fn group_opcode_saves_and_restores_around_children() {
        let mut interp = new_interpreter(100.0, 100.0);
        let children = vec![
            Operator::new(OpCode::SetFillRGBColor, Args::Rgb(1, 2, 3)),
        ];
        interp.dispatch(&Operator::new(OpCode::Group, Args::Children(children))).unwrap();
        assert_eq!(interp.state.fill_color, "#000000");
    }

    #[test]
    fn restore_without_save_is_a_stack_imbalance_error() {
        let mut interp = new_interpreter(100.0, 100.0);
        let result = interp.dispatch(&Operator::new(OpCode::Restore, Args::Unit));
        assert!(matches!(result, Err(Error::StackImbalance)));
    }
}
