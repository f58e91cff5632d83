//! Tiling-pattern synthesis (spec.md §4.7 "Tiling pattern"): builds an SVG
//! `<pattern>` by recursively running the interpreter on a nested operator
//! list into a scratch sub-canvas.

use crate::error::Result;
use crate::format::{hex_rgb, pf};
use crate::interpreter::Interpreter;
use crate::matrix::Matrix;
use crate::oplist;
use crate::state::TilingPatternArgs;

/// Builds a `<pattern>` element in `interp`'s `defs`, recursively evaluating
/// `args.ops` against a fresh sub-canvas, and returns its `url(#id)`
/// reference. Saves and restores `interp`'s `svg`, `transform_matrix`, and
/// fill/stroke colors around the recursive evaluation (spec.md §4.7
/// "Recursive evaluation").
pub fn make_tiling_pattern(interp: &mut Interpreter, args: &TilingPatternArgs) -> Result<String> {
    let matrix =
        Matrix::new(args.matrix[0], args.matrix[1], args.matrix[2], args.matrix[3], args.matrix[4], args.matrix[5]);
    let bbox = matrix.transform_bbox(args.bbox[0], args.bbox[1], args.bbox[2], args.bbox[3]);
    let (xscale, yscale) = matrix.svd_scale();
    let txstep = args.xstep * xscale;
    let tystep = args.ystep * yscale;

    let pattern_id = interp.counters.next_shading_id();
    let pattern_node = interp.doc.create_element("pattern");
    pattern_node.set_attr("id", pattern_id.clone());
    pattern_node.set_attr("patternUnits", "userSpaceOnUse");
    pattern_node.set_attr("width", pf(txstep));
    pattern_node.set_attr("height", pf(tystep));
    pattern_node.set_attr("x", pf(bbox.x0));
    pattern_node.set_attr("y", pf(bbox.y0));

    // Save-and-swap the recursive sub-interpretation touches, scoped guard
    // style (spec.md §9 "Recursive tiling"): restored unconditionally below,
    // even if the nested evaluation errors out.
    let saved_svg = interp.svg.clone();
    let saved_matrix = interp.transform_matrix;
    let saved_fill = interp.state.fill_color.clone();
    let saved_stroke = interp.state.stroke_color.clone();
    let saved_tgrp = interp.tgrp.take();

    let inner_svg = interp.doc.create_element("svg");
    inner_svg.set_attr("width", pf(bbox.width()));
    inner_svg.set_attr("height", pf(bbox.height()));
    interp.svg = inner_svg.clone();
    interp.transform_matrix = matrix;

    if args.paint_type == 2 {
        if let Some((r, g, b)) = args.color {
            let hex = hex_rgb(r, g, b);
            interp.state.fill_color = hex.clone();
            interp.state.stroke_color = hex;
        }
    }

    let result = oplist::flatten(args.ops.clone()).and_then(|tree| interp.convert_op_list(&tree));
    interp.end_transform_group();

    interp.svg = saved_svg;
    interp.transform_matrix = saved_matrix;
    interp.state.fill_color = saved_fill;
    interp.state.stroke_color = saved_stroke;
    interp.tgrp = saved_tgrp;

    result?;

    if let Some(first) = inner_svg.first_child() {
        pattern_node.append_child(&first);
    }
    interp.defs.append_child(&pattern_node);

    Ok(format!("url(#{})", pattern_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::Counters;
    use crate::path::Viewport;
    use crate::svgtree::Document;
    use std::collections::HashMap;

    fn rect_ops() -> Vec<oplist::Operator> {
        vec![
            oplist::Operator::new(
                oplist::OpCode::ConstructPath,
                oplist::Args::ConstructPath {
                    ops: vec![crate::oplist::PathOp::Rectangle],
                    args: vec![0.0, 0.0, 10.0, 10.0],
                },
            ),
            oplist::Operator::new(oplist::OpCode::Fill, oplist::Args::Unit),
        ]
    }

    fn new_interpreter() -> Interpreter {
        let doc = Document::new(100.0, 100.0);
        let defs = doc.create_element("defs");
        let root_group = doc.create_element("g");
        let viewport = Viewport { width: 100.0, height: 100.0, transform: Matrix::IDENTITY };
        Interpreter::new(
            doc,
            defs,
            root_group,
            viewport,
            Counters::new(),
            HashMap::new(),
            HashMap::new(),
            false,
            false,
        )
    }

    #[test]
    fn tiling_pattern_adopts_first_child_and_restores_state() {
        let mut interp = new_interpreter();
        interp.state.fill_color = "#123456".to_string();
        let args = TilingPatternArgs {
            color: None,
            ops: rect_ops(),
            matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            bbox: [0.0, 0.0, 10.0, 10.0],
            xstep: 10.0,
            ystep: 10.0,
            paint_type: 1,
        };
        let url = make_tiling_pattern(&mut interp, &args).unwrap();
        assert!(url.starts_with("url(#shading"));
        assert_eq!(interp.state.fill_color, "#123456");
        assert_eq!(interp.defs.child_count(), 1);
        let pattern = interp.defs.first_child().unwrap();
        assert_eq!(pattern.tag(), "pattern");
        assert_eq!(pattern.child_count(), 1);
        assert_eq!(pattern.first_child().unwrap().tag(), "path");
    }

    #[test]
    fn uncolored_pattern_sets_fill_from_color_during_recursion_only() {
        let mut interp = new_interpreter();
        interp.state.fill_color = "#abcdef".to_string();
        let args = TilingPatternArgs {
            color: Some((10, 20, 30)),
            ops: rect_ops(),
            matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            bbox: [0.0, 0.0, 10.0, 10.0],
            xstep: 10.0,
            ystep: 10.0,
            paint_type: 2,
        };
        make_tiling_pattern(&mut interp, &args).unwrap();
        // The uncolored-pattern fill only applies inside the recursive
        // sub-render; the caller's own fill color is restored afterward.
        assert_eq!(interp.state.fill_color, "#abcdef");
        let pattern = interp.defs.first_child().unwrap();
        let rect = pattern.first_child().unwrap();
        assert_eq!(rect.get_attr("fill").unwrap(), "#0a141e");
    }
}
