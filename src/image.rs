//! Image and mask emission (spec.md §4.9), folding in the "PNG encoder"
//! external collaborator from spec.md §1 since this crate has no upstream
//! PDF parser to own it instead.

use base64::Engine;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};

use crate::counters::Counters;
use crate::error::{Error, Result};
use crate::state::{GraphicsState, ImageArgs, PixelKind};
use crate::svgtree::{Document, Node};

/// Converts `img`'s packed pixel data into an `image::DynamicImage`,
/// unpacking 1-bit-per-pixel grayscale rows (each row byte-aligned) into
/// full 8-bit samples. Fails rather than panics when the declared
/// width/height don't match the packed buffer's actual length (spec.md §7
/// "Input-shape errors").
fn to_dynamic_image(img: &ImageArgs) -> Result<DynamicImage> {
    let invalid = || {
        Error::InvalidImageData(format!(
            "{:?} buffer has {} bytes for {}x{}",
            img.kind,
            img.data.len(),
            img.width,
            img.height
        ))
    };
    match img.kind {
        PixelKind::Rgb24Bpp => {
            let buf =
                RgbImage::from_raw(img.width, img.height, img.data.clone()).ok_or_else(invalid)?;
            Ok(DynamicImage::ImageRgb8(buf))
        }
        PixelKind::Rgba32Bpp => {
            let buf = RgbaImage::from_raw(img.width, img.height, img.data.clone())
                .ok_or_else(invalid)?;
            Ok(DynamicImage::ImageRgba8(buf))
        }
        PixelKind::Grayscale1Bpp => {
            let row_bytes = (img.width as usize + 7) / 8;
            let mut samples = Vec::with_capacity(img.width as usize * img.height as usize);
            for y in 0..img.height as usize {
                for x in 0..img.width as usize {
                    let byte = img.data.get(y * row_bytes + x / 8).copied().unwrap_or(0);
                    let bit = (byte >> (7 - (x % 8))) & 1;
                    samples.push(if bit == 1 { 255 } else { 0 });
                }
            }
            let buf = GrayImage::from_raw(img.width, img.height, samples).ok_or_else(invalid)?;
            Ok(DynamicImage::ImageLuma8(buf))
        }
    }
}

/// `encode_png(image_data, force_data_uri, is_mask) -> string_url`
/// (spec.md §1). This crate only ever produces a single standalone SVG
/// document, so there is no sidecar-asset sink to write external PNG files
/// to; `force_data_uri` is accepted to match the driver contract literally
/// but every href this crate emits is a `data:` URI.
pub fn encode_png(img: &ImageArgs, _force_data_uri: bool, _is_mask: bool) -> Result<String> {
    let dynamic = to_dynamic_image(img)?;
    let mut bytes: Vec<u8> = Vec::new();
    dynamic
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| Error::PngEncode(e.to_string()))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:image/png;base64,{}", encoded))
}

/// `paintSolidColorImageMask`: a 1x1 `<rect>` filled with the current fill
/// color (spec.md §4.9).
pub fn paint_solid_color_image_mask(doc: &Document, parent: &Node, state: &GraphicsState) {
    let rect = doc.create_element("rect");
    rect.set_attr("width", "1");
    rect.set_attr("height", "1");
    rect.set_attr("fill", state.fill_color.clone());
    parent.append_child(&rect);
}

/// `paintInlineImageXObject(imgData, mask?)`: encodes to a PNG URL and
/// builds the `<image>` element, flipped into SVG's y-down space via the
/// `scale(1/width, -1/height)` transform (spec.md §4.9). Appended to `mask`
/// when given, else to `parent` (the current transform group).
pub fn paint_inline_image_xobject(
    doc: &Document,
    img: &ImageArgs,
    mask: Option<&Node>,
    parent: &Node,
    force_data_uri: bool,
) -> Result<()> {
    let url = encode_png(img, force_data_uri, img.is_mask)?;
    let image_node = doc.create_element("image");
    image_node.set_attr("xlink:href", url);
    image_node.set_attr("x", "0");
    image_node.set_attr("y", format!("-{}", img.height));
    image_node.set_attr("width", img.width.to_string());
    image_node.set_attr("height", img.height.to_string());
    image_node.set_attr(
        "transform",
        format!("scale({} {})", 1.0 / img.width as f64, -1.0 / img.height as f64),
    );
    match mask {
        Some(mask) => mask.append_child(&image_node),
        None => parent.append_child(&image_node),
    }
    Ok(())
}

/// `paintImageMaskXObject(img)`: builds a `<mask id=maskN>` wrapping the
/// image (via [`paint_inline_image_xobject`]), then emits a `<rect>` filled
/// with the current fill color masked by it (spec.md §4.9). Bitmap-backed
/// sources are rejected outright, per spec.md §7's "Input-shape errors".
pub fn paint_image_mask_xobject(
    doc: &Document,
    defs: &Node,
    parent: &Node,
    state: &GraphicsState,
    counters: &Counters,
    img: &ImageArgs,
    force_data_uri: bool,
) -> Result<()> {
    if img.is_bitmap {
        return Err(Error::UnsupportedBitmapMask);
    }

    let mask_id = counters.next_mask_id();
    let mask_node = doc.create_element("mask");
    mask_node.set_attr("id", mask_id.clone());
    paint_inline_image_xobject(doc, img, Some(&mask_node), parent, force_data_uri)?;
    defs.append_child(&mask_node);

    let rect = doc.create_element("rect");
    rect.set_attr("fill", state.fill_color.clone());
    rect.set_attr("mask", format!("url(#{})", mask_id));
    parent.append_child(&rect);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_image(w: u32, h: u32) -> ImageArgs {
        ImageArgs {
            width: w,
            height: h,
            kind: PixelKind::Rgb24Bpp,
            data: vec![255u8; (w * h * 3) as usize],
            is_mask: false,
            is_bitmap: false,
        }
    }

    #[test]
    fn encode_png_produces_a_data_uri() {
        let img = rgb_image(2, 2);
        let url = encode_png(&img, true, false).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn solid_color_mask_is_a_one_by_one_rect() {
        let doc = Document::new(10.0, 10.0);
        let state = GraphicsState::default();
        paint_solid_color_image_mask(&doc, &doc.root, &state);
        let rect = doc.root.first_child().unwrap();
        assert_eq!(rect.get_attr("width").unwrap(), "1");
        assert_eq!(rect.get_attr("height").unwrap(), "1");
    }

    #[test]
    fn inline_image_sets_flip_transform() {
        let doc = Document::new(10.0, 10.0);
        let img = rgb_image(4, 8);
        paint_inline_image_xobject(&doc, &img, None, &doc.root, true).unwrap();
        let node = doc.root.first_child().unwrap();
        assert_eq!(node.tag(), "image");
        assert_eq!(node.get_attr("y").unwrap(), "-8");
        assert!(node.get_attr("transform").unwrap().starts_with("scale(0.25 -0.125)"));
    }

    #[test]
    fn mismatched_buffer_length_is_an_error_not_a_panic() {
        let mut img = rgb_image(4, 4);
        img.data.truncate(3);
        let result = encode_png(&img, true, false);
        assert!(matches!(result, Err(Error::InvalidImageData(_))));
    }

    #[test]
    fn bitmap_backed_mask_is_rejected() {
        let doc = Document::new(10.0, 10.0);
        let defs = doc.create_element("defs");
        let state = GraphicsState::default();
        let counters = Counters::new();
        let mut img = rgb_image(2, 2);
        img.is_bitmap = true;
        let result =
            paint_image_mask_xobject(&doc, &defs, &doc.root, &state, &counters, &img, true);
        assert!(matches!(result, Err(Error::UnsupportedBitmapMask)));
    }
}
