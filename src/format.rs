//! Shortest-sufficient number formatting and matrix-to-SVG-transform
//! string conversion.

use crate::matrix::Matrix;

/// Formats a float the way SVG attribute values want it: integers print
/// without a decimal point, everything else is truncated to 10 fractional
/// digits with trailing zeros (and a bare trailing dot) trimmed.
pub fn pf(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let s = format!("{:.10}", v);
    let trimmed = s.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    trimmed.to_string()
}

/// Formats a matrix as an SVG `transform` attribute value, recognizing the
/// identity, pure-scale, pure-rotation and pure-translation special cases.
pub fn pm(m: &Matrix) -> String {
    if m.is_identity() {
        return String::new();
    }

    let is_translation_only = m.a == 1.0 && m.b == 0.0 && m.c == 0.0 && m.d == 1.0;
    if is_translation_only {
        return format!("translate({} {})", pf(m.e), pf(m.f));
    }

    let is_scale_only = m.b == 0.0 && m.c == 0.0 && m.e == 0.0 && m.f == 0.0;
    if is_scale_only {
        return format!("scale({} {})", pf(m.a), pf(m.d));
    }

    let is_rotation_only =
        m.a == m.d && m.b == -m.c && m.e == 0.0 && m.f == 0.0;
    if is_rotation_only {
        let angle = m.a.acos() * 180.0 / std::f64::consts::PI;
        let angle = if m.b < 0.0 { -angle } else { angle };
        return format!("rotate({})", pf(angle));
    }

    format!("matrix({} {} {} {} {} {})", pf(m.a), pf(m.b), pf(m.c), pf(m.d), pf(m.e), pf(m.f))
}

/// `makeHexColor`: plain RGB components to a `#rrggbb` string (spec.md §1
/// Non-goals: "color management beyond naive RGB hex" — this is that naive
/// conversion).
pub fn hex_rgb(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// `setFillGray`/`setStrokeGray`: a single gray component replicated across
/// all three channels.
pub fn hex_gray(gray: f64) -> String {
    let v = (gray.clamp(0.0, 1.0) * 255.0).round() as u8;
    hex_rgb(v, v, v)
}

/// `setFillCMYKColor`/`setStrokeCMYKColor`: naive CMYK-to-RGB conversion,
/// `c` `m` `y` `k` each already on a 0-255 scale.
pub fn hex_cmyk(c: u8, m: u8, y: u8, k: u8) -> String {
    let convert = |component: u8| -> u8 {
        let c = component as f64 / 255.0;
        let k = k as f64 / 255.0;
        (255.0 * (1.0 - c) * (1.0 - k)).round() as u8
    };
    hex_rgb(convert(c), convert(m), convert(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_rgb_formats_lowercase_hex() {
        assert_eq!(hex_rgb(255, 0, 0), "#ff0000");
        assert_eq!(hex_rgb(0, 0, 0), "#000000");
    }

    #[test]
    fn hex_gray_replicates_channel() {
        assert_eq!(hex_gray(1.0), "#ffffff");
        assert_eq!(hex_gray(0.0), "#000000");
    }

    #[test]
    fn hex_cmyk_full_black_is_black() {
        assert_eq!(hex_cmyk(0, 0, 0, 255), "#000000");
        assert_eq!(hex_cmyk(0, 0, 0, 0), "#ffffff");
    }

    #[test]
    fn pf_integers_have_no_trailing_zero_or_dot() {
        assert_eq!(pf(5.0), "5");
        assert_eq!(pf(-12.0), "-12");
        assert_eq!(pf(0.0), "0");
    }

    #[test]
    fn pf_trims_trailing_zeros() {
        assert_eq!(pf(1.5), "1.5");
        assert_eq!(pf(0.1), "0.1");
        assert_eq!(pf(1.0 / 3.0), "0.3333333333");
    }

    #[test]
    fn pm_identity_is_empty() {
        assert_eq!(pm(&Matrix::IDENTITY), "");
    }

    #[test]
    fn pm_pure_translation() {
        let m = Matrix::new(1.0, 0.0, 0.0, 1.0, 10.0, -5.0);
        assert_eq!(pm(&m), "translate(10 -5)");
    }

    #[test]
    fn pm_pure_scale() {
        let m = Matrix::new(2.0, 0.0, 0.0, 3.0, 0.0, 0.0);
        assert_eq!(pm(&m), "scale(2 3)");
    }

    #[test]
    fn pm_pure_rotation() {
        let m = Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        assert_eq!(pm(&m), "rotate(90)");
    }

    #[test]
    fn pm_general_matrix() {
        let m = Matrix::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(pm(&m), "matrix(1 2 3 4 5 6)");
    }
}
