#![forbid(unsafe_code)]

//! Element geometry readers.
//!
//! Pixel measurements come straight from the host's box query. Font-relative
//! (`em`) measurements divide by the computed font size; a zero or
//! unparsable font size propagates as `inf`/`NaN` rather than an error.

use serde::Serialize;

use crate::dom::{Dom, DomError};

/// Width and height of a rendered box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoxSize {
    pub width: f64,
    pub height: f64,
}

impl BoxSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether either axis moved by more than `epsilon`.
    ///
    /// With `epsilon == 0.0` this is plain inequality, except that a `NaN`
    /// axis on both sides counts as unchanged.
    #[must_use]
    pub fn differs_from(&self, other: &Self, epsilon: f64) -> bool {
        axis_differs(self.width, other.width, epsilon)
            || axis_differs(self.height, other.height, epsilon)
    }

    /// Both axes divided by `font_size`.
    #[must_use]
    pub fn in_ems(self, font_size: f64) -> Self {
        Self {
            width: self.width / font_size,
            height: self.height / font_size,
        }
    }
}

fn axis_differs(a: f64, b: f64, epsilon: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return false;
    }
    if epsilon <= 0.0 {
        return a != b;
    }
    // inf - inf is NaN; treat any non-finite delta as a change unless equal.
    let delta = (a - b).abs();
    if delta.is_nan() {
        return a != b;
    }
    delta > epsilon
}

/// Rendered box of `elt`.
pub fn box_size<D: Dom>(dom: &D, elt: &D::Node) -> Result<BoxSize, DomError> {
    dom.bounding_box(elt)
}

/// Rendered width of `elt` in pixels.
pub fn width<D: Dom>(dom: &D, elt: &D::Node) -> Result<f64, DomError> {
    Ok(dom.bounding_box(elt)?.width)
}

/// Rendered height of `elt` in pixels.
pub fn height<D: Dom>(dom: &D, elt: &D::Node) -> Result<f64, DomError> {
    Ok(dom.bounding_box(elt)?.height)
}

/// Computed font size of `elt` in pixels, `NaN` when the value does not parse.
pub fn font_size<D: Dom>(dom: &D, elt: &D::Node) -> Result<f64, DomError> {
    let raw = dom.computed_font_size(elt)?;
    Ok(parse_css_float(&raw))
}

/// Width of `elt` in `em`.
pub fn em_width<D: Dom>(dom: &D, elt: &D::Node) -> Result<f64, DomError> {
    Ok(width(dom, elt)? / font_size(dom, elt)?)
}

/// Height of `elt` in `em`.
pub fn em_height<D: Dom>(dom: &D, elt: &D::Node) -> Result<f64, DomError> {
    Ok(height(dom, elt)? / font_size(dom, elt)?)
}

/// Both axes of `elt` in `em`, with a single box query.
pub fn em_size<D: Dom>(dom: &D, elt: &D::Node) -> Result<BoxSize, DomError> {
    let size = box_size(dom, elt)?;
    Ok(size.in_ems(font_size(dom, elt)?))
}

/// Parse the leading decimal number of `raw` the way `parseFloat` does.
///
/// Leading whitespace is skipped and trailing garbage (such as a `px` unit)
/// is ignored. Returns `NaN` when no number prefix exists.
#[must_use]
pub fn parse_css_float(raw: &str) -> f64 {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();
    let mut idx = 0usize;

    let negative = match bytes.first() {
        Some(b'-') => {
            idx = 1;
            true
        }
        Some(b'+') => {
            idx = 1;
            false
        }
        _ => false,
    };

    if trimmed[idx..].starts_with("Infinity") {
        return if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let mut mantissa_digits = idx - int_start;

    if idx < bytes.len() && bytes[idx] == b'.' {
        let frac_start = idx + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        let frac_digits = frac_end - frac_start;
        if mantissa_digits + frac_digits > 0 {
            idx = frac_end;
            mantissa_digits += frac_digits;
        }
    }

    if mantissa_digits == 0 {
        return f64::NAN;
    }

    if idx < bytes.len() && matches!(bytes[idx], b'e' | b'E') {
        let mut exp_idx = idx + 1;
        if exp_idx < bytes.len() && matches!(bytes[exp_idx], b'+' | b'-') {
            exp_idx += 1;
        }
        let exp_digits_start = exp_idx;
        while exp_idx < bytes.len() && bytes[exp_idx].is_ascii_digit() {
            exp_idx += 1;
        }
        if exp_idx > exp_digits_start {
            idx = exp_idx;
        }
    }

    trimmed[..idx].parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pixel_values() {
        assert_eq!(parse_css_float("16px"), 16.0);
        assert_eq!(parse_css_float("  12.5px"), 12.5);
        assert_eq!(parse_css_float(".75em"), 0.75);
        assert_eq!(parse_css_float("3."), 3.0);
        assert_eq!(parse_css_float("-2e1px"), -20.0);
        assert_eq!(parse_css_float("+4"), 4.0);
    }

    #[test]
    fn exponent_without_digits_is_not_consumed() {
        assert_eq!(parse_css_float("1e"), 1.0);
        assert_eq!(parse_css_float("2e+px"), 2.0);
        assert_eq!(parse_css_float("5E-1"), 0.5);
    }

    #[test]
    fn unparsable_values_are_nan() {
        assert!(parse_css_float("").is_nan());
        assert!(parse_css_float("medium").is_nan());
        assert!(parse_css_float(".").is_nan());
        assert!(parse_css_float("-px").is_nan());
        assert!(parse_css_float("px16").is_nan());
    }

    #[test]
    fn infinity_literal_is_recognised() {
        assert_eq!(parse_css_float("Infinity"), f64::INFINITY);
        assert_eq!(parse_css_float("-Infinitypx"), f64::NEG_INFINITY);
        assert!(parse_css_float("inf").is_nan());
    }

    #[test]
    fn exact_comparison_by_default() {
        let a = BoxSize::new(100.0, 50.0);
        assert!(!a.differs_from(&BoxSize::new(100.0, 50.0), 0.0));
        assert!(a.differs_from(&BoxSize::new(100.5, 50.0), 0.0));
        assert!(a.differs_from(&BoxSize::new(100.0, 49.0), 0.0));
    }

    #[test]
    fn epsilon_absorbs_subpixel_jitter() {
        let a = BoxSize::new(100.0, 50.0);
        assert!(!a.differs_from(&BoxSize::new(100.4, 50.0), 0.5));
        assert!(a.differs_from(&BoxSize::new(101.0, 50.0), 0.5));
        assert!(a.differs_from(&BoxSize::new(f64::INFINITY, 50.0), 0.5));
    }

    #[test]
    fn nan_axes_compare_unchanged() {
        let a = BoxSize::new(f64::NAN, 10.0);
        assert!(!a.differs_from(&BoxSize::new(f64::NAN, 10.0), 0.0));
        assert!(a.differs_from(&BoxSize::new(1.0, 10.0), 0.0));
    }

    #[test]
    fn ems_divide_both_axes() {
        let ems = BoxSize::new(160.0, 48.0).in_ems(16.0);
        assert_eq!(ems, BoxSize::new(10.0, 3.0));
        let zero = BoxSize::new(1.0, 0.0).in_ems(0.0);
        assert_eq!(zero.width, f64::INFINITY);
        assert!(zero.height.is_nan());
    }
}
