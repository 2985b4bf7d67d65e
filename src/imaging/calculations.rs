//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{CropArea, ResizeSpec, WatermarkPosition};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DimensionError {
    #[error("Target dimensions must be greater than zero")]
    ZeroTarget,
    #[error("Percentage must be a positive number, got {0}")]
    InvalidPercentage(f64),
    #[error("Crop area must not be empty")]
    EmptyCrop,
    #[error("Crop area exceeds image bounds")]
    CropOutOfBounds,
    #[error("Rotation angle must be a finite number")]
    InvalidAngle,
    #[error("Output size {width}x{height} exceeds the {limit}px edge limit")]
    TooLarge { width: u32, height: u32, limit: u32 },
}

/// Longest edge any operation may produce. Matches the largest tier's
/// upload limit.
pub const MAX_CANVAS_EDGE: u32 = 20_000;

/// Reject output sizes with an edge longer than [`MAX_CANVAS_EDGE`].
pub fn check_canvas_size(dims: (u32, u32)) -> Result<(u32, u32), DimensionError> {
    if dims.0 > MAX_CANVAS_EDGE || dims.1 > MAX_CANVAS_EDGE {
        return Err(DimensionError::TooLarge {
            width: dims.0,
            height: dims.1,
            limit: MAX_CANVAS_EDGE,
        });
    }
    Ok(dims)
}

// Saturates at u32::MAX, which the canvas check then rejects.
fn scale(value: u32, factor: f64) -> u32 {
    ((value as f64 * factor).round() as u32).max(1)
}

/// Calculate resize target dimensions from a [`ResizeSpec`].
///
/// Scaled edges are rounded to the nearest pixel and never drop below 1.
/// Results with an edge over [`MAX_CANVAS_EDGE`] are rejected.
///
/// # Examples
/// ```
/// # use resize_suite::imaging::{ResizeSpec, calculate_resize_dimensions};
/// // 50% of 800x600 → 400x300
/// assert_eq!(calculate_resize_dimensions((800, 600), &ResizeSpec::Percentage(50.0)), Ok((400, 300)));
///
/// // Width-locked: 400 wide keeps 4:3 → 400x300
/// assert_eq!(calculate_resize_dimensions((800, 600), &ResizeSpec::Width(400)), Ok((400, 300)));
/// ```
pub fn calculate_resize_dimensions(
    source: (u32, u32),
    spec: &ResizeSpec,
) -> Result<(u32, u32), DimensionError> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return Err(DimensionError::ZeroTarget);
    }

    let dims = match *spec {
        ResizeSpec::Exact { width, height } => {
            if width == 0 || height == 0 {
                return Err(DimensionError::ZeroTarget);
            }
            (width, height)
        }
        ResizeSpec::Percentage(p) => {
            if !p.is_finite() || p <= 0.0 {
                return Err(DimensionError::InvalidPercentage(p));
            }
            let factor = p / 100.0;
            (scale(src_w, factor), scale(src_h, factor))
        }
        ResizeSpec::Width(width) => {
            if width == 0 {
                return Err(DimensionError::ZeroTarget);
            }
            (width, scale(src_h, width as f64 / src_w as f64))
        }
        ResizeSpec::Height(height) => {
            if height == 0 {
                return Err(DimensionError::ZeroTarget);
            }
            (scale(src_w, height as f64 / src_h as f64), height)
        }
        ResizeSpec::Fit {
            max_width,
            max_height,
        } => {
            if max_width == 0 || max_height == 0 {
                return Err(DimensionError::ZeroTarget);
            }
            let ratio = (max_width as f64 / src_w as f64).min(max_height as f64 / src_h as f64);
            let (w, h) = (scale(src_w, ratio), scale(src_h, ratio));
            // Rounding can overshoot the box by one pixel on one edge
            (w.min(max_width), h.min(max_height))
        }
    };
    check_canvas_size(dims)
}

/// Check that a crop rectangle is non-empty and lies inside the source.
pub fn validate_crop_area(source: (u32, u32), area: &CropArea) -> Result<(), DimensionError> {
    if area.width == 0 || area.height == 0 {
        return Err(DimensionError::EmptyCrop);
    }
    let right = area.x as u64 + area.width as u64;
    let bottom = area.y as u64 + area.height as u64;
    if right > source.0 as u64 || bottom > source.1 as u64 {
        return Err(DimensionError::CropOutOfBounds);
    }
    Ok(())
}

/// Calculate the bounding box of an image rotated by `degrees`.
///
/// Projects both edges onto the axes: `|w·cos θ| + |h·sin θ|` by
/// `|w·sin θ| + |h·cos θ|`. Right angles are exact (0° keeps the size,
/// 90° swaps it).
pub fn calculate_rotated_dimensions(
    source: (u32, u32),
    degrees: f64,
) -> Result<(u32, u32), DimensionError> {
    if !degrees.is_finite() {
        return Err(DimensionError::InvalidAngle);
    }
    let (w, h) = (source.0 as f64, source.1 as f64);
    let radians = degrees.rem_euclid(360.0).to_radians();
    let snap = |v: f64| if v.abs() < 1e-9 { 0.0 } else { v.abs() };
    let (cos, sin) = (snap(radians.cos()), snap(radians.sin()));

    let out_w = (w * cos + h * sin).round() as u32;
    let out_h = (w * sin + h * cos).round() as u32;
    check_canvas_size((out_w.max(1), out_h.max(1)))
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Centered crop rectangle of `target` size inside `filled`.
pub fn calculate_center_crop(filled: (u32, u32), target: (u32, u32)) -> CropArea {
    let width = target.0.min(filled.0);
    let height = target.1.min(filled.1);
    CropArea {
        x: (filled.0 - width) / 2,
        y: (filled.1 - height) / 2,
        width,
        height,
    }
}

/// Top-left corner for a watermark of size `mark` on a `canvas`.
///
/// Marks larger than the canvas are anchored at the origin edge rather
/// than pushed to negative offsets.
pub fn calculate_watermark_position(
    canvas: (u32, u32),
    mark: (u32, u32),
    position: WatermarkPosition,
    margin: u32,
) -> (i64, i64) {
    let (cw, ch) = (canvas.0 as i64, canvas.1 as i64);
    let (mw, mh) = (mark.0 as i64, mark.1 as i64);
    let m = margin as i64;

    let (x, y) = match position {
        WatermarkPosition::TopLeft => (m, m),
        WatermarkPosition::TopRight => (cw - mw - m, m),
        WatermarkPosition::BottomLeft => (m, ch - mh - m),
        WatermarkPosition::BottomRight => (cw - mw - m, ch - mh - m),
        WatermarkPosition::Center => ((cw - mw) / 2, (ch - mh) / 2),
    };
    (x.max(0), y.max(0))
}
