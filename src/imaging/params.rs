//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`processor`](super::processor) (which decides
//! target dimensions and validates requests) and the
//! [`backend`](super::backend) (which does the actual pixel work). Keeping
//! them plain data lets the same request run inline or on the background
//! worker.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 92). Clamped on construction.
//! - [`ResizeSpec`]: How the target size is derived: exact, percentage, aspect-locked edge, or fit-in-box.
//! - [`CropArea`]: Source rectangle to keep.
//! - [`RotateParams`]: Rotation angle in degrees plus optional flips.
//! - [`Adjustments`]: Tonal filters (brightness, contrast, grayscale, …).
//! - [`WatermarkParams`]: Image overlay with position, opacity and margin.
//! - [`EncodeParams`]: Output format, quality and optional flatten colour.
//! - [`CompressParams`] / [`ConvertParams`]: The two encode-only tools.

use super::format::OutputFormat;
use image::{DynamicImage, Rgba};
use std::str::FromStr;
use std::sync::Arc;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

/// How a resize derives its target dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeSpec {
    /// Exact output size, aspect ratio ignored.
    Exact { width: u32, height: u32 },
    /// Scale both edges by a percentage of the source.
    Percentage(f64),
    /// Set the width; height follows the source aspect ratio.
    Width(u32),
    /// Set the height; width follows the source aspect ratio.
    Height(u32),
    /// Largest aspect-preserving size that fits inside the box.
    Fit { max_width: u32, max_height: u32 },
}

/// A source rectangle, in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Rotation (clockwise, degrees) followed by optional flips.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotateParams {
    pub degrees: f64,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl RotateParams {
    pub fn degrees(degrees: f64) -> Self {
        Self {
            degrees,
            ..Self::default()
        }
    }

    /// Angle normalised to `[0, 360)`.
    pub fn normalized_degrees(&self) -> f64 {
        self.degrees.rem_euclid(360.0)
    }

    pub fn is_identity(&self) -> bool {
        self.normalized_degrees() == 0.0 && !self.flip_horizontal && !self.flip_vertical
    }
}

/// Tonal adjustments, applied in field order.
///
/// - `brightness`: -100..=100, added to every channel (scaled to ±255)
/// - `contrast`: -100..=100 percent
/// - `hue_rotate`: degrees
/// - `blur`: Gaussian sigma, 0 disables
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Adjustments {
    pub brightness: i32,
    pub contrast: f32,
    pub grayscale: bool,
    pub invert: bool,
    pub hue_rotate: i32,
    pub blur: f32,
}

impl Adjustments {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Anchor for watermark placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl FromStr for WatermarkPosition {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top-left" => Ok(WatermarkPosition::TopLeft),
            "top-right" => Ok(WatermarkPosition::TopRight),
            "bottom-left" => Ok(WatermarkPosition::BottomLeft),
            "bottom-right" => Ok(WatermarkPosition::BottomRight),
            "center" | "centre" => Ok(WatermarkPosition::Center),
            other => Err(format!(
                "unknown position '{other}'. Expected top-left, top-right, bottom-left, bottom-right or center"
            )),
        }
    }
}

/// Overlay another image onto the canvas.
///
/// `opacity` is 0.0–1.0 and multiplies the mark's own alpha.
#[derive(Debug, Clone)]
pub struct WatermarkParams {
    pub mark: Arc<DynamicImage>,
    pub position: WatermarkPosition,
    pub opacity: f32,
    pub margin: u32,
}

impl PartialEq for WatermarkParams {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mark, &other.mark)
            && self.position == other.position
            && self.opacity == other.opacity
            && self.margin == other.margin
    }
}

/// Everything an encode needs: format, quality and flatten colour.
///
/// When `background` is set, transparent pixels are composited onto it
/// before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EncodeParams {
    pub format: OutputFormat,
    pub quality: Quality,
    pub background: Option<Rgba<u8>>,
}

impl EncodeParams {
    pub fn png() -> Self {
        Self::default()
    }
}

/// Re-encode the canvas, optionally under a byte budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressParams {
    pub format: OutputFormat,
    pub quality: Quality,
    /// Upper bound on the encoded size. Lossy formats lower the quality in
    /// steps until the output fits.
    pub max_bytes: Option<u64>,
}

impl Default for CompressParams {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: Quality::new(80),
            max_bytes: None,
        }
    }
}

/// Encode the canvas into another format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertParams {
    pub format: OutputFormat,
    pub quality: Quality,
    /// Keep the alpha channel when the target format can carry it.
    pub preserve_transparency: bool,
    /// Colour transparent pixels are flattened onto.
    pub background: Rgba<u8>,
}

impl ConvertParams {
    pub fn to(format: OutputFormat) -> Self {
        Self {
            format,
            quality: Quality::default(),
            preserve_transparency: true,
            background: Rgba([255, 255, 255, 255]),
        }
    }

    /// Resolve into encoder parameters, deciding whether to flatten.
    pub fn encode_params(&self) -> EncodeParams {
        let flatten = !self.preserve_transparency || !self.format.supports_alpha();
        EncodeParams {
            format: self.format,
            quality: self.quality,
            background: flatten.then_some(self.background),
        }
    }
}
