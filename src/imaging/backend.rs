//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the seam between request handling and pixel
//! work: decode, resize, crop, rotate, adjust, overlay and encode. The
//! processor computes target geometry with the pure functions in
//! [`calculations`](super::calculations) and hands the backend fully
//! resolved parameters.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` in this module.

use super::params::{Adjustments, CropArea, EncodeParams, RotateParams};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unrecognized image data")]
    UnknownFormat,
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode {format}: {message}")]
    Encode { format: String, message: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &DynamicImage) -> Self {
        Self::new(image.width(), image.height())
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn megapixels(self) -> f64 {
        self.width as f64 * self.height as f64 / 1_000_000.0
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// A decoded image together with the container format it was read from.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

/// Trait for image processing backends.
///
/// Every operation takes the current canvas by reference and returns a new
/// one, so a failed operation never disturbs the caller's canvas.
pub trait ImageBackend: Send + Sync {
    /// Sniff the container format and decode.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, BackendError>;

    /// Scale to exactly `width` x `height`.
    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, BackendError>;

    /// Extract an in-bounds rectangle (bounds already validated).
    fn crop(&self, image: &DynamicImage, area: &CropArea) -> Result<DynamicImage, BackendError>;

    /// Rotate clockwise into a canvas of `output` size, then apply flips.
    fn rotate(
        &self,
        image: &DynamicImage,
        params: &RotateParams,
        output: Dimensions,
    ) -> Result<DynamicImage, BackendError>;

    /// Apply tonal adjustments.
    fn adjust(
        &self,
        image: &DynamicImage,
        adjustments: &Adjustments,
    ) -> Result<DynamicImage, BackendError>;

    /// Alpha-blend `mark` onto `image` with its top-left corner at `at`.
    fn overlay(
        &self,
        image: &DynamicImage,
        mark: &DynamicImage,
        at: (i64, i64),
        opacity: f32,
    ) -> Result<DynamicImage, BackendError>;

    /// Encode to bytes in the requested format.
    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}
