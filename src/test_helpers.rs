//! Shared test utilities: synthetic images and encoders.
//!
//! Tests never read fixture files; every image is generated in memory so
//! dimensions and pixel values are known exactly.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = encode_png(&gradient_rgba(64, 48));
//! let mut processor = ImageProcessor::new();
//! processor.load_bytes(&bytes).unwrap();
//! ```

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

// =========================================================================
// Synthetic images
// =========================================================================

/// Opaque RGBA gradient: red follows x, green follows y.
pub fn gradient_rgba(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    }))
}

/// Left half opaque blue, right half fully transparent.
pub fn half_transparent(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 255, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    }))
}

// =========================================================================
// Encoders
// =========================================================================

pub fn encode_as(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    let prepared = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image.clone(),
    };
    prepared.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    encode_as(image, ImageFormat::Png)
}

/// Write a synthetic PNG to `dir/name` and return its path.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, encode_png(&gradient_rgba(width, height))).unwrap();
    path
}
