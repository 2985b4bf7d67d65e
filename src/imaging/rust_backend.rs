//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, BMP, GIF, TIFF) | `image::load_from_memory_with_format` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Crop | `DynamicImage::crop_imm` |
//! | Rotate 90/180/270 | `rotate90` / `rotate180` / `rotate270` (lossless) |
//! | Rotate other angles | inverse-mapped bilinear sampling, rows in parallel with `rayon` |
//! | Flip | `fliph` / `flipv` |
//! | Adjust | `brighten`, `adjust_contrast`, `grayscale`, `invert`, `huerotate`, `blur` |
//! | Watermark | `image::imageops::overlay` after scaling the mark's alpha |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → AVIF | `AvifEncoder` (rav1e, speed 6) |
//! | Encode → PNG, WebP (lossless), BMP, GIF, TIFF | `DynamicImage::write_to` |

use super::backend::{BackendError, DecodedImage, Dimensions, ImageBackend};
use super::color::flatten_onto;
use super::format::OutputFormat;
use super::params::{Adjustments, CropArea, EncodeParams, RotateParams};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use rayon::prelude::*;
use std::io::Cursor;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotate clockwise by an arbitrary angle into an `output`-sized canvas.
///
/// Each output pixel centre is mapped back into the source and sampled
/// bilinearly with premultiplied alpha; samples outside the source are
/// transparent.
fn rotate_arbitrary(source: &RgbaImage, degrees: f64, output: Dimensions) -> RgbaImage {
    let (src_w, src_h) = (source.width() as f64, source.height() as f64);
    let (out_w, out_h) = (output.width as usize, output.height as usize);
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();
    let (src_cx, src_cy) = (src_w / 2.0, src_h / 2.0);
    let (out_cx, out_cy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    let mut buf = vec![0u8; out_w * out_h * 4];
    buf.par_chunks_mut(out_w * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let dy = y as f64 + 0.5 - out_cy;
            for x in 0..out_w {
                let dx = x as f64 + 0.5 - out_cx;
                let sx = dx * cos + dy * sin + src_cx - 0.5;
                let sy = -dx * sin + dy * cos + src_cy - 0.5;
                let px = sample_bilinear(source, sx, sy);
                row[x * 4..x * 4 + 4].copy_from_slice(&px);
            }
        });

    RgbaImage::from_raw(output.width, output.height, buf)
        .unwrap_or_else(|| RgbaImage::new(output.width, output.height))
}

fn sample_bilinear(source: &RgbaImage, x: f64, y: f64) -> [u8; 4] {
    let (w, h) = (source.width() as i64, source.height() as i64);
    let (x0, y0) = (x.floor() as i64, y.floor() as i64);
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let mut acc = [0.0f64; 4];
    for (ox, oy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        let (px, py) = (x0 + ox, y0 + oy);
        if weight == 0.0 || px < 0 || py < 0 || px >= w || py >= h {
            continue;
        }
        let [r, g, b, a] = source.get_pixel(px as u32, py as u32).0;
        let alpha = a as f64 / 255.0 * weight;
        acc[0] += r as f64 * alpha;
        acc[1] += g as f64 * alpha;
        acc[2] += b as f64 * alpha;
        acc[3] += alpha;
    }

    if acc[3] <= f64::EPSILON {
        return [0, 0, 0, 0];
    }
    [
        (acc[0] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[1] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[2] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// Convert to the exact pixel layout the target encoder accepts.
fn prepare_for_format(image: &DynamicImage, format: OutputFormat) -> DynamicImage {
    if format.supports_alpha() && image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

fn encode_error(format: OutputFormat, err: image::ImageError) -> BackendError {
    BackendError::Encode {
        format: format.to_string(),
        message: err.to_string(),
    }
}

fn container_format(format: OutputFormat) -> ImageFormat {
    match format {
        OutputFormat::Png => ImageFormat::Png,
        OutputFormat::Jpeg => ImageFormat::Jpeg,
        OutputFormat::WebP => ImageFormat::WebP,
        OutputFormat::Bmp => ImageFormat::Bmp,
        OutputFormat::Gif => ImageFormat::Gif,
        OutputFormat::Tiff => ImageFormat::Tiff,
        OutputFormat::Avif => ImageFormat::Avif,
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, BackendError> {
        let format = image::guess_format(bytes).map_err(|_| BackendError::UnknownFormat)?;
        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(DecodedImage { image, format })
    }

    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, BackendError> {
        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn crop(&self, image: &DynamicImage, area: &CropArea) -> Result<DynamicImage, BackendError> {
        Ok(image.crop_imm(area.x, area.y, area.width, area.height))
    }

    fn rotate(
        &self,
        image: &DynamicImage,
        params: &RotateParams,
        output: Dimensions,
    ) -> Result<DynamicImage, BackendError> {
        let degrees = params.normalized_degrees();
        let rotated = if degrees == 0.0 {
            image.clone()
        } else if degrees == 90.0 {
            image.rotate90()
        } else if degrees == 180.0 {
            image.rotate180()
        } else if degrees == 270.0 {
            image.rotate270()
        } else {
            DynamicImage::ImageRgba8(rotate_arbitrary(&image.to_rgba8(), degrees, output))
        };

        let rotated = if params.flip_horizontal {
            rotated.fliph()
        } else {
            rotated
        };
        Ok(if params.flip_vertical {
            rotated.flipv()
        } else {
            rotated
        })
    }

    fn adjust(
        &self,
        image: &DynamicImage,
        adjustments: &Adjustments,
    ) -> Result<DynamicImage, BackendError> {
        let mut out = image.clone();
        if adjustments.brightness != 0 {
            out = out.brighten(adjustments.brightness.clamp(-100, 100) * 255 / 100);
        }
        if adjustments.contrast != 0.0 {
            out = out.adjust_contrast(adjustments.contrast.clamp(-100.0, 100.0));
        }
        if adjustments.grayscale {
            out = out.grayscale();
        }
        if adjustments.invert {
            out.invert();
        }
        if adjustments.hue_rotate != 0 {
            out = out.huerotate(adjustments.hue_rotate);
        }
        if adjustments.blur > 0.0 {
            out = out.blur(adjustments.blur);
        }
        Ok(out)
    }

    fn overlay(
        &self,
        image: &DynamicImage,
        mark: &DynamicImage,
        at: (i64, i64),
        opacity: f32,
    ) -> Result<DynamicImage, BackendError> {
        let mut base = image.to_rgba8();
        let mut mark = mark.to_rgba8();
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity < 1.0 {
            for pixel in mark.pixels_mut() {
                pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
            }
        }
        image::imageops::overlay(&mut base, &mark, at.0, at.1);
        Ok(DynamicImage::ImageRgba8(base))
    }

    fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        let format = params.format;
        let background = params
            .background
            .or((!format.supports_alpha() && image.color().has_alpha()).then_some(WHITE));

        let flattened;
        let source = match background {
            Some(bg) => {
                // Fully opaque after flattening, so drop the channel
                flattened =
                    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(flatten_onto(image, bg)).into_rgb8());
                &flattened
            }
            None => image,
        };
        let prepared = prepare_for_format(source, format);

        let mut buf = Cursor::new(Vec::new());
        let quality = params.quality.value() as u8;
        match format {
            OutputFormat::Jpeg => {
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
                prepared
                    .write_with_encoder(encoder)
                    .map_err(|e| encode_error(format, e))?;
            }
            OutputFormat::Avif => {
                let encoder =
                    image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut buf, 6, quality);
                prepared
                    .write_with_encoder(encoder)
                    .map_err(|e| encode_error(format, e))?;
            }
            other => {
                prepared
                    .write_to(&mut buf, container_format(other))
                    .map_err(|e| encode_error(format, e))?;
            }
        }
        Ok(buf.into_inner())
    }
}
