//! High-level image operations.
//!
//! [`apply_operation`] combines the pure calculations with backend
//! execution. It is the single code path behind every tool: the inline
//! [`ImageProcessor`](super::ImageProcessor) and the background
//! [`WorkerManager`](crate::worker::WorkerManager) both call it, so an
//! operation behaves identically wherever it runs.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    DimensionError, calculate_center_crop, calculate_fill_dimensions, calculate_resize_dimensions,
    calculate_rotated_dimensions, calculate_watermark_position, check_canvas_size,
    validate_crop_area,
};
use super::format::OutputFormat;
use super::params::{
    Adjustments, CompressParams, ConvertParams, CropArea, EncodeParams, Quality, ResizeSpec,
    RotateParams, WatermarkParams,
};
use base64::{Engine as _, engine::general_purpose};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

/// Lowest quality the byte-budget search in compress will try.
const MIN_COMPRESS_QUALITY: u32 = 10;
/// Quality decrement per compress attempt.
const COMPRESS_QUALITY_STEP: u32 = 10;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("No image loaded")]
    NotLoaded,
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Image processing failed: {0}")]
    Backend(#[from] BackendError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid snapshot: {0}")]
    Snapshot(String),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Encoded image bytes with their format: the output of every tool.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub quality: Quality,
    pub dimensions: Dimensions,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:<mime>;base64,<payload>` form of the bytes.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

/// Extract the payload of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ProcessError::Snapshot("missing data: prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ProcessError::Snapshot("missing payload separator".into()))?;
    if !meta.ends_with(";base64") {
        return Err(ProcessError::Snapshot("payload is not base64".into()));
    }
    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ProcessError::Snapshot(e.to_string()))
}

/// One editing request.
///
/// Canvas-mutating operations produce a new canvas; `Compress` and
/// `Convert` only encode the current one.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Resize(ResizeSpec),
    /// Fill-resize then centre-crop to exactly `width` x `height`.
    Cover { width: u32, height: u32 },
    Crop(CropArea),
    Rotate(RotateParams),
    Adjust(Adjustments),
    Watermark(WatermarkParams),
    Compress(CompressParams),
    Convert(ConvertParams),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Resize(_) => "resize",
            Operation::Cover { .. } => "cover",
            Operation::Crop(_) => "crop",
            Operation::Rotate(_) => "rotate",
            Operation::Adjust(_) => "adjust",
            Operation::Watermark(_) => "watermark",
            Operation::Compress(_) => "compress",
            Operation::Convert(_) => "convert",
        }
    }

    pub fn mutates_canvas(&self) -> bool {
        !matches!(self, Operation::Compress(_) | Operation::Convert(_))
    }

    /// Human-readable summary, used as the history entry description.
    pub fn describe(&self) -> String {
        match self {
            Operation::Resize(ResizeSpec::Exact { width, height }) => {
                format!("Resize to {width}x{height}")
            }
            Operation::Resize(ResizeSpec::Percentage(p)) => format!("Resize to {p}%"),
            Operation::Resize(ResizeSpec::Width(w)) => format!("Resize to width {w}"),
            Operation::Resize(ResizeSpec::Height(h)) => format!("Resize to height {h}"),
            Operation::Resize(ResizeSpec::Fit {
                max_width,
                max_height,
            }) => format!("Resize to fit {max_width}x{max_height}"),
            Operation::Cover { width, height } => format!("Resize and crop to {width}x{height}"),
            Operation::Crop(area) => format!(
                "Crop {}x{} at ({}, {})",
                area.width, area.height, area.x, area.y
            ),
            Operation::Rotate(params) => {
                let mut text = format!("Rotate {}°", params.degrees);
                if params.flip_horizontal {
                    text.push_str(", flip horizontal");
                }
                if params.flip_vertical {
                    text.push_str(", flip vertical");
                }
                text
            }
            Operation::Adjust(_) => "Adjust colours".to_string(),
            Operation::Watermark(_) => "Add watermark".to_string(),
            Operation::Compress(p) => {
                format!("Compress to {} at quality {}", p.format, p.quality.value())
            }
            Operation::Convert(p) => format!("Convert to {}", p.format),
        }
    }
}

/// What an operation produced.
#[derive(Debug, Clone)]
pub struct OperationOutput {
    /// The new canvas, for canvas-mutating operations.
    pub image: Option<DynamicImage>,
    pub encoded: EncodedImage,
}

impl OperationOutput {
    pub fn dimensions(&self) -> Dimensions {
        self.encoded.dimensions
    }
}

fn encode(
    backend: &dyn ImageBackend,
    image: &DynamicImage,
    params: &EncodeParams,
) -> Result<EncodedImage> {
    let bytes = backend.encode(image, params)?;
    Ok(EncodedImage {
        bytes,
        format: params.format,
        quality: params.quality,
        dimensions: Dimensions::of(image),
    })
}

/// Encode, stepping quality down until the output fits `max_bytes`.
///
/// Lossless formats are encoded once. When even the floor quality does not
/// fit, the smallest attempt is returned.
fn compress(
    backend: &dyn ImageBackend,
    image: &DynamicImage,
    params: &CompressParams,
) -> Result<EncodedImage> {
    let mut quality = params.quality;
    loop {
        let encoded = encode(
            backend,
            image,
            &EncodeParams {
                format: params.format,
                quality,
                background: None,
            },
        )?;
        let fits = params
            .max_bytes
            .is_none_or(|max| encoded.len() as u64 <= max);
        if fits || !params.format.is_lossy() || quality.value() <= MIN_COMPRESS_QUALITY {
            if !fits {
                log::warn!(
                    "compress: {} bytes still over budget at quality {}",
                    encoded.len(),
                    quality.value()
                );
            }
            return Ok(encoded);
        }
        quality = Quality::new(
            quality
                .value()
                .saturating_sub(COMPRESS_QUALITY_STEP)
                .max(MIN_COMPRESS_QUALITY),
        );
        log::debug!("compress: retrying at quality {}", quality.value());
    }
}

/// Pixel step of an operation: the new canvas, or `None` for encode-only
/// operations.
pub fn transform(
    backend: &dyn ImageBackend,
    image: &DynamicImage,
    operation: &Operation,
) -> Result<Option<DynamicImage>> {
    let source = Dimensions::of(image).as_tuple();
    let transformed = match operation {
        Operation::Resize(spec) => {
            let (width, height) = calculate_resize_dimensions(source, spec)?;
            backend.resize(image, width, height)?
        }
        Operation::Cover { width, height } => {
            if *width == 0 || *height == 0 {
                return Err(DimensionError::ZeroTarget.into());
            }
            let target = check_canvas_size((*width, *height))?;
            let filled = check_canvas_size(calculate_fill_dimensions(source, target))?;
            let resized = backend.resize(image, filled.0, filled.1)?;
            backend.crop(&resized, &calculate_center_crop(filled, target))?
        }
        Operation::Crop(area) => {
            validate_crop_area(source, area)?;
            backend.crop(image, area)?
        }
        Operation::Rotate(params) => {
            let output = calculate_rotated_dimensions(source, params.degrees)?;
            backend.rotate(image, params, output.into())?
        }
        Operation::Adjust(adjustments) => backend.adjust(image, adjustments)?,
        Operation::Watermark(params) => {
            if !(0.0..=1.0).contains(&params.opacity) {
                return Err(ProcessError::InvalidInput(format!(
                    "watermark opacity must be between 0 and 1, got {}",
                    params.opacity
                )));
            }
            let mark = Dimensions::of(&params.mark).as_tuple();
            let at = calculate_watermark_position(source, mark, params.position, params.margin);
            backend.overlay(image, &params.mark, at, params.opacity)?
        }
        Operation::Compress(_) | Operation::Convert(_) => return Ok(None),
    };
    Ok(Some(transformed))
}

/// Run one operation against `image`: transform, then encode.
///
/// `progress` receives 0 on start, 50 once pixels are transformed and 100
/// once the result is encoded. `image` itself is never modified.
pub fn apply_operation(
    backend: &dyn ImageBackend,
    image: &DynamicImage,
    operation: &Operation,
    progress: &mut dyn FnMut(u8),
) -> Result<OperationOutput> {
    progress(0);
    let transformed = transform(backend, image, operation)?;
    progress(50);

    let encoded = match (operation, &transformed) {
        (Operation::Compress(params), _) => compress(backend, image, params)?,
        (Operation::Convert(params), _) => encode(backend, image, &params.encode_params())?,
        (_, Some(canvas)) => encode(backend, canvas, &EncodeParams::png())?,
        (_, None) => encode(backend, image, &EncodeParams::png())?,
    };
    progress(100);

    log::debug!(
        "{}: {}x{} -> {}x{} ({} bytes {})",
        operation.name(),
        image.width(),
        image.height(),
        encoded.dimensions.width,
        encoded.dimensions.height,
        encoded.len(),
        encoded.mime_type()
    );

    Ok(OperationOutput {
        image: transformed,
        encoded,
    })
}
