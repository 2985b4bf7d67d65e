//! The stateful editor: one canvas, many tools.
//!
//! [`ImageProcessor`] owns the current canvas and runs each tool through
//! [`apply_operation`]. A tool that fails leaves the canvas exactly as it
//! was; a canvas-mutating tool that succeeds replaces it.

use super::backend::{Dimensions, ImageBackend};
use super::color::{PickedColor, has_transparency};
use super::operations::{
    EncodedImage, Operation, OperationOutput, ProcessError, Result, apply_operation,
    decode_data_url,
};
use super::params::{
    Adjustments, CompressParams, ConvertParams, CropArea, EncodeParams, ResizeSpec, RotateParams,
    WatermarkParams,
};
use super::rust_backend::RustBackend;
use crate::presets::SocialPreset;
use crate::types::ImageMetadata;
use image::{DynamicImage, GenericImageView};
use std::path::Path;
use std::sync::Arc;

/// The encoded output of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Operation name (`resize`, `convert`, ...).
    pub operation: &'static str,
    pub encoded: EncodedImage,
}

impl ProcessedImage {
    pub fn dimensions(&self) -> Dimensions {
        self.encoded.dimensions
    }
}

pub struct ImageProcessor {
    backend: Arc<dyn ImageBackend>,
    canvas: Option<DynamicImage>,
    metadata: Option<ImageMetadata>,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self::with_backend(Arc::new(RustBackend::new()))
    }

    pub fn with_backend(backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            backend,
            canvas: None,
            metadata: None,
        }
    }

    pub fn backend(&self) -> Arc<dyn ImageBackend> {
        Arc::clone(&self.backend)
    }

    /// Decode `bytes` into a fresh canvas, replacing any previous one.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<ImageMetadata> {
        let decoded = self.backend.decode(bytes)?;
        let (width, height) = decoded.image.dimensions();
        let metadata = ImageMetadata::new(
            decoded.format,
            width,
            height,
            bytes.len() as u64,
            has_transparency(&decoded.image),
        );
        log::debug!(
            "Loaded {}x{} {} ({} bytes)",
            width,
            height,
            metadata.format,
            metadata.file_size
        );
        self.canvas = Some(decoded.image);
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    pub fn load_path(&mut self, path: &Path) -> Result<ImageMetadata> {
        let bytes = std::fs::read(path)?;
        self.load_bytes(&bytes)
    }

    pub fn is_loaded(&self) -> bool {
        self.canvas.is_some()
    }

    /// Metadata captured at load time.
    pub fn metadata(&self) -> Option<&ImageMetadata> {
        self.metadata.as_ref()
    }

    /// Current canvas dimensions (these change as tools are applied).
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.canvas.as_ref().map(Dimensions::of)
    }

    pub fn canvas(&self) -> Option<&DynamicImage> {
        self.canvas.as_ref()
    }

    fn require_canvas(&self) -> Result<&DynamicImage> {
        self.canvas.as_ref().ok_or(ProcessError::NotLoaded)
    }

    pub fn apply(&mut self, operation: &Operation) -> Result<ProcessedImage> {
        self.apply_with_progress(operation, &mut |_| {})
    }

    pub fn apply_with_progress(
        &mut self,
        operation: &Operation,
        progress: &mut dyn FnMut(u8),
    ) -> Result<ProcessedImage> {
        let canvas = self.require_canvas()?;
        let output = apply_operation(self.backend.as_ref(), canvas, operation, progress)?;
        Ok(self.commit(operation, output))
    }

    /// Adopt the output of an operation that ran elsewhere.
    pub(crate) fn commit(&mut self, operation: &Operation, output: OperationOutput) -> ProcessedImage {
        if let Some(image) = output.image {
            self.canvas = Some(image);
        }
        ProcessedImage {
            operation: operation.name(),
            encoded: output.encoded,
        }
    }

    pub fn resize(&mut self, spec: ResizeSpec) -> Result<ProcessedImage> {
        self.apply(&Operation::Resize(spec))
    }

    pub fn crop(&mut self, area: CropArea) -> Result<ProcessedImage> {
        self.apply(&Operation::Crop(area))
    }

    pub fn rotate(&mut self, params: RotateParams) -> Result<ProcessedImage> {
        self.apply(&Operation::Rotate(params))
    }

    pub fn adjust(&mut self, adjustments: Adjustments) -> Result<ProcessedImage> {
        self.apply(&Operation::Adjust(adjustments))
    }

    pub fn watermark(&mut self, params: WatermarkParams) -> Result<ProcessedImage> {
        self.apply(&Operation::Watermark(params))
    }

    pub fn apply_preset(&mut self, preset: &SocialPreset) -> Result<ProcessedImage> {
        self.apply(&preset.operation())
    }

    pub fn compress(&mut self, params: CompressParams) -> Result<ProcessedImage> {
        self.apply(&Operation::Compress(params))
    }

    pub fn convert(&mut self, params: ConvertParams) -> Result<ProcessedImage> {
        self.apply(&Operation::Convert(params))
    }

    /// Sample the canvas pixel at (`x`, `y`).
    pub fn pick_color(&self, x: u32, y: u32) -> Result<PickedColor> {
        let canvas = self.require_canvas()?;
        if !canvas.in_bounds(x, y) {
            return Err(ProcessError::InvalidInput(format!(
                "point ({x}, {y}) is outside the {}x{} canvas",
                canvas.width(),
                canvas.height()
            )));
        }
        Ok(PickedColor::new(x, y, canvas.get_pixel(x, y)))
    }

    /// The canvas as a `data:image/png;base64,...` URL.
    pub fn snapshot(&self) -> Result<String> {
        let canvas = self.require_canvas()?;
        let bytes = self.backend.encode(canvas, &EncodeParams::png())?;
        let encoded = EncodedImage {
            bytes,
            format: EncodeParams::png().format,
            quality: EncodeParams::png().quality,
            dimensions: Dimensions::of(canvas),
        };
        Ok(encoded.data_url())
    }

    /// Replace the canvas with a previously taken snapshot.
    ///
    /// Load-time metadata is kept.
    pub fn restore(&mut self, snapshot: &str) -> Result<Dimensions> {
        let bytes = decode_data_url(snapshot)?;
        let decoded = self.backend.decode(&bytes)?;
        let dims = Dimensions::of(&decoded.image);
        self.canvas = Some(decoded.image);
        Ok(dims)
    }
}
