//! Image processing on top of the `image` crate.
//!
//! | Tool | Crate / function |
//! |---|---|
//! | **Decode** | `image::guess_format` + `load_from_memory_with_format` |
//! | **Resize** | Lanczos3 `resize_exact` |
//! | **Rotate** | `rotate90/180/270`, bilinear sampling for other angles |
//! | **Encode** | PNG, JPEG, WebP, BMP, GIF, TIFF, AVIF (rav1e) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`Operation`] and [`apply_operation`], shared by the
//!   inline processor and the background worker
//! - **Processor**: [`ImageProcessor`], the stateful canvas owner

pub mod backend;
mod calculations;
pub mod color;
mod format;
pub mod operations;
mod params;
pub mod processor;
pub mod rust_backend;

pub use backend::{BackendError, DecodedImage, Dimensions, ImageBackend};
pub use calculations::{
    DimensionError, MAX_CANVAS_EDGE, calculate_center_crop, calculate_fill_dimensions,
    calculate_resize_dimensions, calculate_rotated_dimensions, calculate_watermark_position,
    check_canvas_size, validate_crop_area,
};
pub use color::{ColorError, PickedColor, parse_hex_color};
pub use format::OutputFormat;
pub use image::ImageFormat;
pub use operations::{
    EncodedImage, Operation, OperationOutput, ProcessError, apply_operation, decode_data_url,
    transform,
};
pub use params::{
    Adjustments, CompressParams, ConvertParams, CropArea, EncodeParams, Quality, ResizeSpec,
    RotateParams, WatermarkParams, WatermarkPosition,
};
pub use processor::{ImageProcessor, ProcessedImage};
pub use rust_backend::RustBackend;
