//! Shared report types.
//!
//! These are serialized to JSON by the CLI (`--json`) and by batch reports,
//! so field names are part of the output contract.

use crate::imaging::{ImageFormat, OutputFormat, ProcessError, ProcessedImage};
use serde::{Deserialize, Serialize};

/// Facts about a loaded image, derived once at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Short format name (`png`, `jpeg`, ...).
    pub format: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Encoded size in bytes.
    pub file_size: u64,
    /// Alpha channel present and at least one pixel not fully opaque.
    pub has_transparency: bool,
}

impl ImageMetadata {
    pub fn new(
        format: ImageFormat,
        width: u32,
        height: u32,
        file_size: u64,
        has_transparency: bool,
    ) -> Self {
        let (name, mime) = match OutputFormat::from_image_format(format) {
            Some(f) => (f.to_string(), f.mime_type().to_string()),
            None => (
                format!("{format:?}").to_ascii_lowercase(),
                format.to_mime_type().to_string(),
            ),
        };
        Self {
            format: name,
            mime_type: mime,
            width,
            height,
            file_size,
            has_transparency,
        }
    }
}

/// Uniform success/failure report for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Where the result was written, when it was written anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            width: None,
            height: None,
            size: None,
            mime_type: None,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

impl From<&ProcessedImage> for ProcessingResult {
    fn from(processed: &ProcessedImage) -> Self {
        let encoded = &processed.encoded;
        Self {
            success: true,
            width: Some(encoded.dimensions.width),
            height: Some(encoded.dimensions.height),
            size: Some(encoded.len() as u64),
            mime_type: Some(encoded.mime_type().to_string()),
            output: None,
            error: None,
        }
    }
}

impl From<&Result<ProcessedImage, ProcessError>> for ProcessingResult {
    fn from(result: &Result<ProcessedImage, ProcessError>) -> Self {
        match result {
            Ok(processed) => processed.into(),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Dimensions, EncodedImage, Quality};

    fn processed() -> ProcessedImage {
        ProcessedImage {
            operation: "resize",
            encoded: EncodedImage {
                bytes: vec![0; 42],
                format: OutputFormat::Jpeg,
                quality: Quality::new(80),
                dimensions: Dimensions::new(400, 300),
            },
        }
    }

    #[test]
    fn success_result_carries_dimensions_and_mime() {
        let result = ProcessingResult::from(&Ok(processed()));
        assert!(result.success);
        assert_eq!(result.width, Some(400));
        assert_eq!(result.height, Some(300));
        assert_eq!(result.size, Some(42));
        assert_eq!(result.mime_type.as_deref(), Some("image/jpeg"));
        assert!(result.error.is_none());
    }

    #[test]
    fn failure_result_carries_message_only() {
        let result = ProcessingResult::from(&Err(ProcessError::NotLoaded));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No image loaded"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "No image loaded"})
        );
    }

    #[test]
    fn metadata_names_known_formats() {
        let meta = ImageMetadata::new(ImageFormat::Jpeg, 10, 20, 300, false);
        assert_eq!(meta.format, "jpeg");
        assert_eq!(meta.mime_type, "image/jpeg");
    }
}
