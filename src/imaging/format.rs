//! Output formats and the format → MIME lookup.
//!
//! Every encode path goes through [`OutputFormat`]: it decides the MIME type
//! reported on an [`EncodedImage`](super::EncodedImage), the file extension
//! used by batch output, and whether transparency survives encoding.

use image::ImageFormat;
use std::fmt;
use std::str::FromStr;

/// An encodable image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    WebP,
    Bmp,
    Gif,
    Tiff,
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Png,
        OutputFormat::Jpeg,
        OutputFormat::WebP,
        OutputFormat::Bmp,
        OutputFormat::Gif,
        OutputFormat::Tiff,
        OutputFormat::Avif,
    ];

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Bmp => "image/bmp",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Avif => "image/avif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Avif => "avif",
        }
    }

    /// Whether an alpha channel survives encoding in this format.
    ///
    /// JPEG and BMP output is always flattened onto a background colour.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, OutputFormat::Jpeg | OutputFormat::Bmp)
    }

    /// Whether the quality setting has any effect on the encoder.
    ///
    /// WebP is encoded losslessly by the pure-Rust encoder.
    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::Avif)
    }

    /// Map a detected input format to the matching output format, if any.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(OutputFormat::Png),
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::WebP => Some(OutputFormat::WebP),
            ImageFormat::Bmp => Some(OutputFormat::Bmp),
            ImageFormat::Gif => Some(OutputFormat::Gif),
            ImageFormat::Tiff => Some(OutputFormat::Tiff),
            ImageFormat::Avif => Some(OutputFormat::Avif),
            _ => None,
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.mime_type() == mime)
            .or(match mime.as_str() {
                "image/jpg" | "image/pjpeg" => Some(OutputFormat::Jpeg),
                "image/x-ms-bmp" => Some(OutputFormat::Bmp),
                _ => None,
            })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::WebP => "webp",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Avif => "avif",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    /// Accepts short names (`png`, `jpg`, `jpeg`, …) and MIME types.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized.contains('/') {
            return Self::from_mime_type(&normalized)
                .ok_or_else(|| format!("unsupported output format '{value}'"));
        }
        match normalized.as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            "bmp" => Ok(OutputFormat::Bmp),
            "gif" => Ok(OutputFormat::Gif),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(format!(
                "unsupported output format '{other}'. Expected png, jpeg, webp, bmp, gif, tiff or avif"
            )),
        }
    }
}
