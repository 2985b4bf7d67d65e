//! Upload validation against tier limits.
//!
//! Checks run cheapest first and stop at the first failure:
//!
//! 1. empty file
//! 2. file size against the tier cap
//! 3. content type, sniffed from magic bytes with the extension as fallback
//! 4. pixel dimensions, read from the header without decoding pixels
//!
//! Batches are checked for file count first; past that, every file is
//! validated independently so one bad file never sinks the rest.

use crate::config::{LimitsConfig, TierLimits};
use crate::imaging::{Dimensions, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Account tier, selecting which set of limits applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            other => Err(format!("unknown tier '{other}'. Expected free or pro")),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File is empty")]
    Empty,
    #[error("File is too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Image dimensions {width}x{height} exceed the {limit}px limit")]
    DimensionsTooLarge { width: u32, height: u32, limit: u32 },
    #[error("Could not read image: {0}")]
    Unreadable(String),
    #[error("Too many files: {count} selected, limit is {limit}")]
    TooManyFiles { count: usize, limit: usize },
}

/// A file that passed every check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub dimensions: Dimensions,
}

/// Per-file outcome of a batch check.
#[derive(Debug, Clone, Default)]
pub struct BatchValidation {
    pub accepted: Vec<ValidatedFile>,
    pub rejected: Vec<(String, ValidationError)>,
}

impl BatchValidation {
    pub fn all_valid(&self) -> bool {
        self.rejected.is_empty()
    }
}

pub struct FileValidator {
    allowed_types: Vec<String>,
    limits: TierLimits,
    tier: Tier,
}

impl FileValidator {
    pub fn new(limits: &LimitsConfig, tier: Tier) -> Self {
        Self {
            allowed_types: limits.allowed_types.clone(),
            limits: *limits.for_tier(tier),
            tier,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn limits(&self) -> &TierLimits {
        &self.limits
    }

    fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::Empty);
        }
        let limit = self.limits.max_file_size_bytes();
        if size > limit {
            return Err(ValidationError::FileTooLarge { size, limit });
        }
        Ok(())
    }

    /// Reject a batch that is over the tier's file count.
    pub fn check_count(&self, count: usize) -> Result<(), ValidationError> {
        if count > self.limits.max_files {
            return Err(ValidationError::TooManyFiles {
                count,
                limit: self.limits.max_files,
            });
        }
        Ok(())
    }

    pub fn validate_file(&self, name: &str, bytes: &[u8]) -> Result<ValidatedFile, ValidationError> {
        self.check_size(bytes.len() as u64)?;

        let mime_type = detect_mime_type(name, bytes)
            .ok_or_else(|| ValidationError::UnsupportedType(unknown_type_label(name)))?;
        if !self.allowed_types.iter().any(|t| t == &mime_type) {
            return Err(ValidationError::UnsupportedType(mime_type));
        }

        let (width, height) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ValidationError::Unreadable(e.to_string()))?
            .into_dimensions()
            .map_err(|e| ValidationError::Unreadable(e.to_string()))?;
        let limit = self.limits.max_dimension;
        if width.max(height) > limit {
            return Err(ValidationError::DimensionsTooLarge {
                width,
                height,
                limit,
            });
        }

        Ok(ValidatedFile {
            name: name.to_string(),
            mime_type,
            size: bytes.len() as u64,
            dimensions: Dimensions::new(width, height),
        })
    }

    /// Validate a file on disk. Oversized files are rejected before reading.
    pub fn validate_path(&self, path: &Path) -> Result<ValidatedFile, ValidationError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let size = std::fs::metadata(path)
            .map_err(|e| ValidationError::Unreadable(e.to_string()))?
            .len();
        self.check_size(size)?;
        let bytes = std::fs::read(path).map_err(|e| ValidationError::Unreadable(e.to_string()))?;
        self.validate_file(&name, &bytes)
    }

    /// Validate a batch of in-memory files.
    ///
    /// Over the count limit, every file is rejected with `TooManyFiles`.
    pub fn validate_batch<N, B>(&self, files: &[(N, B)]) -> BatchValidation
    where
        N: AsRef<str>,
        B: AsRef<[u8]>,
    {
        let mut result = BatchValidation::default();
        if let Err(e) = self.check_count(files.len()) {
            log::warn!("{e}");
            result.rejected = files
                .iter()
                .map(|(name, _)| (name.as_ref().to_string(), e.clone()))
                .collect();
            return result;
        }

        for (name, bytes) in files {
            match self.validate_file(name.as_ref(), bytes.as_ref()) {
                Ok(file) => result.accepted.push(file),
                Err(e) => {
                    log::info!("Skipping {}: {e}", name.as_ref());
                    result.rejected.push((name.as_ref().to_string(), e));
                }
            }
        }
        result
    }
}

/// MIME type from magic bytes, falling back to the file extension.
fn detect_mime_type(name: &str, bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .or_else(|_| ImageFormat::from_path(name))
        .ok()
        .map(|f| f.to_mime_type().to_string())
}

fn unknown_type_label(name: &str) -> String {
    match Path::new(name).extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => "unknown".to_string(),
    }
}
