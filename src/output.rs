//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Info
//!
//! ```text
//! photo.png
//!     Format: png (image/png)
//!     Size: 1200x800, 412.5 KB
//!     Transparency: no
//! ```
//!
//! ## Single-image tools
//!
//! ```text
//! resize → out.png
//!     Size: 600x400, 120.0 KB (image/png)
//! ```
//!
//! ## Batch
//!
//! ```text
//! Processing 3 files
//! 001 beach.png → out/beach.jpg (10x5, 1.2 KB)
//! 002 notes.txt skipped: Unsupported file type: .txt
//! Processed 2, skipped 1, failed 0
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{BatchEvent, BatchSummary, FileStatus};
use crate::imaging::{PickedColor, ProcessedImage};
use crate::presets::SocialPreset;
use crate::types::ImageMetadata;
use crate::validation::{BatchValidation, ValidatedFile, ValidationError};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

// ============================================================================
// Single image
// ============================================================================

pub fn format_metadata(path: &Path, metadata: &ImageMetadata) -> Vec<String> {
    vec![
        file_label(path),
        format!("    Format: {} ({})", metadata.format, metadata.mime_type),
        format!(
            "    Size: {}x{}, {}",
            metadata.width,
            metadata.height,
            format_bytes(metadata.file_size)
        ),
        format!(
            "    Transparency: {}",
            if metadata.has_transparency { "yes" } else { "no" }
        ),
    ]
}

pub fn format_processed(processed: &ProcessedImage, destination: &Path) -> Vec<String> {
    let encoded = &processed.encoded;
    let mut lines = vec![
        format!("{} → {}", processed.operation, destination.display()),
        format!(
            "    Size: {}x{}, {} ({})",
            encoded.dimensions.width,
            encoded.dimensions.height,
            format_bytes(encoded.len() as u64),
            encoded.mime_type()
        ),
    ];
    if encoded.format.is_lossy() {
        lines.push(format!("    Quality: {}", encoded.quality.value()));
    }
    lines
}

pub fn print_processed(processed: &ProcessedImage, destination: &Path) {
    print_lines(&format_processed(processed, destination));
}

pub fn format_picked_color(color: &PickedColor) -> Vec<String> {
    vec![
        format!("Pixel ({}, {})", color.x, color.y),
        format!("    Hex: {}", color.hex),
        format!("    CSS: {}", color.css()),
    ]
}

// ============================================================================
// Validation
// ============================================================================

fn validation_line(index: usize, name: &str, outcome: Result<&ValidatedFile, &ValidationError>) -> String {
    match outcome {
        Ok(file) => format!(
            "{} {} ok ({}, {}x{}, {})",
            format_index(index),
            name,
            file.mime_type,
            file.dimensions.width,
            file.dimensions.height,
            format_bytes(file.size)
        ),
        Err(e) => format!("{} {} rejected: {}", format_index(index), name, e),
    }
}

/// One line per file, accepted first, then a count line.
pub fn format_validation(result: &BatchValidation) -> Vec<String> {
    let mut lines: Vec<String> = result
        .accepted
        .iter()
        .map(|f| (f.name.as_str(), Ok(f)))
        .chain(result.rejected.iter().map(|(n, e)| (n.as_str(), Err(e))))
        .enumerate()
        .map(|(i, (name, outcome))| validation_line(i + 1, name, outcome))
        .collect();
    lines.push(format!(
        "{} accepted, {} rejected",
        result.accepted.len(),
        result.rejected.len()
    ));
    lines
}

// ============================================================================
// Presets
// ============================================================================

pub fn format_presets(presets: &[SocialPreset]) -> Vec<String> {
    let slug_width = presets.iter().map(|p| p.slug.len()).max().unwrap_or(0);
    presets
        .iter()
        .map(|p| {
            format!(
                "{:<slug_width$}  {}x{} ({})  {} {}",
                p.slug,
                p.width,
                p.height,
                p.aspect_ratio(),
                p.platform,
                p.name
            )
        })
        .collect()
}

// ============================================================================
// Batch
// ============================================================================

/// Format a batch event. `index` is the 1-based completion order.
pub fn format_batch_event(index: usize, event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Started { total } => vec![format!("Processing {total} files")],
        BatchEvent::Processed { source, result } => {
            let target = result.output.as_deref().unwrap_or("-");
            let detail = match (result.width, result.height, result.size) {
                (Some(w), Some(h), Some(size)) => format!(" ({w}x{h}, {})", format_bytes(size)),
                _ => String::new(),
            };
            vec![format!(
                "{} {} → {}{}",
                format_index(index),
                file_label(source),
                target,
                detail
            )]
        }
        BatchEvent::Skipped { source, reason } => vec![format!(
            "{} {} skipped: {}",
            format_index(index),
            file_label(source),
            reason
        )],
        BatchEvent::Failed { source, error } => vec![format!(
            "{} {} failed: {}",
            format_index(index),
            file_label(source),
            error
        )],
    }
}

pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Processed {}, skipped {}, failed {}",
        summary.processed, summary.skipped, summary.failed
    )];
    for file in summary
        .files
        .iter()
        .filter(|f| f.status == FileStatus::Failed)
    {
        lines.push(format!(
            "    {}: {}",
            file.source,
            file.result.error.as_deref().unwrap_or("unknown error")
        ));
    }
    lines
}

pub fn print_batch_summary(summary: &BatchSummary) {
    print_lines(&format_batch_summary(summary));
}
