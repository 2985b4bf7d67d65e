//! Directory batches against real files on disk.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use resize_suite::batch::{BatchError, BatchEvent, BatchJob, BatchOptions, FileStatus, run_batch};
use resize_suite::config::EditorConfig;
use resize_suite::imaging::{
    CompressParams, ConvertParams, Operation, OutputFormat, Quality, ResizeSpec, RustBackend,
};
use resize_suite::validation::{FileValidator, Tier, ValidationError};
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use tempfile::TempDir;

fn write_image(dir: &Path, name: &str, width: u32, height: u32, format: ImageFormat) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 90, 255])
    });
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
        _ => DynamicImage::ImageRgba8(img),
    };
    img.save_with_format(dir.join(name), format).unwrap();
}

fn validator(tier: Tier) -> FileValidator {
    FileValidator::new(&EditorConfig::default().limits, tier)
}

#[test]
fn mixed_directory_is_processed_skipped_and_reported() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_image(input.path(), "a.png", 40, 20, ImageFormat::Png);
    write_image(input.path(), "b.jpg", 30, 30, ImageFormat::Jpeg);
    fs::write(input.path().join("notes.txt"), "not an image").unwrap();

    let job = BatchJob::new(Operation::Convert(ConvertParams::to(OutputFormat::WebP)))
        .then(Operation::Resize(ResizeSpec::Width(10)));
    let (tx, rx) = mpsc::channel();
    let summary = run_batch(
        &RustBackend::new(),
        &validator(Tier::Free),
        &job,
        input.path(),
        output.path(),
        BatchOptions::default(),
        Some(tx),
    )
    .unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let a = image::open(output.path().join("a.webp")).unwrap();
    assert_eq!((a.width(), a.height()), (10, 5));
    let b = image::open(output.path().join("b.webp")).unwrap();
    assert_eq!((b.width(), b.height()), (10, 10));
    assert!(!output.path().join("notes.webp").exists());

    let events: Vec<_> = rx.into_iter().collect();
    assert!(matches!(events[0], BatchEvent::Started { total: 3 }));
    assert_eq!(events.len(), 4);

    let skipped = summary
        .files
        .iter()
        .find(|f| f.status == FileStatus::Skipped)
        .unwrap();
    assert!(skipped.source.ends_with("notes.txt"));
    assert!(!skipped.result.success);
}

#[test]
fn compress_budget_applies_to_every_file() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    for name in ["one.png", "two.png"] {
        write_image(input.path(), name, 120, 120, ImageFormat::Png);
    }

    let budget = 6 * 1024;
    let job = BatchJob::new(Operation::Compress(CompressParams {
        format: OutputFormat::Jpeg,
        quality: Quality::new(95),
        max_bytes: Some(budget),
    }));
    let summary = run_batch(
        &RustBackend::new(),
        &validator(Tier::Pro),
        &job,
        input.path(),
        output.path(),
        BatchOptions::default(),
        None,
    )
    .unwrap();

    assert_eq!(summary.processed, 2);
    for file in &summary.files {
        assert_eq!(file.result.mime_type.as_deref(), Some("image/jpeg"));
        assert!(file.result.size.unwrap() <= budget);
    }
}

#[test]
fn too_many_files_for_tier_fails_up_front() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    for i in 0..6 {
        write_image(input.path(), &format!("img{i}.png"), 4, 4, ImageFormat::Png);
    }

    let result = run_batch(
        &RustBackend::new(),
        &validator(Tier::Free),
        &BatchJob::default(),
        input.path(),
        output.path(),
        BatchOptions::default(),
        None,
    );
    assert!(matches!(
        result,
        Err(BatchError::Validation(ValidationError::TooManyFiles {
            count: 6,
            limit: 5
        }))
    ));
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}

#[test]
fn recursive_batch_mirrors_subdirectories() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let nested = input.path().join("trips/beach");
    fs::create_dir_all(&nested).unwrap();
    write_image(input.path(), "top.png", 8, 8, ImageFormat::Png);
    write_image(&nested, "wave.png", 8, 8, ImageFormat::Png);

    let summary = run_batch(
        &RustBackend::new(),
        &validator(Tier::Free),
        &BatchJob::default(),
        input.path(),
        output.path(),
        BatchOptions { recursive: true },
        None,
    )
    .unwrap();

    assert_eq!(summary.processed, 2);
    assert!(output.path().join("top.png").exists());
    assert!(output.path().join("trips/beach/wave.png").exists());
}
