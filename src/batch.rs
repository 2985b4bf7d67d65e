//! Batch processing of a directory of images.
//!
//! Every file is validated against the tier limits, run through the job's
//! operations and written to the output directory. A file that fails is
//! reported and skipped; the rest of the batch carries on.
//!
//! ## Output Structure
//!
//! ```text
//! input/                 output/
//! ├── beach.png    →     ├── beach.jpg
//! ├── beach.jpeg   →     ├── beach-1.jpg     # name collision
//! ├── notes.txt          │                   # skipped: unsupported type
//! └── trips/             └── trips/          # only with --recursive
//!     └── alps.webp  →       └── alps.jpg
//! ```
//!
//! ## Parallel Processing
//!
//! Files are processed in parallel using [rayon](https://docs.rs/rayon).
//! Progress is reported as [`BatchEvent`]s over an optional channel so the
//! caller can print while work continues.

use crate::imaging::{
    ConvertParams, ImageBackend, Operation, ProcessError, ProcessedImage, apply_operation,
    transform,
};
use crate::types::ProcessingResult;
use crate::validation::{FileValidator, ValidationError};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read input directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Input directory not found: {0}")]
    InputNotFound(PathBuf),
}

/// What to do with each file: a chain of operations, then a final encode.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub operations: Vec<Operation>,
    /// Encode step. `Compress` and `Convert` pick the output format; any
    /// other operation is applied and written as PNG.
    pub output: Operation,
}

impl BatchJob {
    pub fn new(output: Operation) -> Self {
        Self {
            operations: Vec::new(),
            output,
        }
    }

    pub fn then(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn output_extension(&self) -> &'static str {
        match &self.output {
            Operation::Compress(p) => p.format.extension(),
            Operation::Convert(p) => p.format.extension(),
            _ => "png",
        }
    }
}

impl Default for BatchJob {
    fn default() -> Self {
        Self::new(Operation::Convert(ConvertParams::to(Default::default())))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Descend into subdirectories, mirroring them in the output.
    pub recursive: bool,
}

/// Progress events, in the order each file finishes.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    Skipped { source: PathBuf, reason: String },
    Processed { source: PathBuf, result: ProcessingResult },
    Failed { source: PathBuf, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Processed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFileResult {
    pub source: String,
    pub status: FileStatus,
    pub result: ProcessingResult,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub files: Vec<BatchFileResult>,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn from_files(files: Vec<BatchFileResult>) -> Self {
        let count = |status| files.iter().filter(|f| f.status == status).count();
        Self {
            processed: count(FileStatus::Processed),
            skipped: count(FileStatus::Skipped),
            failed: count(FileStatus::Failed),
            files,
        }
    }
}

/// Files under `input`, sorted by path. Hidden files are ignored.
pub fn collect_inputs(input: &Path, recursive: bool) -> Result<Vec<PathBuf>, BatchError> {
    if !input.is_dir() {
        return Err(BatchError::InputNotFound(input.to_path_buf()));
    }
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(input)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Output path per input: `<relative dir>/<stem>.<ext>`, with `-N`
/// suffixes on collisions.
fn plan_outputs(input: &Path, output: &Path, files: &[PathBuf], ext: &str) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    files
        .iter()
        .map(|file| {
            let relative_dir = file
                .parent()
                .and_then(|p| p.strip_prefix(input).ok())
                .unwrap_or_else(|| Path::new(""));
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let dir = output.join(relative_dir);

            let mut candidate = dir.join(format!("{stem}.{ext}"));
            let mut n = 1;
            while !taken.insert(candidate.clone()) {
                candidate = dir.join(format!("{stem}-{n}.{ext}"));
                n += 1;
            }
            candidate
        })
        .collect()
}

fn run_job(
    backend: &dyn ImageBackend,
    job: &BatchJob,
    source: &Path,
    destination: &Path,
) -> Result<ProcessedImage, ProcessError> {
    let bytes = std::fs::read(source)?;
    let mut canvas = backend.decode(&bytes)?.image;
    for operation in &job.operations {
        if let Some(next) = transform(backend, &canvas, operation)? {
            canvas = next;
        }
    }
    let output = apply_operation(backend, &canvas, &job.output, &mut |_| {})?;
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    output.encoded.write_to(destination)?;
    Ok(ProcessedImage {
        operation: job.output.name(),
        encoded: output.encoded,
    })
}

fn process_file(
    backend: &dyn ImageBackend,
    validator: &FileValidator,
    job: &BatchJob,
    source: &Path,
    destination: &Path,
) -> (BatchFileResult, BatchEvent) {
    let source_name = source.display().to_string();

    if let Err(e) = validator.validate_path(source) {
        log::info!("Skipping {source_name}: {e}");
        return (
            BatchFileResult {
                source: source_name,
                status: FileStatus::Skipped,
                result: ProcessingResult::failure(e.to_string()),
            },
            BatchEvent::Skipped {
                source: source.to_path_buf(),
                reason: e.to_string(),
            },
        );
    }

    let outcome = run_job(backend, job, source, destination);
    let mut result = ProcessingResult::from(&outcome);
    match outcome {
        Ok(_) => {
            result = result.with_output(destination.display().to_string());
            log::debug!("{source_name} -> {}", destination.display());
            (
                BatchFileResult {
                    source: source_name,
                    status: FileStatus::Processed,
                    result: result.clone(),
                },
                BatchEvent::Processed {
                    source: source.to_path_buf(),
                    result,
                },
            )
        }
        Err(e) => {
            log::warn!("Failed {source_name}: {e}");
            (
                BatchFileResult {
                    source: source_name,
                    status: FileStatus::Failed,
                    result,
                },
                BatchEvent::Failed {
                    source: source.to_path_buf(),
                    error: e.to_string(),
                },
            )
        }
    }
}

/// Process every file under `input` into `output`.
///
/// Fails up front only when the input cannot be read or the batch exceeds
/// the tier's file count. Per-file problems end up in the summary.
pub fn run_batch(
    backend: &dyn ImageBackend,
    validator: &FileValidator,
    job: &BatchJob,
    input: &Path,
    output: &Path,
    options: BatchOptions,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchSummary, BatchError> {
    let files = collect_inputs(input, options.recursive)?;
    validator.check_count(files.len())?;
    std::fs::create_dir_all(output)?;

    if let Some(tx) = &events {
        let _ = tx.send(BatchEvent::Started { total: files.len() });
    }
    log::info!("Batch: {} file(s) from {}", files.len(), input.display());

    let destinations = plan_outputs(input, output, &files, job.output_extension());
    let results: Vec<BatchFileResult> = files
        .par_iter()
        .zip(destinations.par_iter())
        .map_with(events, |tx, (source, destination)| {
            let (result, event) = process_file(backend, validator, job, source, destination);
            if let Some(tx) = tx {
                let _ = tx.send(event);
            }
            result
        })
        .collect();

    Ok(BatchSummary::from_files(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::imaging::{OutputFormat, ResizeSpec, RustBackend};
    use crate::test_helpers::write_png;
    use crate::validation::Tier;
    use std::fs;
    use tempfile::TempDir;

    fn validator() -> FileValidator {
        FileValidator::new(&LimitsConfig::default(), Tier::Pro)
    }

    fn jpeg_job() -> BatchJob {
        BatchJob::new(Operation::Convert(ConvertParams::to(OutputFormat::Jpeg)))
            .then(Operation::Resize(ResizeSpec::Width(10)))
    }

    // =========================================================================
    // Input discovery and naming
    // =========================================================================

    #[test]
    fn collect_inputs_is_sorted_and_skips_hidden() {
        let tmp = TempDir::new().unwrap();
        write_png(tmp.path(), "b.png", 4, 4);
        write_png(tmp.path(), "a.png", 4, 4);
        write_png(tmp.path(), ".hidden.png", 4, 4);
        fs::create_dir(tmp.path().join("sub")).unwrap();
        write_png(&tmp.path().join("sub"), "c.png", 4, 4);

        let flat = collect_inputs(tmp.path(), false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);

        assert_eq!(collect_inputs(tmp.path(), true).unwrap().len(), 3);
    }

    #[test]
    fn collect_inputs_missing_dir_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            collect_inputs(&tmp.path().join("nope"), false),
            Err(BatchError::InputNotFound(_))
        ));
    }

    #[test]
    fn plan_outputs_dedupes_stems() {
        let input = Path::new("/in");
        let files = vec![
            PathBuf::from("/in/beach.png"),
            PathBuf::from("/in/beach.jpeg"),
            PathBuf::from("/in/trips/alps.webp"),
        ];
        let planned = plan_outputs(input, Path::new("/out"), &files, "jpg");
        assert_eq!(
            planned,
            vec![
                PathBuf::from("/out/beach.jpg"),
                PathBuf::from("/out/beach-1.jpg"),
                PathBuf::from("/out/trips/alps.jpg"),
            ]
        );
    }

    #[test]
    fn job_extension_follows_output_format() {
        assert_eq!(jpeg_job().output_extension(), "jpg");
        assert_eq!(BatchJob::default().output_extension(), "png");
        assert_eq!(
            BatchJob::new(Operation::Resize(ResizeSpec::Width(5))).output_extension(),
            "png"
        );
    }

    // =========================================================================
    // Running
    // =========================================================================

    #[test]
    fn batch_processes_good_files_and_skips_bad_ones() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_png(input.path(), "one.png", 40, 20);
        write_png(input.path(), "two.png", 20, 20);
        fs::write(input.path().join("notes.txt"), "not an image").unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let summary = run_batch(
            &RustBackend::new(),
            &validator(),
            &jpeg_job(),
            input.path(),
            output.path(),
            BatchOptions::default(),
            Some(tx),
        )
        .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);

        let one = image::open(output.path().join("one.jpg")).unwrap();
        assert_eq!((one.width(), one.height()), (10, 5));
        assert!(output.path().join("two.jpg").exists());

        let events: Vec<BatchEvent> = rx.iter().collect();
        assert!(matches!(events[0], BatchEvent::Started { total: 3 }));
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn batch_reports_failed_operation() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_png(input.path(), "small.png", 4, 4);

        let job = BatchJob::default().then(Operation::Crop(crate::imaging::CropArea {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        }));
        let summary = run_batch(
            &RustBackend::new(),
            &validator(),
            &job,
            input.path(),
            output.path(),
            BatchOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(summary.failed, 1);
        let file = &summary.files[0];
        assert_eq!(file.status, FileStatus::Failed);
        assert_eq!(
            file.result.error.as_deref(),
            Some("Crop area exceeds image bounds")
        );
    }

    #[test]
    fn batch_over_file_limit_fails_up_front() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        for i in 0..3 {
            write_png(input.path(), &format!("{i}.png"), 4, 4);
        }
        let mut limits = LimitsConfig::default();
        limits.free.max_files = 2;

        let result = run_batch(
            &RustBackend::new(),
            &FileValidator::new(&limits, Tier::Free),
            &BatchJob::default(),
            input.path(),
            output.path(),
            BatchOptions::default(),
            None,
        );
        assert!(matches!(
            result,
            Err(BatchError::Validation(ValidationError::TooManyFiles {
                count: 3,
                limit: 2
            }))
        ));
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn recursive_batch_mirrors_directories() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::create_dir(input.path().join("trips")).unwrap();
        write_png(&input.path().join("trips"), "alps.png", 8, 8);

        let summary = run_batch(
            &RustBackend::new(),
            &validator(),
            &BatchJob::default(),
            input.path(),
            output.path(),
            BatchOptions { recursive: true },
            None,
        )
        .unwrap();

        assert_eq!(summary.processed, 1);
        assert!(output.path().join("trips/alps.png").exists());
    }

    #[test]
    fn summary_serializes_statuses_lowercase() {
        let summary = BatchSummary::from_files(vec![BatchFileResult {
            source: "a.png".into(),
            status: FileStatus::Skipped,
            result: ProcessingResult::failure("File is empty"),
        }]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["files"][0]["status"], "skipped");
        assert_eq!(json["skipped"], 1);
    }
}
