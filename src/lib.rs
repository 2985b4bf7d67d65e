//! # ResizeSuite
//!
//! Image editing toolkit: resize, crop, rotate, adjust, watermark, compress,
//! convert and social-media presets, with undo history and a background
//! worker for large canvases.
//!
//! # Architecture
//!
//! ```text
//!   bytes ──► FileValidator ──► ImageProcessor ──► EncodedImage
//!                                │  canvas (DynamicImage)
//!                                ▼
//!              EnhancedImageProcessor
//!                 ├── OperationHistory   (PNG snapshots, undo/redo)
//!                 └── WorkerManager      (FIFO queue, crash recovery)
//! ```
//!
//! Every tool is an [`imaging::Operation`] run through
//! [`imaging::apply_operation`], so a request behaves the same inline, on
//! the worker thread or inside a batch.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Dimension math, backend trait, `image`-crate backend, operations and the stateful [`imaging::ImageProcessor`] |
//! | [`validation`] | Upload checks: type sniffing, size, dimensions and batch count per tier |
//! | [`history`] | Bounded linear undo/redo list of canvas snapshots |
//! | [`worker`] | Background worker thread with FIFO queue, progress, cancellation and restart on crash |
//! | [`enhanced`] | Editing session tying processor, history and worker together under an offload policy |
//! | [`presets`] | Social media target sizes |
//! | [`batch`] | Directory batch runs in parallel with per-file reports |
//! | [`config`] | `resize-suite.toml` loading, validation and merging |
//! | [`types`] | Serializable reports (`ImageMetadata`, `ProcessingResult`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Results, Reported Uniformly
//!
//! Operations return `Result` with typed errors. Where a uniform
//! success/failure record is needed (CLI `--json`, batch reports) it is
//! derived with `ProcessingResult::from(&result)`.
//!
//! ## Explicit Offload
//!
//! Whether work runs on the background worker is a configured
//! [`enhanced::OffloadPolicy`]. Passing a progress callback never changes
//! where an operation runs.

pub mod batch;
pub mod config;
pub mod enhanced;
pub mod history;
pub mod imaging;
pub mod output;
pub mod presets;
pub mod types;
pub mod validation;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
