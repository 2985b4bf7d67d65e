//! Editing session: processor + undo history + optional background worker.
//!
//! Whether an operation runs inline or on the worker is decided by an
//! explicit [`OffloadPolicy`]. A progress callback is honoured on both paths
//! and has no bearing on where the work runs.

use crate::config::EditorConfig;
use crate::history::{HistoryError, OperationHistory, OperationState};
use crate::imaging::{
    Dimensions, ImageBackend, ImageProcessor, Operation, PickedColor, ProcessError,
    ProcessedImage,
};
use crate::types::ImageMetadata;
use crate::worker::{ProgressCallback, TaskProgress, WorkerError, WorkerManager};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Where editing operations run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OffloadPolicy {
    /// Always on the calling thread.
    Never,
    /// Always on the background worker.
    Always,
    /// On the worker once the canvas reaches `min_megapixels`.
    Auto { min_megapixels: f64 },
}

impl Default for OffloadPolicy {
    fn default() -> Self {
        OffloadPolicy::Auto {
            min_megapixels: 4.0,
        }
    }
}

impl OffloadPolicy {
    pub fn should_offload(&self, canvas: Dimensions) -> bool {
        match *self {
            OffloadPolicy::Never => false,
            OffloadPolicy::Always => true,
            OffloadPolicy::Auto { min_megapixels } => canvas.megapixels() >= min_megapixels,
        }
    }
}

/// Percent-complete callback for [`EnhancedImageProcessor::apply`].
pub type PercentCallback = Box<dyn Fn(u8) + Send>;

pub struct EnhancedImageProcessor {
    processor: ImageProcessor,
    history: OperationHistory,
    policy: OffloadPolicy,
    worker: Option<WorkerManager>,
}

impl EnhancedImageProcessor {
    pub fn new(config: &EditorConfig) -> Self {
        Self::with_processor(
            ImageProcessor::new(),
            config.history.max_entries,
            config.worker.policy(),
        )
    }

    pub fn with_backend(
        backend: Arc<dyn ImageBackend>,
        max_entries: usize,
        policy: OffloadPolicy,
    ) -> Self {
        Self::with_processor(ImageProcessor::with_backend(backend), max_entries, policy)
    }

    fn with_processor(processor: ImageProcessor, max_entries: usize, policy: OffloadPolicy) -> Self {
        Self {
            processor,
            history: OperationHistory::new(max_entries),
            policy,
            worker: None,
        }
    }

    pub fn processor(&self) -> &ImageProcessor {
        &self.processor
    }

    pub fn history(&self) -> &OperationHistory {
        &self.history
    }

    pub fn policy(&self) -> OffloadPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: OffloadPolicy) {
        self.policy = policy;
    }

    pub fn metadata(&self) -> Option<&ImageMetadata> {
        self.processor.metadata()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.processor.dimensions()
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Load a new image. History restarts with a single `load` entry.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<ImageMetadata, EditorError> {
        let metadata = self.processor.load_bytes(bytes)?;
        self.cancel_pending();
        self.history.clear();
        let snapshot = self.processor.snapshot()?;
        let dims = self.processor.dimensions().ok_or(ProcessError::NotLoaded)?;
        self.record("load", "Original image".to_string(), snapshot, dims);
        Ok(metadata)
    }

    pub fn load_path(&mut self, path: &Path) -> Result<ImageMetadata, EditorError> {
        let bytes = std::fs::read(path).map_err(ProcessError::from)?;
        self.load_bytes(&bytes)
    }

    fn record(&mut self, operation: &str, description: String, snapshot: String, dims: Dimensions) {
        let entry = self
            .history
            .add_operation(operation, snapshot, dims, description);
        log::debug!("History {}: {}", entry.id, entry.description);
    }

    fn ensure_worker(&mut self) -> Result<&WorkerManager, WorkerError> {
        if self.worker.is_none() {
            self.worker = Some(WorkerManager::new(self.processor.backend())?);
        }
        self.worker.as_ref().ok_or(WorkerError::Disconnected)
    }

    /// Run an operation, inline or on the worker per the offload policy.
    ///
    /// Canvas-mutating operations commit the new canvas and add a history
    /// entry. On failure neither the canvas nor the history changes.
    pub fn apply(
        &mut self,
        operation: &Operation,
        progress: Option<PercentCallback>,
    ) -> Result<ProcessedImage, EditorError> {
        let dims = self.processor.dimensions().ok_or(ProcessError::NotLoaded)?;

        let processed = if self.policy.should_offload(dims) {
            let canvas = Arc::new(
                self.processor
                    .canvas()
                    .ok_or(ProcessError::NotLoaded)?
                    .clone(),
            );
            let callback = progress.map(|cb| -> ProgressCallback {
                Box::new(move |p: TaskProgress| cb(p.percent))
            });
            log::debug!("Offloading {} on {}x{}", operation.name(), dims.width, dims.height);
            let output = self
                .ensure_worker()?
                .submit(canvas, operation.clone(), callback)
                .wait()?;
            self.processor.commit(operation, output)
        } else {
            let mut report = |percent: u8| {
                if let Some(cb) = &progress {
                    cb(percent);
                }
            };
            self.processor.apply_with_progress(operation, &mut report)?
        };

        // A canvas operation's result is the PNG snapshot of the new canvas
        if operation.mutates_canvas() {
            self.record(
                operation.name(),
                operation.describe(),
                processed.encoded.data_url(),
                processed.dimensions(),
            );
        }
        Ok(processed)
    }

    pub fn pick_color(&self, x: u32, y: u32) -> Result<PickedColor, EditorError> {
        Ok(self.processor.pick_color(x, y)?)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Step back one entry and restore its snapshot onto the canvas.
    pub fn undo(&mut self) -> Result<OperationState, EditorError> {
        let state = self
            .history
            .undo()
            .cloned()
            .ok_or(HistoryError::NothingToUndo)?;
        if let Err(e) = self.processor.restore(&state.snapshot) {
            self.history.redo();
            return Err(e.into());
        }
        Ok(state)
    }

    /// Step forward one entry and restore its snapshot onto the canvas.
    pub fn redo(&mut self) -> Result<OperationState, EditorError> {
        let state = self
            .history
            .redo()
            .cloned()
            .ok_or(HistoryError::NothingToRedo)?;
        if let Err(e) = self.processor.restore(&state.snapshot) {
            self.history.undo();
            return Err(e.into());
        }
        Ok(state)
    }

    /// Cancel operations queued on the worker. Returns how many were cancelled.
    pub fn cancel_pending(&self) -> usize {
        self.worker.as_ref().map_or(0, WorkerManager::cancel_all)
    }
}
