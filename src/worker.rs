//! Background worker with a FIFO task queue.
//!
//! ```text
//!   submit() ──► queue (Mutex<VecDeque> + Condvar)
//!                  │
//!              dispatcher thread ──job──► worker thread
//!                  ▲                         │ apply_operation
//!                  └──progress / result──────┘
//! ```
//!
//! Tasks run one at a time in submission order. The dispatcher forwards
//! progress to each task's callback and delivers the result on the task's
//! own reply channel.
//!
//! If an operation panics the worker thread dies. The dispatcher notices the
//! closed channel, rejects the running task with [`WorkerError::Crashed`],
//! starts a fresh worker and carries on with the queue.
//!
//! A progress callback that panics is dropped for the rest of its task; the
//! task itself still completes.
//!
//! Cancellation is all-or-nothing: [`WorkerManager::cancel_all`] rejects
//! every task still waiting. The task already running is not interrupted.

use crate::imaging::{ImageBackend, Operation, OperationOutput, ProcessError, apply_operation};
use image::DynamicImage;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Task cancelled")]
    Cancelled,
    #[error("Worker crashed: {0}")]
    Crashed(String),
    #[error("Worker is no longer running")]
    Disconnected,
    #[error("Failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Operation(#[from] ProcessError),
}

/// Progress notification for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProgress {
    pub task_id: u64,
    pub percent: u8,
}

pub type ProgressCallback = Box<dyn Fn(TaskProgress) + Send>;

type TaskResult = Result<OperationOutput, WorkerError>;

struct Task {
    id: u64,
    image: Arc<DynamicImage>,
    operation: Operation,
    progress: Option<ProgressCallback>,
    reply: Sender<TaskResult>,
}

struct QueueState {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    ready: Condvar,
    restarts: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end for one submitted task.
pub struct TaskHandle {
    id: u64,
    reply: Receiver<TaskResult>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the task finishes, fails or is cancelled.
    pub fn wait(self) -> TaskResult {
        self.reply.recv().unwrap_or(Err(WorkerError::Disconnected))
    }

    /// The result, if it has arrived.
    pub fn try_wait(&self) -> Option<TaskResult> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(WorkerError::Disconnected)),
        }
    }
}

pub struct WorkerManager {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    dispatcher: Option<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Result<Self, WorkerError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                shutdown: false,
            }),
            ready: Condvar::new(),
            restarts: AtomicUsize::new(0),
        });
        let worker = Worker::spawn(Arc::clone(&backend))?;
        let dispatcher = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("resize-suite-dispatch".into())
                .spawn(move || dispatch(shared, backend, worker))?
        };
        log::debug!("Worker started");
        Ok(Self {
            shared,
            next_id: AtomicU64::new(1),
            dispatcher: Some(dispatcher),
        })
    }

    /// Queue an operation on `image`. Returns immediately.
    pub fn submit(
        &self,
        image: Arc<DynamicImage>,
        operation: Operation,
        progress: Option<ProgressCallback>,
    ) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = mpsc::channel();
        let task = Task {
            id,
            image,
            operation,
            progress,
            reply,
        };

        let mut state = self.shared.lock();
        if state.shutdown {
            let _ = task.reply.send(Err(WorkerError::Disconnected));
        } else {
            log::debug!("Queued task {id} ({})", task.operation.name());
            state.tasks.push_back(task);
            self.shared.ready.notify_one();
        }
        TaskHandle { id, reply: rx }
    }

    /// Reject every queued task with [`WorkerError::Cancelled`].
    ///
    /// Returns how many tasks were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Task> = self.shared.lock().tasks.drain(..).collect();
        for task in &drained {
            let _ = task.reply.send(Err(WorkerError::Cancelled));
        }
        if !drained.is_empty() {
            log::info!("Cancelled {} queued task(s)", drained.len());
        }
        drained.len()
    }

    /// Tasks waiting to start.
    pub fn pending(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    /// How many times the worker thread has been recreated after a crash.
    pub fn restarts(&self) -> usize {
        self.shared.restarts.load(Ordering::Relaxed)
    }
}

impl Drop for WorkerManager {
    fn drop(&mut self) {
        self.cancel_all();
        self.shared.lock().shutdown = true;
        self.shared.ready.notify_all();
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// Worker thread
// ============================================================================

struct Job {
    image: Arc<DynamicImage>,
    operation: Operation,
}

enum WorkerMessage {
    Progress(u8),
    Done(Result<OperationOutput, ProcessError>),
}

struct Worker {
    jobs: Sender<Job>,
    messages: Receiver<WorkerMessage>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(backend: Arc<dyn ImageBackend>) -> std::io::Result<Self> {
        let (jobs, job_rx) = mpsc::channel::<Job>();
        let (message_tx, messages) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("resize-suite-worker".into())
            .spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let mut report = |percent| {
                        let _ = message_tx.send(WorkerMessage::Progress(percent));
                    };
                    let result =
                        apply_operation(backend.as_ref(), &job.image, &job.operation, &mut report);
                    if message_tx.send(WorkerMessage::Done(result)).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self {
            jobs,
            messages,
            handle,
        })
    }

    /// Close the job channel and wait for the thread. Returns the panic
    /// message if the thread died.
    fn shutdown(self) -> Option<String> {
        drop(self.jobs);
        self.handle.join().err().map(panic_message)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn next_task(shared: &Shared) -> Option<Task> {
    let mut state = shared.lock();
    loop {
        if let Some(task) = state.tasks.pop_front() {
            return Some(task);
        }
        if state.shutdown {
            return None;
        }
        state = shared
            .ready
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

enum Outcome {
    Finished(TaskResult),
    WorkerDied,
}

fn run_task(worker: &Worker, task: &Task) -> Outcome {
    let job = Job {
        image: Arc::clone(&task.image),
        operation: task.operation.clone(),
    };
    if worker.jobs.send(job).is_err() {
        return Outcome::WorkerDied;
    }
    let mut callback = task.progress.as_ref();
    loop {
        match worker.messages.recv() {
            Ok(WorkerMessage::Progress(percent)) => {
                let Some(cb) = callback else { continue };
                let update = TaskProgress {
                    task_id: task.id,
                    percent,
                };
                // Runs on the dispatcher thread, which must outlive it
                if panic::catch_unwind(AssertUnwindSafe(|| cb(update))).is_err() {
                    log::warn!("Progress callback for task {} panicked, muting it", task.id);
                    callback = None;
                }
            }
            Ok(WorkerMessage::Done(result)) => {
                return Outcome::Finished(result.map_err(WorkerError::from));
            }
            Err(_) => return Outcome::WorkerDied,
        }
    }
}

fn dispatch(shared: Arc<Shared>, backend: Arc<dyn ImageBackend>, worker: Worker) {
    let mut worker = Some(worker);

    while let Some(task) = next_task(&shared) {
        let outcome = match &worker {
            Some(w) => run_task(w, &task),
            None => Outcome::WorkerDied,
        };

        let result = match outcome {
            Outcome::Finished(result) => result,
            Outcome::WorkerDied => {
                let message = worker
                    .take()
                    .and_then(Worker::shutdown)
                    .unwrap_or_else(|| "worker exited unexpectedly".to_string());
                log::warn!("Worker crashed on task {}: {message}", task.id);
                match Worker::spawn(Arc::clone(&backend)) {
                    Ok(fresh) => {
                        worker = Some(fresh);
                        shared.restarts.fetch_add(1, Ordering::Relaxed);
                        log::info!("Worker restarted");
                    }
                    Err(e) => log::error!("Could not restart worker: {e}"),
                }
                Err(WorkerError::Crashed(message))
            }
        };
        let _ = task.reply.send(result);
    }

    if let Some(w) = worker {
        w.shutdown();
    }
    log::debug!("Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::backend::{BackendError, DecodedImage, Dimensions};
    use crate::imaging::{Adjustments, CropArea, EncodeParams, ResizeSpec, RotateParams};
    use std::time::Duration;

    fn blank(width: u32, height: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgba8(width, height))
    }

    fn resize_to(width: u32) -> Operation {
        Operation::Resize(ResizeSpec::Width(width))
    }

    /// Backend whose `resize` blocks until the test releases it.
    struct GatedBackend {
        inner: MockBackend,
        entered: Mutex<Sender<()>>,
        gate: Mutex<Receiver<()>>,
    }

    impl GatedBackend {
        fn new() -> (Self, Receiver<()>, Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (gate_tx, gate_rx) = mpsc::channel();
            let backend = Self {
                inner: MockBackend::new(),
                entered: Mutex::new(entered_tx),
                gate: Mutex::new(gate_rx),
            };
            (backend, entered_rx, gate_tx)
        }
    }

    impl ImageBackend for GatedBackend {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, BackendError> {
            self.inner.decode(bytes)
        }

        fn resize(
            &self,
            image: &DynamicImage,
            width: u32,
            height: u32,
        ) -> Result<DynamicImage, BackendError> {
            self.entered.lock().unwrap().send(()).unwrap();
            self.gate.lock().unwrap().recv().unwrap();
            self.inner.resize(image, width, height)
        }

        fn crop(&self, image: &DynamicImage, area: &CropArea) -> Result<DynamicImage, BackendError> {
            self.inner.crop(image, area)
        }

        fn rotate(
            &self,
            image: &DynamicImage,
            params: &RotateParams,
            output: Dimensions,
        ) -> Result<DynamicImage, BackendError> {
            self.inner.rotate(image, params, output)
        }

        fn adjust(
            &self,
            image: &DynamicImage,
            adjustments: &Adjustments,
        ) -> Result<DynamicImage, BackendError> {
            self.inner.adjust(image, adjustments)
        }

        fn overlay(
            &self,
            image: &DynamicImage,
            mark: &DynamicImage,
            at: (i64, i64),
            opacity: f32,
        ) -> Result<DynamicImage, BackendError> {
            self.inner.overlay(image, mark, at, opacity)
        }

        fn encode(&self, image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
            self.inner.encode(image, params)
        }
    }

    // =========================================================================
    // Results and progress
    // =========================================================================

    #[test]
    fn runs_operation_and_returns_output() {
        let manager = WorkerManager::new(Arc::new(MockBackend::new())).unwrap();
        let output = manager
            .submit(blank(100, 50), resize_to(40), None)
            .wait()
            .unwrap();
        assert_eq!(output.dimensions(), Dimensions::new(40, 20));
    }

    #[test]
    fn operation_errors_come_back_as_operation_variant() {
        let manager = WorkerManager::new(Arc::new(MockBackend::new())).unwrap();
        let area = CropArea {
            x: 0,
            y: 0,
            width: 20,
            height: 20,
        };
        let err = manager
            .submit(blank(10, 10), Operation::Crop(area), None)
            .wait()
            .unwrap_err();
        assert!(matches!(err, WorkerError::Operation(_)));
        assert_eq!(err.to_string(), "Crop area exceeds image bounds");
    }

    #[test]
    fn progress_is_forwarded_with_task_id() {
        let manager = WorkerManager::new(Arc::new(MockBackend::new())).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handle = manager.submit(
            blank(10, 10),
            resize_to(5),
            Some(Box::new(move |p| sink.lock().unwrap().push(p))),
        );
        let id = handle.id();
        handle.wait().unwrap();

        let seen = seen.lock().unwrap();
        let percents: Vec<u8> = seen.iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![0, 50, 100]);
        assert!(seen.iter().all(|p| p.task_id == id));
    }

    #[test]
    fn tasks_complete_in_submission_order() {
        let manager = WorkerManager::new(Arc::new(MockBackend::new())).unwrap();
        let finished = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<TaskHandle> = (1..=5)
            .map(|w| {
                let sink = Arc::clone(&finished);
                manager.submit(
                    blank(10, 10),
                    resize_to(w),
                    Some(Box::new(move |p: TaskProgress| {
                        if p.percent == 100 {
                            sink.lock().unwrap().push(p.task_id);
                        }
                    })),
                )
            })
            .collect();
        let ids: Vec<u64> = handles.iter().map(TaskHandle::id).collect();
        for handle in handles {
            handle.wait().unwrap();
        }

        assert_eq!(*finished.lock().unwrap(), ids);
    }

    // =========================================================================
    // Crashes
    // =========================================================================

    #[test]
    fn crash_rejects_task_and_worker_recovers() {
        let manager = WorkerManager::new(Arc::new(MockBackend::panicking_on_width(13))).unwrap();

        let crashed = manager.submit(blank(100, 100), resize_to(13), None);
        let after = manager.submit(blank(100, 100), resize_to(20), None);

        match crashed.wait() {
            Err(WorkerError::Crashed(message)) => assert!(message.contains("width 13")),
            other => panic!("expected crash, got {:?}", other.map(|o| o.dimensions())),
        }
        assert_eq!(after.wait().unwrap().dimensions(), Dimensions::new(20, 20));
        assert_eq!(manager.restarts(), 1);
    }

    #[test]
    fn panicking_progress_callback_does_not_stall_queue() {
        let manager = WorkerManager::new(Arc::new(MockBackend::new())).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let first = manager.submit(
            blank(10, 10),
            resize_to(5),
            Some(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("callback blew up");
            })),
        );
        let second = manager.submit(blank(10, 10), resize_to(4), None);

        assert_eq!(first.wait().unwrap().dimensions(), Dimensions::new(5, 5));
        assert_eq!(second.wait().unwrap().dimensions(), Dimensions::new(4, 4));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let later = manager.submit(blank(10, 10), resize_to(3), None);
        assert_eq!(later.wait().unwrap().dimensions(), Dimensions::new(3, 3));
        assert_eq!(manager.pending(), 0);
        assert_eq!(manager.restarts(), 0);
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    #[test]
    fn cancel_all_rejects_queued_but_not_running() {
        let (backend, entered, gate) = GatedBackend::new();
        let manager = WorkerManager::new(Arc::new(backend)).unwrap();

        let running = manager.submit(blank(10, 10), resize_to(5), None);
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        let queued_a = manager.submit(blank(10, 10), resize_to(4), None);
        let queued_b = manager.submit(blank(10, 10), resize_to(3), None);
        assert_eq!(manager.pending(), 2);

        assert_eq!(manager.cancel_all(), 2);
        assert_eq!(manager.pending(), 0);
        assert!(matches!(queued_a.wait(), Err(WorkerError::Cancelled)));
        assert!(matches!(queued_b.try_wait(), Some(Err(WorkerError::Cancelled))));

        gate.send(()).unwrap();
        assert_eq!(running.wait().unwrap().dimensions(), Dimensions::new(5, 5));
    }

    #[test]
    fn cancel_all_on_idle_queue_is_zero() {
        let manager = WorkerManager::new(Arc::new(MockBackend::new())).unwrap();
        assert_eq!(manager.cancel_all(), 0);
    }

    #[test]
    fn try_wait_is_none_while_running() {
        let (backend, entered, gate) = GatedBackend::new();
        let manager = WorkerManager::new(Arc::new(backend)).unwrap();

        let handle = manager.submit(blank(10, 10), resize_to(5), None);
        entered.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(handle.try_wait().is_none());

        gate.send(()).unwrap();
        assert!(handle.wait().is_ok());
    }

    #[test]
    fn drop_joins_threads() {
        let manager = WorkerManager::new(Arc::new(MockBackend::new())).unwrap();
        let handle = manager.submit(blank(10, 10), resize_to(5), None);
        handle.wait().unwrap();
        drop(manager);
    }
}
