use std::cell::Cell;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::constants::ICTCLAS_MAX_INPUT_BYTES;
use crate::engine::{Engine, IctclasEngine, IctclasLibrary};
use crate::error::{IctclasError, Result};
use crate::types::SegmenterConfig;

/// Completion callback invoked with the operation's result or error.
type Completion = Box<dyn FnOnce(Result<String>) + Send + 'static>;

#[derive(Debug, Clone, Copy)]
enum TaskKind {
    Segment,
    ImportDictionary,
}

/// One in-flight operation: the copied input, the callback, and the result
/// the worker phase fills in. Owned by exactly one thread at a time as it
/// moves control thread -> worker -> control thread through the channels.
struct Task {
    kind: TaskKind,
    input: String,
    callback: Completion,
    result: Option<Result<String>>,
}

/// Asynchronous interface to the ICTCLAS segmentation engine.
///
/// Blocking native calls run on a small worker pool; completion callbacks
/// run on whichever thread owns the `Segmenter` and pumps completions via
/// [`drive`](Self::drive) or [`run_until_idle`](Self::run_until_idle). The
/// type is deliberately not `Sync`, so submissions and callbacks stay on
/// that single owning thread.
///
/// Submissions fail synchronously on invalid input and when the idle
/// engine cannot initialize; after that, success and failure both arrive
/// through the callback. Submitting never waits behind a native call in
/// flight, so a re-initialization forced mid-stream by an import runs on
/// a worker and reports failures through the callback too.
pub struct Segmenter {
    engine: Arc<Engine>,
    jobs: Option<Sender<Task>>,
    completions: Receiver<Task>,
    workers: Vec<thread::JoinHandle<()>>,
    pending: Cell<usize>,
    callback_faults: Cell<u64>,
}

impl Segmenter {
    /// Loads the ICTCLAS shared library from `ICTCLAS_LIBRARY_PATH` or the
    /// platform's common locations and starts the worker pool.
    pub fn init() -> Result<Self> {
        Self::from_config(SegmenterConfig::default())
    }

    /// Builds a segmenter from explicit configuration.
    pub fn from_config(config: SegmenterConfig) -> Result<Self> {
        let library = match config.library_path.as_ref() {
            Some(path) => IctclasLibrary::load(path)?,
            None => IctclasLibrary::load_default()?,
        };
        Self::from_engine(Arc::new(library), config)
    }

    /// Builds a segmenter over any [`IctclasEngine`] implementation.
    ///
    /// `config.library_path` is ignored here; the caller already chose the
    /// engine.
    pub fn from_engine(driver: Arc<dyn IctclasEngine>, config: SegmenterConfig) -> Result<Self> {
        let worker_count = config.resolved_worker_threads();
        let engine = Arc::new(Engine::new(driver, config.engine.clone()));

        let (job_tx, job_rx) = mpsc::channel::<Task>();
        let (done_tx, done_rx) = mpsc::channel::<Task>();
        let shared_jobs = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let jobs = Arc::clone(&shared_jobs);
            let done = done_tx.clone();
            let engine = Arc::clone(&engine);
            let handle = thread::Builder::new()
                .name(format!("ictclas-worker-{index}"))
                .spawn(move || worker_loop(jobs, done, engine))
                .map_err(|error| {
                    IctclasError::Init(format!("failed to spawn worker thread: {error}"))
                })?;
            workers.push(handle);
        }

        tracing::info!(workers = worker_count, "segmenter started");
        Ok(Self {
            engine,
            jobs: Some(job_tx),
            completions: done_rx,
            workers,
            pending: Cell::new(0),
            callback_faults: Cell::new(0),
        })
    }

    /// Schedules segmentation of `text` with part-of-speech annotation.
    ///
    /// `callback` receives the annotated text (or the failure) exactly once,
    /// on the pumping thread. Returns without blocking on the native call.
    pub fn segment(
        &self,
        text: &str,
        callback: impl FnOnce(Result<String>) + Send + 'static,
    ) -> Result<()> {
        self.submit(TaskKind::Segment, text, Box::new(callback))
    }

    /// Schedules an import of the dictionary file at `path` into the
    /// engine's user dictionary.
    ///
    /// `callback` receives the imported-entry count as a decimal string
    /// (`"0"` is a valid import). The engine re-initializes on the next
    /// operation so the entries take effect. The native library skips the
    /// first line of the dictionary file.
    pub fn import_dictionary(
        &self,
        path: &str,
        callback: impl FnOnce(Result<String>) + Send + 'static,
    ) -> Result<()> {
        self.submit(TaskKind::ImportDictionary, path, Box::new(callback))
    }

    /// Dispatches every completion currently queued, without blocking.
    /// Returns the number of callbacks invoked.
    pub fn drive(&self) -> usize {
        let mut dispatched = 0;
        while let Ok(task) = self.completions.try_recv() {
            self.finish(task);
            dispatched += 1;
        }
        dispatched
    }

    /// Blocks until every in-flight operation has completed and its
    /// callback has run. Returns immediately when nothing is pending.
    pub fn run_until_idle(&self) {
        while self.pending.get() > 0 {
            match self.completions.recv() {
                Ok(task) => self.finish(task),
                Err(_) => break,
            }
        }
    }

    /// Operations submitted but not yet delivered to their callbacks.
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Number of callbacks that panicked during dispatch. The panic itself
    /// resumes on the pumping thread after the task is released.
    pub fn callback_faults(&self) -> u64 {
        self.callback_faults.get()
    }

    /// Number of successful native engine initializations so far; grows by
    /// one after every dictionary import takes effect.
    pub fn initialization_count(&self) -> u64 {
        self.engine.initialization_count()
    }

    /// Stops intake, finishes queued work, delivers the remaining
    /// completions, joins the workers, and shuts the native engine down.
    ///
    /// Consuming `self` is what closes the submission side; a closed
    /// segmenter cannot be used again by construction. Dropping without
    /// `close` also releases everything but delivers no further callbacks.
    pub fn close(mut self) -> Result<()> {
        self.jobs = None;
        while self.pending.get() > 0 {
            match self.completions.recv() {
                Ok(task) => self.finish(task),
                Err(_) => break,
            }
        }
        self.join_workers();
        tracing::info!("segmenter closed");
        self.engine.shutdown()
    }

    fn submit(&self, kind: TaskKind, input: &str, callback: Completion) -> Result<()> {
        let jobs = match self.jobs.as_ref() {
            Some(jobs) => jobs,
            None => return Err(IctclasError::Closed),
        };
        validate_input(kind, input)?;
        self.engine.ensure_ready_for_submit()?;

        let task = Task {
            kind,
            input: input.to_string(),
            callback,
            result: None,
        };
        jobs.send(task).map_err(|_| IctclasError::Closed)?;
        self.pending.set(self.pending.get() + 1);
        tracing::trace!(?kind, bytes = input.len(), "task queued");
        Ok(())
    }

    fn finish(&self, task: Task) {
        self.pending.set(self.pending.get().saturating_sub(1));
        let Task {
            kind,
            callback,
            result,
            ..
        } = task;
        let result = result.expect("worker stores a result before completing");

        let outcome = catch_unwind(AssertUnwindSafe(move || callback(result)));
        if let Err(payload) = outcome {
            // The record, its input copy, and the callback are gone by now;
            // only the panic is left to hand back to the pumping thread.
            self.callback_faults.set(self.callback_faults.get() + 1);
            tracing::error!(?kind, "completion callback panicked");
            resume_unwind(payload);
        }
    }

    fn join_workers(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for Segmenter {
    fn drop(&mut self) {
        self.jobs = None;
        self.join_workers();
        let undelivered = self.pending.get();
        if undelivered > 0 {
            tracing::warn!(undelivered, "segmenter dropped with undelivered completions");
        }
        let _ = self.engine.shutdown();
    }
}

fn worker_loop(jobs: Arc<Mutex<Receiver<Task>>>, done: Sender<Task>, engine: Arc<Engine>) {
    loop {
        let mut task = {
            let receiver = jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match receiver.recv() {
                Ok(task) => task,
                Err(_) => break,
            }
        };

        let result = match task.kind {
            TaskKind::Segment => engine.segment_paragraph(&task.input),
            TaskKind::ImportDictionary => engine.import_dictionary(&task.input),
        };
        task.result = Some(result);

        if done.send(task).is_err() {
            break;
        }
    }
}

fn validate_input(kind: TaskKind, input: &str) -> Result<()> {
    if input.bytes().any(|byte| byte == 0) {
        let what = match kind {
            TaskKind::Segment => "text",
            TaskKind::ImportDictionary => "path",
        };
        return Err(IctclasError::InvalidArgument(format!(
            "{what} contains an interior NUL byte"
        )));
    }
    if input.len() > ICTCLAS_MAX_INPUT_BYTES {
        return Err(IctclasError::InvalidArgument(format!(
            "input exceeds {ICTCLAS_MAX_INPUT_BYTES} bytes"
        )));
    }
    Ok(())
}
