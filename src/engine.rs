use std::env;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::constants::{
    ICTCLAS_CODE_UTF8, ICTCLAS_LIBRARY_PATH_ENV, ICTCLAS_MAX_INPUT_BYTES,
    ICTCLAS_RESULT_CAPACITY_FACTOR,
};
use crate::discovery::{default_library_candidates, discover_default_library_path};
use crate::error::{IctclasError, Result};
use crate::native::{DynamicLibrary, IctclasApi, LoadedLibrary};
use crate::types::EngineConfig;

// ICTCLAS keeps its engine state process-wide, so native calls from every
// coordinator in the process funnel through this one lock.
static NATIVE_CALL_LOCK: Mutex<()> = Mutex::new(());

fn native_lock() -> MutexGuard<'static, ()> {
    NATIVE_CALL_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Contract of the native segmentation engine.
///
/// [`IctclasLibrary`] is the production implementation backed by the ICTCLAS
/// shared library; tests and embedders may substitute their own. Sentinel
/// values stay raw (`false`, non-positive counts): interpreting them into
/// errors is [`Engine`]'s job, while `Err` carries marshalling and loading
/// failures.
///
/// Implementations must tolerate concurrent callers; [`Engine`] nonetheless
/// serializes every call because the real engine's process-wide state cannot
/// take overlapping mutation.
pub trait IctclasEngine: Send + Sync {
    /// One-time engine setup. `false` means the engine refused to start.
    ///
    /// `data_dir` is the directory containing the engine's `Data/` tree;
    /// the engine falls back to the process working directory when absent.
    fn init(&self, data_dir: Option<&Path>) -> Result<bool>;

    /// Selects the part-of-speech tag mapping applied to annotated output.
    fn set_pos_map(&self, mode: i32) -> Result<()>;

    /// Segments `text` into `output` as NUL-terminated annotated text and
    /// returns the amount produced, or a non-positive sentinel on failure.
    fn process_paragraph(
        &self,
        text: &str,
        output: &mut [u8],
        code_type: i32,
        pos_tagged: bool,
    ) -> Result<i32>;

    /// Merges the dictionary file at `path` into the user dictionary and
    /// returns how many entries it contributed.
    fn import_user_dict(&self, path: &str, code_type: i32) -> Result<u32>;

    /// Persists the merged user dictionary. `false` means the engine failed
    /// to write it.
    fn save_user_dict(&self) -> Result<bool>;

    /// Releases process-wide engine resources.
    fn exit(&self) -> Result<bool>;
}

/// Handle to a loaded ICTCLAS dynamic library plus resolved function table.
///
/// This type is useful when you want explicit control over which shared
/// library is loaded before creating a [`crate::Segmenter`].
#[derive(Clone)]
pub struct IctclasLibrary {
    inner: Arc<LoadedLibrary>,
}

impl IctclasLibrary {
    /// Loads the ICTCLAS dynamic library from an explicit path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let library = DynamicLibrary::open(path)?;
        Self::from_library(library)
    }

    /// Loads ICTCLAS from common platform-specific locations and caches it.
    pub fn load_default() -> Result<Self> {
        static DEFAULT_LIBRARY: Mutex<Option<Arc<LoadedLibrary>>> = Mutex::new(None);

        let mut guard = DEFAULT_LIBRARY.lock().map_err(|_| {
            IctclasError::LibraryLoad("failed to lock default library cache".to_string())
        })?;

        if let Some(inner) = guard.as_ref() {
            return Ok(Self {
                inner: inner.clone(),
            });
        }

        let loaded = Self::load_default_internal()?;
        let inner = loaded.inner;
        *guard = Some(inner.clone());
        Ok(Self { inner })
    }

    fn load_default_internal() -> Result<Self> {
        let mut errors = Vec::new();

        if let Some(path) = discover_default_library_path() {
            match Self::load(&path) {
                Ok(loaded) => return Ok(loaded),
                Err(error) => errors.push(format!("{}: {}", path.display(), error)),
            }
        }

        for candidate in default_library_candidates() {
            let library = match DynamicLibrary::open(candidate) {
                Ok(library) => library,
                Err(error) => {
                    errors.push(format!("{candidate}: {error}"));
                    continue;
                }
            };

            match Self::from_library(library) {
                Ok(loaded) => return Ok(loaded),
                Err(error) => errors.push(format!("{candidate}: {error}")),
            }
        }

        Err(IctclasError::LibraryLoad(format!(
            "set ICTCLAS_LIBRARY_PATH to the shared library path. tried: {}",
            errors.join(" | ")
        )))
    }

    /// Loads from `ICTCLAS_LIBRARY_PATH` if set, otherwise falls back to
    /// [`Self::load_default`].
    pub fn load_from_env_or_default() -> Result<Self> {
        if let Some(path) = env::var_os(ICTCLAS_LIBRARY_PATH_ENV) {
            return Self::load(PathBuf::from(path));
        }
        Self::load_default()
    }

    fn from_library(library: DynamicLibrary) -> Result<Self> {
        let api = unsafe { IctclasApi::load(&library)? };
        Ok(Self {
            inner: Arc::new(LoadedLibrary {
                _library: library,
                api,
            }),
        })
    }
}

impl IctclasEngine for IctclasLibrary {
    fn init(&self, data_dir: Option<&Path>) -> Result<bool> {
        let dir = data_dir
            .map(|path| path.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        let dir_c = CString::new(dir)?;
        let result = unsafe { (self.inner.api.ictclas_init)(dir_c.as_ptr()) };
        Ok(result != 0)
    }

    fn set_pos_map(&self, mode: i32) -> Result<()> {
        let result = unsafe { (self.inner.api.ictclas_set_pos_map)(mode as c_int) };
        if result == 0 {
            return Err(IctclasError::Init(format!(
                "ICTCLAS_SetPOSmap rejected mode {mode}"
            )));
        }
        Ok(())
    }

    fn process_paragraph(
        &self,
        text: &str,
        output: &mut [u8],
        code_type: i32,
        pos_tagged: bool,
    ) -> Result<i32> {
        let text_c = CString::new(text)?;
        let produced = unsafe {
            (self.inner.api.ictclas_paragraph_process)(
                text_c.as_ptr(),
                text.len() as c_int,
                output.as_mut_ptr() as *mut c_char,
                code_type as c_int,
                if pos_tagged { 1 } else { 0 },
            )
        };
        Ok(produced)
    }

    fn import_user_dict(&self, path: &str, code_type: i32) -> Result<u32> {
        let path_c = CString::new(path)?;
        let count = unsafe {
            (self.inner.api.ictclas_import_user_dict_file)(path_c.as_ptr(), code_type as c_int)
        };
        Ok(count)
    }

    fn save_user_dict(&self) -> Result<bool> {
        let result = unsafe { (self.inner.api.ictclas_save_the_usr_dic)() };
        Ok(result != 0)
    }

    fn exit(&self) -> Result<bool> {
        let result = unsafe { (self.inner.api.ictclas_exit)() };
        Ok(result != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    NotReady,
    Ready,
    Closed,
}

impl EngineState {
    fn encode(self) -> u8 {
        match self {
            EngineState::NotReady => 0,
            EngineState::Ready => 1,
            EngineState::Closed => 2,
        }
    }

    fn decode(raw: u8) -> Self {
        match raw {
            0 => EngineState::NotReady,
            1 => EngineState::Ready,
            _ => EngineState::Closed,
        }
    }
}

/// Coordinator owning the engine's lifecycle state.
///
/// Native calls are serialized twice over: the state lock orders them within
/// one coordinator, and the process-wide call lock orders them across
/// coordinators, because the real engine's state is process-global.
///
/// The engine starts `NotReady`, initializes lazily before the first call,
/// and drops back to `NotReady` after a dictionary import so the next call
/// re-initializes with the merged dictionary. A dictionary import (import,
/// save, state reset) is one critical section; no segmentation interleaves.
pub struct Engine {
    driver: Arc<dyn IctclasEngine>,
    config: EngineConfig,
    state: Mutex<EngineState>,
    // Mirror of `state`, written only while the lock is held. Lets the
    // submission path answer without waiting behind a native call.
    state_cache: AtomicU8,
    init_count: AtomicU64,
}

impl Engine {
    /// Creates a coordinator around `driver`. No native call happens until
    /// the first operation.
    pub fn new(driver: Arc<dyn IctclasEngine>, config: EngineConfig) -> Self {
        Self {
            driver,
            config,
            state: Mutex::new(EngineState::NotReady),
            state_cache: AtomicU8::new(EngineState::NotReady.encode()),
            init_count: AtomicU64::new(0),
        }
    }

    /// Initializes the native engine if it is not currently ready.
    pub fn ensure_ready(&self) -> Result<()> {
        let mut state = self.state();
        self.ready_locked(&mut state)
    }

    /// Submission-side readiness check that never waits behind a native call
    /// in flight.
    ///
    /// Warm and closed engines answer from the state mirror. A cold engine
    /// initializes here only when the state lock is free, so init failures
    /// still surface before anything is queued; when a worker holds the
    /// lock, readiness is left to that worker's re-check and an init failure
    /// travels through the task's callback instead.
    pub(crate) fn ensure_ready_for_submit(&self) -> Result<()> {
        match EngineState::decode(self.state_cache.load(Ordering::SeqCst)) {
            EngineState::Ready => Ok(()),
            EngineState::Closed => Err(IctclasError::Closed),
            EngineState::NotReady => match self.state.try_lock() {
                Ok(mut state) => self.ready_locked(&mut state),
                Err(TryLockError::Poisoned(poisoned)) => {
                    let mut state = poisoned.into_inner();
                    self.ready_locked(&mut state)
                }
                Err(TryLockError::WouldBlock) => Ok(()),
            },
        }
    }

    /// Segments one paragraph with part-of-speech annotation, initializing
    /// the engine first if needed.
    ///
    /// Empty input returns an empty string without touching the native
    /// processing call. Aborts the process if the native engine reports
    /// more output than the capacity bound allows, because the buffer is
    /// already overrun at that point.
    pub fn segment_paragraph(&self, text: &str) -> Result<String> {
        let mut state = self.state();
        self.ready_locked(&mut state)?;

        if text.is_empty() {
            return Ok(String::new());
        }
        if text.len() > ICTCLAS_MAX_INPUT_BYTES {
            return Err(IctclasError::InvalidArgument(format!(
                "text exceeds {ICTCLAS_MAX_INPUT_BYTES} bytes"
            )));
        }

        let capacity = text.len() * ICTCLAS_RESULT_CAPACITY_FACTOR + 1;
        let mut buffer = vec![0u8; capacity];
        let produced = {
            let _native = native_lock();
            self.driver
                .process_paragraph(text, &mut buffer, ICTCLAS_CODE_UTF8, true)?
        };

        if produced <= 0 {
            return Err(IctclasError::Segmentation(format!(
                "native call returned {produced} for {} input bytes",
                text.len()
            )));
        }
        if produced as usize >= capacity {
            tracing::error!(
                produced,
                capacity,
                "native engine overran the segmentation output buffer"
            );
            // The engine wrote past our allocation; the process is not
            // continuable.
            std::process::abort();
        }

        let end = buffer
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(buffer.len());
        buffer.truncate(end);
        let segmented = String::from_utf8(buffer).map_err(|_| {
            IctclasError::Segmentation("native call produced invalid UTF-8 output".to_string())
        })?;

        tracing::debug!(
            bytes_in = text.len(),
            bytes_out = segmented.len(),
            "paragraph segmented"
        );
        Ok(segmented)
    }

    /// Imports the dictionary file at `path`, persists the merge, and
    /// schedules re-initialization so the entries take effect.
    ///
    /// Returns the imported-entry count as its decimal string; zero entries
    /// is a valid import and reports `"0"`. A failed save also schedules
    /// re-initialization, discarding the unsaved in-memory merge.
    pub fn import_dictionary(&self, path: &str) -> Result<String> {
        let mut state = self.state();
        self.ready_locked(&mut state)?;

        let _native = native_lock();
        let count = self.driver.import_user_dict(path, ICTCLAS_CODE_UTF8)?;
        self.transition(&mut state, EngineState::NotReady);
        let saved = self.driver.save_user_dict()?;
        drop(_native);
        if !saved {
            return Err(IctclasError::Import(
                "native engine failed to persist the user dictionary".to_string(),
            ));
        }

        tracing::info!(count, path, "user dictionary imported");
        Ok(count.to_string())
    }

    /// Forces the next operation to re-initialize the native engine.
    pub fn invalidate(&self) {
        let mut state = self.state();
        if *state == EngineState::Ready {
            self.transition(&mut state, EngineState::NotReady);
        }
    }

    /// Shuts the native engine down and rejects further operations.
    ///
    /// Idempotent. An engine that was never initialized closes without a
    /// native call; a refused native exit is logged, not an error.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state();
        match *state {
            EngineState::Closed => Ok(()),
            EngineState::NotReady => {
                self.transition(&mut state, EngineState::Closed);
                Ok(())
            }
            EngineState::Ready => {
                self.transition(&mut state, EngineState::Closed);
                let clean = {
                    let _native = native_lock();
                    self.driver.exit()?
                };
                if !clean {
                    tracing::warn!("native engine refused to exit cleanly");
                }
                Ok(())
            }
        }
    }

    /// Number of successful native initializations so far.
    ///
    /// Increments on first use and again after every dictionary import;
    /// useful for observing re-initialization.
    pub fn initialization_count(&self) -> u64 {
        self.init_count.load(Ordering::SeqCst)
    }

    fn ready_locked(&self, state: &mut EngineState) -> Result<()> {
        match *state {
            EngineState::Closed => Err(IctclasError::Closed),
            EngineState::Ready => Ok(()),
            EngineState::NotReady => {
                let _native = native_lock();
                let started = self.driver.init(self.config.data_path.as_deref())?;
                if !started {
                    return Err(IctclasError::Init(
                        "native engine refused to start; check the data directory".to_string(),
                    ));
                }
                self.driver.set_pos_map(self.config.pos_map)?;
                drop(_native);
                self.transition(state, EngineState::Ready);
                self.init_count.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    pos_map = self.config.pos_map,
                    data_dir = ?self.config.data_path,
                    "native engine initialized"
                );
                Ok(())
            }
        }
    }

    fn transition(&self, state: &mut EngineState, next: EngineState) {
        *state = next;
        self.state_cache.store(next.encode(), Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod engine_tests {
    use super::Engine;
    use crate::error::IctclasError;
    use crate::test_support::RecordingEngine;
    use crate::types::EngineConfig;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn engine_with(recording: Arc<RecordingEngine>) -> Engine {
        Engine::new(recording, EngineConfig::default().with_data_path("/opt/ictclas"))
    }

    #[test]
    fn initializes_lazily_and_only_once() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = engine_with(recording.clone());
        assert_eq!(recording.init_calls(), 0);

        engine.segment_paragraph("你好").unwrap();
        engine.segment_paragraph("世界").unwrap();

        assert_eq!(recording.init_calls(), 1);
        assert_eq!(engine.initialization_count(), 1);
    }

    #[test]
    fn applies_configured_pos_map_at_init() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = Engine::new(
            recording.clone(),
            EngineConfig::default().with_pos_map(crate::constants::ICTCLAS_POS_MAP_PKU_FIRST),
        );

        engine.ensure_ready().unwrap();
        assert_eq!(
            recording.last_pos_map(),
            Some(crate::constants::ICTCLAS_POS_MAP_PKU_FIRST)
        );
    }

    #[test]
    fn refused_init_is_an_error_and_state_stays_cold() {
        let recording = Arc::new(RecordingEngine::new().with_failing_init());
        let engine = engine_with(recording.clone());

        let error = engine.ensure_ready().unwrap_err();
        assert!(matches!(error, IctclasError::Init(_)));
        assert_eq!(engine.initialization_count(), 0);

        // Still cold: the next attempt hits the native init again.
        let _ = engine.ensure_ready().unwrap_err();
        assert_eq!(recording.init_calls(), 2);
    }

    #[test]
    fn submission_readiness_initializes_an_idle_engine() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = engine_with(recording.clone());

        engine.ensure_ready_for_submit().unwrap();
        assert_eq!(recording.init_calls(), 1);

        // Warm now: the check answers from the mirror alone.
        engine.ensure_ready_for_submit().unwrap();
        assert_eq!(recording.init_calls(), 1);
    }

    #[test]
    fn submission_readiness_surfaces_init_failure_when_idle() {
        let recording = Arc::new(RecordingEngine::new().with_failing_init());
        let engine = engine_with(recording);

        let error = engine.ensure_ready_for_submit().unwrap_err();
        assert!(matches!(error, IctclasError::Init(_)));
    }

    #[test]
    fn submission_readiness_reports_closed_after_shutdown() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = engine_with(recording);
        engine.shutdown().unwrap();

        let error = engine.ensure_ready_for_submit().unwrap_err();
        assert!(matches!(error, IctclasError::Closed));
    }

    #[test]
    fn busy_engine_defers_submission_readiness_to_the_lock_holder() {
        let recording =
            Arc::new(RecordingEngine::new().with_call_delay(Duration::from_millis(300)));
        let engine = Arc::new(engine_with(recording.clone()));

        let runner = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.segment_paragraph("你好").unwrap())
        };
        // Give the runner time to take the state lock and enter the slow init.
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        engine.ensure_ready_for_submit().unwrap();
        let waited = started.elapsed();
        assert!(
            waited < Duration::from_millis(150),
            "readiness check waited {waited:?} behind the lock holder"
        );

        assert_eq!(runner.join().unwrap(), "你好/x");
        assert_eq!(recording.init_calls(), 1);
    }

    #[test]
    fn segments_through_the_driver() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = engine_with(recording.clone());

        let segmented = engine.segment_paragraph("你好世界").unwrap();
        assert_eq!(segmented, "你好世界/x");
        assert!(segmented.len() <= "你好世界".len() * 6);
    }

    #[test]
    fn empty_input_skips_the_native_processing_call() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = engine_with(recording.clone());

        assert_eq!(engine.segment_paragraph("").unwrap(), "");
        assert_eq!(recording.init_calls(), 1);
        assert!(recording
            .calls()
            .iter()
            .all(|call| !call.starts_with("process(")));
    }

    #[test]
    fn negative_process_result_becomes_segmentation_error() {
        let recording = Arc::new(RecordingEngine::new().with_process_result(-1));
        let engine = engine_with(recording);

        let error = engine.segment_paragraph("你好").unwrap_err();
        assert!(matches!(error, IctclasError::Segmentation(_)));
    }

    #[test]
    fn zero_output_for_nonempty_input_is_an_error() {
        let recording = Arc::new(RecordingEngine::new().with_process_result(0));
        let engine = engine_with(recording);

        let error = engine.segment_paragraph("你好").unwrap_err();
        assert!(matches!(error, IctclasError::Segmentation(_)));
    }

    #[test]
    fn output_filling_the_capacity_is_still_decoded() {
        // The largest in-bound output: six bytes for every input byte.
        let annotated = "你/n 好/v 吗/yg";
        assert_eq!(annotated.len(), "你".len() * 6);

        let recording = Arc::new(RecordingEngine::new().with_process_output(annotated));
        let engine = engine_with(recording);
        assert_eq!(engine.segment_paragraph("你").unwrap(), annotated);
    }

    #[test]
    fn import_reports_count_and_forces_reinit() {
        let recording = Arc::new(RecordingEngine::new().with_import_count(12));
        let engine = engine_with(recording.clone());

        let count = engine.import_dictionary("/tmp/dict.txt").unwrap();
        assert_eq!(count, "12");
        assert_eq!(recording.init_calls(), 1);

        engine.segment_paragraph("你好").unwrap();
        assert_eq!(recording.init_calls(), 2);
        assert_eq!(engine.initialization_count(), 2);
    }

    #[test]
    fn importing_zero_entries_still_reports_zero() {
        let recording = Arc::new(RecordingEngine::new().with_import_count(0));
        let engine = engine_with(recording);
        assert_eq!(engine.import_dictionary("/tmp/empty.txt").unwrap(), "0");
    }

    #[test]
    fn failed_save_is_an_import_error_and_still_reinitializes() {
        let recording = Arc::new(RecordingEngine::new().with_failing_save());
        let engine = engine_with(recording.clone());

        let error = engine.import_dictionary("/tmp/dict.txt").unwrap_err();
        assert!(matches!(error, IctclasError::Import(_)));

        engine.segment_paragraph("你好").unwrap();
        assert_eq!(recording.init_calls(), 2);
    }

    #[test]
    fn invalidate_forces_the_next_call_to_reinit() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = engine_with(recording.clone());

        engine.segment_paragraph("你好").unwrap();
        engine.invalidate();
        engine.segment_paragraph("你好").unwrap();
        assert_eq!(recording.init_calls(), 2);
    }

    #[test]
    fn shutdown_is_idempotent_and_rejects_later_operations() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = engine_with(recording.clone());
        engine.ensure_ready().unwrap();

        engine.shutdown().unwrap();
        engine.shutdown().unwrap();
        assert_eq!(recording.exit_calls(), 1);

        let error = engine.segment_paragraph("你好").unwrap_err();
        assert!(matches!(error, IctclasError::Closed));
    }

    #[test]
    fn shutdown_without_init_skips_the_native_exit() {
        let recording = Arc::new(RecordingEngine::new());
        let engine = engine_with(recording.clone());
        engine.shutdown().unwrap();
        assert_eq!(recording.exit_calls(), 0);
    }

    #[test]
    fn dropping_the_engine_shuts_the_native_engine_down() {
        let recording = Arc::new(RecordingEngine::new());
        {
            let engine = engine_with(recording.clone());
            engine.ensure_ready().unwrap();
        }
        assert_eq!(recording.exit_calls(), 1);
    }

    #[test]
    fn engine_is_shareable_across_worker_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
