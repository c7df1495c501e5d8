use std::env;
use std::ffi::OsString;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use crate::engine::IctclasEngine;
use crate::error::Result;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn set_env_var(key: &str, value: &str) {
    #[allow(unused_unsafe)]
    unsafe {
        env::set_var(key, value);
    }
}

fn remove_env_var(key: &str) {
    #[allow(unused_unsafe)]
    unsafe {
        env::remove_var(key);
    }
}

/// Runs a closure with one overridden environment variable.
pub(crate) fn with_env_var<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    with_env_vars(&[(key, Some(value))], f)
}

/// Runs a closure while holding a global environment lock and applying overrides.
pub(crate) fn with_env_vars<T>(overrides: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    let _guard = env_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let backups: Vec<(&str, Option<OsString>)> = overrides
        .iter()
        .map(|(key, _)| (*key, env::var_os(key)))
        .collect();

    for (key, value) in overrides {
        match value {
            Some(value) => set_env_var(key, value),
            None => remove_env_var(key),
        }
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (key, value) in backups.into_iter().rev() {
        match value {
            Some(value) => {
                #[allow(unused_unsafe)]
                unsafe {
                    env::set_var(key, value);
                }
            }
            None => remove_env_var(key),
        }
    }

    match result {
        Ok(result) => result,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Scripted in-process stand-in for the native library.
///
/// Segmentation echoes the input as a single `input/x` term; every other
/// behavior is overridable through the `with_*` constructors. Call history
/// and counters let tests assert what reached the engine and whether native
/// calls ever overlapped.
pub(crate) struct RecordingEngine {
    script: Mutex<EngineScript>,
    calls: Mutex<Vec<String>>,
    init_calls: AtomicU64,
    exit_calls: AtomicU64,
    active_calls: AtomicUsize,
    max_concurrent_calls: AtomicUsize,
}

struct EngineScript {
    init_ok: bool,
    import_count: u32,
    save_ok: bool,
    process_result: Option<i32>,
    process_output: Option<String>,
    call_delay: Duration,
    last_pos_map: Option<i32>,
}

impl RecordingEngine {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(EngineScript {
                init_ok: true,
                import_count: 0,
                save_ok: true,
                process_result: None,
                process_output: None,
                call_delay: Duration::ZERO,
                last_pos_map: None,
            }),
            calls: Mutex::new(Vec::new()),
            init_calls: AtomicU64::new(0),
            exit_calls: AtomicU64::new(0),
            active_calls: AtomicUsize::new(0),
            max_concurrent_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_failing_init(self) -> Self {
        self.script().init_ok = false;
        self
    }

    pub(crate) fn with_import_count(self, count: u32) -> Self {
        self.script().import_count = count;
        self
    }

    pub(crate) fn with_failing_save(self) -> Self {
        self.script().save_ok = false;
        self
    }

    /// Forces `process_paragraph` to report `result` without writing output.
    pub(crate) fn with_process_result(self, result: i32) -> Self {
        self.script().process_result = Some(result);
        self
    }

    /// Makes `process_paragraph` write `annotated` instead of echoing input.
    pub(crate) fn with_process_output(self, annotated: impl Into<String>) -> Self {
        self.script().process_output = Some(annotated.into());
        self
    }

    /// Holds every native call open for `delay`, making overlap observable.
    pub(crate) fn with_call_delay(self, delay: Duration) -> Self {
        self.script().call_delay = delay;
        self
    }

    pub(crate) fn init_calls(&self) -> u64 {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn exit_calls(&self) -> u64 {
        self.exit_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_pos_map(&self) -> Option<i32> {
        self.script().last_pos_map
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, EngineScript> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    fn enter_call(&self) -> Duration {
        let active = self.active_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_calls
            .fetch_max(active, Ordering::SeqCst);
        self.script().call_delay
    }

    fn leave_call(&self) {
        self.active_calls.fetch_sub(1, Ordering::SeqCst);
    }
}

impl IctclasEngine for RecordingEngine {
    fn init(&self, data_dir: Option<&Path>) -> Result<bool> {
        let delay = self.enter_call();
        thread::sleep(delay);
        self.record(format!(
            "init({})",
            data_dir.map(|p| p.display().to_string()).unwrap_or_default()
        ));
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let ok = self.script().init_ok;
        self.leave_call();
        Ok(ok)
    }

    fn set_pos_map(&self, mode: i32) -> Result<()> {
        self.record(format!("set_pos_map({mode})"));
        self.script().last_pos_map = Some(mode);
        Ok(())
    }

    fn process_paragraph(
        &self,
        text: &str,
        output: &mut [u8],
        _code_type: i32,
        _pos_tagged: bool,
    ) -> Result<i32> {
        let delay = self.enter_call();
        thread::sleep(delay);
        self.record(format!("process({text})"));

        let (forced, scripted) = {
            let script = self.script();
            (script.process_result, script.process_output.clone())
        };
        let result = match forced {
            Some(forced) => forced,
            None => {
                let produced = scripted.unwrap_or_else(|| format!("{text}/x"));
                let bytes = produced.as_bytes();
                let writable = bytes.len().min(output.len().saturating_sub(1));
                output[..writable].copy_from_slice(&bytes[..writable]);
                output[writable] = 0;
                bytes.len() as i32
            }
        };
        self.leave_call();
        Ok(result)
    }

    fn import_user_dict(&self, path: &str, _code_type: i32) -> Result<u32> {
        let delay = self.enter_call();
        thread::sleep(delay);
        self.record(format!("import({path})"));
        let count = self.script().import_count;
        self.leave_call();
        Ok(count)
    }

    fn save_user_dict(&self) -> Result<bool> {
        self.record("save".to_string());
        Ok(self.script().save_ok)
    }

    fn exit(&self) -> Result<bool> {
        self.record("exit".to_string());
        self.exit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
