use std::env;
use std::path::{Path, PathBuf};
use std::thread;

use crate::constants::{ICTCLAS_LIBRARY_PATH_ENV, ICTCLAS_POS_MAP_ICT_SECOND};
use crate::discovery::discover_default_data_path;

/// Native engine settings applied every time the engine initializes.
///
/// A dictionary import invalidates the running engine, so these settings are
/// re-applied on the reinitialization that follows.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory containing the engine's `Data/` tree. The engine resolves
    /// paths relative to the process working directory when `None`.
    pub data_path: Option<PathBuf>,
    /// Part-of-speech tag mapping mode, one of the `ICTCLAS_POS_MAP_*`
    /// constants.
    pub pos_map: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_path: discover_default_data_path(),
            pos_map: ICTCLAS_POS_MAP_ICT_SECOND,
        }
    }
}

impl EngineConfig {
    /// Sets the directory containing the engine's `Data/` tree.
    pub fn with_data_path(mut self, data_path: impl AsRef<Path>) -> Self {
        self.data_path = Some(data_path.as_ref().to_path_buf());
        self
    }

    /// Sets the part-of-speech tag mapping mode.
    pub fn with_pos_map(mut self, pos_map: i32) -> Self {
        self.pos_map = pos_map;
        self
    }
}

/// Configuration for [`crate::Segmenter`] construction.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Explicit shared library path; platform discovery applies when `None`.
    pub library_path: Option<PathBuf>,
    /// Engine settings applied at every (re)initialization.
    pub engine: EngineConfig,
    /// Worker threads executing blocking native calls. `0` selects the
    /// host's available parallelism.
    pub worker_threads: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            library_path: env::var_os(ICTCLAS_LIBRARY_PATH_ENV).map(PathBuf::from),
            engine: EngineConfig::default(),
            worker_threads: 0,
        }
    }
}

impl SegmenterConfig {
    /// Sets the shared library path.
    pub fn with_library_path(mut self, library_path: impl AsRef<Path>) -> Self {
        self.library_path = Some(library_path.as_ref().to_path_buf());
        self
    }

    /// Sets the directory containing the engine's `Data/` tree.
    pub fn with_data_path(mut self, data_path: impl AsRef<Path>) -> Self {
        self.engine = self.engine.with_data_path(data_path);
        self
    }

    /// Replaces the engine settings wholesale.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the worker thread count; `0` selects the host's available
    /// parallelism.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub(crate) fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(2)
        } else {
            self.worker_threads
        }
    }
}
