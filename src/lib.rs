#![deny(missing_docs)]

//! Rust bindings for the ICTCLAS Chinese word segmentation C API.
//!
//! Segmentation and dictionary import run on a worker pool so the calling
//! thread never blocks on the native library; results come back through
//! single-shot callbacks delivered on the thread that owns the
//! [`Segmenter`].
//!
//! ## Quick Start
//! ```no_run
//! use ictclas_rs::Segmenter;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let segmenter = Segmenter::init()?;
//!     segmenter.segment("欢迎使用计算所语言技术平台", |result| match result {
//!         Ok(annotated) => println!("{annotated}"),
//!         Err(error) => eprintln!("segmentation failed: {error}"),
//!     })?;
//!     segmenter.run_until_idle();
//!     segmenter.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Initialization Paths
//! `ictclas-rs` supports two common initialization modes:
//!
//! 1. Automatic discovery via [`Segmenter::init`]
//!   - Honors `ICTCLAS_LIBRARY_PATH` when set.
//!   - Otherwise checks the platform's common install locations.
//! 2. Explicit setup via [`Segmenter::from_config`]
//!   - For controlled deployments with fixed library/data paths.
//!
//! ```no_run
//! use ictclas_rs::{Segmenter, SegmenterConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SegmenterConfig::default()
//!         .with_library_path("/opt/ictclas/lib/libICTCLAS50.so")
//!         .with_data_path("/opt/ictclas");
//!     let segmenter = Segmenter::from_config(config)?;
//!     segmenter.segment("中文分词", |result| {
//!         println!("{}", result.unwrap_or_default());
//!     })?;
//!     segmenter.run_until_idle();
//!     Ok(())
//! }
//! ```
//!
//! ## Callback Delivery Rules
//! - Callbacks never run on worker threads. They run when the owning thread
//!   pumps completions with [`Segmenter::drive`] (non-blocking) or
//!   [`Segmenter::run_until_idle`] (blocking).
//! - Each callback runs exactly once, with either the result or the error.
//! - `Segmenter` is `Send` but not `Sync`; move it to the thread that should
//!   observe the callbacks.
//!
//! ## User Dictionaries
//! [`Segmenter::import_dictionary`] feeds a dictionary file to the engine,
//! persists it, and reports the number of imported entries as a decimal
//! string. The engine re-initializes on the next operation so the new
//! entries take effect. Note that the native library treats the first line
//! of the file as a header and skips it.
//!
//! ## Environment Variables
//! - `ICTCLAS_LIBRARY_PATH`: explicit dynamic library path.
//! - `ICTCLAS_DATA_PATH`: directory whose `Data/` subtree holds the
//!   engine's lexicons.

mod constants;
mod discovery;
mod engine;
mod error;
mod model;
mod native;
mod runtime;
mod types;

pub use constants::*;
pub use engine::{Engine, IctclasEngine, IctclasLibrary};
pub use error::{IctclasError, Result};
pub use model::{parse_terms, Term};
pub use runtime::Segmenter;
pub use types::{EngineConfig, SegmenterConfig};

#[cfg(test)]
mod test_support;
