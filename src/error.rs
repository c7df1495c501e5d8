use std::fmt;

/// Error type returned by ictclas-rs public APIs.
#[derive(Debug)]
pub enum IctclasError {
    /// Dynamic library could not be loaded.
    LibraryLoad(String),
    /// Required symbol could not be resolved from the library.
    SymbolLoad(String),
    /// Rust string contained an interior `NUL` byte for C interop.
    NulByte(std::ffi::NulError),
    /// User-provided arguments were invalid.
    InvalidArgument(String),
    /// Native engine failed to initialize or configure itself.
    Init(String),
    /// Native engine reported a segmentation failure.
    Segmentation(String),
    /// Native engine reported a dictionary import or save failure.
    Import(String),
    /// Operation submitted after the segmenter or engine was shut down.
    Closed,
}

impl fmt::Display for IctclasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IctclasError::LibraryLoad(message) => write!(f, "failed to load library: {message}"),
            IctclasError::SymbolLoad(message) => write!(f, "failed to load symbol: {message}"),
            IctclasError::NulByte(error) => write!(f, "string contains NUL byte: {error}"),
            IctclasError::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            IctclasError::Init(message) => write!(f, "engine initialization failed: {message}"),
            IctclasError::Segmentation(message) => write!(f, "segmentation failed: {message}"),
            IctclasError::Import(message) => write!(f, "dictionary import failed: {message}"),
            IctclasError::Closed => write!(f, "segmenter is closed"),
        }
    }
}

impl std::error::Error for IctclasError {}

impl From<std::ffi::NulError> for IctclasError {
    fn from(value: std::ffi::NulError) -> Self {
        IctclasError::NulByte(value)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IctclasError>;
