//! Constants mirrored from ICTCLAS C API code-type and tag-map values.

/// Code type: GB2312/GBK simplified Chinese encoding.
pub const ICTCLAS_CODE_GBK: i32 = 0;
/// Code type: UTF-8 encoding.
pub const ICTCLAS_CODE_UTF8: i32 = 1;
/// Code type: BIG5 traditional Chinese encoding.
pub const ICTCLAS_CODE_BIG5: i32 = 2;
/// Code type: GBK with traditional-form characters.
pub const ICTCLAS_CODE_GBK_FANTI: i32 = 3;

/// Part-of-speech map: ICT first-level tagset.
pub const ICTCLAS_POS_MAP_ICT_FIRST: i32 = 1;
/// Part-of-speech map: ICT second-level tagset.
pub const ICTCLAS_POS_MAP_ICT_SECOND: i32 = 2;
/// Part-of-speech map: PKU second-level tagset.
pub const ICTCLAS_POS_MAP_PKU_SECOND: i32 = 3;
/// Part-of-speech map: PKU first-level tagset.
pub const ICTCLAS_POS_MAP_PKU_FIRST: i32 = 4;

/// Output buffer capacity per input byte for annotated segmentation.
///
/// The annotated output (delimiters and part-of-speech tags included) is
/// bounded by six times the input byte length; the native engine documents
/// no tighter bound. Exceeding it means the engine wrote past the buffer.
pub const ICTCLAS_RESULT_CAPACITY_FACTOR: usize = 6;

/// Largest input accepted by [`crate::Segmenter`] submissions, in bytes.
///
/// Keeps `input_len * ICTCLAS_RESULT_CAPACITY_FACTOR + 1` within `i32`,
/// the widest length the C interface can express.
pub const ICTCLAS_MAX_INPUT_BYTES: usize =
    (i32::MAX as usize - 1) / ICTCLAS_RESULT_CAPACITY_FACTOR;

/// Environment variable pointing at the ICTCLAS shared library file.
pub const ICTCLAS_LIBRARY_PATH_ENV: &str = "ICTCLAS_LIBRARY_PATH";
/// Environment variable pointing at the directory holding the engine's
/// `Data/` tree.
pub const ICTCLAS_DATA_PATH_ENV: &str = "ICTCLAS_DATA_PATH";

#[cfg(target_os = "linux")]
pub(crate) const ICTCLAS_LIBRARY_FILENAME: &str = "libICTCLAS50.so";
#[cfg(target_os = "macos")]
pub(crate) const ICTCLAS_LIBRARY_FILENAME: &str = "libICTCLAS50.dylib";
#[cfg(target_os = "windows")]
pub(crate) const ICTCLAS_LIBRARY_FILENAME: &str = "ICTCLAS50.dll";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub(crate) const ICTCLAS_LIBRARY_FILENAME: &str = "libICTCLAS50.so";
