use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::path::Path;
use std::ptr;

use crate::error::{IctclasError, Result};

#[cfg(unix)]
use std::ffi::CStr;

type FnIctclasInit = unsafe extern "C" fn(*const c_char) -> c_int;
type FnIctclasExit = unsafe extern "C" fn() -> c_int;
type FnIctclasSetPosMap = unsafe extern "C" fn(c_int) -> c_int;
type FnIctclasParagraphProcess =
    unsafe extern "C" fn(*const c_char, c_int, *mut c_char, c_int, c_int) -> c_int;
type FnIctclasImportUserDictFile = unsafe extern "C" fn(*const c_char, c_int) -> c_uint;
type FnIctclasSaveTheUsrDic = unsafe extern "C" fn() -> c_int;

/// Resolved ICTCLAS entry points. All six symbols are required; a library
/// missing any of them fails to load.
#[derive(Clone, Copy)]
pub(crate) struct IctclasApi {
    pub(crate) ictclas_init: FnIctclasInit,
    pub(crate) ictclas_exit: FnIctclasExit,
    pub(crate) ictclas_set_pos_map: FnIctclasSetPosMap,
    pub(crate) ictclas_paragraph_process: FnIctclasParagraphProcess,
    pub(crate) ictclas_import_user_dict_file: FnIctclasImportUserDictFile,
    pub(crate) ictclas_save_the_usr_dic: FnIctclasSaveTheUsrDic,
}

impl IctclasApi {
    pub(crate) unsafe fn load(library: &DynamicLibrary) -> Result<Self> {
        Ok(Self {
            ictclas_init: library.load_symbol("ICTCLAS_Init")?,
            ictclas_exit: library.load_symbol("ICTCLAS_Exit")?,
            ictclas_set_pos_map: library.load_symbol("ICTCLAS_SetPOSmap")?,
            ictclas_paragraph_process: library.load_symbol("ICTCLAS_ParagraphProcess")?,
            ictclas_import_user_dict_file: library.load_symbol("ICTCLAS_ImportUserDictFile")?,
            ictclas_save_the_usr_dic: library.load_symbol("ICTCLAS_SaveTheUsrDic")?,
        })
    }
}

pub(crate) struct LoadedLibrary {
    pub(crate) _library: DynamicLibrary,
    pub(crate) api: IctclasApi,
}

#[derive(Debug)]
pub(crate) struct DynamicLibrary {
    handle: *mut c_void,
}

impl DynamicLibrary {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_string = path.as_ref().to_string_lossy().to_string();
        let path_c = CString::new(path_string.clone())?;
        let handle = unsafe { platform_open(path_c.as_ptr()) };
        if handle.is_null() {
            return Err(IctclasError::LibraryLoad(format!(
                "{} ({})",
                path_string,
                platform_last_error()
            )));
        }
        Ok(Self { handle })
    }

    pub(crate) unsafe fn load_symbol<T: Copy>(&self, symbol_name: &str) -> Result<T> {
        let symbol_c = CString::new(symbol_name)?;
        let symbol_ptr = platform_symbol(self.handle, symbol_c.as_ptr());
        if symbol_ptr.is_null() {
            return Err(IctclasError::SymbolLoad(format!(
                "{} ({})",
                symbol_name,
                platform_last_error()
            )));
        }
        Ok(std::mem::transmute_copy::<*mut c_void, T>(&symbol_ptr))
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        if self.handle.is_null() {
            return;
        }
        unsafe {
            platform_close(self.handle);
        }
        self.handle = ptr::null_mut();
    }
}

// The handle is only ever used through the loaded function pointers, which
// the ICTCLAS interface allows from any thread as long as calls do not
// overlap; the engine serializes them.
unsafe impl Send for DynamicLibrary {}
unsafe impl Sync for DynamicLibrary {}

#[cfg(target_os = "windows")]
#[link(name = "kernel32")]
extern "system" {
    fn LoadLibraryA(lp_lib_file_name: *const c_char) -> *mut c_void;
    fn GetProcAddress(h_module: *mut c_void, lp_proc_name: *const c_char) -> *mut c_void;
    fn FreeLibrary(h_lib_module: *mut c_void) -> i32;
    fn GetLastError() -> u32;
}

#[cfg(target_os = "windows")]
unsafe fn platform_open(path: *const c_char) -> *mut c_void {
    LoadLibraryA(path)
}

#[cfg(target_os = "windows")]
unsafe fn platform_symbol(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    GetProcAddress(handle, symbol)
}

#[cfg(target_os = "windows")]
unsafe fn platform_close(handle: *mut c_void) {
    let _ = FreeLibrary(handle);
}

#[cfg(target_os = "windows")]
fn platform_last_error() -> String {
    format!("GetLastError={}", unsafe { GetLastError() })
}

#[cfg(target_os = "linux")]
#[link(name = "dl")]
extern "C" {
    fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void;
    fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
    fn dlclose(handle: *mut c_void) -> c_int;
    fn dlerror() -> *const c_char;
}

#[cfg(target_os = "macos")]
extern "C" {
    fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void;
    fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
    fn dlclose(handle: *mut c_void) -> c_int;
    fn dlerror() -> *const c_char;
}

#[cfg(unix)]
unsafe fn platform_open(path: *const c_char) -> *mut c_void {
    const RTLD_NOW: c_int = 2;
    const RTLD_LOCAL: c_int = 0;
    dlopen(path, RTLD_NOW | RTLD_LOCAL)
}

#[cfg(unix)]
unsafe fn platform_symbol(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    dlsym(handle, symbol)
}

#[cfg(unix)]
unsafe fn platform_close(handle: *mut c_void) {
    let _ = dlclose(handle);
}

#[cfg(unix)]
fn platform_last_error() -> String {
    let pointer = unsafe { dlerror() };
    if pointer.is_null() {
        "unknown error".to_string()
    } else {
        let full = unsafe { CStr::from_ptr(pointer) }
            .to_string_lossy()
            .to_string();
        full.split(": tried:").next().unwrap_or(&full).to_string()
    }
}
