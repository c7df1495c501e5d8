use std::env;
use std::path::PathBuf;

use crate::constants::{ICTCLAS_DATA_PATH_ENV, ICTCLAS_LIBRARY_FILENAME};

pub(crate) fn default_library_candidates() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["ICTCLAS50.dll", "libICTCLAS50.dll"]
    }
    #[cfg(target_os = "macos")]
    {
        &[
            "libICTCLAS50.dylib",
            "./libICTCLAS50.dylib",
            "/usr/local/lib/libICTCLAS50.dylib",
            "/opt/homebrew/lib/libICTCLAS50.dylib",
        ]
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        &[
            "libICTCLAS50.so",
            "./libICTCLAS50.so",
            "/usr/local/lib/libICTCLAS50.so",
            "/usr/lib/libICTCLAS50.so",
            "/opt/ictclas/lib/libICTCLAS50.so",
        ]
    }
}

pub(crate) fn discover_default_library_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        if let Some(local_app_data) = env::var_os("LOCALAPPDATA") {
            let path = PathBuf::from(local_app_data)
                .join("ictclas")
                .join("lib")
                .join(ICTCLAS_LIBRARY_FILENAME);
            if path.exists() {
                return Some(path);
            }
        }
        if let Some(user_profile) = env::var_os("USERPROFILE") {
            let path = PathBuf::from(user_profile)
                .join("AppData")
                .join("Local")
                .join("ictclas")
                .join("lib")
                .join(ICTCLAS_LIBRARY_FILENAME);
            if path.exists() {
                return Some(path);
            }
        }
        let well_known = [
            PathBuf::from("C:\\ictclas\\lib\\ICTCLAS50.dll"),
            PathBuf::from("C:\\Program Files\\ICTCLAS\\lib\\ICTCLAS50.dll"),
        ];
        for path in well_known {
            if path.exists() {
                return Some(path);
            }
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Some(home) = env::var_os("HOME") {
            let path = PathBuf::from(home)
                .join(".local")
                .join("ictclas")
                .join("lib")
                .join(ICTCLAS_LIBRARY_FILENAME);
            if path.exists() {
                return Some(path);
            }
        }

        #[cfg(target_os = "macos")]
        let well_known = [
            PathBuf::from("/usr/local/lib/libICTCLAS50.dylib"),
            PathBuf::from("/opt/homebrew/lib/libICTCLAS50.dylib"),
        ];
        #[cfg(not(target_os = "macos"))]
        let well_known = [
            PathBuf::from("/usr/local/lib/libICTCLAS50.so"),
            PathBuf::from("/usr/lib/libICTCLAS50.so"),
            PathBuf::from("/opt/ictclas/lib/libICTCLAS50.so"),
        ];
        for path in well_known {
            if path.exists() {
                return Some(path);
            }
        }
    }

    None
}

/// Finds a directory whose `Data/` subtree holds the engine's dictionaries.
/// `ICTCLAS_Init` receives the parent directory, never `Data/` itself.
pub(crate) fn discover_default_data_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(ICTCLAS_DATA_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local_app_data) = env::var_os("LOCALAPPDATA") {
            let path = PathBuf::from(local_app_data).join("ictclas");
            if path.join("Data").is_dir() {
                return Some(path);
            }
        }
        if let Some(user_profile) = env::var_os("USERPROFILE") {
            let path = PathBuf::from(user_profile)
                .join("AppData")
                .join("Local")
                .join("ictclas");
            if path.join("Data").is_dir() {
                return Some(path);
            }
        }
    }

    #[cfg(target_os = "windows")]
    let candidates: &[&str] = &["C:\\ictclas", "C:\\Program Files\\ICTCLAS"];

    #[cfg(target_os = "macos")]
    let candidates: &[&str] = &[
        "~/.local/ictclas",
        "/usr/local/share/ictclas",
        "/opt/homebrew/share/ictclas",
        "/opt/ictclas",
    ];

    #[cfg(all(unix, not(target_os = "macos")))]
    let candidates: &[&str] = &[
        "~/.local/ictclas",
        "/usr/local/share/ictclas",
        "/usr/share/ictclas",
        "/opt/ictclas",
    ];

    for candidate in candidates {
        let path = if let Some(stripped) = candidate.strip_prefix("~/") {
            match env::var_os("HOME") {
                Some(home) => PathBuf::from(home).join(stripped),
                None => continue,
            }
        } else {
            PathBuf::from(candidate)
        };
        if path.join("Data").is_dir() {
            return Some(path);
        }
    }

    None
}
