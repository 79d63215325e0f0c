#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A module every test machine has, and a function it exports.
#[cfg(target_os = "linux")]
pub const SYSTEM_LIB: &str = "libc.so.6";
#[cfg(target_os = "linux")]
pub const EXPORTED_SYMBOL: &str = "strlen";

#[cfg(target_os = "macos")]
pub const SYSTEM_LIB: &str = "/usr/lib/libSystem.B.dylib";
#[cfg(target_os = "macos")]
pub const EXPORTED_SYMBOL: &str = "strlen";

#[cfg(windows)]
pub const SYSTEM_LIB: &str = "kernel32.dll";
#[cfg(windows)]
pub const EXPORTED_SYMBOL: &str = "GetCurrentProcessId";

pub const MISSING_SYMBOL: &str = "oshandle_this_symbol_is_definitely_not_exported";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A path under the temp dir that no other test uses.
pub fn fresh_path(tag: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir()
        .join(format!("oshandle-{}", std::process::id()))
        .join(format!("{n}-{tag}"))
}

pub fn write_file(bytes: &[u8], path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

/// Writes `bytes` to a fresh path and returns it.
pub fn fixture(tag: &str, bytes: &[u8]) -> PathBuf {
    let path = fresh_path(tag);
    write_file(bytes, &path);
    path
}
