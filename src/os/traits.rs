use core::{
    ffi::{CStr, c_void},
    ptr::NonNull,
};
use std::{ffi::OsStr, path::Path};

use crate::{Result, library::OpenFlags, mmap::RawMapping};

/// A trait for the native dynamic-module loader.
///
/// [`Library`](crate::Library) is generic over this trait, so each platform
/// provides one implementation and the choice is made at compile time.
/// Custom implementations can be plugged in the same way, which is how
/// the release path is fault-injected in tests.
///
/// # Example
/// ```rust,ignore
/// struct MyLoader;
///
/// impl DynLoader for MyLoader {
///     unsafe fn dlopen(path: &OsStr, flags: OpenFlags) -> Result<NonNull<c_void>> {
///         // Platform-specific implementation
///         todo!()
///     }
///
///     // Implement other required methods...
/// }
/// ```
pub trait DynLoader {
    /// Loads the module at `path` and returns its native reference.
    ///
    /// Failures are reported as [`Error::Open`](crate::Error::Open) and must
    /// name `path` in the message.
    ///
    /// # Safety
    /// Loading a module runs its initialisers, which may do anything.
    unsafe fn dlopen(path: &OsStr, flags: OpenFlags) -> Result<NonNull<c_void>>;

    /// Unloads a module previously returned by [`DynLoader::dlopen`].
    ///
    /// The reference must be treated as released even when an error is
    /// returned; it is never passed to this function twice.
    ///
    /// # Safety
    /// No address resolved from `handle` may be used afterwards.
    unsafe fn dlclose(handle: NonNull<c_void>) -> Result<()>;

    /// Resolves `name` inside the module.
    ///
    /// A missing symbol is reported as [`Error::Symbol`](crate::Error::Symbol).
    ///
    /// # Safety
    /// `handle` must come from [`DynLoader::dlopen`] and still be loaded.
    unsafe fn dlsym(handle: NonNull<c_void>, name: &CStr) -> Result<NonNull<c_void>>;
}

/// A trait for read-only file mapping.
///
/// [`MemoryMap`](crate::MemoryMap) is generic over this trait, the same way
/// [`Library`](crate::Library) is generic over [`DynLoader`].
pub trait Mmap {
    /// Maps the whole file at `path` read-only.
    ///
    /// Every step reports its own error kind: opening the file
    /// ([`Error::Open`](crate::Error::Open)), querying its length
    /// ([`Error::SizeQuery`](crate::Error::SizeQuery)), creating the mapping
    /// object and the view ([`Error::Map`](crate::Error::Map)). The file
    /// itself must be closed before returning, on success and on failure.
    ///
    /// An empty file yields a [`RawMapping`] of length zero with a null address.
    ///
    /// # Safety
    /// The returned view aliases the file. If the file is changed on disk
    /// while mapped, what the view shows is up to the platform.
    unsafe fn map_file(path: &Path) -> Result<RawMapping>;

    /// Releases a mapping previously returned by [`Mmap::map_file`].
    ///
    /// # Safety
    /// No reference into the view may be alive.
    unsafe fn unmap(mapping: RawMapping) -> Result<()>;
}
