use crate::{
    Result,
    error::{map_error, open_error, release_error, size_error, symbol_error},
    library::OpenFlags,
    mmap::RawMapping,
    os::{DynLoader, Mmap},
};
use core::{
    ffi::{CStr, c_void},
    ptr::{NonNull, null, null_mut},
};
use std::{ffi::OsStr, io, os::windows::ffi::OsStrExt, path::Path};
use windows_sys::Win32::{
    Foundation::{CloseHandle, FreeLibrary, GENERIC_READ, HANDLE, INVALID_HANDLE_VALUE},
    Storage::FileSystem::{
        CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, GetFileSizeEx, OPEN_EXISTING,
    },
    System::{
        LibraryLoader::{GetProcAddress, LoadLibraryW},
        Memory::{
            CreateFileMappingW, FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile,
            PAGE_READONLY, UnmapViewOfFile,
        },
    },
};

/// An implementation of [`DynLoader`] on top of `LoadLibraryW`.
pub struct DefaultDynLoader;

/// An implementation of [`Mmap`] on top of `CreateFileMappingW`/`MapViewOfFile`.
pub struct DefaultMmap;

/// A kernel object handle, closed when dropped.
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) };
    }
}

impl OwnedHandle {
    fn into_raw(self) -> HANDLE {
        let handle = self.0;
        core::mem::forget(self);
        handle
    }
}

fn to_wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(core::iter::once(0)).collect()
}

impl DynLoader for DefaultDynLoader {
    unsafe fn dlopen(path: &OsStr, _flags: OpenFlags) -> Result<NonNull<c_void>> {
        let display = path.to_string_lossy();
        if path.encode_wide().any(|c| c == 0) {
            return Err(open_error(
                "LoadLibraryW",
                format!("cannot load module {display}: path contains a NUL character"),
            ));
        }
        let wide_path = to_wide(path);
        let module = unsafe { LoadLibraryW(wide_path.as_ptr()) };
        match NonNull::new(module) {
            Some(module) => {
                #[cfg(feature = "log")]
                log::debug!("[LoadLibraryW] {display} at {:p}", module);
                Ok(module)
            }
            None => Err(open_error(
                "LoadLibraryW",
                format!(
                    "cannot load module {display}: {}",
                    io::Error::last_os_error()
                ),
            )),
        }
    }

    unsafe fn dlclose(handle: NonNull<c_void>) -> Result<()> {
        if unsafe { FreeLibrary(handle.as_ptr()) } == 0 {
            return Err(release_error(
                "FreeLibrary",
                format!(
                    "cannot unload module {:p}: {}",
                    handle,
                    io::Error::last_os_error()
                ),
            ));
        }
        #[cfg(feature = "log")]
        log::debug!("[FreeLibrary] {:p}", handle);
        Ok(())
    }

    unsafe fn dlsym(handle: NonNull<c_void>, name: &CStr) -> Result<NonNull<c_void>> {
        let proc = unsafe { GetProcAddress(handle.as_ptr(), name.as_ptr().cast()) };
        match proc {
            Some(proc) => Ok(unsafe { NonNull::new_unchecked(proc as *mut c_void) }),
            None => Err(symbol_error(
                "GetProcAddress",
                format!(
                    "cannot resolve symbol {}: {}",
                    name.to_string_lossy(),
                    io::Error::last_os_error()
                ),
            )),
        }
    }
}

impl Mmap for DefaultMmap {
    unsafe fn map_file(path: &Path) -> Result<RawMapping> {
        if path.as_os_str().encode_wide().any(|c| c == 0) {
            return Err(open_error(
                "CreateFileW",
                format!(
                    "cannot open file {}: path contains a NUL character",
                    path.display()
                ),
            ));
        }
        let wide_path = to_wide(path.as_os_str());
        let handle = unsafe {
            CreateFileW(
                wide_path.as_ptr(),
                GENERIC_READ,
                FILE_SHARE_READ,
                null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(open_error(
                "CreateFileW",
                format!(
                    "cannot open file {}: {}",
                    path.display(),
                    io::Error::last_os_error()
                ),
            ));
        }
        // Closed on every return path below, the mapping object keeps the file alive.
        let file = OwnedHandle(handle);

        let mut size = 0i64;
        if unsafe { GetFileSizeEx(file.0, &mut size) } == 0 {
            return Err(size_error(
                "GetFileSizeEx",
                format!("cannot query file size: {}", io::Error::last_os_error()),
            ));
        }
        let len = usize::try_from(size).map_err(|_| {
            size_error(
                "GetFileSizeEx",
                format!("file size {size} does not fit in memory"),
            )
        })?;
        if len == 0 {
            // CreateFileMappingW rejects empty files
            return Ok(RawMapping::empty());
        }

        let mapping = unsafe { CreateFileMappingW(file.0, null(), PAGE_READONLY, 0, 0, null()) };
        if mapping.is_null() {
            return Err(map_error(
                "CreateFileMappingW",
                format!(
                    "cannot create file mapping for {}: {}",
                    path.display(),
                    io::Error::last_os_error()
                ),
            ));
        }
        let mapping = OwnedHandle(mapping);

        let view = unsafe { MapViewOfFile(mapping.0, FILE_MAP_READ, 0, 0, 0) };
        let Some(addr) = NonNull::new(view.Value) else {
            return Err(map_error(
                "MapViewOfFile",
                format!(
                    "cannot create file map view of {}: {}",
                    path.display(),
                    io::Error::last_os_error()
                ),
            ));
        };
        #[cfg(feature = "log")]
        log::trace!(
            "[MapViewOfFile] address: {:p}, length: {}, path: {}",
            addr,
            len,
            path.display()
        );
        let object = NonNull::new(mapping.into_raw());
        Ok(unsafe { RawMapping::from_raw_parts(addr, len, object) })
    }

    unsafe fn unmap(mapping: RawMapping) -> Result<()> {
        let object = mapping.object().map(|object| OwnedHandle(object.as_ptr()));
        let Some(addr) = NonNull::new(mapping.addr()) else {
            return Ok(());
        };
        let view = MEMORY_MAPPED_VIEW_ADDRESS {
            Value: addr.as_ptr(),
        };
        if unsafe { UnmapViewOfFile(view) } == 0 {
            return Err(release_error(
                "UnmapViewOfFile",
                format!(
                    "cannot unmap view at {:p}: {}",
                    addr,
                    io::Error::last_os_error()
                ),
            ));
        }
        drop(object);
        #[cfg(feature = "log")]
        log::trace!("[UnmapViewOfFile] address: {:p}, length: {}", addr, mapping.len());
        Ok(())
    }
}
