use crate::{
    Result,
    error::{map_error, open_error, release_error, size_error, symbol_error},
    library::OpenFlags,
    mmap::RawMapping,
    os::{DynLoader, Mmap},
};
use core::{
    ffi::{CStr, c_int, c_void},
    ptr::{NonNull, null_mut},
};
use libc::{MAP_SHARED, O_CLOEXEC, O_RDONLY, PROT_READ};
use std::{
    borrow::Cow,
    ffi::{CString, OsStr},
    io,
    os::unix::ffi::OsStrExt,
    path::Path,
};

/// An implementation of [`DynLoader`] on top of `dlopen(3)`.
pub struct DefaultDynLoader;

/// An implementation of [`Mmap`] on top of `mmap(2)`.
pub struct DefaultMmap;

/// An open file descriptor, closed when dropped.
struct RawFile {
    fd: c_int,
}

impl Drop for RawFile {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

impl RawFile {
    fn open_read_only(path: &Path) -> Result<Self> {
        let name = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            open_error(
                "open",
                format!("cannot open file {}: path contains a NUL byte", path.display()),
            )
        })?;
        let fd = unsafe { libc::open(name.as_ptr(), O_RDONLY | O_CLOEXEC) };
        if fd == -1 {
            return Err(open_error(
                "open",
                format!(
                    "cannot open file {}: {}",
                    path.display(),
                    io::Error::last_os_error()
                ),
            ));
        }
        Ok(Self { fd })
    }

    /// Returns the length of the file, rejecting anything but a regular file.
    fn len(&self, path: &Path) -> Result<usize> {
        let mut stat: libc::stat = unsafe { core::mem::zeroed() };
        if unsafe { libc::fstat(self.fd, &mut stat) } == -1 {
            return Err(size_error(
                "fstat",
                format!(
                    "cannot query size of {}: {}",
                    path.display(),
                    io::Error::last_os_error()
                ),
            ));
        }
        if stat.st_mode & libc::S_IFMT != libc::S_IFREG {
            return Err(open_error(
                "open",
                format!("cannot open file {}: not a regular file", path.display()),
            ));
        }
        let size = stat.st_size;
        usize::try_from(size)
            .map_err(|_| size_error("fstat", format!("file size {size} does not fit in memory")))
    }
}

fn flags_to_rtld(flags: OpenFlags) -> c_int {
    let mut mode = 0;
    if flags.contains(OpenFlags::NOW) {
        mode |= libc::RTLD_NOW;
    } else {
        mode |= libc::RTLD_LAZY;
    }
    if flags.contains(OpenFlags::GLOBAL) {
        mode |= libc::RTLD_GLOBAL;
    } else {
        mode |= libc::RTLD_LOCAL;
    }
    mode
}

/// Takes the pending `dlerror()` message, if any.
fn dl_error() -> Option<Cow<'static, str>> {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        return None;
    }
    Some(Cow::Owned(
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned(),
    ))
}

impl DynLoader for DefaultDynLoader {
    unsafe fn dlopen(path: &OsStr, flags: OpenFlags) -> Result<NonNull<c_void>> {
        let display = path.to_string_lossy();
        let name = CString::new(path.as_bytes()).map_err(|_| {
            open_error(
                "dlopen",
                format!("cannot load module {display}: path contains a NUL byte"),
            )
        })?;
        let handle = unsafe { libc::dlopen(name.as_ptr(), flags_to_rtld(flags)) };
        match NonNull::new(handle) {
            Some(handle) => {
                #[cfg(feature = "log")]
                log::debug!("[dlopen] {display} at {:p}, flags: {:?}", handle, flags);
                Ok(handle)
            }
            None => {
                let detail = dl_error().unwrap_or(Cow::Borrowed("unknown dlopen error"));
                Err(open_error(
                    "dlopen",
                    format!("cannot load module {display}: {detail}"),
                ))
            }
        }
    }

    unsafe fn dlclose(handle: NonNull<c_void>) -> Result<()> {
        if unsafe { libc::dlclose(handle.as_ptr()) } != 0 {
            let detail = dl_error().unwrap_or(Cow::Borrowed("unknown dlclose error"));
            return Err(release_error(
                "dlclose",
                format!("cannot unload module {:p}: {detail}", handle),
            ));
        }
        #[cfg(feature = "log")]
        log::debug!("[dlclose] {:p}", handle);
        Ok(())
    }

    unsafe fn dlsym(handle: NonNull<c_void>, name: &CStr) -> Result<NonNull<c_void>> {
        // A null result is only an error if dlerror() says so, clear any stale message first.
        let _ = dl_error();
        let ptr = unsafe { libc::dlsym(handle.as_ptr(), name.as_ptr()) };
        match NonNull::new(ptr) {
            Some(ptr) => Ok(ptr),
            None => {
                let detail =
                    dl_error().unwrap_or(Cow::Borrowed("symbol resolves to a null address"));
                Err(symbol_error(
                    "dlsym",
                    format!(
                        "cannot resolve symbol {}: {detail}",
                        name.to_string_lossy()
                    ),
                ))
            }
        }
    }
}

impl Mmap for DefaultMmap {
    unsafe fn map_file(path: &Path) -> Result<RawMapping> {
        let file = RawFile::open_read_only(path)?;
        let len = file.len(path)?;
        if len == 0 {
            // mmap rejects zero-length mappings
            return Ok(RawMapping::empty());
        }
        let ptr = unsafe { libc::mmap(null_mut(), len, PROT_READ, MAP_SHARED, file.fd, 0) };
        if core::ptr::eq(ptr, libc::MAP_FAILED) {
            return Err(map_error(
                "mmap",
                format!(
                    "cannot map {} bytes of {}: {}",
                    len,
                    path.display(),
                    io::Error::last_os_error()
                ),
            ));
        }
        #[cfg(feature = "log")]
        log::trace!(
            "[Mmap] address: {:p}, length: {}, path: {}",
            ptr,
            len,
            path.display()
        );
        // `file` is closed here, the mapping keeps its own reference to the file.
        Ok(unsafe { RawMapping::from_raw_parts(NonNull::new_unchecked(ptr), len, None) })
    }

    unsafe fn unmap(mapping: RawMapping) -> Result<()> {
        let Some(addr) = NonNull::new(mapping.addr()) else {
            return Ok(());
        };
        if unsafe { libc::munmap(addr.as_ptr(), mapping.len()) } != 0 {
            return Err(release_error(
                "munmap",
                format!(
                    "cannot unmap {} bytes at {:p}: {}",
                    mapping.len(),
                    addr,
                    io::Error::last_os_error()
                ),
            ));
        }
        #[cfg(feature = "log")]
        log::trace!("[Munmap] address: {:p}, length: {}", addr, mapping.len());
        Ok(())
    }
}
