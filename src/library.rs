//! Owning handle for a dynamically loaded code module.

pub use crate::os::DefaultDynLoader;

use crate::{
    Result,
    error::{not_open_error, symbol_error},
    os::DynLoader,
};
use bitflags::bitflags;
use core::{
    ffi::c_void,
    fmt::Debug,
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops,
    ptr::NonNull,
};
use std::ffi::{CString, OsStr};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Options for loading a module.
    ///
    /// They map to the `RTLD_*` modes of `dlopen` on unix and are ignored on
    /// Windows, where `LoadLibraryW` has no equivalent.
    pub struct OpenFlags: u32 {
        /// Resolve functions only when they are first called.
        const LAZY = 1;

        /// Resolve every undefined symbol before `open` returns. Takes precedence over `LAZY`.
        const NOW = 1 << 1;

        /// Make the module's symbols available to modules loaded later.
        const GLOBAL = 1 << 2;

        /// Keep the module's symbols to this handle. This is the default unless `GLOBAL` is set.
        const LOCAL = 1 << 3;
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        OpenFlags::LAZY
    }
}

/// A loaded code module, owned by exactly one `Library` at a time.
///
/// A `Library` is either *closed* or *open*. Opening a path loads the module
/// immediately; dropping the handle or calling [`Library::close`] unloads it.
/// Moving a `Library` moves the module; use [`core::mem::take`] to move out of
/// a handle you only borrow, which leaves it closed.
///
/// # Examples
/// ```no_run
/// use oshandle::Library;
///
/// let libm = Library::new("libm.so.6")?;
/// let cos = unsafe { *libm.get::<extern "C" fn(f64) -> f64>("cos")? };
/// assert_eq!(cos(0.0), 1.0);
/// # Ok::<(), oshandle::Error>(())
/// ```
pub struct Library<D: DynLoader = DefaultDynLoader> {
    handle: Option<NonNull<c_void>>,
    _marker: PhantomData<D>,
}

// The native module reference is process-wide and symbol lookup is thread-safe
// on every supported platform.
unsafe impl<D: DynLoader> Send for Library<D> {}
unsafe impl<D: DynLoader> Sync for Library<D> {}

impl<D: DynLoader> Default for Library<D> {
    fn default() -> Self {
        Self {
            handle: None,
            _marker: PhantomData,
        }
    }
}

impl<D: DynLoader> Debug for Library<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Library")
            .field("handle", &self.handle)
            .finish()
    }
}

impl Library {
    /// Loads the module at `path` with [`OpenFlags::LAZY`].
    ///
    /// This is the same as creating a closed handle and calling [`Library::open`].
    pub fn new(path: impl AsRef<OsStr>) -> Result<Self> {
        Self::new_with(path, OpenFlags::default())
    }

    /// Loads the module at `path` with the given flags.
    pub fn new_with(path: impl AsRef<OsStr>, flags: OpenFlags) -> Result<Self> {
        Self::with_loader(path, flags)
    }
}

impl<D: DynLoader> Library<D> {
    /// Loads the module at `path` through the loader `D`.
    pub fn with_loader(path: impl AsRef<OsStr>, flags: OpenFlags) -> Result<Self> {
        let mut lib = Self::default();
        lib.open_with(path, flags)?;
        Ok(lib)
    }

    /// Loads the module at `path`, closing the current one first.
    ///
    /// If closing the current module fails, that error is returned and
    /// nothing is loaded; the handle is closed either way.
    pub fn open(&mut self, path: impl AsRef<OsStr>) -> Result<()> {
        self.open_with(path, OpenFlags::default())
    }

    /// [`Library::open`] with explicit flags.
    pub fn open_with(&mut self, path: impl AsRef<OsStr>, flags: OpenFlags) -> Result<()> {
        self.close()?;
        let handle = unsafe { D::dlopen(path.as_ref(), flags) }?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Unloads the module.
    ///
    /// Does nothing on a closed handle. Otherwise the handle is closed when
    /// this returns, even if the platform reports an error.
    pub fn close(&mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => unsafe { D::dlclose(handle) },
            None => Ok(()),
        }
    }

    /// Resolves `name` to its address in the open module.
    ///
    /// The name is used as-is; no mangling or decoration is applied.
    pub fn load(&self, name: &str) -> Result<NonNull<c_void>> {
        let Some(handle) = self.handle else {
            return Err(not_open_error(
                "Library::load",
                format!("cannot resolve symbol {name}, handle not open"),
            ));
        };
        let cname = CString::new(name).map_err(|_| {
            symbol_error(
                "Library::load",
                format!("cannot resolve symbol {name:?}: name contains a NUL byte"),
            )
        })?;
        unsafe { D::dlsym(handle, &cname) }
    }

    /// Gets a function pointer or a pointer to a static variable by symbol name.
    ///
    /// # Safety
    /// Users of this API must specify the correct type of the function or
    /// variable loaded. `T` must be pointer sized.
    ///
    /// # Examples
    /// ```no_run
    /// # let lib = oshandle::Library::new("libawesome.so").unwrap();
    /// unsafe {
    ///     let awesome_function: oshandle::Symbol<unsafe extern "C" fn(f64) -> f64> =
    ///         lib.get("awesome_function").unwrap();
    ///     awesome_function(0.42);
    /// }
    /// ```
    pub unsafe fn get<'lib, T>(&'lib self, name: &str) -> Result<Symbol<'lib, T>> {
        debug_assert_eq!(mem::size_of::<T>(), mem::size_of::<*mut c_void>());
        self.load(name).map(|ptr| Symbol {
            ptr,
            pd: PhantomData,
        })
    }

    /// Whether the handle owns a loaded module.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Gives up ownership of the module without unloading it.
    pub fn into_raw(self) -> Option<NonNull<c_void>> {
        let this = ManuallyDrop::new(self);
        this.handle
    }

    /// Takes ownership of a native module reference.
    ///
    /// # Safety
    /// `handle` must have been returned by `D::dlopen` (or [`Library::into_raw`])
    /// and must not be owned by anything else.
    pub unsafe fn from_raw(handle: NonNull<c_void>) -> Self {
        Self {
            handle: Some(handle),
            _marker: PhantomData,
        }
    }
}

impl<D: DynLoader> Drop for Library<D> {
    fn drop(&mut self) {
        if let Err(_err) = self.release() {
            #[cfg(feature = "log")]
            log::warn!("discarding failure while dropping a library: {_err}");
        }
    }
}

/// A symbol resolved from a [`Library`], valid as long as the library is borrowed.
#[derive(Debug, Clone)]
pub struct Symbol<'lib, T: 'lib> {
    ptr: NonNull<c_void>,
    pd: PhantomData<&'lib T>,
}

impl<'lib, T> ops::Deref for Symbol<'lib, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*(&self.ptr as *const NonNull<c_void> as *const T) }
    }
}

impl<'lib, T> Symbol<'lib, T> {
    pub fn into_raw(self) -> NonNull<c_void> {
        self.ptr
    }
}
