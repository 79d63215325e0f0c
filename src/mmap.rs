//! Read-only memory-mapped file views.
//!
//! [`MemoryMap`] owns one mapping of a whole file and exposes it as a byte
//! slice. The platform work (opening the file, querying its length, creating
//! the mapping object where one is needed, and creating the view) is done by
//! an [`Mmap`] implementation chosen at compile time.
//!
//! # Safety
//! The view aliases the file on disk. It is read-only for the lifetime of the
//! handle, but if another process modifies the file while it is mapped, what
//! the view shows is up to the platform.

pub use crate::os::DefaultMmap;

use crate::{Result, os::Mmap};
use core::{
    ffi::c_void,
    fmt::Debug,
    marker::PhantomData,
    ptr::{NonNull, null, null_mut},
};
use std::path::Path;

/// The native pieces of one mapping: the view and, on platforms that need
/// it, the intermediate mapping object.
///
/// A mapping of an empty file has a null address, a length of zero and no
/// mapping object.
pub struct RawMapping {
    addr: *mut c_void,
    len: usize,
    object: Option<NonNull<c_void>>,
}

impl RawMapping {
    /// The mapping of an empty file.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            addr: null_mut(),
            len: 0,
            object: None,
        }
    }

    /// # Safety
    /// `addr` must be the start of a readable view of at least `len` bytes,
    /// and `object` the mapping object it was created from, if any. Both are
    /// owned by the returned value.
    #[inline]
    pub unsafe fn from_raw_parts(
        addr: NonNull<c_void>,
        len: usize,
        object: Option<NonNull<c_void>>,
    ) -> Self {
        Self {
            addr: addr.as_ptr(),
            len,
            object,
        }
    }

    #[inline]
    pub fn addr(&self) -> *mut c_void {
        self.addr
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The intermediate mapping object (a section handle on Windows).
    #[inline]
    pub fn object(&self) -> Option<NonNull<c_void>> {
        self.object
    }
}

impl Debug for RawMapping {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawMapping")
            .field("addr", &self.addr)
            .field("len", &self.len)
            .field("object", &self.object)
            .finish()
    }
}

/// A read-only view of a file's contents, owned by exactly one `MemoryMap`.
///
/// A `MemoryMap` is either *unmapped* or *mapped*. Mapping a path creates
/// the view immediately; dropping the handle or calling [`MemoryMap::clear`]
/// releases it. The slice returned by [`MemoryMap::bytes`] borrows the
/// handle, so the view cannot be released while it is in use.
///
/// # Examples
/// ```no_run
/// use oshandle::MemoryMap;
///
/// let map = MemoryMap::new("assets/level1.bin")?;
/// println!("{} bytes, first: {:?}", map.size(), map.bytes().first());
/// # Ok::<(), oshandle::Error>(())
/// ```
pub struct MemoryMap<M: Mmap = DefaultMmap> {
    mapping: Option<RawMapping>,
    _marker: PhantomData<M>,
}

// The view is never written through.
unsafe impl<M: Mmap> Send for MemoryMap<M> {}
unsafe impl<M: Mmap> Sync for MemoryMap<M> {}

impl<M: Mmap> Default for MemoryMap<M> {
    fn default() -> Self {
        Self {
            mapping: None,
            _marker: PhantomData,
        }
    }
}

impl<M: Mmap> Debug for MemoryMap<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryMap")
            .field("addr", &self.addr())
            .field("size", &self.size())
            .finish()
    }
}

impl MemoryMap {
    /// Maps the whole file at `path` read-only.
    ///
    /// This is the same as creating an unmapped handle and calling [`MemoryMap::map`].
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_mmap(path)
    }
}

impl<M: Mmap> MemoryMap<M> {
    /// Maps the file at `path` through the backend `M`.
    pub fn with_mmap(path: impl AsRef<Path>) -> Result<Self> {
        let mut map = Self::default();
        map.map(path)?;
        Ok(map)
    }

    /// Maps the whole file at `path`, releasing the current view first.
    ///
    /// On failure the handle is left unmapped.
    pub fn map(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.clear()?;
        let mapping = unsafe { M::map_file(path.as_ref()) }?;
        self.mapping = Some(mapping);
        Ok(())
    }

    /// Releases the view.
    ///
    /// Does nothing on an unmapped handle. Otherwise the handle is unmapped
    /// when this returns, even if the platform reports an error.
    pub fn clear(&mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        match self.mapping.take() {
            Some(mapping) => unsafe { M::unmap(mapping) },
            None => Ok(()),
        }
    }

    /// The base address of the view, null when unmapped.
    ///
    /// A mapped empty file may also report null; check [`MemoryMap::size`]
    /// before reading through the address.
    #[inline]
    pub fn addr(&self) -> *const c_void {
        self.mapping
            .as_ref()
            .map_or(null(), |mapping| mapping.addr().cast_const())
    }

    /// The length of the view in bytes, zero when unmapped.
    #[inline]
    pub fn size(&self) -> usize {
        self.mapping.as_ref().map_or(0, RawMapping::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether the handle owns a mapping. An empty file counts as mapped.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// The mapped bytes: exactly [`MemoryMap::size`] of them.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        match &self.mapping {
            Some(mapping) if !mapping.addr().is_null() && mapping.len() != 0 => unsafe {
                core::slice::from_raw_parts(mapping.addr().cast::<u8>(), mapping.len())
            },
            _ => &[],
        }
    }
}

impl<M: Mmap> AsRef<[u8]> for MemoryMap<M> {
    fn as_ref(&self) -> &[u8] {
        self.bytes()
    }
}

impl<M: Mmap> Drop for MemoryMap<M> {
    fn drop(&mut self) {
        if let Err(_err) = self.release() {
            #[cfg(feature = "log")]
            log::warn!("discarding failure while dropping a memory map: {_err}");
        }
    }
}
