//! # oshandle
//! Portable, owning handles for two OS resources whose native APIs differ
//! between POSIX-like systems and Windows:
//! * [`Library`]: a dynamically loaded code module (`dlopen` / `LoadLibraryW`),
//! * [`MemoryMap`]: a read-only memory-mapped view of a file
//!   (`mmap` / `CreateFileMappingW` + `MapViewOfFile`).
//!
//! Both handles are move-only, release their resource exactly once, and
//! never fail while being dropped. Explicit `close`/`clear` calls report
//! release failures instead.
//!
//! Every failure is an [`Error`] carrying a [`Diagnostic`]: the message, the
//! call site that raised it, and, with the `backtrace` feature, the call stack.
//!
//! ## Example
//! ```no_run
//! use oshandle::{Library, MemoryMap};
//!
//! let lib = Library::new("libplugin.so")?;
//! let entry = lib.load("plugin_entry")?;
//! let data = MemoryMap::new("plugin.dat")?;
//! println!("{entry:p}: {} bytes", data.bytes().len());
//! # Ok::<(), oshandle::Error>(())
//! ```
pub mod error;
pub mod library;
pub mod mmap;
pub mod os;

pub use error::{Diagnostic, Error};
pub use library::{Library, OpenFlags, Symbol};
pub use mmap::{MemoryMap, RawMapping};

pub type Result<T> = core::result::Result<T, Error>;
