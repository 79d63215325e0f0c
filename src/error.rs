use std::{
    borrow::Cow,
    fmt::{Debug, Display},
    panic::Location,
};

/// An immutable description of a failure.
///
/// A `Diagnostic` is built exactly once, at the point where a native call
/// reports an error, and is never modified afterwards. It records:
/// * a human-readable message (possibly empty),
/// * the source location of the code that raised it,
/// * the name of the operation that was in progress,
/// * a backtrace of the active call sequence, when the `backtrace` feature is enabled.
///
/// Without the `backtrace` feature the record only carries call-site information.
pub struct Diagnostic {
    message: Cow<'static, str>,
    location: &'static Location<'static>,
    operation: &'static str,
    #[cfg(feature = "backtrace")]
    backtrace: backtrace::Backtrace,
}

impl Diagnostic {
    /// Creates a diagnostic for `operation`, located at the caller.
    #[track_caller]
    pub fn new(operation: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
            operation,
            #[cfg(feature = "backtrace")]
            backtrace: backtrace::Backtrace::new_unresolved(),
        }
    }

    /// Creates a diagnostic without a message, for failures whose call site
    /// alone says enough.
    #[track_caller]
    pub fn here(operation: &'static str) -> Self {
        Self::new(operation, "")
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The location of the code that raised the failure.
    #[inline]
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    #[inline]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Formats the whole record: file, line, column, operation, message and,
    /// if one was captured, the backtrace on the following lines.
    pub fn describe(&self) -> String {
        #[cfg(feature = "backtrace")]
        {
            let mut trace = self.backtrace.clone();
            trace.resolve();
            format!("{self}\n{trace:?}")
        }
        #[cfg(not(feature = "backtrace"))]
        {
            format!("{self}")
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{} ({}): {}",
            self.location.file(),
            self.location.line(),
            self.location.column(),
            self.operation,
            self.message
        )
    }
}

impl Debug for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostic")
            .field("message", &self.message)
            .field("location", &self.location)
            .field("operation", &self.operation)
            .finish()
    }
}

/// Error types used throughout the `oshandle` library.
///
/// Every variant carries the [`Diagnostic`] raised at the failure site.
#[derive(Debug)]
pub enum Error {
    /// A module failed to load, or a file failed to open for mapping.
    Open { diag: Box<Diagnostic> },

    /// The length of a file could not be determined.
    SizeQuery { diag: Box<Diagnostic> },

    /// The virtual-memory view, or the intermediate mapping object some
    /// platforms need before it, could not be created.
    Map { diag: Box<Diagnostic> },

    /// Unloading a module or unmapping a view reported a failure.
    ///
    /// Only returned by explicit `close`/`clear` calls, never from a destructor.
    Release { diag: Box<Diagnostic> },

    /// A named entry point was not found in an open module.
    Symbol { diag: Box<Diagnostic> },

    /// The operation needs an open handle, but the handle is closed.
    NotOpen { diag: Box<Diagnostic> },
}

impl Error {
    /// Returns the diagnostic record of this failure.
    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            Error::Open { diag }
            | Error::SizeQuery { diag }
            | Error::Map { diag }
            | Error::Release { diag }
            | Error::Symbol { diag }
            | Error::NotOpen { diag } => &**diag,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Open { diag } => write!(f, "Open error: {diag}"),
            Error::SizeQuery { diag } => write!(f, "Size query error: {diag}"),
            Error::Map { diag } => write!(f, "Memory mapping error: {diag}"),
            Error::Release { diag } => write!(f, "Release error: {diag}"),
            Error::Symbol { diag } => write!(f, "Symbol resolution error: {diag}"),
            Error::NotOpen { diag } => write!(f, "Handle not open: {diag}"),
        }
    }
}

impl std::error::Error for Error {}

/// Creates an `Error::Open` raised by `operation`.
#[cold]
#[inline(never)]
#[track_caller]
pub fn open_error(operation: &'static str, msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Open {
        diag: Box::new(Diagnostic::new(operation, msg)),
    }
}

/// Creates an `Error::SizeQuery` raised by `operation`.
#[cold]
#[inline(never)]
#[track_caller]
pub fn size_error(operation: &'static str, msg: impl Into<Cow<'static, str>>) -> Error {
    Error::SizeQuery {
        diag: Box::new(Diagnostic::new(operation, msg)),
    }
}

/// Creates an `Error::Map` raised by `operation`.
#[cold]
#[inline(never)]
#[track_caller]
pub fn map_error(operation: &'static str, msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Map {
        diag: Box::new(Diagnostic::new(operation, msg)),
    }
}

/// Creates an `Error::Release` raised by `operation`.
#[cold]
#[inline(never)]
#[track_caller]
pub fn release_error(operation: &'static str, msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Release {
        diag: Box::new(Diagnostic::new(operation, msg)),
    }
}

/// Creates an `Error::Symbol` raised by `operation`.
#[cold]
#[inline(never)]
#[track_caller]
pub fn symbol_error(operation: &'static str, msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Symbol {
        diag: Box::new(Diagnostic::new(operation, msg)),
    }
}

/// Creates an `Error::NotOpen` raised by `operation`.
#[cold]
#[inline(never)]
#[track_caller]
pub fn not_open_error(operation: &'static str, msg: impl Into<Cow<'static, str>>) -> Error {
    Error::NotOpen {
        diag: Box::new(Diagnostic::new(operation, msg)),
    }
}
