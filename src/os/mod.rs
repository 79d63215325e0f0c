mod traits;

pub use traits::{DynLoader, Mmap};

cfg_if::cfg_if! {
    if #[cfg(windows)]{
        pub(crate) mod windows;
        pub use windows::*;
    }else if #[cfg(unix)]{
        pub(crate) mod unix;
        pub use unix::*;
    }else {
        compile_error!("oshandle only supports unix and windows targets");
    }
}
