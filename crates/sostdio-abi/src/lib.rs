// All extern "C" exports accept raw pointers from C callers and validate them
// at the boundary, so per-function safety docs would be boilerplate.
#![allow(clippy::missing_safety_doc)]
//! # sostdio-abi
//!
//! C-compatible `so_*` boundary over `sostdio-core`.
//!
//! ```text
//! C caller -> so_* entry (this crate) -> handle registry -> core Stream -> return
//! ```
//!
//! `SO_FILE*` values handed to C are opaque registry ids, never addresses.
//! Every entry point reports failure with the C sentinel (`NULL`, `SO_EOF`,
//! `-1` or `0`) and sets `errno` when the cause is known.

mod registry;

pub mod process_abi;
pub mod stdio_abi;

use std::ffi::c_int;

/// End-of-file / failure sentinel returned by the `int`-valued entry points.
pub const SO_EOF: c_int = -1;

#[inline]
pub(crate) unsafe fn set_abi_errno(val: c_int) {
    // SAFETY: __errno_location returns this thread's errno slot.
    let p = unsafe { libc::__errno_location() };
    unsafe { *p = val };
}
