//! ABI layer for the `so_*` file stream functions.
//!
//! Unknown or already closed handles set `EBADF`. Null pointers and invalid
//! arguments set `EINVAL`.

use std::ffi::{CStr, OsStr, c_char, c_int, c_long, c_void};
use std::os::unix::ffi::OsStrExt;

use log::debug;
use sostdio_core::{Stream, StreamError, Whence};

use crate::registry;
use crate::{SO_EOF, set_abi_errno};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run `f` against the stream behind `handle`, or return `fail` with `EBADF`.
pub(crate) fn with_stream<R>(
    handle: *mut c_void,
    fail: R,
    f: impl FnOnce(&mut Stream) -> R,
) -> R {
    match registry::lookup(handle) {
        Some(entry) => f(&mut entry.lock()),
        None => {
            unsafe { set_abi_errno(libc::EBADF) };
            fail
        }
    }
}

/// Publish a stream error's errno (a clean end of file leaves errno alone).
pub(crate) fn report(err: StreamError) {
    let errno = err.errno();
    if errno != 0 {
        unsafe { set_abi_errno(errno) };
    }
}

/// Close a stream that was just removed from the registry.
pub(crate) fn close_removed(
    handle: *mut c_void,
    entry: Option<Result<Stream, registry::Handle>>,
) -> c_int {
    match entry {
        None => {
            unsafe { set_abi_errno(libc::EBADF) };
            SO_EOF
        }
        Some(Err(_in_use)) => {
            // The last concurrent user drops the stream, which flushes and closes it.
            debug!("close {handle:p}: stream still in use by another call");
            unsafe { set_abi_errno(libc::EBUSY) };
            SO_EOF
        }
        Some(Ok(stream)) => match stream.close() {
            Ok(()) => 0,
            Err(err) => {
                report(err);
                SO_EOF
            }
        },
    }
}

unsafe fn c_str_arg<'a>(ptr: *const c_char) -> Option<&'a CStr> {
    if ptr.is_null() {
        unsafe { set_abi_errno(libc::EINVAL) };
        return None;
    }
    // SAFETY: non-null pointer to a NUL-terminated string supplied by the caller.
    Some(unsafe { CStr::from_ptr(ptr) })
}

// ---------------------------------------------------------------------------
// so_fopen / so_fclose / so_fileno
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fopen(pathname: *const c_char, mode: *const c_char) -> *mut c_void {
    let (Some(path), Some(mode)) = (unsafe { c_str_arg(pathname) }, unsafe { c_str_arg(mode) })
    else {
        return std::ptr::null_mut();
    };
    let Ok(mode) = mode.to_str() else {
        unsafe { set_abi_errno(libc::EINVAL) };
        return std::ptr::null_mut();
    };

    match Stream::open(OsStr::from_bytes(path.to_bytes()), mode) {
        Ok(stream) => registry::insert(stream),
        Err(err) => {
            unsafe { set_abi_errno(err.errno()) };
            std::ptr::null_mut()
        }
    }
}

/// Flush, close and release the stream. Process streams are also reaped.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fclose(stream: *mut c_void) -> c_int {
    close_removed(stream, registry::remove(stream))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fileno(stream: *mut c_void) -> c_int {
    with_stream(stream, -1, |s| s.fileno())
}

// ---------------------------------------------------------------------------
// Byte and block I/O
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fgetc(stream: *mut c_void) -> c_int {
    with_stream(stream, SO_EOF, |s| match s.read_byte() {
        Ok(byte) => c_int::from(byte),
        Err(err) => {
            report(err);
            SO_EOF
        }
    })
}

/// Write `c` converted to `unsigned char`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fputc(c: c_int, stream: *mut c_void) -> c_int {
    with_stream(stream, SO_EOF, |s| match s.write_byte(c as u8) {
        Ok(byte) => c_int::from(byte),
        Err(err) => {
            report(err);
            SO_EOF
        }
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fread(
    ptr: *mut c_void,
    size: usize,
    nmemb: usize,
    stream: *mut c_void,
) -> usize {
    if size == 0 || nmemb == 0 {
        return 0;
    }
    let Some(total) = size.checked_mul(nmemb).filter(|_| !ptr.is_null()) else {
        unsafe { set_abi_errno(libc::EINVAL) };
        return 0;
    };
    with_stream(stream, 0, |s| {
        // SAFETY: the caller provides `size * nmemb` writable bytes at `ptr`.
        let dst = unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>(), total) };
        s.read_block(dst, size, nmemb)
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fwrite(
    ptr: *const c_void,
    size: usize,
    nmemb: usize,
    stream: *mut c_void,
) -> usize {
    if size == 0 || nmemb == 0 {
        return 0;
    }
    let Some(total) = size.checked_mul(nmemb).filter(|_| !ptr.is_null()) else {
        unsafe { set_abi_errno(libc::EINVAL) };
        return 0;
    };
    with_stream(stream, 0, |s| {
        // SAFETY: the caller provides `size * nmemb` readable bytes at `ptr`.
        let src = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), total) };
        s.write_block(src, size, nmemb)
    })
}

// ---------------------------------------------------------------------------
// Positioning and status
// ---------------------------------------------------------------------------

/// `whence` is one of `SEEK_SET`, `SEEK_CUR`, `SEEK_END`. Returns 0 or -1.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fseek(stream: *mut c_void, offset: c_long, whence: c_int) -> c_int {
    let Some(whence) = Whence::from_raw(whence) else {
        unsafe { set_abi_errno(libc::EINVAL) };
        return -1;
    };
    with_stream(stream, -1, |s| match s.seek(i64::from(offset), whence) {
        Ok(_) => 0,
        Err(err) => {
            report(err);
            -1
        }
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_ftell(stream: *mut c_void) -> c_long {
    with_stream(stream, -1, |s| {
        c_long::try_from(s.position()).unwrap_or_else(|_| {
            unsafe { set_abi_errno(libc::EOVERFLOW) };
            -1
        })
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_fflush(stream: *mut c_void) -> c_int {
    with_stream(stream, SO_EOF, |s| match s.flush() {
        Ok(()) => 0,
        Err(err) => {
            report(err);
            SO_EOF
        }
    })
}

/// Nonzero once end of file (or a read failure) has been latched.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_feof(stream: *mut c_void) -> c_int {
    with_stream(stream, 0, |s| c_int::from(s.at_end()))
}

/// Nonzero once any operation has failed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_ferror(stream: *mut c_void) -> c_int {
    with_stream(stream, 0, |s| c_int::from(s.had_error()))
}
