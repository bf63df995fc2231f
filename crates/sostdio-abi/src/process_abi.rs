//! ABI layer for `so_popen` / `so_pclose`.

use std::ffi::{CStr, c_char, c_int, c_void};

use log::debug;
use sostdio_core::{close_process, open_process};

use crate::registry;
use crate::stdio_abi::{close_removed, report};
use crate::{SO_EOF, set_abi_errno};

/// Run `command` with `/bin/sh -c` (or the configured shell). `type` is `"r"` or `"w"`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_popen(command: *const c_char, r#type: *const c_char) -> *mut c_void {
    if command.is_null() || r#type.is_null() {
        unsafe { set_abi_errno(libc::EINVAL) };
        return std::ptr::null_mut();
    }
    // SAFETY: both pointers are non-null, NUL-terminated strings from the caller.
    let (command, direction) = unsafe { (CStr::from_ptr(command), CStr::from_ptr(r#type)) };
    let (Ok(command), Ok(direction)) = (command.to_str(), direction.to_str()) else {
        unsafe { set_abi_errno(libc::EINVAL) };
        return std::ptr::null_mut();
    };

    match open_process(command, direction) {
        Ok(stream) => registry::insert(stream),
        Err(err) => {
            debug!("so_popen {command:?}: {err}");
            unsafe { set_abi_errno(err.errno()) };
            std::ptr::null_mut()
        }
    }
}

/// Flush and close the stream, then wait for its child. Returns 0 unless the wait fails.
///
/// A stream without a child is closed as by `so_fclose`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn so_pclose(stream: *mut c_void) -> c_int {
    match registry::remove(stream) {
        Some(Ok(s)) if s.child_pid().is_some() => match close_process(s) {
            Ok(status) => {
                debug!("so_pclose {stream:p}: child {status}");
                0
            }
            Err(err) => {
                report(err);
                SO_EOF
            }
        },
        entry => close_removed(stream, entry),
    }
}
