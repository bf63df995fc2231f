//! Thin syscall veneer over `libc`.
//!
//! Every wrapper returns `Result<T, i32>` where the error is the raw errno
//! observed right after the call. Calls that may be interrupted by a signal
//! before transferring anything (`open`, `read`, `write`, `waitpid`) are
//! retried on `EINTR` here so callers never see it.
//!
//! # Safety
//!
//! The wrappers taking slices derive pointer/length pairs from the slice, so
//! they are safe to call. Descriptor validity is the caller's concern: a bad
//! descriptor is reported by the kernel as `EBADF`, never undefined behavior.

mod spawn;

use std::ffi::CStr;
use std::os::fd::RawFd;

pub use spawn::{ChildSetup, fork_exec};

/// errno of the most recent failed libc call on this thread.
#[inline]
#[must_use]
pub fn last_errno() -> i32 {
    std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::EIO)
}

/// `open(path, flags, mode)`.
pub fn sys_open(path: &CStr, flags: i32, mode: u32) -> Result<RawFd, i32> {
    loop {
        // SAFETY: `path` is a valid NUL-terminated string for the call's duration.
        let fd = unsafe { libc::open(path.as_ptr(), flags, mode as libc::c_uint) };
        if fd >= 0 {
            return Ok(fd);
        }
        match last_errno() {
            libc::EINTR => continue,
            errno => return Err(errno),
        }
    }
}

/// `read(fd, buf, buf.len())`.
pub fn sys_read(fd: RawFd, buf: &mut [u8]) -> Result<usize, i32> {
    loop {
        // SAFETY: pointer and length come from a live mutable slice.
        let rc = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if rc >= 0 {
            return Ok(rc as usize);
        }
        match last_errno() {
            libc::EINTR => continue,
            errno => return Err(errno),
        }
    }
}

/// `write(fd, buf, buf.len())`. May write fewer bytes than requested.
pub fn sys_write(fd: RawFd, buf: &[u8]) -> Result<usize, i32> {
    loop {
        // SAFETY: pointer and length come from a live slice.
        let rc = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        if rc >= 0 {
            return Ok(rc as usize);
        }
        match last_errno() {
            libc::EINTR => continue,
            errno => return Err(errno),
        }
    }
}

/// `lseek(fd, offset, whence)`, returning the new absolute offset.
pub fn sys_lseek(fd: RawFd, offset: i64, whence: i32) -> Result<u64, i32> {
    // SAFETY: lseek has no memory-safety preconditions.
    let rc = unsafe { libc::lseek(fd, offset as libc::off_t, whence) };
    if rc < 0 {
        Err(last_errno())
    } else {
        Ok(rc as u64)
    }
}

/// `close(fd)`. Never retried: the descriptor is released even on `EINTR`.
pub fn sys_close(fd: RawFd) -> Result<(), i32> {
    // SAFETY: close is safe on any descriptor value (a bad one yields EBADF).
    let rc = unsafe { libc::close(fd) };
    if rc == 0 { Ok(()) } else { Err(last_errno()) }
}

/// Create a pipe whose two ends are close-on-exec. Returns `(read_end, write_end)`.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub fn sys_pipe_cloexec() -> Result<(RawFd, RawFd), i32> {
    let mut fds = [-1 as RawFd; 2];
    // SAFETY: `fds` is a writable array of two descriptors.
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if rc == 0 {
        Ok((fds[0], fds[1]))
    } else {
        Err(last_errno())
    }
}

/// Create a pipe whose two ends are close-on-exec. Returns `(read_end, write_end)`.
#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
pub fn sys_pipe_cloexec() -> Result<(RawFd, RawFd), i32> {
    let mut fds = [-1 as RawFd; 2];
    // SAFETY: `fds` is a writable array of two descriptors.
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc != 0 {
        return Err(last_errno());
    }
    for fd in fds {
        // SAFETY: fcntl on a descriptor we just created.
        if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } != 0 {
            let errno = last_errno();
            let _ = sys_close(fds[0]);
            let _ = sys_close(fds[1]);
            return Err(errno);
        }
    }
    Ok((fds[0], fds[1]))
}

/// `waitpid(pid, &status, 0)`, returning the raw wait status.
pub fn sys_waitpid(pid: libc::pid_t) -> Result<i32, i32> {
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: `status` is a valid writable int.
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc == pid {
            return Ok(status);
        }
        if rc >= 0 {
            // Only reachable with WNOHANG, which is never passed.
            return Err(libc::ECHILD);
        }
        match last_errno() {
            libc::EINTR => continue,
            errno => return Err(errno),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_bad_descriptor_reports_ebadf() {
        assert_eq!(sys_close(-1), Err(libc::EBADF));
    }

    #[test]
    fn open_missing_file_reports_enoent() {
        let path = c"/nonexistent/sostdio/definitely-missing";
        assert_eq!(sys_open(path, libc::O_RDONLY, 0), Err(libc::ENOENT));
    }

    #[test]
    fn pipe_round_trip_and_lseek_rejected() {
        let (r, w) = sys_pipe_cloexec().unwrap();
        assert_eq!(sys_write(w, b"ping").unwrap(), 4);
        let mut buf = [0u8; 8];
        assert_eq!(sys_read(r, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");
        assert_eq!(sys_lseek(r, 0, libc::SEEK_SET), Err(libc::ESPIPE));
        sys_close(w).unwrap();
        assert_eq!(sys_read(r, &mut buf).unwrap(), 0);
        sys_close(r).unwrap();
    }

    #[test]
    fn waitpid_without_child_fails() {
        // PID 1 is never our child.
        assert_eq!(sys_waitpid(1), Err(libc::ECHILD));
    }
}
