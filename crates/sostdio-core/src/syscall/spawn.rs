//! fork + exec with a fixed list of descriptor actions.
//!
//! Everything the child needs (argv pointer array, descriptor numbers) is
//! prepared before `fork`, so the child only performs async-signal-safe
//! calls: `close`, `dup2`, `fcntl`, `execv`, `write` and `_exit`. That keeps
//! forking safe from a multi-threaded parent.

use std::ffi::{CStr, CString, c_char};
use std::os::fd::RawFd;

use super::last_errno;

/// Exit status used by a child whose setup or exec failed.
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// Descriptor plan and program image for a forked child.
#[derive(Debug)]
pub struct ChildSetup<'a> {
    /// Absolute path of the program to execute.
    pub program: &'a CStr,
    /// Full argument vector, including `argv[0]`.
    pub args: &'a [CString],
    /// Descriptors the child closes before anything else.
    pub close: &'a [RawFd],
    /// `(from, onto)`: `from` becomes the child's descriptor `onto`.
    pub redirect: (RawFd, RawFd),
    /// Close-on-exec descriptor receiving the child's errno if setup or exec fails.
    pub report: RawFd,
}

/// Fork and run `setup` in the child. Returns the child pid to the parent.
///
/// Exec failure is not reported here: the child writes its errno to
/// `setup.report` and exits with [`EXEC_FAILURE_STATUS`]. Because `report`
/// is close-on-exec, the parent observes end of file on the other end of
/// that pipe exactly when exec succeeded.
pub fn fork_exec(setup: &ChildSetup<'_>) -> Result<libc::pid_t, i32> {
    let mut argv: Vec<*const c_char> = setup.args.iter().map(|arg| arg.as_ptr()).collect();
    argv.push(std::ptr::null());

    // SAFETY: the child branch below performs only async-signal-safe calls
    // on memory allocated before the fork.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(last_errno());
    }
    if pid == 0 {
        // SAFETY: we are the freshly forked child; `argv` and `setup` are valid copies.
        unsafe { run_child(setup, &argv) }
    }
    Ok(pid)
}

/// Child-side half of [`fork_exec`]. Never returns.
unsafe fn run_child(setup: &ChildSetup<'_>, argv: &[*const c_char]) -> ! {
    for &fd in setup.close {
        // SAFETY: closing an inherited descriptor copy.
        unsafe { libc::close(fd) };
    }

    let (from, onto) = setup.redirect;
    if from == onto {
        // dup2 onto itself is a no-op that would leave FD_CLOEXEC set.
        // SAFETY: fcntl on an inherited descriptor.
        if unsafe { libc::fcntl(from, libc::F_SETFD, 0) } != 0 {
            unsafe { report_and_exit(setup.report) };
        }
    } else {
        // SAFETY: both are plain descriptor numbers; dup2 clears FD_CLOEXEC on `onto`.
        if unsafe { libc::dup2(from, onto) } < 0 {
            unsafe { report_and_exit(setup.report) };
        }
        // SAFETY: the original end is no longer needed once duplicated.
        unsafe { libc::close(from) };
    }

    // SAFETY: `program` is NUL-terminated and `argv` is a NULL-terminated array
    // of pointers into `setup.args`, all allocated before fork.
    unsafe { libc::execv(setup.program.as_ptr(), argv.as_ptr()) };
    unsafe { report_and_exit(setup.report) }
}

unsafe fn report_and_exit(report: RawFd) -> ! {
    let errno = last_errno().to_ne_bytes();
    // SAFETY: writing a four-byte stack buffer; a short or failed write only
    // degrades the parent's diagnosis to "exec succeeded".
    unsafe {
        libc::write(report, errno.as_ptr().cast(), errno.len());
        libc::_exit(EXEC_FAILURE_STATUS)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{sys_close, sys_pipe_cloexec, sys_read, sys_waitpid};
    use super::*;

    fn read_report(fd: RawFd) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8];
        loop {
            let n = sys_read(fd, &mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn exec_failure_is_reported_through_control_pipe() {
        let (data_r, data_w) = sys_pipe_cloexec().unwrap();
        let (ctl_r, ctl_w) = sys_pipe_cloexec().unwrap();
        let args = [c"missing".to_owned()];
        let setup = ChildSetup {
            program: c"/nonexistent/sostdio-shell",
            args: &args,
            close: &[data_r, ctl_r],
            redirect: (data_w, libc::STDOUT_FILENO),
            report: ctl_w,
        };
        let pid = fork_exec(&setup).unwrap();
        sys_close(ctl_w).unwrap();
        sys_close(data_w).unwrap();

        let report = read_report(ctl_r);
        assert_eq!(report.len(), 4);
        let errno = i32::from_ne_bytes(report[..4].try_into().unwrap());
        assert_eq!(errno, libc::ENOENT);

        let status = sys_waitpid(pid).unwrap();
        assert_eq!((status >> 8) & 0xff, EXEC_FAILURE_STATUS);
        sys_close(ctl_r).unwrap();
        sys_close(data_r).unwrap();
    }

    #[test]
    fn exec_success_closes_control_pipe() {
        let (data_r, data_w) = sys_pipe_cloexec().unwrap();
        let (ctl_r, ctl_w) = sys_pipe_cloexec().unwrap();
        let args = [c"sh".to_owned(), c"-c".to_owned(), c"printf ok".to_owned()];
        let setup = ChildSetup {
            program: c"/bin/sh",
            args: &args,
            close: &[data_r, ctl_r],
            redirect: (data_w, libc::STDOUT_FILENO),
            report: ctl_w,
        };
        let pid = fork_exec(&setup).unwrap();
        sys_close(ctl_w).unwrap();
        sys_close(data_w).unwrap();

        assert!(read_report(ctl_r).is_empty());
        assert_eq!(read_report(data_r), b"ok");
        assert_eq!(sys_waitpid(pid).unwrap(), 0);
        sys_close(ctl_r).unwrap();
        sys_close(data_r).unwrap();
    }
}
