//! Process streams (`popen`/`pclose`).
//!
//! A process stream is an ordinary [`Stream`] over one end of a pipe whose
//! other end is the standard output (direction `r`) or standard input
//! (direction `w`) of `<shell> -c <command>`. The child is reaped when the
//! stream is closed with [`close_process`], closed with [`Stream::close`], or
//! dropped.

mod wait;

use std::ffi::CString;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;

use log::{debug, info, warn};

pub use wait::{WaitStatus, wexitstatus, wifexited, wifsignaled, wtermsig};

use crate::config::{self, IoConfig};
use crate::error::{SpawnError, StreamError};
use crate::stdio::{Descriptor, FileDescriptor, Stream};
use crate::syscall::{self, ChildSetup};

/// Which side of the child the caller talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Read the child's standard output.
    Read,
    /// Write the child's standard input.
    Write,
}

impl Direction {
    /// Parse `"r"` or `"w"`.
    #[must_use]
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "r" => Some(Self::Read),
            "w" => Some(Self::Write),
            _ => None,
        }
    }

    /// Descriptor number the child end is installed on.
    fn child_target(self) -> RawFd {
        match self {
            Self::Read => libc::STDOUT_FILENO,
            Self::Write => libc::STDIN_FILENO,
        }
    }
}

/// A forked child owned by a process stream.
///
/// Dropping an unreaped child waits for it, so no zombie outlives its stream.
#[derive(Debug)]
pub struct Child {
    pid: libc::pid_t,
    reaped: bool,
}

impl Child {
    fn new(pid: libc::pid_t) -> Self {
        Self { pid, reaped: false }
    }

    #[must_use]
    pub fn pid(&self) -> libc::pid_t {
        self.pid
    }

    /// Block until the child terminates.
    pub fn wait(mut self) -> Result<WaitStatus, StreamError> {
        self.reaped = true;
        match syscall::sys_waitpid(self.pid) {
            Ok(raw) => {
                let status = WaitStatus::from_raw(raw);
                debug!("reaped pid={} ({status})", self.pid);
                Ok(status)
            }
            Err(errno) => {
                warn!("waitpid pid={} failed: errno {errno}", self.pid);
                Err(StreamError::Child(errno))
            }
        }
    }
}

impl Drop for Child {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = syscall::sys_waitpid(self.pid);
        }
    }
}

/// Run `command` through the configured shell and connect a stream to it.
pub fn open_process(command: &str, direction: &str) -> Result<Stream, SpawnError> {
    open_process_with(command, direction, config::global())
}

/// [`open_process`] with an explicit configuration.
pub fn open_process_with(
    command: &str,
    direction: &str,
    config: &IoConfig,
) -> Result<Stream, SpawnError> {
    let Some(dir) = Direction::parse(direction) else {
        warn!("popen: invalid direction {direction:?}");
        return Err(SpawnError::InvalidDirection(direction.to_string()));
    };
    let command_c = CString::new(command).map_err(|_| SpawnError::InvalidCommand)?;
    let program = CString::new(config.shell.as_os_str().as_bytes())
        .map_err(|_| SpawnError::Os(libc::EINVAL))?;
    let argv0 = config
        .shell
        .file_name()
        .and_then(|name| CString::new(name.as_bytes()).ok())
        .unwrap_or_else(|| program.clone());
    let args = [argv0, c"-c".to_owned(), command_c];

    let (data_r, data_w) = syscall::sys_pipe_cloexec().map_err(SpawnError::Os)?;
    let (ctl_r, ctl_w) = match syscall::sys_pipe_cloexec() {
        Ok(pair) => pair,
        Err(errno) => {
            close_all(&[data_r, data_w]);
            return Err(SpawnError::Os(errno));
        }
    };
    let (parent_end, child_end) = match dir {
        Direction::Read => (data_r, data_w),
        Direction::Write => (data_w, data_r),
    };

    let setup = ChildSetup {
        program: &program,
        args: &args,
        close: &[parent_end, ctl_r],
        redirect: (child_end, dir.child_target()),
        report: ctl_w,
    };
    let pid = match syscall::fork_exec(&setup) {
        Ok(pid) => pid,
        Err(errno) => {
            warn!("popen {command:?}: fork failed: errno {errno}");
            close_all(&[data_r, data_w, ctl_r, ctl_w]);
            return Err(SpawnError::Os(errno));
        }
    };
    close_all(&[child_end, ctl_w]);

    let report = read_exec_report(ctl_r);
    close_all(&[ctl_r]);
    if let Some(errno) = report {
        close_all(&[parent_end]);
        let _ = syscall::sys_waitpid(pid);
        warn!(
            "popen {command:?}: exec of {} failed: errno {errno}",
            config.shell.display()
        );
        return Err(SpawnError::Exec(errno));
    }

    info!("popen {command:?} mode={direction} pid={pid} fd={parent_end}");
    let mut stream = Stream::from_descriptor(
        FileDescriptor::from_raw(parent_end),
        config.buffer_capacity,
    );
    stream.attach_child(Child::new(pid));
    Ok(stream)
}

/// Flush and close a process stream, then wait for its child.
///
/// Returns the child's raw wait status. Flush and close failures are logged
/// but do not change the result; a stream without a child yields
/// `StreamError::Child(ECHILD)` after being closed.
pub fn close_process<D: Descriptor>(mut stream: Stream<D>) -> Result<WaitStatus, StreamError> {
    let fd = stream.fileno();
    let (released, child) = stream.release();
    if let Err(err) = released {
        warn!("pclose fd={fd}: {err}");
    }
    match child {
        Some(child) => child.wait(),
        None => Err(StreamError::Child(libc::ECHILD)),
    }
}

/// Read the child's exec report: `Some(errno)` if it wrote one before exiting.
fn read_exec_report(fd: RawFd) -> Option<i32> {
    let mut report = [0u8; 4];
    let mut got = 0;
    while got < report.len() {
        match syscall::sys_read(fd, &mut report[got..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => got += n,
        }
    }
    (got == report.len()).then(|| i32::from_ne_bytes(report))
}

fn close_all(fds: &[RawFd]) {
    for &fd in fds {
        let _ = syscall::sys_close(fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(stream: &mut Stream) -> Vec<u8> {
        std::iter::from_fn(|| stream.read_byte().ok()).collect()
    }

    #[test]
    fn direction_parse() {
        assert_eq!(Direction::parse("r"), Some(Direction::Read));
        assert_eq!(Direction::parse("w"), Some(Direction::Write));
        assert_eq!(Direction::parse("r+"), None);
        assert_eq!(Direction::parse(""), None);
    }

    #[test]
    fn invalid_direction_spawns_nothing() {
        let err = open_process("true", "rw").unwrap_err();
        assert_eq!(err, SpawnError::InvalidDirection("rw".into()));
        assert_eq!(err.errno(), libc::EINVAL);
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert_eq!(
            open_process("echo a\0b", "r").unwrap_err(),
            SpawnError::InvalidCommand
        );
    }

    #[test]
    fn read_direction_sees_child_stdout() {
        let mut stream = open_process("echo hello", "r").unwrap();
        assert!(stream.child_pid().is_some());
        assert_eq!(read_all(&mut stream), b"hello\n");
        assert!(stream.at_end());
        let status = close_process(stream).unwrap();
        assert!(status.success());
    }

    #[test]
    fn exit_code_is_reported() {
        let stream = open_process("exit 3", "r").unwrap();
        let status = close_process(stream).unwrap();
        assert_eq!(status.exit_code(), Some(3));
        assert_eq!(status.raw(), 3 << 8);
    }

    #[test]
    fn write_direction_feeds_child_stdin() {
        let mut stream = open_process("read line; test \"$line\" = ping", "w").unwrap();
        assert_eq!(stream.write_block(b"ping\n", 1, 5), 5);
        let status = close_process(stream).unwrap();
        assert_eq!(status.exit_code(), Some(0));
    }

    #[test]
    fn missing_shell_is_an_exec_error() {
        let config = IoConfig::default().with_shell("/nonexistent/sostdio-sh");
        let err = open_process_with("true", "r", &config).unwrap_err();
        assert_eq!(err, SpawnError::Exec(libc::ENOENT));
    }

    #[test]
    fn close_process_without_child_reports_echild() {
        let (r, w) = syscall::sys_pipe_cloexec().unwrap();
        close_all(&[w]);
        let stream = Stream::from_descriptor(FileDescriptor::from_raw(r), 16);
        assert_eq!(
            close_process(stream),
            Err(StreamError::Child(libc::ECHILD))
        );
    }
}
