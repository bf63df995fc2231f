//! Descriptor backends for streams.

use std::os::fd::RawFd;

use crate::syscall;

/// Reference point for [`Descriptor::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// `SEEK_SET`
    Start,
    /// `SEEK_CUR`
    Current,
    /// `SEEK_END`
    End,
}

impl Whence {
    /// Convert from the POSIX `SEEK_*` constant.
    #[must_use]
    pub fn from_raw(whence: i32) -> Option<Self> {
        match whence {
            libc::SEEK_SET => Some(Self::Start),
            libc::SEEK_CUR => Some(Self::Current),
            libc::SEEK_END => Some(Self::End),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Start => libc::SEEK_SET,
            Self::Current => libc::SEEK_CUR,
            Self::End => libc::SEEK_END,
        }
    }
}

/// The four syscalls a stream issues against its descriptor.
///
/// Each method corresponds to exactly one syscall so that callers can
/// reason about (and tests can count) the I/O a stream performs. Errors are
/// raw errno values.
pub trait Descriptor {
    /// Raw descriptor number, as reported by `fileno`.
    fn raw_fd(&self) -> RawFd;

    /// One `read`; `Ok(0)` means end of data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32>;

    /// One `write`; may be partial.
    fn write(&mut self, buf: &[u8]) -> Result<usize, i32>;

    /// One `lseek`, returning the new absolute offset.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, i32>;

    /// Release the descriptor. Called at most once.
    fn close(&mut self) -> Result<(), i32>;
}

/// An OS file descriptor owned by a stream.
#[derive(Debug)]
pub struct FileDescriptor {
    fd: RawFd,
}

impl FileDescriptor {
    /// Take ownership of an open descriptor.
    #[must_use]
    pub fn from_raw(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl Descriptor for FileDescriptor {
    fn raw_fd(&self) -> RawFd {
        self.fd
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        syscall::sys_read(self.fd, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, i32> {
        syscall::sys_write(self.fd, buf)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, i32> {
        syscall::sys_lseek(self.fd, offset, whence.to_raw())
    }

    fn close(&mut self) -> Result<(), i32> {
        let fd = std::mem::replace(&mut self.fd, -1);
        if fd < 0 {
            return Err(libc::EBADF);
        }
        syscall::sys_close(fd)
    }
}
