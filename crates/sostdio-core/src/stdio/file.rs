//! Stream state management.
//!
//! `Stream` is the safe Rust model of an `SO_FILE`: one owned descriptor,
//! a read-ahead buffer, a write-behind buffer, the logical position, and
//! the sticky end-of-file/error indicators.
//!
//! Direction switches are defined rather than left to the caller:
//! - write → read: pending bytes are flushed before the first fill.
//! - read → write: unread read-ahead is discarded and the descriptor offset
//!   is moved back by that many bytes, so the write lands at the logical
//!   position.
//!
//! A seek flushes pending writes, discards read-ahead, clears both sticky
//! flags and adopts the offset reported by the OS.

use std::ffi::CString;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use log::{debug, trace, warn};

use super::buffer::{ReadBuffer, WriteBuffer};
use super::descriptor::{Descriptor, FileDescriptor, Whence};
use crate::config::{self, IoConfig};
use crate::error::{OpenError, StreamError};
use crate::process::Child;
use crate::syscall;

// ---------------------------------------------------------------------------
// Mode parsing
// ---------------------------------------------------------------------------

/// File open intent derived from a mode string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub readable: bool,
    pub writable: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
}

/// Parse one of the six supported mode strings: `r`, `r+`, `w`, `w+`, `a`, `a+`.
#[must_use]
pub fn parse_mode(mode: &str) -> Option<OpenFlags> {
    let (base, plus) = match mode.as_bytes() {
        [base] => (*base, false),
        [base, b'+'] => (*base, true),
        _ => return None,
    };

    let mut flags = match base {
        b'r' => OpenFlags {
            readable: true,
            ..OpenFlags::default()
        },
        b'w' => OpenFlags {
            writable: true,
            create: true,
            truncate: true,
            ..OpenFlags::default()
        },
        b'a' => OpenFlags {
            writable: true,
            create: true,
            append: true,
            ..OpenFlags::default()
        },
        _ => return None,
    };
    if plus {
        flags.readable = true;
        flags.writable = true;
    }
    Some(flags)
}

/// Convert open flags to `O_*` bits. Descriptors are always close-on-exec.
#[must_use]
pub fn flags_to_oflags(flags: &OpenFlags) -> i32 {
    let mut oflags = if flags.readable && flags.writable {
        libc::O_RDWR
    } else if flags.writable {
        libc::O_WRONLY
    } else {
        libc::O_RDONLY
    };

    if flags.create {
        oflags |= libc::O_CREAT;
    }
    if flags.truncate {
        oflags |= libc::O_TRUNC;
    }
    if flags.append {
        oflags |= libc::O_APPEND;
    }
    oflags | libc::O_CLOEXEC
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// Which buffering discipline was exercised last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LastOp {
    #[default]
    None,
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, Default)]
struct StreamFlags {
    eof: bool,
    error: bool,
}

/// Buffered byte stream over an exclusively owned descriptor.
///
/// Dropping a stream that was never [`close`](Self::close)d flushes it,
/// closes the descriptor and reaps its child, discarding any error.
#[derive(Debug)]
pub struct Stream<D: Descriptor = FileDescriptor> {
    fd: D,
    rbuf: ReadBuffer,
    wbuf: WriteBuffer,
    last_op: LastOp,
    position: u64,
    flags: StreamFlags,
    child: Option<Child>,
    closed: bool,
}

impl Stream<FileDescriptor> {
    /// Open `path` with one of the modes `r`, `r+`, `w`, `w+`, `a`, `a+`.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self, OpenError> {
        Self::open_with(path, mode, config::global())
    }

    /// [`open`](Self::open) with an explicit configuration.
    pub fn open_with(
        path: impl AsRef<Path>,
        mode: &str,
        config: &IoConfig,
    ) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let Some(flags) = parse_mode(mode) else {
            warn!("open {}: invalid mode {mode:?}", path.display());
            return Err(OpenError::InvalidMode(mode.to_string()));
        };
        let c_path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| OpenError::Os(libc::EINVAL))?;

        let fd = syscall::sys_open(&c_path, flags_to_oflags(&flags), config.create_mode)
            .map_err(|errno| {
                debug!("open {} mode={mode} failed: errno {errno}", path.display());
                OpenError::Os(errno)
            })?;
        debug!("open {} mode={mode} fd={fd}", path.display());
        Ok(Self::from_descriptor(
            FileDescriptor::from_raw(fd),
            config.buffer_capacity,
        ))
    }
}

impl<D: Descriptor> Stream<D> {
    /// Wrap a descriptor with fresh buffers of `capacity` bytes each.
    #[must_use]
    pub fn from_descriptor(fd: D, capacity: usize) -> Self {
        Self {
            fd,
            rbuf: ReadBuffer::new(capacity),
            wbuf: WriteBuffer::new(capacity),
            last_op: LastOp::None,
            position: 0,
            flags: StreamFlags::default(),
            child: None,
            closed: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Underlying descriptor number.
    #[must_use]
    pub fn fileno(&self) -> RawFd {
        self.fd.raw_fd()
    }

    /// Borrow the descriptor backend.
    #[must_use]
    pub fn get_ref(&self) -> &D {
        &self.fd
    }

    /// Capacity of each buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.wbuf.capacity()
    }

    /// Logical position: bytes consumed or produced since open or the last seek.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True once a read has hit end of data or failed.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.flags.eof
    }

    /// True once any read, write or flush has failed (or a read hit end of data).
    #[must_use]
    pub fn had_error(&self) -> bool {
        self.flags.error
    }

    /// Clear both sticky indicators without moving.
    pub fn clear_error(&mut self) {
        self.flags = StreamFlags::default();
    }

    /// Which buffering discipline was exercised last.
    #[must_use]
    pub fn last_op(&self) -> LastOp {
        self.last_op
    }

    /// Bytes waiting in the write buffer.
    #[must_use]
    pub fn pending_write(&self) -> usize {
        self.wbuf.len()
    }

    /// Bytes fetched but not yet delivered.
    #[must_use]
    pub fn buffered_read(&self) -> usize {
        self.rbuf.readable()
    }

    /// Pid of the child attached to a process stream.
    #[must_use]
    pub fn child_pid(&self) -> Option<libc::pid_t> {
        self.child.as_ref().map(Child::pid)
    }

    pub(crate) fn attach_child(&mut self, child: Child) {
        self.child = Some(child);
    }

    // -----------------------------------------------------------------------
    // Byte primitives
    // -----------------------------------------------------------------------

    /// Deliver the next byte, refilling the read buffer with one `read` when exhausted.
    ///
    /// Once end of file is latched this returns `Eof` without touching the
    /// descriptor until the next seek.
    pub fn read_byte(&mut self) -> Result<u8, StreamError> {
        if self.flags.eof {
            return Err(StreamError::Eof);
        }
        if !self.wbuf.is_empty() {
            self.flush()?;
        }
        if self.rbuf.is_exhausted() {
            self.fill()?;
        }
        let byte = self.rbuf.next_byte().ok_or(StreamError::Eof)?;
        self.position += 1;
        self.last_op = LastOp::Read;
        Ok(byte)
    }

    /// Buffer one byte, flushing first if the write buffer is full.
    ///
    /// If that flush fails, both sticky flags are latched and the byte is
    /// not stored.
    pub fn write_byte(&mut self, byte: u8) -> Result<u8, StreamError> {
        if self.last_op == LastOp::Read {
            self.leave_read_mode()?;
        }
        if self.wbuf.is_full()
            && let Err(err) = self.flush()
        {
            self.flags.eof = true;
            return Err(err);
        }
        self.wbuf.push(byte);
        self.position += 1;
        self.last_op = LastOp::Write;
        Ok(byte)
    }

    // -----------------------------------------------------------------------
    // Block transfer
    // -----------------------------------------------------------------------

    /// Read up to `size * nmemb` bytes into `dst`, returning whole elements read.
    ///
    /// Bytes of a trailing partial element are still stored in `dst`.
    pub fn read_block(&mut self, dst: &mut [u8], size: usize, nmemb: usize) -> usize {
        self.last_op = LastOp::Read;
        if size == 0 || nmemb == 0 {
            return 0;
        }
        let total = size.saturating_mul(nmemb).min(dst.len());
        let mut copied = 0;
        while copied < total {
            match self.read_byte() {
                Ok(byte) => {
                    dst[copied] = byte;
                    copied += 1;
                }
                Err(_) => break,
            }
        }
        copied / size
    }

    /// Write up to `size * nmemb` bytes from `src`, returning whole elements accepted.
    pub fn write_block(&mut self, src: &[u8], size: usize, nmemb: usize) -> usize {
        if size == 0 || nmemb == 0 {
            self.last_op = LastOp::Write;
            return 0;
        }
        let total = size.saturating_mul(nmemb).min(src.len());
        let mut written = 0;
        for &byte in &src[..total] {
            if self.write_byte(byte).is_err() {
                break;
            }
            written += 1;
        }
        self.last_op = LastOp::Write;
        written / size
    }

    // -----------------------------------------------------------------------
    // Flush / seek
    // -----------------------------------------------------------------------

    /// Write every pending byte, retrying partial writes.
    ///
    /// The write buffer is emptied whether or not the transfer succeeds; a
    /// failure latches the error flag.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        if self.wbuf.is_empty() {
            return Ok(());
        }
        let pending = self.wbuf.len();
        let result = write_fully(&mut self.fd, self.wbuf.pending());
        self.wbuf.mark_flushed();
        match result {
            Ok(()) => {
                trace!("flush fd={} bytes={pending}", self.fd.raw_fd());
                Ok(())
            }
            Err(errno) => {
                self.flags.error = true;
                warn!(
                    "flush fd={} bytes={pending} failed: errno {errno}",
                    self.fd.raw_fd()
                );
                Err(StreamError::Os(errno))
            }
        }
    }

    /// Reposition the stream and return the new absolute offset.
    ///
    /// On failure the logical position and any read-ahead are unchanged.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, StreamError> {
        let unread = self.rbuf.readable() as i64;
        self.flush()?;

        // The descriptor sits `unread` bytes past the logical position.
        let offset = match whence {
            Whence::Current => offset.saturating_sub(unread),
            Whence::Start | Whence::End => offset,
        };
        let position = self.fd.seek(offset, whence).map_err(|errno| {
            debug!("seek fd={} failed: errno {errno}", self.fd.raw_fd());
            StreamError::Os(errno)
        })?;

        self.rbuf.reset();
        self.position = position;
        self.flags = StreamFlags::default();
        self.last_op = LastOp::None;
        debug!("seek fd={} position={position}", self.fd.raw_fd());
        Ok(position)
    }

    /// Seek to the start and clear both sticky indicators.
    pub fn rewind(&mut self) -> Result<(), StreamError> {
        let result = self.seek(0, Whence::Start).map(|_| ());
        self.clear_error();
        result
    }

    // -----------------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------------

    /// Flush pending writes, close the descriptor and reap any child.
    ///
    /// Fails if the flush, the close or the wait failed; the first failure wins.
    pub fn close(mut self) -> Result<(), StreamError> {
        let (released, child) = self.release();
        let reaped = match child {
            Some(child) => child.wait().map(|_| ()),
            None => Ok(()),
        };
        released.and(reaped)
    }

    /// Flush and close the descriptor, detaching the child for the caller to reap.
    pub(crate) fn release(&mut self) -> (Result<(), StreamError>, Option<Child>) {
        let fd = self.fd.raw_fd();
        let flushed = self.flush();
        let closed = self.fd.close().map_err(StreamError::Os);
        self.closed = true;
        debug!("close fd={fd}");
        (flushed.and(closed), self.child.take())
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn fill(&mut self) -> Result<(), StreamError> {
        match self.fd.read(self.rbuf.spare_mut()) {
            Ok(0) => {
                self.flags.eof = true;
                self.flags.error = true;
                trace!("fill fd={}: end of file", self.fd.raw_fd());
                Err(StreamError::Eof)
            }
            Ok(n) => {
                self.rbuf.set_filled(n);
                trace!("fill fd={} bytes={n}", self.fd.raw_fd());
                Ok(())
            }
            Err(errno) => {
                self.flags.eof = true;
                self.flags.error = true;
                warn!("read fd={} failed: errno {errno}", self.fd.raw_fd());
                Err(StreamError::Os(errno))
            }
        }
    }

    fn leave_read_mode(&mut self) -> Result<(), StreamError> {
        let unread = self.rbuf.readable() as i64;
        if unread > 0
            && let Err(errno) = self.fd.seek(-unread, Whence::Current)
        {
            self.flags.error = true;
            warn!(
                "fd={}: cannot rewind {unread} read-ahead bytes before write: errno {errno}",
                self.fd.raw_fd()
            );
            return Err(StreamError::Os(errno));
        }
        self.rbuf.reset();
        Ok(())
    }
}

impl<D: Descriptor> Drop for Stream<D> {
    fn drop(&mut self) {
        if !self.closed {
            // Dropping the detached child reaps it after the descriptor is closed.
            let _ = self.release();
        }
    }
}

fn write_fully<D: Descriptor>(fd: &mut D, mut buf: &[u8]) -> Result<(), i32> {
    while !buf.is_empty() {
        match fd.write(buf)? {
            0 => return Err(libc::EIO),
            n => buf = &buf[n.min(buf.len())..],
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
