//! # sostdio-core
//!
//! Buffered byte streams over raw file descriptors, plus shell process
//! streams built on pipes.
//!
//! The crate is split the same way a libc splits `<stdio.h>` from its
//! syscall veneer: [`stdio`] owns the buffer state machine and never touches
//! the OS directly, [`process`] adds fork/exec/wait lifecycle on top of it,
//! and [`syscall`] is the only module permitted to use `unsafe`.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod process;
pub mod stdio;
#[allow(unsafe_code)]
pub mod syscall;

pub use config::IoConfig;
pub use error::{OpenError, SpawnError, StreamError};
pub use process::{Direction, WaitStatus, close_process, open_process, open_process_with};
pub use stdio::{Descriptor, FileDescriptor, Stream, Whence};
