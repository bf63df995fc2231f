//! Buffered byte streams.
//!
//! Implements the `fopen`/`fgetc`/`fputc`/`fread`/`fwrite`/`fseek`/`ftell`/
//! `fflush`/`fclose` family over a [`Descriptor`], with independent
//! read-ahead and write-behind buffers.

pub mod buffer;
pub mod descriptor;
pub mod file;

pub use buffer::{ReadBuffer, WriteBuffer};
pub use descriptor::{Descriptor, FileDescriptor, Whence};
pub use file::{LastOp, OpenFlags, Stream, flags_to_oflags, parse_mode};
