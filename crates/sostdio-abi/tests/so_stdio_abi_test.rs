//! Integration tests: the `so_*` C boundary, called the way a C program would.
//!
//! Run: cargo test -p sostdio-abi --test so_stdio_abi_test

use std::ffi::{CString, c_int, c_void};
use std::path::PathBuf;
use std::ptr;
use std::time::{SystemTime, UNIX_EPOCH};

use so_stdio::SO_EOF;
use so_stdio::process_abi::{so_pclose, so_popen};
use so_stdio::stdio_abi::{
    so_fclose, so_feof, so_ferror, so_fflush, so_fgetc, so_fileno, so_fopen, so_fputc, so_fread,
    so_fseek, so_ftell, so_fwrite,
};

fn abi_errno() -> c_int {
    // SAFETY: __errno_location returns this thread's errno slot.
    unsafe { *libc::__errno_location() }
}

fn clear_errno() {
    // SAFETY: as above.
    unsafe { *libc::__errno_location() = 0 };
}

fn temp_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("so-abi-{tag}-{}-{nanos}", std::process::id()))
}

fn c_path(path: &PathBuf) -> CString {
    CString::new(path.to_str().unwrap()).unwrap()
}

#[test]
fn fopen_write_read_cycle() {
    let path = temp_path("cycle");
    let cpath = c_path(&path);
    unsafe {
        let f = so_fopen(cpath.as_ptr(), c"w".as_ptr());
        assert!(!f.is_null());
        assert!(so_fileno(f) >= 0);
        for &b in b"hi!" {
            assert_eq!(so_fputc(c_int::from(b), f), c_int::from(b));
        }
        let data = b" there";
        assert_eq!(so_fwrite(data.as_ptr().cast(), 1, data.len(), f), data.len());
        assert_eq!(so_ftell(f), 9);
        assert_eq!(so_fclose(f), 0);

        let f = so_fopen(cpath.as_ptr(), c"r".as_ptr());
        assert!(!f.is_null());
        assert_eq!(so_fgetc(f), c_int::from(b'h'));
        let mut rest = [0u8; 16];
        assert_eq!(so_fread(rest.as_mut_ptr().cast(), 1, rest.len(), f), 8);
        assert_eq!(&rest[..8], b"i! there");
        assert_eq!(so_fgetc(f), SO_EOF);
        assert_ne!(so_feof(f), 0);
        assert_ne!(so_ferror(f), 0);

        assert_eq!(so_fseek(f, 3, libc::SEEK_SET), 0);
        assert_eq!(so_feof(f), 0);
        assert_eq!(so_ferror(f), 0);
        assert_eq!(so_ftell(f), 3);
        assert_eq!(so_fgetc(f), c_int::from(b' '));
        assert_eq!(so_fclose(f), 0);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn fputc_returns_the_unsigned_char_value() {
    let path = temp_path("uchar");
    let cpath = c_path(&path);
    unsafe {
        let f = so_fopen(cpath.as_ptr(), c"w+".as_ptr());
        assert_eq!(so_fputc(0x1ff, f), 0xff);
        assert_eq!(so_fseek(f, 0, libc::SEEK_SET), 0);
        assert_eq!(so_fgetc(f), 0xff);
        assert_eq!(so_fclose(f), 0);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn fopen_failures_return_null_with_errno() {
    let missing = c_path(&temp_path("missing"));
    unsafe {
        clear_errno();
        assert!(so_fopen(missing.as_ptr(), c"r".as_ptr()).is_null());
        assert_eq!(abi_errno(), libc::ENOENT);

        clear_errno();
        assert!(so_fopen(missing.as_ptr(), c"rw".as_ptr()).is_null());
        assert_eq!(abi_errno(), libc::EINVAL);

        assert!(so_fopen(ptr::null(), c"r".as_ptr()).is_null());
        assert!(so_fopen(missing.as_ptr(), ptr::null()).is_null());
    }
}

#[test]
fn unknown_handles_are_rejected() {
    let bogus = 0xdead_beef_usize as *mut c_void;
    unsafe {
        clear_errno();
        assert_eq!(so_fgetc(bogus), SO_EOF);
        assert_eq!(abi_errno(), libc::EBADF);
        assert_eq!(so_fputc(1, bogus), SO_EOF);
        assert_eq!(so_fclose(bogus), SO_EOF);
        assert_eq!(so_pclose(bogus), SO_EOF);
        assert_eq!(so_fflush(bogus), SO_EOF);
        assert_eq!(so_ftell(bogus), -1);
        assert_eq!(so_fileno(bogus), -1);
        assert_eq!(so_fseek(bogus, 0, libc::SEEK_SET), -1);
        assert_eq!(so_fclose(ptr::null_mut()), SO_EOF);
    }
}

#[test]
fn double_close_is_ebadf() {
    let path = temp_path("double");
    let cpath = c_path(&path);
    unsafe {
        let f = so_fopen(cpath.as_ptr(), c"w".as_ptr());
        assert_eq!(so_fclose(f), 0);
        clear_errno();
        assert_eq!(so_fclose(f), SO_EOF);
        assert_eq!(abi_errno(), libc::EBADF);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn fseek_rejects_bad_whence() {
    let path = temp_path("whence");
    let cpath = c_path(&path);
    unsafe {
        let f = so_fopen(cpath.as_ptr(), c"w".as_ptr());
        clear_errno();
        assert_eq!(so_fseek(f, 0, 42), -1);
        assert_eq!(abi_errno(), libc::EINVAL);
        assert_eq!(so_fclose(f), 0);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn fflush_publishes_pending_bytes() {
    let path = temp_path("fflush");
    let cpath = c_path(&path);
    unsafe {
        let f = so_fopen(cpath.as_ptr(), c"w".as_ptr());
        so_fputc(c_int::from(b'z'), f);
        assert_eq!(std::fs::read(&path).unwrap(), b"");
        assert_eq!(so_fflush(f), 0);
        assert_eq!(std::fs::read(&path).unwrap(), b"z");
        assert_eq!(so_fclose(f), 0);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn popen_read_and_pclose() {
    unsafe {
        let p = so_popen(c"echo hello".as_ptr(), c"r".as_ptr());
        assert!(!p.is_null());
        let mut buf = [0u8; 32];
        let n = so_fread(buf.as_mut_ptr().cast(), 1, buf.len(), p);
        assert_eq!(&buf[..n], b"hello\n");
        assert_ne!(so_feof(p), 0);
        assert_eq!(so_pclose(p), 0);
    }
}

#[test]
fn popen_write_feeds_stdin() {
    let out = temp_path("popen-w");
    let cmd = CString::new(format!("cat > '{}'", out.display())).unwrap();
    unsafe {
        let p = so_popen(cmd.as_ptr(), c"w".as_ptr());
        assert!(!p.is_null());
        let data = b"through the pipe";
        assert_eq!(so_fwrite(data.as_ptr().cast(), 4, 4, p), 4);
        assert_eq!(so_pclose(p), 0);
    }
    assert_eq!(std::fs::read(&out).unwrap(), b"through the pipe");
    let _ = std::fs::remove_file(&out);
}

#[test]
fn popen_rejects_bad_direction() {
    unsafe {
        clear_errno();
        assert!(so_popen(c"true".as_ptr(), c"rw".as_ptr()).is_null());
        assert_eq!(abi_errno(), libc::EINVAL);
    }
}

#[test]
fn pclose_on_plain_stream_closes_it() {
    let path = temp_path("pclose-plain");
    let cpath = c_path(&path);
    unsafe {
        let f = so_fopen(cpath.as_ptr(), c"w".as_ptr());
        so_fputc(c_int::from(b'p'), f);
        assert_eq!(so_pclose(f), 0);
        assert_eq!(so_fclose(f), SO_EOF);
    }
    assert_eq!(std::fs::read(&path).unwrap(), b"p");
    let _ = std::fs::remove_file(&path);
}
