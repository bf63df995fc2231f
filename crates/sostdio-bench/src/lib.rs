//! Shared fixtures for the sostdio benchmarks.

use std::path::{Path, PathBuf};

/// Scratch file removed on drop.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Create a scratch file holding `len` deterministic bytes.
    pub fn with_len(tag: &str, len: usize) -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("sostdio-bench-{tag}-{}", std::process::id()));
        std::fs::write(&path, payload(len))?;
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `len` bytes cycling through every byte value.
#[must_use]
pub fn payload(len: usize) -> Vec<u8> {
    (0..=u8::MAX).cycle().take(len).collect()
}
