//! Stream configuration.
//!
//! Defaults can be overridden through the environment:
//! - `SOSTDIO_BUFSIZ`: capacity of each stream buffer in bytes (1..=1 MiB).
//! - `SOSTDIO_SHELL`: shell executed by process streams as `<shell> -c <cmd>`.
//! - `SOSTDIO_CREATE_MODE`: octal permission bits for files created by `w`/`a` modes.
//!
//! Unparseable or out-of-range values fall back to the defaults.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default buffer capacity for both the read and the write side.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Upper bound accepted from `SOSTDIO_BUFSIZ`.
pub const MAX_BUFFER_CAPACITY: usize = 1 << 20;

/// Shell used by process streams.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Permission bits for newly created files.
pub const DEFAULT_CREATE_MODE: u32 = 0o644;

pub const ENV_BUFSIZ: &str = "SOSTDIO_BUFSIZ";
pub const ENV_SHELL: &str = "SOSTDIO_SHELL";
pub const ENV_CREATE_MODE: &str = "SOSTDIO_CREATE_MODE";

/// Tunables shared by file and process streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoConfig {
    /// Capacity C of each of the two stream buffers.
    pub buffer_capacity: usize,
    /// Absolute path of the shell used by process streams.
    pub shell: PathBuf,
    /// Mode bits passed to `open(2)` when a file is created.
    pub create_mode: u32,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            shell: PathBuf::from(DEFAULT_SHELL),
            create_mode: DEFAULT_CREATE_MODE,
        }
    }
}

impl IoConfig {
    /// Build a configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(capacity) = lookup(ENV_BUFSIZ).as_deref().and_then(parse_capacity) {
            config.buffer_capacity = capacity;
        }
        if let Some(shell) = lookup(ENV_SHELL).filter(|s| !s.trim().is_empty()) {
            config.shell = PathBuf::from(shell.trim());
        }
        if let Some(bits) = lookup(ENV_CREATE_MODE).as_deref().and_then(parse_mode_bits) {
            config.create_mode = bits;
        }
        config
    }

    /// Same configuration with a different buffer capacity (clamped to the valid range).
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.clamp(1, MAX_BUFFER_CAPACITY);
        self
    }

    /// Same configuration with a different shell.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }
}

fn parse_capacity(raw: &str) -> Option<usize> {
    let value: usize = raw.trim().parse().ok()?;
    (1..=MAX_BUFFER_CAPACITY).contains(&value).then_some(value)
}

fn parse_mode_bits(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    let bits = u32::from_str_radix(digits, 8).ok()?;
    (bits <= 0o7777).then_some(bits)
}

/// Process-wide configuration, resolved from the environment on first use.
#[must_use]
pub fn global() -> &'static IoConfig {
    static CONFIG: OnceLock<IoConfig> = OnceLock::new();
    CONFIG.get_or_init(IoConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn defaults_without_environment() {
        let config = IoConfig::from_lookup(|_| None);
        assert_eq!(config, IoConfig::default());
        assert_eq!(config.buffer_capacity, 4096);
        assert_eq!(config.shell, PathBuf::from("/bin/sh"));
        assert_eq!(config.create_mode, 0o644);
    }

    #[test]
    fn overrides_are_applied() {
        let config = IoConfig::from_lookup(lookup_from(&[
            (ENV_BUFSIZ, "512"),
            (ENV_SHELL, "/usr/bin/dash"),
            (ENV_CREATE_MODE, "0600"),
        ]));
        assert_eq!(config.buffer_capacity, 512);
        assert_eq!(config.shell, PathBuf::from("/usr/bin/dash"));
        assert_eq!(config.create_mode, 0o600);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = IoConfig::from_lookup(lookup_from(&[
            (ENV_BUFSIZ, "0"),
            (ENV_SHELL, "   "),
            (ENV_CREATE_MODE, "0999"),
        ]));
        assert_eq!(config, IoConfig::default());

        let too_big = IoConfig::from_lookup(lookup_from(&[(ENV_BUFSIZ, "2000000")]));
        assert_eq!(too_big.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn octal_prefix_accepted() {
        assert_eq!(parse_mode_bits("0o640"), Some(0o640));
        assert_eq!(parse_mode_bits("755"), Some(0o755));
        assert_eq!(parse_mode_bits("abc"), None);
    }

    #[test]
    fn builder_clamps_capacity() {
        assert_eq!(IoConfig::default().with_buffer_capacity(0).buffer_capacity, 1);
        assert_eq!(
            IoConfig::default()
                .with_buffer_capacity(usize::MAX)
                .buffer_capacity,
            MAX_BUFFER_CAPACITY
        );
    }
}
