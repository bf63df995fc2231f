//! Test execution engine.
//!
//! Each operation appends one token to the case transcript:
//!
//! | op | token |
//! |----|-------|
//! | `getc` / `putc` | `getc=<byte>` / `putc=<byte>`, or `=EOF` |
//! | `read` | `read=<elements>:<delivered bytes, ASCII-escaped>` |
//! | `write` | `write=<elements>` |
//! | `seek` / `rewind` | `seek=0` or `seek=-1` / `rewind=0` or `rewind=-1` |
//! | `tell` | `tell=<position>` |
//! | `flush` | `flush=0` or `flush=EOF` |
//! | `eof` / `error` | `eof=0|1` / `error=0|1` |
//!
//! Closing appends `close=0|EOF` for files (followed by
//! `contents=<escaped>` when requested) and `pclose=<exit code>`,
//! `pclose=signal<n>` or `pclose=EOF` for process streams. A stream that
//! fails to open yields the single token `open=<errno>`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use log::{info, warn};
use sostdio_core::{IoConfig, Stream, Whence, close_process, open_process_with};

use crate::fixtures::{FixtureCase, FixtureSet, Op, Target};
use crate::verify::{VerificationResult, render_diff};

static SCRATCH_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Runs a fixture set and collects verification results.
pub struct TestRunner {
    /// Name of the test campaign.
    pub campaign: String,
    /// Configuration used to open streams (per-case capacity overrides apply on top).
    pub config: IoConfig,
    /// Directory for scratch files.
    pub scratch_dir: PathBuf,
}

impl TestRunner {
    /// Create a new test runner with default stream configuration.
    #[must_use]
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
            config: IoConfig::default(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: IoConfig) -> Self {
        self.config = config;
        self
    }

    /// Run all fixtures in a set and return results.
    pub fn run(&self, fixture_set: &FixtureSet) -> Vec<VerificationResult> {
        fixture_set
            .cases
            .iter()
            .map(|case| {
                let started = Instant::now();
                let actual = self.execute_case(case);
                let latency_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
                let passed = actual == case.expected_output;
                if passed {
                    info!("{}/{}: pass", fixture_set.family, case.name);
                } else {
                    warn!("{}/{}: FAIL", fixture_set.family, case.name);
                }
                VerificationResult {
                    case_name: case.name.clone(),
                    family: fixture_set.family.clone(),
                    passed,
                    diff: (!passed).then(|| render_diff(&case.expected_output, &actual)),
                    expected: case.expected_output.clone(),
                    actual,
                    latency_ns,
                }
            })
            .collect()
    }

    fn execute_case(&self, case: &FixtureCase) -> String {
        let config = match case.buffer_capacity {
            Some(capacity) => self.config.clone().with_buffer_capacity(capacity),
            None => self.config.clone(),
        };
        match &case.target {
            Target::File {
                mode,
                initial,
                check_contents,
            } => self.run_file_case(case, &config, mode, initial, *check_contents),
            Target::Process { command, direction } => {
                let mut stream = match open_process_with(command, direction, &config) {
                    Ok(stream) => stream,
                    Err(err) => return format!("open={}", err.errno()),
                };
                let mut transcript = apply_ops(&mut stream, &case.ops);
                transcript.push(match close_process(stream) {
                    Ok(status) => match (status.exit_code(), status.term_signal()) {
                        (Some(code), _) => format!("pclose={code}"),
                        (None, Some(sig)) => format!("pclose=signal{sig}"),
                        (None, None) => format!("pclose=raw{}", status.raw()),
                    },
                    Err(_) => "pclose=EOF".to_string(),
                });
                transcript.join(" ")
            }
        }
    }

    fn run_file_case(
        &self,
        case: &FixtureCase,
        config: &IoConfig,
        mode: &str,
        initial: &str,
        check_contents: bool,
    ) -> String {
        let path = self.scratch_path(&case.name);
        if let Err(err) = std::fs::write(&path, initial) {
            return format!("scratch-error={err}");
        }
        let transcript = match Stream::open_with(&path, mode, config) {
            Ok(mut stream) => {
                let mut transcript = apply_ops(&mut stream, &case.ops);
                transcript.push(match stream.close() {
                    Ok(()) => "close=0".to_string(),
                    Err(_) => "close=EOF".to_string(),
                });
                if check_contents {
                    let contents = std::fs::read(&path).unwrap_or_default();
                    transcript.push(format!("contents={}", contents.escape_ascii()));
                }
                transcript.join(" ")
            }
            Err(err) => format!("open={}", err.errno()),
        };
        let _ = std::fs::remove_file(&path);
        transcript
    }

    fn scratch_path(&self, case_name: &str) -> PathBuf {
        let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
        let safe: String = case_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.scratch_dir.join(format!(
            "sostdio-{}-{safe}-{}-{seq}",
            self.campaign,
            std::process::id()
        ))
    }
}

fn apply_ops(stream: &mut Stream, ops: &[Op]) -> Vec<String> {
    ops.iter().map(|op| apply_op(stream, op)).collect()
}

fn apply_op(stream: &mut Stream, op: &Op) -> String {
    match op {
        Op::Getc => match stream.read_byte() {
            Ok(byte) => format!("getc={byte}"),
            Err(_) => "getc=EOF".to_string(),
        },
        Op::Putc { byte } => match stream.write_byte(*byte) {
            Ok(byte) => format!("putc={byte}"),
            Err(_) => "putc=EOF".to_string(),
        },
        Op::Read { size, nmemb } => {
            let mut buf = vec![0u8; size.saturating_mul(*nmemb)];
            let before = stream.position();
            let elements = stream.read_block(&mut buf, *size, *nmemb);
            let delivered = usize::try_from(stream.position() - before).unwrap_or(0);
            format!("read={elements}:{}", buf[..delivered].escape_ascii())
        }
        Op::Write { data, size } => {
            let bytes = data.as_bytes();
            let nmemb = if *size == 0 { 0 } else { bytes.len() / size };
            format!("write={}", stream.write_block(bytes, *size, nmemb))
        }
        Op::Seek { offset, whence } => {
            let whence = match whence.as_str() {
                "set" => Whence::Start,
                "cur" => Whence::Current,
                "end" => Whence::End,
                _ => return "seek=-1".to_string(),
            };
            match stream.seek(*offset, whence) {
                Ok(_) => "seek=0".to_string(),
                Err(_) => "seek=-1".to_string(),
            }
        }
        Op::Tell => format!("tell={}", stream.position()),
        Op::Flush => match stream.flush() {
            Ok(()) => "flush=0".to_string(),
            Err(_) => "flush=EOF".to_string(),
        },
        Op::Eof => format!("eof={}", u8::from(stream.at_end())),
        Op::Error => format!("error={}", u8::from(stream.had_error())),
        Op::Rewind => match stream.rewind() {
            Ok(()) => "rewind=0".to_string(),
            Err(_) => "rewind=-1".to_string(),
        },
    }
}
