//! CLI entrypoint for the sostdio conformance harness.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use sostdio_core::IoConfig;
use sostdio_harness::structured_log::{
    ArtifactIndex, JsonlLogger, LogEmitter, LogEntry, LogLevel, Outcome, SharedEmitter,
    validate_log_file,
};
use sostdio_harness::{FixtureSet, TestRunner, VerificationResult};

/// Scenario-driven conformance tooling for sostdio streams.
#[derive(Debug, Parser)]
#[command(name = "sostdio-harness")]
#[command(about = "Conformance testing harness for sostdio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run fixture scenarios against the stream implementation.
    Run {
        /// Fixture JSON file, or a directory of them.
        #[arg(long)]
        fixture: PathBuf,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index output path (requires --log).
        #[arg(long, requires = "log")]
        artifact_index: Option<PathBuf>,
        /// Buffer capacity for every stream (overrides SOSTDIO_BUFSIZ).
        #[arg(long)]
        buffer_capacity: Option<usize>,
        /// Minimum level of library log records captured in the JSONL log.
        #[arg(long, default_value = "debug")]
        log_level: log::LevelFilter,
    },
    /// Validate a structured JSONL log.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            fixture,
            log,
            artifact_index,
            buffer_capacity,
            log_level,
        } => {
            let sets = load_fixtures(&fixture)?;
            if sets.is_empty() {
                return Err(format!("No fixture JSON files found in {}", fixture.display()).into());
            }

            let run_id = format!("run-{}", std::process::id());
            let emitter: Option<SharedEmitter> = match &log {
                Some(path) => {
                    let emitter = Arc::new(Mutex::new(LogEmitter::to_file(path, &run_id)?));
                    JsonlLogger::new(Arc::clone(&emitter), log_level).install()?;
                    Some(emitter)
                }
                None => None,
            };

            let mut config = IoConfig::from_env();
            if let Some(capacity) = buffer_capacity {
                config = config.with_buffer_capacity(capacity);
            }
            let runner = TestRunner::new(run_id.clone()).with_config(config);

            let mut results = Vec::new();
            for set in &sets {
                results.extend(runner.run(set));
            }
            for result in &results {
                print_result(result);
                if let Some(emitter) = &emitter {
                    emitter.lock().emit_entry(result_entry(result))?;
                }
            }

            let failed = results.iter().filter(|r| !r.passed).count();
            if let Some(emitter) = &emitter {
                let mut emitter = emitter.lock();
                let summary = LogEntry::new(String::new(), LogLevel::Info, "run_summary")
                    .with_details(serde_json::json!({
                        "total": results.len(),
                        "failed": failed,
                    }));
                emitter.emit_entry(summary)?;
                emitter.flush()?;
            }
            if let (Some(log), Some(index_path)) = (&log, &artifact_index) {
                let mut index = ArtifactIndex::new(&run_id);
                index.add_file(log, "log")?;
                std::fs::write(index_path, index.to_json()?)?;
                eprintln!("Wrote artifact index to {}", index_path.display());
            }

            println!("{} passed, {failed} failed", results.len() - failed);
            if failed > 0 {
                return Err(format!("{failed} fixture case(s) failed").into());
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                let count = errors.len();
                return Err(format!("{count} validation error(s) in {lines} line(s)").into());
            }
            println!("{}: {lines} valid line(s)", log.display());
        }
    }

    Ok(())
}

fn load_fixtures(path: &Path) -> Result<Vec<FixtureSet>, sostdio_harness::FixtureError> {
    if path.is_dir() {
        FixtureSet::load_dir(path)
    } else {
        FixtureSet::from_file(path).map(|set| vec![set])
    }
}

fn print_result(result: &VerificationResult) {
    if result.passed {
        println!("PASS {}/{}", result.family, result.case_name);
    } else {
        println!("FAIL {}/{}", result.family, result.case_name);
        if let Some(diff) = &result.diff {
            println!("     {diff}");
        }
        println!("     expected: {}", result.expected);
        println!("     actual:   {}", result.actual);
    }
}

fn result_entry(result: &VerificationResult) -> LogEntry {
    let (level, outcome) = if result.passed {
        (LogLevel::Info, Outcome::Pass)
    } else {
        (LogLevel::Error, Outcome::Fail)
    };
    let mut entry = LogEntry::new(String::new(), level, "case_result")
        .with_case(&result.family, &result.case_name)
        .with_outcome(outcome)
        .with_latency_ns(result.latency_ns);
    if let Some(diff) = &result.diff {
        entry = entry.with_details(serde_json::json!({
            "diff": diff,
            "expected": result.expected,
            "actual": result.actual,
        }));
    }
    entry
}
