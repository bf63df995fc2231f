//! Fixture loading and management.
//!
//! A fixture case opens one stream ([`Target`]), applies a list of [`Op`]s,
//! closes the stream, and compares the resulting transcript with
//! `expected_output`. Transcript tokens are space separated; see
//! [`crate::runner`] for their format.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stream a case runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// A scratch file, pre-filled with `initial`, opened with `mode`.
    File {
        mode: String,
        #[serde(default)]
        initial: String,
        /// Append the final file contents to the transcript.
        #[serde(default)]
        check_contents: bool,
    },
    /// `<shell> -c command`, opened with `direction` (`r` or `w`).
    Process { command: String, direction: String },
}

/// One stream operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Getc,
    Putc { byte: u8 },
    Read { size: usize, nmemb: usize },
    Write { data: String, size: usize },
    Seek { offset: i64, whence: String },
    Tell,
    Flush,
    Eof,
    Error,
    Rewind,
}

/// A single fixture test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCase {
    /// Case identifier.
    pub name: String,
    /// Behavior under test, for reports.
    #[serde(default)]
    pub description: String,
    pub target: Target,
    pub ops: Vec<Op>,
    /// Expected transcript.
    pub expected_output: String,
    /// Buffer capacity override for this case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_capacity: Option<usize>,
}

/// A collection of fixture cases for one stream family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSet {
    /// Schema version.
    pub version: String,
    /// Family name (`file`, `process`, ...).
    pub family: String,
    pub cases: Vec<FixtureCase>,
}

/// Failure to load a fixture set.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

impl FixtureSet {
    /// Load fixture set from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize fixture set to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load fixture set from a file path.
    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| FixtureError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load every `*.json` set in `dir`, sorted by file name.
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>, FixtureError> {
        let io_err = |source| FixtureError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        paths.sort();
        paths.iter().map(|path| Self::from_file(path)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_targets_and_ops() {
        let set = FixtureSet::from_json(
            r#"{
                "version":"v1",
                "family":"file",
                "cases":[
                    {"name":"one","target":{"kind":"file","mode":"w+"},
                     "ops":[{"op":"putc","byte":65},{"op":"seek","offset":0,"whence":"set"},{"op":"getc"}],
                     "expected_output":"putc=65 seek=0 getc=65 close=0"}
                ]
            }"#,
        )
        .unwrap();
        let case = &set.cases[0];
        assert_eq!(
            case.target,
            Target::File {
                mode: "w+".into(),
                initial: String::new(),
                check_contents: false
            }
        );
        assert_eq!(case.ops[0], Op::Putc { byte: 65 });
        assert_eq!(case.ops[2], Op::Getc);
        assert_eq!(case.buffer_capacity, None);
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = FixtureSet::from_json(
            r#"{"version":"v1","family":"file","cases":[
                {"name":"bad","target":{"kind":"file","mode":"r"},"ops":[{"op":"ungetc"}],"expected_output":""}
            ]}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn json_round_trip_preserves_cases() {
        let set = FixtureSet {
            version: "v1".into(),
            family: "process".into(),
            cases: vec![FixtureCase {
                name: "echo".into(),
                description: String::new(),
                target: Target::Process {
                    command: "echo hi".into(),
                    direction: "r".into(),
                },
                ops: vec![Op::Read { size: 1, nmemb: 8 }],
                expected_output: "read=3:hi\\n pclose=0".into(),
                buffer_capacity: Some(2),
            }],
        };
        let back = FixtureSet::from_json(&set.to_json().unwrap()).unwrap();
        assert_eq!(back.cases[0].target, set.cases[0].target);
        assert_eq!(back.cases[0].buffer_capacity, Some(2));
    }
}
