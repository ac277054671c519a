//! The wire format handed to the executor.
//!
//! A serialized plan is a newline-delimited sequence of self-contained
//! JSON records, one per command, in declaration order. This file is the
//! sole contract between the authoring side and the executor; nothing
//! else crosses that boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::tag::Tag;

/// One line of the serialized graph file.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Record {
    Command(CommandRecord),
    Task(TaskRecord),
}

impl Record {
    pub fn name(&self) -> &str {
        match self {
            Record::Command(record) => &record.name,
            Record::Task(record) => &record.name,
        }
    }
}

/// An external executable invocation.
///
/// `outputs` excludes the capture files; those serialize under `stdout`
/// and `stderr`. All paths are relative to the workspace root.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRecord {
    pub name: String,
    pub executable: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// A built-in operation of the executor.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TaskRecord {
    pub name: String,
    pub task: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// Parse a serialized plan back into records. Blank lines are skipped.
pub fn parse_jsonl(text: &str) -> Result<Vec<Record>, PlanError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(PlanError::from))
        .collect()
}
