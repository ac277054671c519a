use std::collections::BTreeMap;

use serde::Serialize;

use crate::file::FileHandle;
use crate::tag::Tag;

/// A lightweight token for a command node in the plan.
///
/// Like [`FileHandle`], this is a plain `Copy` index into the arena owned
/// by [`Plan`]. Declaration order is the handle order, and also the order
/// in which records are serialized.
///
/// [`Plan`]: crate::Plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHandle(pub(crate) usize);

/// A positional argument after resolution: either a literal string or a
/// reference to a file node.
#[derive(Debug, Clone)]
pub(crate) enum Arg {
    Lit(String),
    File(FileHandle),
}

/// What callers pass to the command factories: a literal string, a file,
/// or another command. A command argument stands for that command's single
/// output file and fails to resolve if the output count differs from one.
#[derive(Debug, Clone)]
pub enum ArgSpec {
    Lit(String),
    File(FileHandle),
    Command(CommandHandle),
}

impl From<&str> for ArgSpec {
    fn from(value: &str) -> Self {
        ArgSpec::Lit(value.to_owned())
    }
}

impl From<String> for ArgSpec {
    fn from(value: String) -> Self {
        ArgSpec::Lit(value)
    }
}

impl From<FileHandle> for ArgSpec {
    fn from(value: FileHandle) -> Self {
        ArgSpec::File(value)
    }
}

impl From<CommandHandle> for ArgSpec {
    fn from(value: CommandHandle) -> Self {
        ArgSpec::Command(value)
    }
}

/// Either side of an [`ensure_equal`]/[`ensure_not_equal`] check.
///
/// [`ensure_equal`]: crate::Plan::ensure_equal
/// [`ensure_not_equal`]: crate::Plan::ensure_not_equal
#[derive(Debug, Clone, Copy)]
pub enum CompareArg {
    File(FileHandle),
    Command(CommandHandle),
}

impl From<FileHandle> for CompareArg {
    fn from(value: FileHandle) -> Self {
        CompareArg::File(value)
    }
}

impl From<CommandHandle> for CompareArg {
    fn from(value: CommandHandle) -> Self {
        CompareArg::Command(value)
    }
}

/// The variant-specific payload of a command node.
#[derive(Debug)]
pub(crate) enum CommandKind {
    /// An external executable invocation.
    Custom {
        /// Resolved to a path string at construction time.
        executable: String,
        args: Vec<Arg>,
        env: BTreeMap<String, String>,
        /// Capture files are also present in `outputs`, but serialized
        /// under their own keys instead of the `outputs` list.
        stdout: Option<FileHandle>,
        stderr: Option<FileHandle>,
    },
    /// A built-in operation of the executor, identified by name.
    Task { task: String, args: Vec<Arg> },
}

/// The data stored in the plan for each command.
#[derive(Debug)]
pub(crate) struct CommandNode {
    /// Unique within the plan, sanitized at construction.
    pub(crate) name: String,
    pub(crate) kind: CommandKind,
    /// Ordered, path-unique.
    pub(crate) inputs: Vec<FileHandle>,
    /// Ordered, path-unique. Every entry has this command as producer.
    pub(crate) outputs: Vec<FileHandle>,
    /// Pure sequencing edges, no data relationship implied.
    pub(crate) deps: Vec<CommandHandle>,
    pub(crate) tags: Vec<Tag>,
}

/// The reduced structural signature used to decide whether two commands
/// sharing a name are the same declaration.
///
/// Inputs, outputs and environment variables are deliberately excluded:
/// they may legitimately grow after construction through the mutators, so
/// only the command-defining fields take part in the comparison. The
/// serialized form of both sides is embedded in the conflict error.
#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum Signature {
    Custom {
        executable: String,
        args: Vec<String>,
    },
    Task {
        task: String,
        args: Vec<String>,
    },
}
