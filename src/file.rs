use camino::Utf8PathBuf;

use crate::command::CommandHandle;

/// A lightweight token for a file node in the plan.
///
/// Handles are plain indices into the arena owned by [`Plan`]; they are
/// `Copy` and can be freely passed around and stored while the plan is
/// being built. All queries on a file (path, producer) go through the
/// plan that issued the handle.
///
/// [`Plan`]: crate::Plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub(crate) usize);

/// Whether a file is supplied from outside or produced by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileKind {
    /// Externally supplied; never produced by a command of this graph.
    Data,
    /// Produced by exactly one command of this graph.
    Output,
}

/// The data stored in the plan for each file.
#[derive(Debug)]
pub(crate) struct FileNode {
    /// Workspace-relative, normalized at creation.
    pub(crate) path: Utf8PathBuf,
    pub(crate) kind: FileKind,
    /// Set once, by the command that claims this file as output.
    /// Always `None` for data files.
    pub(crate) producer: Option<CommandHandle>,
}

impl FileNode {
    pub(crate) fn basename(&self) -> &str {
        self.path.file_name().unwrap_or_else(|| self.path.as_str())
    }

    /// A file is consumed as an input when it comes from outside the graph
    /// or is already produced by some other command. A fresh output file
    /// with no producer yet is something the next command will create.
    pub(crate) fn is_input(&self) -> bool {
        self.kind == FileKind::Data || self.producer.is_some()
    }
}
