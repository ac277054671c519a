use camino::Utf8PathBuf;
use thiserror::Error;

/// Every way graph authoring can fail.
///
/// All of these are authoring mistakes, not runtime faults: the plan holds
/// in-memory state only, so nothing here is retryable. The `Io`/`Json`
/// variants can only surface while emitting the serialized graph.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("workspace root must be an absolute path, got '{0}'")]
    WorkspaceNotAbsolute(Utf8PathBuf),

    #[error("the process-wide plan is not initialized")]
    NotInitialized,

    #[error("the process-wide plan is already initialized")]
    AlreadyInitialized,

    #[error("output() requires exactly one output file, but command '{name}' has {count}")]
    SingleOutput { name: String, count: usize },

    #[error("conflicting command '{name}':\nexisting: {existing}\nto add:   {added}")]
    ConflictingCommand {
        name: String,
        existing: String,
        added: String,
    },

    #[error("command '{name}' is already declared with a different kind")]
    KindMismatch { name: String },

    #[error(
        "commands to compare have a different number of output files: \
         '{left}' has {left_outputs}, '{right}' has {right_outputs}"
    )]
    CompareArity {
        left: String,
        right: String,
        left_outputs: usize,
        right_outputs: usize,
    },

    #[error("file '{0}' is already declared with a different kind")]
    FileKindConflict(Utf8PathBuf),

    #[error("file '{path}' is already produced by command '{existing}'")]
    ProducerConflict {
        path: Utf8PathBuf,
        existing: String,
    },

    #[error("command '{name}' already captures {stream} to '{existing}', cannot redirect to '{requested}'")]
    CaptureConflict {
        name: String,
        stream: &'static str,
        existing: Utf8PathBuf,
        requested: Utf8PathBuf,
    },

    #[error("'{name}' is a task; {operation} applies only to custom commands")]
    NotACustomCommand {
        name: String,
        operation: &'static str,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
