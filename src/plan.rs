//! The build-graph registry.
//!
//! [`Plan`] owns two arenas, one for files and one for commands, and hands
//! out [`FileHandle`]/[`CommandHandle`] tokens pointing into them. Script
//! code declares files and commands through the factory methods; arguments
//! are classified into inputs and outputs from the state of the file nodes
//! alone, and repeated declarations of the same command collapse onto the
//! first one. When authoring is done, [`Plan::write_plan_file`] serializes
//! the whole graph for the executor.
//!
//! Construction is synchronous and touches no files; the only I/O in this
//! module is the final serialization, and only when asked for.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::mem;

use camino::{Utf8Path, Utf8PathBuf};

use crate::command::{Arg, ArgSpec, CommandHandle, CommandKind, CommandNode, CompareArg, Signature};
use crate::error::PlanError;
use crate::file::{FileHandle, FileKind, FileNode};
use crate::record::{CommandRecord, Record, TaskRecord};
use crate::tag::Tag;

/// Name of the serialized graph file within the workspace root.
pub const PLAN_FILE_NAME: &str = "gantry.jsonl";

/// Which comparison task a pair of files is registered under.
#[derive(Clone, Copy)]
enum Comparison {
    Equal,
    NotEqual,
}

impl Comparison {
    fn task(self) -> &'static str {
        match self {
            Comparison::Equal => "ensure-equal",
            Comparison::NotEqual => "ensure-not-equal",
        }
    }

    /// Joins the two base names into the generated task name.
    fn marker(self) -> &'static str {
        match self {
            Comparison::Equal => "##shouldEqual##",
            Comparison::NotEqual => "##shouldNotEqual##",
        }
    }
}

#[derive(Clone, Copy)]
enum Capture {
    Stdout,
    Stderr,
}

impl Capture {
    fn label(self) -> &'static str {
        match self {
            Capture::Stdout => "stdout",
            Capture::Stderr => "stderr",
        }
    }
}

/// The build-graph registry.
///
/// Files and commands are kept in declaration order; command names are
/// unique, and declaring the same command twice with identical defining
/// arguments returns the first handle instead of a duplicate. See the
/// crate docs for a full authoring example.
pub struct Plan {
    workspace_root: Utf8PathBuf,
    files: Vec<FileNode>,
    files_by_path: HashMap<Utf8PathBuf, FileHandle>,
    commands: Vec<CommandNode>,
    commands_by_name: HashMap<String, CommandHandle>,
}

impl Plan {
    /// Create an empty plan rooted at an absolute workspace directory.
    /// All file paths under that directory are stored relative to it.
    pub fn new(workspace_root: impl AsRef<Utf8Path>) -> Result<Self, PlanError> {
        let workspace_root = workspace_root.as_ref();
        if !workspace_root.is_absolute() {
            return Err(PlanError::WorkspaceNotAbsolute(workspace_root.to_owned()));
        }
        Ok(Self {
            workspace_root: workspace_root.to_owned(),
            files: Vec::new(),
            files_by_path: HashMap::new(),
            commands: Vec::new(),
            commands_by_name: HashMap::new(),
        })
    }

    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Path of the serialized graph file, `<workspace_root>/gantry.jsonl`.
    pub fn plan_file(&self) -> Utf8PathBuf {
        self.workspace_root.join(PLAN_FILE_NAME)
    }

    /// Declare an externally supplied file. Data files are consumed as
    /// inputs by every command that mentions them and can never be
    /// claimed as an output.
    pub fn data_file(&mut self, path: impl AsRef<Utf8Path>) -> Result<FileHandle, PlanError> {
        let path = self.rel_path(path.as_ref());
        self.intern_file(path, FileKind::Data)
    }

    /// Declare a file that some command of this graph will create. Until
    /// a command claims it, passing it as an argument marks it as that
    /// command's output; afterwards it is classified as an input.
    pub fn output_file(&mut self, path: impl AsRef<Utf8Path>) -> Result<FileHandle, PlanError> {
        let path = self.rel_path(path.as_ref());
        self.intern_file(path, FileKind::Output)
    }

    /// Declare a command running an external executable.
    ///
    /// The executable may be a literal path, a file, or another command,
    /// which stands for its single output. Arguments are classified into
    /// inputs and outputs structurally; see the module docs.
    ///
    /// Declaring the same `(name, executable, args)` again returns the
    /// handle of the first declaration. The same name with different
    /// defining arguments is a hard error.
    pub fn custom_command<I, A>(
        &mut self,
        name: &str,
        executable: impl Into<ArgSpec>,
        args: I,
    ) -> Result<CommandHandle, PlanError>
    where
        I: IntoIterator<Item = A>,
        A: Into<ArgSpec>,
    {
        let name = Self::sanitize_name(name);
        let (executable, executable_file) = self.resolve_executable(executable.into())?;
        let args = self.resolve_args(args)?;
        let (mut inputs, outputs) = self.split_args(&args);
        // An executable produced elsewhere must exist before this command
        // runs; the wire format expresses that as an input.
        if let Some(file) = executable_file {
            if self.files[file.0].is_input() && !inputs.contains(&file) {
                inputs.insert(0, file);
            }
        }
        self.add(CommandNode {
            name,
            kind: CommandKind::Custom {
                executable,
                args,
                env: BTreeMap::new(),
                stdout: None,
                stderr: None,
            },
            inputs,
            outputs,
            deps: Vec::new(),
            tags: Vec::new(),
        })
    }

    /// Declare a built-in task of the executor, identified by its task
    /// type string. Argument classification and deduplication work the
    /// same way as for [`Plan::custom_command`].
    pub fn task<I, A>(&mut self, name: &str, task: &str, args: I) -> Result<CommandHandle, PlanError>
    where
        I: IntoIterator<Item = A>,
        A: Into<ArgSpec>,
    {
        let name = Self::sanitize_name(name);
        let args = self.resolve_args(args)?;
        let (inputs, outputs) = self.split_args(&args);
        self.add(CommandNode {
            name,
            kind: CommandKind::Task {
                task: task.to_owned(),
                args,
            },
            inputs,
            outputs,
            deps: Vec::new(),
            tags: Vec::new(),
        })
    }

    /// Declare a `write-file` task producing `path` from the given lines,
    /// and return the produced file.
    pub fn write_file<I, S>(&mut self, path: &str, lines: I) -> Result<FileHandle, PlanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let file = self.output_file(path)?;
        let mut args: Vec<ArgSpec> = vec![ArgSpec::File(file)];
        args.extend(lines.into_iter().map(|line| ArgSpec::Lit(line.into())));
        self.task(path, "write-file", args)?;
        Ok(file)
    }

    /// Register a task checking that two files have equal content. Given
    /// two commands, their output files are compared pairwise; the output
    /// counts must match.
    pub fn ensure_equal(
        &mut self,
        left: impl Into<CompareArg>,
        right: impl Into<CompareArg>,
    ) -> Result<(), PlanError> {
        self.compare(left.into(), right.into(), Comparison::Equal)
    }

    /// Like [`Plan::ensure_equal`], but checks that the contents differ.
    pub fn ensure_not_equal(
        &mut self,
        left: impl Into<CompareArg>,
        right: impl Into<CompareArg>,
    ) -> Result<(), PlanError> {
        self.compare(left.into(), right.into(), Comparison::NotEqual)
    }

    /// The single output file of a command. Errors unless the command has
    /// exactly one output.
    pub fn output(&self, command: CommandHandle) -> Result<FileHandle, PlanError> {
        let node = &self.commands[command.0];
        match node.outputs.as_slice() {
            [single] => Ok(*single),
            outputs => Err(PlanError::SingleOutput {
                name: node.name.clone(),
                count: outputs.len(),
            }),
        }
    }

    pub fn outputs(&self, command: CommandHandle) -> &[FileHandle] {
        &self.commands[command.0].outputs
    }

    pub fn inputs(&self, command: CommandHandle) -> &[FileHandle] {
        &self.commands[command.0].inputs
    }

    pub fn command_name(&self, command: CommandHandle) -> &str {
        &self.commands[command.0].name
    }

    /// The workspace-relative path of a file.
    pub fn file_path(&self, file: FileHandle) -> &Utf8Path {
        &self.files[file.0].path
    }

    /// Add an input file which is not part of the command line. A literal
    /// path declares a data file; idempotent by path.
    pub fn add_input_file(
        &mut self,
        command: CommandHandle,
        file: impl Into<ArgSpec>,
    ) -> Result<FileHandle, PlanError> {
        let handle = match file.into() {
            ArgSpec::Lit(path) => self.data_file(path)?,
            ArgSpec::File(handle) => handle,
            ArgSpec::Command(producer) => self.output(producer)?,
        };
        let node = &mut self.commands[command.0];
        if !node.inputs.contains(&handle) {
            node.inputs.push(handle);
        }
        Ok(handle)
    }

    pub fn add_input_files<I, A>(&mut self, command: CommandHandle, files: I) -> Result<(), PlanError>
    where
        I: IntoIterator<Item = A>,
        A: Into<ArgSpec>,
    {
        for file in files {
            self.add_input_file(command, file)?;
        }
        Ok(())
    }

    /// Add an output file which is not part of the command line. The
    /// command claims the file as its producer; idempotent by path.
    pub fn add_output_file(
        &mut self,
        command: CommandHandle,
        file: impl Into<ArgSpec>,
    ) -> Result<FileHandle, PlanError> {
        let handle = match file.into() {
            ArgSpec::Lit(path) => self.output_file(path)?,
            ArgSpec::File(handle) => handle,
            ArgSpec::Command(producer) => self.output(producer)?,
        };
        self.claim_output(command, handle)?;
        let node = &mut self.commands[command.0];
        if !node.outputs.contains(&handle) {
            node.outputs.push(handle);
        }
        Ok(handle)
    }

    /// Capture the command's standard output into a file, defaulting to
    /// `<name>.stdout.txt`. Capturing again with the same path is a
    /// no-op; a different path is an error.
    pub fn write_stdout_to_file(
        &mut self,
        command: CommandHandle,
        path: Option<&str>,
    ) -> Result<FileHandle, PlanError> {
        self.capture(command, path, Capture::Stdout)
    }

    /// Capture the command's standard error into a file, defaulting to
    /// `<name>.stderr.txt`. Same rules as [`Plan::write_stdout_to_file`].
    pub fn write_stderr_to_file(
        &mut self,
        command: CommandHandle,
        path: Option<&str>,
    ) -> Result<FileHandle, PlanError> {
        self.capture(command, path, Capture::Stderr)
    }

    /// Set an environment variable for a custom command. Variables are
    /// not part of the defining signature, so they may be added after a
    /// deduplicated redeclaration without conflict.
    pub fn add_env(
        &mut self,
        command: CommandHandle,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), PlanError> {
        let node = &mut self.commands[command.0];
        match &mut node.kind {
            CommandKind::Custom { env, .. } => {
                env.insert(key.into(), value.into());
                Ok(())
            }
            CommandKind::Task { .. } => Err(PlanError::NotACustomCommand {
                name: node.name.clone(),
                operation: "add_env",
            }),
        }
    }

    /// Add a sequencing edge: this command runs only after `dependency`.
    /// No data relationship is implied.
    pub fn add_dependency(&mut self, command: CommandHandle, dependency: CommandHandle) {
        let node = &mut self.commands[command.0];
        if !node.deps.contains(&dependency) {
            node.deps.push(dependency);
        }
    }

    pub fn add_dependencies(
        &mut self,
        command: CommandHandle,
        dependencies: impl IntoIterator<Item = CommandHandle>,
    ) {
        for dependency in dependencies {
            self.add_dependency(command, dependency);
        }
    }

    pub fn add_tag(&mut self, command: CommandHandle, tag: Tag) {
        let node = &mut self.commands[command.0];
        if !node.tags.contains(&tag) {
            node.tags.push(tag);
        }
    }

    pub fn add_tags(&mut self, command: CommandHandle, tags: impl IntoIterator<Item = Tag>) {
        for tag in tags {
            self.add_tag(command, tag);
        }
    }

    /// All commands as wire records, in declaration order.
    pub fn records(&self) -> Vec<Record> {
        self.commands.iter().map(|node| self.record(node)).collect()
    }

    /// Render the whole plan as newline-delimited JSON.
    pub fn render_jsonl(&self) -> Result<String, PlanError> {
        let mut out = String::new();
        for record in self.records() {
            out.push_str(&serde_json::to_string(&record)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Serialize the plan to a writer, one JSON record per line.
    pub fn emit_jsonl<W: io::Write>(&self, mut writer: W) -> Result<(), PlanError> {
        for record in self.records() {
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write the serialized graph to [`Plan::plan_file`] and return that
    /// path. This is the sole artifact the executor consumes.
    pub fn write_plan_file(&self) -> Result<Utf8PathBuf, PlanError> {
        let path = self.plan_file();
        let mut writer = io::BufWriter::new(fs::File::create(&path)?);
        self.emit_jsonl(&mut writer)?;
        writer.flush()?;
        tracing::debug!("wrote {} commands to {path}", self.commands.len());
        Ok(path)
    }

    /// Target names may not contain ':', it is reserved as a separator.
    fn sanitize_name(name: &str) -> String {
        name.replace(':', ".")
    }

    /// Paths under the workspace root are stored relative to it; all
    /// other paths pass through unchanged.
    fn rel_path(&self, path: &Utf8Path) -> Utf8PathBuf {
        path.strip_prefix(&self.workspace_root)
            .map(Utf8Path::to_owned)
            .unwrap_or_else(|_| path.to_owned())
    }

    fn intern_file(&mut self, path: Utf8PathBuf, kind: FileKind) -> Result<FileHandle, PlanError> {
        if let Some(&handle) = self.files_by_path.get(&path) {
            if self.files[handle.0].kind != kind {
                return Err(PlanError::FileKindConflict(path));
            }
            return Ok(handle);
        }
        let handle = FileHandle(self.files.len());
        self.files.push(FileNode {
            path: path.clone(),
            kind,
            producer: None,
        });
        self.files_by_path.insert(path, handle);
        Ok(handle)
    }

    fn resolve_arg(&self, spec: ArgSpec) -> Result<Arg, PlanError> {
        Ok(match spec {
            ArgSpec::Lit(value) => Arg::Lit(value),
            ArgSpec::File(handle) => Arg::File(handle),
            ArgSpec::Command(command) => Arg::File(self.output(command)?),
        })
    }

    fn resolve_args<I, A>(&self, args: I) -> Result<Vec<Arg>, PlanError>
    where
        I: IntoIterator<Item = A>,
        A: Into<ArgSpec>,
    {
        args.into_iter()
            .map(|arg| self.resolve_arg(arg.into()))
            .collect()
    }

    /// Resolve the executable field to a path string, plus the file node
    /// backing it when there is one.
    fn resolve_executable(&self, spec: ArgSpec) -> Result<(String, Option<FileHandle>), PlanError> {
        Ok(match spec {
            ArgSpec::Lit(path) => (self.rel_path(Utf8Path::new(&path)).into_string(), None),
            ArgSpec::File(handle) => (self.files[handle.0].path.to_string(), Some(handle)),
            ArgSpec::Command(command) => {
                let handle = self.output(command)?;
                (self.files[handle.0].path.to_string(), Some(handle))
            }
        })
    }

    /// Partition resolved arguments into inputs and outputs. Purely
    /// structural: data files and files produced elsewhere are inputs,
    /// fresh output files are outputs. First-seen order, path-unique.
    fn split_args(&self, args: &[Arg]) -> (Vec<FileHandle>, Vec<FileHandle>) {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for arg in args {
            if let Arg::File(handle) = arg {
                let list = if self.files[handle.0].is_input() {
                    &mut inputs
                } else {
                    &mut outputs
                };
                if !list.contains(handle) {
                    list.push(*handle);
                }
            }
        }
        (inputs, outputs)
    }

    /// Append the command, or collapse it onto an existing declaration
    /// with the same name. Same name with a different defining signature
    /// or a different kind is a hard authoring error.
    fn add(&mut self, node: CommandNode) -> Result<CommandHandle, PlanError> {
        if let Some(&existing) = self.commands_by_name.get(&node.name) {
            let current = &self.commands[existing.0];
            if mem::discriminant(&current.kind) != mem::discriminant(&node.kind) {
                return Err(PlanError::KindMismatch { name: node.name });
            }
            let existing_signature = self.signature(current);
            let added_signature = self.signature(&node);
            if existing_signature != added_signature {
                return Err(PlanError::ConflictingCommand {
                    name: node.name,
                    existing: serde_json::to_string(&existing_signature)?,
                    added: serde_json::to_string(&added_signature)?,
                });
            }
            tracing::debug!("command '{}' already declared, reusing it", node.name);
            return Ok(existing);
        }
        let handle = CommandHandle(self.commands.len());
        for output in &node.outputs {
            self.files[output.0].producer = Some(handle);
        }
        self.commands_by_name.insert(node.name.clone(), handle);
        self.commands.push(node);
        Ok(handle)
    }

    fn signature(&self, node: &CommandNode) -> Signature {
        match &node.kind {
            CommandKind::Custom {
                executable, args, ..
            } => Signature::Custom {
                executable: executable.clone(),
                args: self.render_args(args),
            },
            CommandKind::Task { task, args } => Signature::Task {
                task: task.clone(),
                args: self.render_args(args),
            },
        }
    }

    fn compare(
        &mut self,
        left: CompareArg,
        right: CompareArg,
        check: Comparison,
    ) -> Result<(), PlanError> {
        match (left, right) {
            (CompareArg::Command(left), CompareArg::Command(right)) => {
                let left_outputs = self.commands[left.0].outputs.clone();
                let right_outputs = self.commands[right.0].outputs.clone();
                if left_outputs.len() != right_outputs.len() {
                    return Err(PlanError::CompareArity {
                        left: self.commands[left.0].name.clone(),
                        right: self.commands[right.0].name.clone(),
                        left_outputs: left_outputs.len(),
                        right_outputs: right_outputs.len(),
                    });
                }
                for (left, right) in left_outputs.into_iter().zip(right_outputs) {
                    self.compare_files(left, right, check)?;
                }
                Ok(())
            }
            (left, right) => {
                let left = self.compare_file(left)?;
                let right = self.compare_file(right)?;
                self.compare_files(left, right, check)
            }
        }
    }

    fn compare_file(&self, arg: CompareArg) -> Result<FileHandle, PlanError> {
        match arg {
            CompareArg::File(handle) => Ok(handle),
            CompareArg::Command(command) => self.output(command),
        }
    }

    fn compare_files(
        &mut self,
        left: FileHandle,
        right: FileHandle,
        check: Comparison,
    ) -> Result<(), PlanError> {
        let name = format!(
            "{}{}{}",
            self.files[left.0].basename(),
            check.marker(),
            self.files[right.0].basename(),
        );
        let args = vec![Arg::File(left), Arg::File(right)];
        let (inputs, outputs) = self.split_args(&args);
        self.add(CommandNode {
            name: Self::sanitize_name(&name),
            kind: CommandKind::Task {
                task: check.task().to_owned(),
                args,
            },
            inputs,
            outputs,
            deps: Vec::new(),
            tags: Vec::new(),
        })?;
        Ok(())
    }

    /// Mark `command` as the producer of `file`. Data files and files
    /// produced by another command are rejected.
    fn claim_output(&mut self, command: CommandHandle, file: FileHandle) -> Result<(), PlanError> {
        let node = &self.files[file.0];
        if node.kind == FileKind::Data {
            return Err(PlanError::FileKindConflict(node.path.clone()));
        }
        if let Some(producer) = node.producer {
            if producer != command {
                return Err(PlanError::ProducerConflict {
                    path: node.path.clone(),
                    existing: self.commands[producer.0].name.clone(),
                });
            }
        }
        self.files[file.0].producer = Some(command);
        Ok(())
    }

    fn capture(
        &mut self,
        command: CommandHandle,
        path: Option<&str>,
        stream: Capture,
    ) -> Result<FileHandle, PlanError> {
        let default_path;
        let path = match path {
            Some(path) => path,
            None => {
                default_path = format!(
                    "{}.{}.txt",
                    self.commands[command.0].name,
                    stream.label()
                );
                &default_path
            }
        };
        let file = self.output_file(path)?;
        let (name, current) = {
            let node = &self.commands[command.0];
            let current = match &node.kind {
                CommandKind::Custom { stdout, stderr, .. } => match stream {
                    Capture::Stdout => *stdout,
                    Capture::Stderr => *stderr,
                },
                CommandKind::Task { .. } => {
                    return Err(PlanError::NotACustomCommand {
                        name: node.name.clone(),
                        operation: "output capturing",
                    });
                }
            };
            (node.name.clone(), current)
        };
        if let Some(existing) = current {
            if existing == file {
                return Ok(existing);
            }
            return Err(PlanError::CaptureConflict {
                name,
                stream: stream.label(),
                existing: self.files[existing.0].path.clone(),
                requested: self.files[file.0].path.clone(),
            });
        }
        self.claim_output(command, file)?;
        let node = &mut self.commands[command.0];
        if let CommandKind::Custom { stdout, stderr, .. } = &mut node.kind {
            match stream {
                Capture::Stdout => *stdout = Some(file),
                Capture::Stderr => *stderr = Some(file),
            }
        }
        if !node.outputs.contains(&file) {
            node.outputs.push(file);
        }
        Ok(file)
    }

    fn render_arg(&self, arg: &Arg) -> String {
        match arg {
            Arg::Lit(value) => value.clone(),
            Arg::File(handle) => self.files[handle.0].path.to_string(),
        }
    }

    fn render_args(&self, args: &[Arg]) -> Vec<String> {
        args.iter().map(|arg| self.render_arg(arg)).collect()
    }

    fn render_files(&self, files: &[FileHandle]) -> Vec<String> {
        files
            .iter()
            .map(|handle| self.files[handle.0].path.to_string())
            .collect()
    }

    fn record(&self, node: &CommandNode) -> Record {
        let deps = node
            .deps
            .iter()
            .map(|dep| self.commands[dep.0].name.clone())
            .collect();
        match &node.kind {
            CommandKind::Custom {
                executable,
                args,
                env,
                stdout,
                stderr,
            } => {
                let outputs: Vec<FileHandle> = node
                    .outputs
                    .iter()
                    .copied()
                    .filter(|output| Some(*output) != *stdout && Some(*output) != *stderr)
                    .collect();
                Record::Command(CommandRecord {
                    name: node.name.clone(),
                    executable: executable.clone(),
                    args: self.render_args(args),
                    inputs: self.render_files(&node.inputs),
                    outputs: self.render_files(&outputs),
                    env: env.clone(),
                    stdout: stdout.map(|handle| self.files[handle.0].path.to_string()),
                    stderr: stderr.map(|handle| self.files[handle.0].path.to_string()),
                    deps,
                    tags: node.tags.clone(),
                })
            }
            CommandKind::Task { task, args } => Record::Task(TaskRecord {
                name: node.name.clone(),
                task: task.clone(),
                args: self.render_args(args),
                deps,
                tags: node.tags.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::parse_jsonl;

    fn plan() -> Plan {
        Plan::new("/workspace").unwrap()
    }

    #[test]
    fn workspace_root_must_be_absolute() {
        assert!(matches!(
            Plan::new("relative/dir"),
            Err(PlanError::WorkspaceNotAbsolute(_)),
        ));
    }

    #[test]
    fn paths_inside_the_workspace_are_relativized() {
        let mut plan = plan();
        let inside = plan.data_file("/workspace/data/a.csv").unwrap();
        let outside = plan.data_file("/elsewhere/b.csv").unwrap();
        let relative = plan.data_file("data/c.csv").unwrap();
        assert_eq!(plan.file_path(inside), "data/a.csv");
        assert_eq!(plan.file_path(outside), "/elsewhere/b.csv");
        assert_eq!(plan.file_path(relative), "data/c.csv");
    }

    #[test]
    fn files_are_interned_by_path() {
        let mut plan = plan();
        let first = plan.data_file("a.csv").unwrap();
        let second = plan.data_file("/workspace/a.csv").unwrap();
        assert_eq!(first, second);
        assert!(matches!(
            plan.output_file("a.csv"),
            Err(PlanError::FileKindConflict(_)),
        ));
    }

    #[test]
    fn arguments_split_into_inputs_and_outputs() {
        let mut plan = plan();
        let data = plan.data_file("a.csv").unwrap();
        let out = plan.output_file("b.csv").unwrap();
        let cmd = plan
            .custom_command("filter", "bin/filter", [data.into(), ArgSpec::from(out)])
            .unwrap();
        assert_eq!(plan.inputs(cmd), &[data]);
        assert_eq!(plan.outputs(cmd), &[out]);
        assert_eq!(plan.output(cmd).unwrap(), out);

        // Downstream, the produced file is someone else's output, so it
        // classifies as an input.
        let sum = plan.output_file("sum.csv").unwrap();
        let next = plan
            .task("sum", "csv-concat", [out.into(), ArgSpec::from(sum)])
            .unwrap();
        assert_eq!(plan.inputs(next), &[out]);
        assert_eq!(plan.outputs(next), &[sum]);
    }

    #[test]
    fn data_files_are_never_outputs() {
        let mut plan = plan();
        let data = plan.data_file("a.csv").unwrap();
        let cmd = plan
            .custom_command("read", "bin/reader", [ArgSpec::from(data)])
            .unwrap();
        assert!(plan.outputs(cmd).is_empty());
        assert!(matches!(
            plan.add_output_file(cmd, data),
            Err(PlanError::FileKindConflict(_)),
        ));
    }

    #[test]
    fn declaration_is_idempotent() {
        let mut plan = plan();
        let out = plan.output_file("b.csv").unwrap();
        let first = plan
            .custom_command("gen", "bin/gen", [ArgSpec::from(out)])
            .unwrap();
        let second = plan
            .custom_command("gen", "bin/gen", [ArgSpec::from(out)])
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(plan.records().len(), 1);
    }

    #[test]
    fn conflicting_declaration_is_rejected() {
        let mut plan = plan();
        plan.custom_command("gen", "bin/gen", ["-a"]).unwrap();
        let err = plan.custom_command("gen", "bin/gen", ["-b"]).unwrap_err();
        assert!(matches!(err, PlanError::ConflictingCommand { .. }));
        let err = plan.custom_command("gen", "bin/other", ["-a"]).unwrap_err();
        assert!(matches!(err, PlanError::ConflictingCommand { .. }));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut plan = plan();
        plan.custom_command("check", "bin/check", ["-a"]).unwrap();
        assert!(matches!(
            plan.task("check", "ensure-equal", ["-a"]),
            Err(PlanError::KindMismatch { .. }),
        ));
    }

    #[test]
    fn names_are_sanitized() {
        let mut plan = plan();
        let cmd = plan.custom_command("pkg:gen", "bin/gen", ["-a"]).unwrap();
        assert_eq!(plan.command_name(cmd), "pkg.gen");
    }

    #[test]
    fn single_output_accessor_requires_exactly_one_output() {
        let mut plan = plan();
        let none = plan.custom_command("none", "bin/gen", ["-a"]).unwrap();
        assert!(matches!(
            plan.output(none),
            Err(PlanError::SingleOutput { count: 0, .. }),
        ));

        let one = plan.output_file("a.txt").unwrap();
        let two = plan.output_file("b.txt").unwrap();
        let both = plan
            .custom_command("both", "bin/gen", [one.into(), ArgSpec::from(two)])
            .unwrap();
        assert!(matches!(
            plan.output(both),
            Err(PlanError::SingleOutput { count: 2, .. }),
        ));
    }

    #[test]
    fn command_argument_stands_for_its_single_output() {
        let mut plan = plan();
        let out = plan.output_file("b.csv").unwrap();
        let producer = plan
            .custom_command("gen", "bin/gen", [ArgSpec::from(out)])
            .unwrap();
        let check = plan
            .task("check", "csv-filter", [ArgSpec::from(producer)])
            .unwrap();
        assert_eq!(plan.inputs(check), &[out]);
        match &plan.records()[1] {
            Record::Task(record) => assert_eq!(record.args, vec!["b.csv"]),
            record => panic!("expected a task record, got {record:?}"),
        }
    }

    #[test]
    fn executable_built_by_another_command_becomes_an_input() {
        let mut plan = plan();
        let binary = plan.output_file("tools/gen").unwrap();
        let build = plan
            .custom_command("build", "bin/cc", [ArgSpec::from(binary)])
            .unwrap();
        let out = plan.output_file("b.csv").unwrap();
        let run = plan
            .custom_command("run", build, [ArgSpec::from(out)])
            .unwrap();
        assert_eq!(plan.inputs(run), &[binary]);
        match &plan.records()[1] {
            Record::Command(record) => assert_eq!(record.executable, "tools/gen"),
            record => panic!("expected a command record, got {record:?}"),
        }
    }

    #[test]
    fn ensure_equal_registers_one_comparison_per_file_pair() {
        let mut plan = plan();
        let a = plan.data_file("data/a.csv").unwrap();
        let f = plan.data_file("data/f.csv").unwrap();
        plan.ensure_equal(a, f).unwrap();
        let records = plan.records();
        assert_eq!(records.len(), 1);
        match &records[0] {
            Record::Task(record) => {
                assert_eq!(record.name, "a.csv##shouldEqual##f.csv");
                assert_eq!(record.task, "ensure-equal");
                assert_eq!(record.args, vec!["data/a.csv", "data/f.csv"]);
            }
            record => panic!("expected a task record, got {record:?}"),
        }
    }

    #[test]
    fn ensure_not_equal_commands_expand_pairwise() {
        let mut plan = plan();
        let a1 = plan.output_file("a1.txt").unwrap();
        let a2 = plan.output_file("a2.txt").unwrap();
        let b1 = plan.output_file("b1.txt").unwrap();
        let b2 = plan.output_file("b2.txt").unwrap();
        let left = plan
            .custom_command("left", "bin/gen", [a1.into(), ArgSpec::from(a2)])
            .unwrap();
        let right = plan
            .custom_command("right", "bin/gen2", [b1.into(), ArgSpec::from(b2)])
            .unwrap();
        plan.ensure_not_equal(left, right).unwrap();
        let records = plan.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[2].name(), "a1.txt##shouldNotEqual##b1.txt");
        assert_eq!(records[3].name(), "a2.txt##shouldNotEqual##b2.txt");
    }

    #[test]
    fn comparing_commands_with_different_output_counts_fails() {
        let mut plan = plan();
        let a1 = plan.output_file("a1.txt").unwrap();
        let b1 = plan.output_file("b1.txt").unwrap();
        let b2 = plan.output_file("b2.txt").unwrap();
        let left = plan
            .custom_command("left", "bin/gen", [ArgSpec::from(a1)])
            .unwrap();
        let right = plan
            .custom_command("right", "bin/gen2", [b1.into(), ArgSpec::from(b2)])
            .unwrap();
        assert!(matches!(
            plan.ensure_equal(left, right),
            Err(PlanError::CompareArity {
                left_outputs: 1,
                right_outputs: 2,
                ..
            }),
        ));
    }

    #[test]
    fn stdout_capture_is_excluded_from_outputs() {
        let mut plan = plan();
        let out = plan.output_file("b.csv").unwrap();
        let cmd = plan
            .custom_command("gen", "bin/gen", [ArgSpec::from(out)])
            .unwrap();
        let log = plan.write_stdout_to_file(cmd, None).unwrap();
        assert_eq!(plan.file_path(log), "gen.stdout.txt");
        assert_eq!(plan.outputs(cmd), &[out, log]);

        // Same path again is a no-op, a different path is an error.
        assert_eq!(plan.write_stdout_to_file(cmd, None).unwrap(), log);
        assert!(matches!(
            plan.write_stdout_to_file(cmd, Some("other.txt")),
            Err(PlanError::CaptureConflict { .. }),
        ));

        match &plan.records()[0] {
            Record::Command(record) => {
                assert_eq!(record.outputs, vec!["b.csv"]);
                assert_eq!(record.stdout.as_deref(), Some("gen.stdout.txt"));
                assert_eq!(record.stderr, None);
            }
            record => panic!("expected a command record, got {record:?}"),
        }
    }

    #[test]
    fn captures_require_a_custom_command() {
        let mut plan = plan();
        let task = plan.task("noop", "write-file", ["x"]).unwrap();
        assert!(matches!(
            plan.write_stderr_to_file(task, None),
            Err(PlanError::NotACustomCommand { .. }),
        ));
        assert!(matches!(
            plan.add_env(task, "KEY", "value"),
            Err(PlanError::NotACustomCommand { .. }),
        ));
    }

    #[test]
    fn extra_files_and_env_do_not_break_idempotency() {
        let mut plan = plan();
        let first = plan.custom_command("gen", "bin/gen", ["-a"]).unwrap();
        plan.add_input_file(first, "config.toml").unwrap();
        plan.add_output_file(first, "side-effect.txt").unwrap();
        plan.add_env(first, "LANG", "C").unwrap();

        // The redeclaration carries none of the additions, yet still
        // collapses onto the first declaration.
        let second = plan.custom_command("gen", "bin/gen", ["-a"]).unwrap();
        assert_eq!(first, second);
        assert_eq!(plan.records().len(), 1);
    }

    #[test]
    fn output_claimed_by_two_commands_is_rejected() {
        let mut plan = plan();
        let out = plan.output_file("b.csv").unwrap();
        plan.custom_command("gen", "bin/gen", [ArgSpec::from(out)])
            .unwrap();
        let other = plan.custom_command("other", "bin/other", ["-a"]).unwrap();
        assert!(matches!(
            plan.add_output_file(other, out),
            Err(PlanError::ProducerConflict { .. }),
        ));
    }

    #[test]
    fn deps_and_tags_serialize_when_present() {
        let mut plan = plan();
        let first = plan.custom_command("first", "bin/gen", ["-a"]).unwrap();
        let second = plan.custom_command("second", "bin/gen", ["-b"]).unwrap();
        plan.add_dependency(second, first);
        plan.add_dependency(second, first);
        plan.add_tags(second, [Tag::Quiet, Tag::Custom("team:simulation".into())]);
        plan.add_tag(second, Tag::Quiet);

        match &plan.records()[1] {
            Record::Command(record) => {
                assert_eq!(record.deps, vec!["first"]);
                assert_eq!(
                    record.tags,
                    vec![Tag::Quiet, Tag::Custom("team:simulation".into())],
                );
            }
            record => panic!("expected a command record, got {record:?}"),
        }
    }

    #[test]
    fn write_file_registers_a_task_producing_the_file() {
        let mut plan = plan();
        let file = plan.write_file("b.csv", ["a,b", "1,2"]).unwrap();
        let records = plan.records();
        assert_eq!(records.len(), 1);
        match &records[0] {
            Record::Task(record) => {
                assert_eq!(record.task, "write-file");
                assert_eq!(record.args, vec!["b.csv", "a,b", "1,2"]);
            }
            record => panic!("expected a task record, got {record:?}"),
        }

        // A later task consuming the file sees it as an input.
        let filtered = plan.output_file("filtered.csv").unwrap();
        let filter = plan
            .task("filter", "csv-filter", [file.into(), ArgSpec::from(filtered)])
            .unwrap();
        assert_eq!(plan.inputs(filter), &[file]);
    }

    #[test]
    fn serialized_plan_round_trips() {
        let mut plan = plan();
        let a = plan.data_file("data/a.csv").unwrap();
        let f = plan.data_file("data/f.csv").unwrap();
        plan.ensure_not_equal(a, f).unwrap();
        let b = plan.write_file("b.csv", ["a,b,c", "1,2,3"]).unwrap();
        let out = plan.output_file("concat.csv").unwrap();
        plan.task(
            "concat",
            "csv-concat",
            [a.into(), b.into(), ArgSpec::from(out)],
        )
        .unwrap();

        let text = plan.render_jsonl().unwrap();
        assert_eq!(text.lines().count(), 3);
        let records = parse_jsonl(&text).unwrap();
        assert_eq!(records[0].name(), "a.csv##shouldNotEqual##f.csv");
        assert_eq!(records[1].name(), "b.csv");
        assert_eq!(records[2].name(), "concat");
        match &records[2] {
            Record::Task(record) => {
                assert_eq!(record.args, vec!["data/a.csv", "b.csv", "concat.csv"]);
            }
            record => panic!("expected a task record, got {record:?}"),
        }

        let mut bytes = Vec::new();
        plan.emit_jsonl(&mut bytes).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), text);
    }
}
