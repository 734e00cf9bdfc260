use anyhow::{Context, Result};
use std::path::PathBuf;

#[cfg(feature = "serde-errors")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "dry-run")]
use std::sync::Mutex;
#[cfg(feature = "exec-events")]
use std::sync::{
    Mutex as StdMutex,
    atomic::{AtomicU64, Ordering},
};

#[cfg(feature = "exec-events")]
use cbuild_exec_events::{
    BuildEvent, CommandExecutionItem, CommandExecutionStatus, EventEmitter, ItemCompletedEvent,
    ItemStartedEvent, ThreadItem, ThreadItemDetails,
};

/// A fully assembled compiler, archiver, or linker invocation.
///
/// `cbuild-engine` builds one of these per compile or link task from the
/// `Toolchain` plus project/target flags; the runner only knows how to spawn
/// it and capture its output.
#[cfg_attr(feature = "serde-errors", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    /// Absolute path to the program to execute (compiler, linker, archiver).
    pub program: PathBuf,
    /// Arguments passed verbatim, in order.
    pub args: Vec<String>,
    /// Directory the subprocess is spawned in.
    pub working_dir: PathBuf,
}

impl CommandInvocation {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Render the invocation as a single human-readable command line, used
    /// in warning logs when a compile or link step fails (§7).
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Exit status of a completed command invocation.
#[cfg_attr(feature = "serde-errors", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    success: bool,
    code: Option<i32>,
}

impl CommandStatus {
    pub fn new(success: bool, code: Option<i32>) -> Self {
        Self { success, code }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<std::process::ExitStatus> for CommandStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Captured output of a completed command invocation.
#[cfg_attr(feature = "serde-errors", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Combined stdout+stderr, used when logging a failing command (§7).
    pub fn combined_output(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else if self.stdout.trim().is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// The sole collaborator interface the engine needs to run a compiler,
/// archiver, or linker subprocess (spec §6 `CommandRunner`).
///
/// A spawn failure (program missing, permission denied, ...) is returned as
/// `Err`; a non-zero exit is a normal `Ok(CommandOutput)` whose `status` is
/// not successful — the caller (the compile/link handler) decides what that
/// means for the target.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput>;
}

/// Executes commands by spawning the given program directly via
/// [`std::process::Command`] and blocking until it exits. This is the only
/// suspension point besides the task queue's wait (spec §5).
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandRunner;

impl ProcessCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        let output = std::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .output()
            .with_context(|| format!("failed to spawn `{}`", invocation.display_command()))?;

        Ok(CommandOutput {
            status: CommandStatus::from(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Records every invocation instead of spawning it; used by `cache=flush`
/// smoke tests and by `cbuild-engine`'s own test suite to assert which
/// commands a given build would have run.
#[cfg(feature = "dry-run")]
#[derive(Clone, Default)]
pub struct DryRunCommandRunner {
    log: std::sync::Arc<Mutex<Vec<CommandInvocation>>>,
}

#[cfg(feature = "dry-run")]
impl DryRunCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_invocations(&self) -> Vec<CommandInvocation> {
        match self.log.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(feature = "dry-run")]
impl CommandRunner for DryRunCommandRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        let mut guard = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(invocation.clone());
        Ok(CommandOutput {
            status: CommandStatus::new(true, Some(0)),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Wraps another [`CommandRunner`] and emits structured
/// [`cbuild_exec_events`] telemetry around each invocation.
#[cfg(feature = "exec-events")]
pub struct EventfulCommandRunner<R, T> {
    inner: R,
    emitter: StdMutex<T>,
    counter: AtomicU64,
}

#[cfg(feature = "exec-events")]
impl<R, T> EventfulCommandRunner<R, T>
where
    T: EventEmitter,
{
    pub fn new(inner: R, emitter: T) -> Self {
        Self {
            inner,
            emitter: StdMutex::new(emitter),
            counter: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> String {
        format!("cmd-{}", self.counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn emit(&self, event: BuildEvent) {
        if let Ok(mut emitter) = self.emitter.lock() {
            EventEmitter::emit(&mut *emitter, &event);
        }
    }
}

#[cfg(feature = "exec-events")]
impl<R, T> CommandRunner for EventfulCommandRunner<R, T>
where
    R: CommandRunner,
    T: EventEmitter + Send,
{
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput> {
        let id = self.next_id();
        self.emit(BuildEvent::ItemStarted(ItemStartedEvent {
            item: ThreadItem {
                id: id.clone(),
                details: ThreadItemDetails::CommandExecution(CommandExecutionItem {
                    command: invocation.display_command(),
                    aggregated_output: String::new(),
                    exit_code: None,
                    status: CommandExecutionStatus::InProgress,
                }),
            },
        }));

        let result = self.inner.run(invocation);
        let (status, exit_code, output) = match &result {
            Ok(output) if output.status.success() => (
                CommandExecutionStatus::Completed,
                output.status.code(),
                output.combined_output(),
            ),
            Ok(output) => (
                CommandExecutionStatus::Failed,
                output.status.code(),
                output.combined_output(),
            ),
            Err(err) => (CommandExecutionStatus::Failed, None, err.to_string()),
        };

        self.emit(BuildEvent::ItemCompleted(ItemCompletedEvent {
            item: ThreadItem {
                id,
                details: ThreadItemDetails::CommandExecution(CommandExecutionItem {
                    command: invocation.display_command(),
                    aggregated_output: output,
                    exit_code,
                    status,
                }),
            },
        }));

        result
    }
}
