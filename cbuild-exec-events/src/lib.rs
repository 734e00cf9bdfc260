//! Structured telemetry events emitted by the build engine.
//!
//! `cbuild-engine` and `cbuild-runner` report progress through an
//! [`EventEmitter`] instead of calling `tracing` directly at every call
//! site; this keeps the event *shape* stable (and serializable) while
//! letting the binary crate decide whether events become log lines, a
//! progress bar, or nothing at all.

use serde::{Deserialize, Serialize};

/// Outcome of a single command execution, independent of what triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandExecutionStatus {
    InProgress,
    Completed,
    Failed,
}

/// A command execution rendered for telemetry consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandExecutionItem {
    pub command: String,
    pub aggregated_output: String,
    pub exit_code: Option<i32>,
    pub status: CommandExecutionStatus,
}

/// Union of the kinds of work item a [`ThreadItem`] can describe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ThreadItemDetails {
    CommandExecution(CommandExecutionItem),
}

/// A single unit of reported work, identified by an opaque id scoped to the
/// emitter that produced it (e.g. `cmd-17`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadItem {
    pub id: String,
    pub details: ThreadItemDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStartedEvent {
    pub item: ThreadItem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCompletedEvent {
    pub item: ThreadItem,
}

/// A target's compile phase finished (every file either compiled or was
/// skipped as unchanged); corresponds to the "last writer" transition in
/// spec §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetCompiledEvent {
    pub target: String,
    pub compiled: u32,
    pub skipped: u32,
    pub failed: bool,
}

/// A target's link (or archive) step finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetLinkedEvent {
    pub target: String,
    pub outcome: LinkEventOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkEventOutcome {
    Success,
    Ignored,
    Failed,
}

/// A target had zero source files and was short-circuited (spec §4.5 step 7,
/// §8 boundary behaviour 9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSkippedEvent {
    pub target: String,
    pub reason: String,
}

/// An `#include` could not be resolved in any search directory (spec §4.2.1,
/// §8 boundary behaviour 10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMissEvent {
    pub including_file: String,
    pub include_path: String,
    pub searched_dirs: Vec<String>,
}

/// Every structured event the build engine can report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuildEvent {
    ItemStarted(ItemStartedEvent),
    ItemCompleted(ItemCompletedEvent),
    TargetCompiled(TargetCompiledEvent),
    TargetLinked(TargetLinkedEvent),
    TargetSkipped(TargetSkippedEvent),
    ScanMiss(ScanMissEvent),
}

/// Sink for [`BuildEvent`]s. Implementations must tolerate being called
/// concurrently from multiple worker threads (the engine holds the emitter
/// behind a mutex, see `cbuild-runner::executor::EventfulCommandRunner`).
pub trait EventEmitter {
    fn emit(&mut self, event: &BuildEvent);
}

/// Forwards every event to `tracing`, matching the density the rest of the
/// corpus logs compile/link activity at.
#[cfg(feature = "telemetry-tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventEmitter;

#[cfg(feature = "telemetry-tracing")]
impl EventEmitter for TracingEventEmitter {
    fn emit(&mut self, event: &BuildEvent) {
        match event {
            BuildEvent::ItemStarted(started) => {
                tracing::debug!(id = %started.item.id, "command started")
            }
            BuildEvent::ItemCompleted(completed) => match &completed.item.details {
                ThreadItemDetails::CommandExecution(item)
                    if item.status == CommandExecutionStatus::Failed =>
                {
                    tracing::warn!(
                        command = %item.command,
                        exit_code = ?item.exit_code,
                        output = %item.aggregated_output,
                        "command failed"
                    )
                }
                ThreadItemDetails::CommandExecution(item) => {
                    tracing::debug!(command = %item.command, "command completed")
                }
            },
            BuildEvent::TargetCompiled(ev) => tracing::info!(
                target = %ev.target,
                compiled = ev.compiled,
                skipped = ev.skipped,
                failed = ev.failed,
                "target compile phase finished"
            ),
            BuildEvent::TargetLinked(ev) => tracing::info!(
                target = %ev.target,
                outcome = ?ev.outcome,
                "target link phase finished"
            ),
            BuildEvent::TargetSkipped(ev) => {
                tracing::info!(target = %ev.target, reason = %ev.reason, "target skipped")
            }
            BuildEvent::ScanMiss(ev) => tracing::warn!(
                including_file = %ev.including_file,
                include_path = %ev.include_path,
                searched_dirs = ?ev.searched_dirs,
                "include could not be resolved"
            ),
        }
    }
}

/// Drops every event; used in tests and when telemetry isn't wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&mut self, _event: &BuildEvent) {}
}

/// Collects every event into memory, for assertions in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingEventEmitter {
    pub events: Vec<BuildEvent>,
}

impl EventEmitter for RecordingEventEmitter {
    fn emit(&mut self, event: &BuildEvent) {
        self.events.push(event.clone());
    }
}
