//! Task engine and target state machine (spec §4.4).
//!
//! One [`Engine`] is built per build and shared, unmutated by reference,
//! across the main thread and every worker thread via `std::thread::scope`
//! (spec §5 "parallel, shared-memory threads"). Everything a handler
//! touches concurrently lives behind an atomic ([`TargetTracker`]) or a
//! single-writer-per-slot claim ([`UpdateSet`]); the only lock is the one
//! guarding the event emitter.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use cbuild_exec_events::{
    BuildEvent, EventEmitter, LinkEventOutcome, TargetCompiledEvent, TargetLinkedEvent,
    TargetSkippedEvent,
};
use cbuild_project::{FileSystem, Project, TargetId};
use cbuild_queue::Queue;
use cbuild_registry::{Registry, UpdateSet};
use cbuild_runner::CommandRunner;

use crate::command::{compile_invocation, link_invocation};
use crate::layout::{object_file_path, output_file_path};
use crate::observer::LinkObserver;
use crate::task::BuildTask;
use crate::tracker::{CompileStatus, LinkOutcome, LinkStatus, TargetTracker, UpstreamStatus};

/// Shared state for one build. Constructed by [`crate::driver::build_project`]
/// and borrowed by every worker; nothing here is ever moved or reallocated
/// once the build starts (spec §5 "Shared-resource policy").
pub struct Engine<'a, E: EventEmitter + Send> {
    pub project: &'a Project,
    pub fs: &'a dyn FileSystem,
    pub runner: &'a dyn CommandRunner,
    pub registry: &'a Registry,
    pub update_set: &'a UpdateSet,
    pub trackers: Vec<TargetTracker>,
    pub queue: Queue<BuildTask>,
    pub object_dir: PathBuf,
    pub out_dir: PathBuf,
    pub project_include_dirs: Vec<PathBuf>,
    pub registry_enabled: bool,
    pub link_observer: &'a dyn LinkObserver,
    submitted: AtomicU64,
    completed: AtomicU64,
    events: Mutex<E>,
}

impl<'a, E: EventEmitter + Send> Engine<'a, E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project: &'a Project,
        fs: &'a dyn FileSystem,
        runner: &'a dyn CommandRunner,
        registry: &'a Registry,
        update_set: &'a UpdateSet,
        trackers: Vec<TargetTracker>,
        queue_capacity: usize,
        object_dir: PathBuf,
        out_dir: PathBuf,
        project_include_dirs: Vec<PathBuf>,
        registry_enabled: bool,
        link_observer: &'a dyn LinkObserver,
        events: E,
    ) -> Self {
        Self {
            project,
            fs,
            runner,
            registry,
            update_set,
            trackers,
            queue: Queue::new(queue_capacity),
            object_dir,
            out_dir,
            project_include_dirs,
            registry_enabled,
            link_observer,
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            events: Mutex::new(events),
        }
    }

    fn emit(&self, event: BuildEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.emit(&event);
        }
    }

    /// Enqueues `task`, recording it against the `submitted` counter (spec
    /// §4.4 "Completion is signalled by `submitted == completed`").
    pub fn submit(&self, task: BuildTask) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        if !self.queue.push(task) {
            tracing::error!("build task queue rejected a push past its sized capacity");
        }
    }

    pub fn has_unfinished_tasks(&self) -> bool {
        self.completed.load(Ordering::Acquire) != self.submitted.load(Ordering::Acquire)
    }

    /// Pulls and dispatches one task. Returns `false` if the queue was
    /// momentarily empty, so callers can yield instead of busy-spinning
    /// (spec §4.4 "Drain" — caller loops on [`Self::has_unfinished_tasks`]).
    pub fn execute_one(&self) -> bool {
        let Some(task) = self.queue.pop() else { return false };
        match task {
            BuildTask::Compile { target, source, dependencies_updated } => {
                self.handle_compile(target, &source, dependencies_updated);
            }
            BuildTask::Link { target } => {
                self.handle_link(target);
            }
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Compile handler for one file of `target` (spec §4.4 "Compile
    /// handler"). On the thread that decrements `files_pending` to zero,
    /// settles `compile_status` and submits this target's Link task.
    fn handle_compile(&self, target_id: TargetId, source: &Path, dependencies_updated: bool) {
        let target = self.project.target(target_id);
        let tracker = &self.trackers[target_id.index()];
        let object_path = object_file_path(&self.object_dir, target, source);

        let file_id = match self.fs.get_file_id(source) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(file = %source.display(), error = %err, "failed to identify source file, forcing rebuild");
                0
            }
        };

        let mut should_rebuild = true;
        if !self.registry_enabled || self.project.rebuild_required || dependencies_updated {
            should_rebuild = true;
        } else if let Some(last_info_index) = self.update_set.last_info(target_id) {
            let previous = &self.registry.targets()[last_info_index];
            if let Some(prior_timestamp) = self.registry.find_file_in_target(previous, file_id) {
                let current_timestamp = self.fs.get_last_update_timestamp(source).unwrap_or(0);
                should_rebuild = current_timestamp != prior_timestamp || !self.fs.check_file_exists(&object_path);
            }
        }

        enum FileOutcome {
            Ignored,
            Success,
            Failed,
        }

        let outcome = if should_rebuild {
            tracing::debug!(target = %target.name, file = %source.display(), "compiling");
            let invocation = compile_invocation(self.project, target, source, &object_path);
            match self.runner.run(&invocation) {
                Ok(output) if output.status.success() => FileOutcome::Success,
                Ok(output) => {
                    tracing::warn!(
                        command = %invocation.display_command(),
                        output = %output.combined_output(),
                        "compile failed"
                    );
                    FileOutcome::Failed
                }
                Err(err) => {
                    tracing::warn!(command = %invocation.display_command(), error = %err, "failed to spawn compiler");
                    FileOutcome::Failed
                }
            }
        } else {
            tracker.increment_skipped();
            FileOutcome::Ignored
        };

        if self.registry_enabled && matches!(outcome, FileOutcome::Success) {
            let timestamp = self.fs.get_last_update_timestamp(source).unwrap_or(0);
            let slot = self.update_set.claim_file_slot(target_id);
            self.update_set.write_file(target_id, slot, file_id, timestamp);
        }

        if matches!(outcome, FileOutcome::Failed) {
            tracker.finish_linking(LinkStatus::Failed);
            tracker.finish_compiling(CompileStatus::Failed);
        }

        let was_last = tracker.decrement_files_pending();
        if !was_last {
            return;
        }

        if tracker.compile_status() == CompileStatus::Failed {
            tracing::warn!(target = %target.name, "target couldn't be linked because of compilation errors");
            self.emit(BuildEvent::TargetCompiled(TargetCompiledEvent {
                target: target.name.clone(),
                compiled: 0,
                skipped: tracker.skipped_counter(),
                failed: true,
            }));
            // No Link task runs for this target, so nothing else will ever
            // propagate its failure downstream. Do it here, on the single
            // thread that observes `files_pending` reach zero, or every
            // downstream tracker's `waiting_on_counter` would never drop to
            // zero (spec §4.4 "downstream trackers will later observe an
            // upstream failure").
            self.settle_link(target_id, LinkOutcome::Failed);
            return;
        }

        let skipped_count = tracker.skipped_counter();
        let mut needs_linking = (skipped_count as usize) < target.file_count();
        if !needs_linking {
            let output_path = output_file_path(&self.out_dir, target);
            needs_linking = !self.fs.check_file_exists(&output_path);
        }
        tracker.set_needs_linking(needs_linking);

        self.emit(BuildEvent::TargetCompiled(TargetCompiledEvent {
            target: target.name.clone(),
            compiled: target.file_count() as u32 - skipped_count,
            skipped: skipped_count,
            failed: false,
        }));

        tracker.finish_compiling(CompileStatus::Success);
        self.submit(BuildTask::Link { target: target_id });
    }

    /// Link handler for `target_id` (spec §4.4 "Link handler").
    fn handle_link(&self, target_id: TargetId) {
        let target = self.project.target(target_id);
        let tracker = &self.trackers[target_id.index()];

        if tracker.compile_status() == CompileStatus::Compiling {
            return;
        }
        if tracker.waiting_on_count() > 0 {
            return;
        }
        if !tracker.begin_linking() {
            return;
        }

        if tracker.compile_status() == CompileStatus::Failed || tracker.upstream_status() == UpstreamStatus::Failed {
            tracker.finish_linking(LinkStatus::Failed);
            self.settle_link(target_id, LinkOutcome::Failed);
            return;
        }

        let needs_linking_effective = tracker.needs_linking() || tracker.upstream_status() == UpstreamStatus::Updated;
        if !needs_linking_effective {
            tracing::debug!(target = %target.name, "link cancelled, not required");
            tracker.finish_linking(LinkStatus::Success);
            self.settle_link(target_id, LinkOutcome::Ignore);
            return;
        }

        tracing::debug!(target = %target.name, "linking target");
        let object_paths: Vec<PathBuf> =
            target.sources.iter().map(|source| object_file_path(&self.object_dir, target, source)).collect();
        let upstream_targets: Vec<_> = target.upstream.iter().map(|id| self.project.target(*id)).collect();
        let invocation = link_invocation(
            self.project,
            target,
            &self.out_dir,
            &object_paths,
            &upstream_targets,
        );

        let outcome = match self.runner.run(&invocation) {
            Ok(output) if output.status.success() => LinkOutcome::Success,
            Ok(output) => {
                tracing::warn!(
                    command = %invocation.display_command(),
                    output = %output.combined_output(),
                    "link failed"
                );
                LinkOutcome::Failed
            }
            Err(err) => {
                tracing::warn!(command = %invocation.display_command(), error = %err, "failed to spawn linker");
                LinkOutcome::Failed
            }
        };

        tracker.finish_linking(if outcome == LinkOutcome::Failed { LinkStatus::Failed } else { LinkStatus::Success });
        self.settle_link(target_id, outcome);
    }

    /// Common tail of the link handler: propagates to downstream trackers,
    /// emits telemetry, and invokes the `on_linked` hook (spec §4.4 steps
    /// 7-8).
    fn settle_link(&self, target_id: TargetId, outcome: LinkOutcome) {
        let target = self.project.target(target_id);
        self.propagate_downstream(target_id, outcome);

        self.emit(BuildEvent::TargetLinked(TargetLinkedEvent {
            target: target.name.clone(),
            outcome: match outcome {
                LinkOutcome::Success => LinkEventOutcome::Success,
                LinkOutcome::Ignore => LinkEventOutcome::Ignored,
                LinkOutcome::Failed => LinkEventOutcome::Failed,
            },
        }));

        self.link_observer.on_linked(&target.name, outcome);
    }

    /// Marks every downstream tracker's `upstream_status` and, for the
    /// tracker whose `waiting_on_counter` this drives to zero, submits its
    /// Link task (spec §4.4 step 7).
    fn propagate_downstream(&self, target_id: TargetId, outcome: LinkOutcome) {
        let downstream = self.project.target(target_id).downstream.clone();
        for downstream_id in downstream {
            let downstream_tracker = &self.trackers[downstream_id.index()];
            downstream_tracker.mark_upstream(outcome);
            if downstream_tracker.decrement_waiting_on() {
                self.submit(BuildTask::Link { target: downstream_id });
            }
        }
    }

    /// Short-circuits a target with zero source files straight to a settled
    /// `Success`/`Ignore` state instead of letting it sit in `Compiling`
    /// forever — the original implementation never transitions such a
    /// tracker out of `Compiling` since no compile task ever decrements its
    /// `files_pending` (spec §4.4 "Initial seeding": "the driver may
    /// short-circuit them to link-submitted with a Success outcome").
    pub fn short_circuit_empty_target(&self, target_id: TargetId) {
        let target = self.project.target(target_id);
        let tracker = &self.trackers[target_id.index()];
        tracker.set_needs_linking(false);
        tracker.finish_compiling(CompileStatus::Success);

        self.emit(BuildEvent::TargetSkipped(TargetSkippedEvent {
            target: target.name.clone(),
            reason: "no source files".to_string(),
        }));

        if tracker.waiting_on_count() == 0 {
            self.submit(BuildTask::Link { target: target_id });
        }
    }
}
