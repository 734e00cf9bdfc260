//! Build driver entry point (spec §4.5 "Build Driver").
//!
//! This is the one function the CLI binary calls. Everything else in this
//! crate exists to be orchestrated from here: resolve a plan, seed the task
//! queue, run the engine to completion, flush the registry, and summarize
//! what happened.

use std::path::PathBuf;

use cbuild_exec_events::EventEmitter;
use cbuild_project::{FileSystem, Project, TargetId};
use cbuild_registry::{Registry, UpdateSet, registry_path};
use cbuild_runner::CommandRunner;
use cbuild_scanner::{ScanArena, scan_dependency_chain};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::observer::LinkObserver;
use crate::plan::BuildPlan;
use crate::task::BuildTask;
use crate::tracker::{CompileStatus, LinkStatus, TargetTracker};

/// How the on-disk registry participates in this build (spec §6 `cache`
/// option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Load the existing registry and use it to skip unchanged files.
    On,
    /// Never consult or write the registry; every selected file rebuilds.
    Off,
    /// Rebuild everything selected, as if the registry were empty, but
    /// still flush a fresh one at the end (spec §9 open question: the
    /// original loads the existing registry and then ignores its contents
    /// for the skip decision; skipping the load entirely is behaviourally
    /// identical here since `UpdateSet::new` only uses it to resolve
    /// `last_info`, which `rebuild_required` already bypasses — see
    /// DESIGN.md).
    Flush,
}

/// Per-target outcome recorded after the build settles, used to build the
/// aggregate [`BuildOutcome`] (spec §8 "end-to-end scenarios").
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: String,
    pub compile_status: CompileStatus,
    pub link_status: LinkStatus,
}

/// Summary returned to the caller once every selected target has settled
/// (spec §4.5 step 11).
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub targets: Vec<TargetOutcome>,
    pub success: bool,
}

impl BuildOutcome {
    fn empty() -> Self {
        Self { targets: Vec::new(), success: true }
    }
}

/// Runs one full build (spec §4.5 steps 1-11).
///
/// `builders_count` is the user-requested worker count (spec §6 `builders`
/// option); it is clamped to `[1, available_parallelism]` and one fewer
/// thread than that is actually spawned, since the calling thread also
/// drains the queue.
#[allow(clippy::too_many_arguments)]
pub fn build_project<E: EventEmitter + Send>(
    project: &Project,
    fs: &dyn FileSystem,
    runner: &dyn CommandRunner,
    selected_targets: &[String],
    cache: CacheMode,
    builders_count: u32,
    link_observer: &dyn LinkObserver,
    events: E,
) -> Result<BuildOutcome, EngineError> {
    if project.targets().is_empty() {
        tracing::info!("project has no targets, nothing to build");
        return Ok(BuildOutcome::empty());
    }

    fs.create_directory(&project.build_root).map_err(|source| EngineError::CreateDirectory {
        path: project.build_root.clone(),
        source,
    })?;
    let out_dir = project.build_root.join("out");
    let object_dir = project.build_root.join("obj");
    fs.create_directory(&out_dir).map_err(|source| EngineError::CreateDirectory {
        path: out_dir.clone(),
        source,
    })?;
    fs.create_directory(&object_dir).map_err(|source| EngineError::CreateDirectory {
        path: object_dir.clone(),
        source,
    })?;

    let registry_enabled = !project.registry_disabled && cache != CacheMode::Off;
    let registry = match cache {
        CacheMode::On if registry_enabled => Registry::load(&registry_path(&project.build_root)),
        _ => Registry::empty(),
    };

    let update_set = UpdateSet::new(project, &registry);
    let plan = BuildPlan::resolve(project, selected_targets)?;

    let trackers: Vec<TargetTracker> = project
        .targets()
        .iter()
        .map(|target| TargetTracker::new(target.file_count(), target.upstream.len()))
        .collect();

    let queue_capacity = cbuild_queue::next_pow2(
        project.targets().len() + project.targets().iter().map(|t| t.file_count()).sum::<usize>(),
    );

    let engine = Engine::new(
        project,
        fs,
        runner,
        &registry,
        &update_set,
        trackers,
        queue_capacity,
        object_dir.clone(),
        out_dir.clone(),
        project.include_dirs.clone(),
        registry_enabled,
        link_observer,
        events,
    );

    let mut arena = ScanArena::new();
    for &target_id in &plan.selected {
        let target = project.target(target_id);
        if target.file_count() == 0 {
            tracing::info!(target = %target.name, "target has no source files, short-circuiting");
            engine.short_circuit_empty_target(target_id);
            continue;
        }

        let target_object_dir = object_dir.join(&target.name);
        fs.create_directory(&target_object_dir).map_err(|source| EngineError::CreateDirectory {
            path: target_object_dir,
            source,
        })?;

        // Spec §4.5 step 7: scan with project *and* target include paths,
        // the file's own directory taking precedence inside the scanner
        // itself (spec §4.2 protocol step 3).
        let scan_include_dirs: Vec<PathBuf> =
            project.include_dirs.iter().chain(target.include_dirs.iter()).cloned().collect();

        for source in &target.sources {
            // Spec §4.5 step 7: "open each source file and submit a Compile
            // task" — a listed source that can't be opened at all is a
            // configuration problem, fatal before any task runs, not a
            // scan-time miss (spec §7 "Configuration error" vs "Scan miss").
            fs.open_file(source).map_err(|source_error| EngineError::OpenSource {
                path: source.clone(),
                source: source_error,
            })?;

            let dependencies_updated = if registry_enabled {
                scan_dependency_chain(&mut arena, fs, &update_set, &registry, &scan_include_dirs, source)
            } else {
                true
            };
            engine.submit(BuildTask::Compile {
                target: target_id,
                source: source.clone(),
                dependencies_updated,
            });
        }
    }

    for &target_id in &plan.skipped {
        update_set.preserve_skipped_target(target_id, &registry);
    }

    run_workers(&engine, builders_count);

    if registry_enabled {
        update_set.flush(&registry_path(&project.build_root))?;
    }

    Ok(summarize(project, &engine, &plan.selected))
}

/// Spawns `clamp(builders_count, 1, available_parallelism) - 1` extra worker
/// threads and drains the queue on the calling thread too, until
/// `submitted == completed` (spec §4.5 step 9, §5 "thread pool").
fn run_workers<E: EventEmitter + Send>(engine: &Engine<'_, E>, builders_count: u32) {
    let available = num_cpus::get().max(1) as u32;
    let count = builders_count.clamp(1, available);
    let extra_workers = count.saturating_sub(1);

    std::thread::scope(|scope| {
        for _ in 0..extra_workers {
            scope.spawn(|| {
                while engine.has_unfinished_tasks() {
                    if !engine.execute_one() {
                        std::thread::yield_now();
                    }
                }
            });
        }

        while engine.has_unfinished_tasks() {
            if !engine.execute_one() {
                std::thread::yield_now();
            }
        }
    });
}

fn summarize<E: EventEmitter + Send>(project: &Project, engine: &Engine<'_, E>, selected: &[TargetId]) -> BuildOutcome {
    let mut targets = Vec::with_capacity(selected.len());
    let mut success = true;
    for &target_id in selected {
        let tracker = &engine.trackers[target_id.index()];
        let compile_status = tracker.compile_status();
        let link_status = tracker.link_status();
        if compile_status == CompileStatus::Failed || link_status == LinkStatus::Failed {
            success = false;
        }
        targets.push(TargetOutcome {
            target: project.target(target_id).name.clone(),
            compile_status,
            link_status,
        });
    }
    BuildOutcome { targets, success }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbuild_exec_events::NoopEventEmitter;
    use cbuild_project::{ProjectBuilder, StdFileSystem, TargetKind, TargetSpec, Toolchain, ToolchainKind};
    use cbuild_runner::DryRunCommandRunner;
    use std::path::Path;

    fn toolchain() -> Toolchain {
        let existing = std::env::current_exe().unwrap();
        Toolchain::new(ToolchainKind::Gcc, &existing, &existing, &existing, &existing)
    }

    fn write_source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"int main() { return 0; }\n").unwrap();
        path
    }

    #[test]
    fn empty_project_builds_trivially() {
        let project = ProjectBuilder::new("/tmp/cbuild-empty", toolchain()).build().unwrap();
        let fs = StdFileSystem;
        let runner = DryRunCommandRunner::new();
        let outcome = build_project(
            &project,
            &fs,
            &runner,
            &[],
            CacheMode::On,
            4,
            &crate::observer::NoopLinkObserver,
            NoopEventEmitter,
        )
        .unwrap();
        assert!(outcome.success);
        assert!(outcome.targets.is_empty());
    }

    #[test]
    fn single_executable_links_successfully() {
        let dir = tempfile::tempdir().unwrap();
        let main = write_source(dir.path(), "main.cpp");
        let build_root = dir.path().join("build");

        let project = ProjectBuilder::new(&build_root, toolchain())
            .with_target(TargetSpec::new("app", TargetKind::Executable).with_sources(vec![main]))
            .build()
            .unwrap();

        let fs = StdFileSystem;
        let runner = DryRunCommandRunner::new();
        let outcome = build_project(
            &project,
            &fs,
            &runner,
            &[],
            CacheMode::On,
            4,
            &crate::observer::NoopLinkObserver,
            NoopEventEmitter,
        )
        .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.targets.len(), 1);
        assert_eq!(outcome.targets[0].compile_status, CompileStatus::Success);
        assert_eq!(outcome.targets[0].link_status, LinkStatus::Success);
        assert_eq!(runner.logged_invocations().len(), 2);
    }

    #[test]
    fn missing_source_file_fails_the_build_before_any_task_runs() {
        let dir = tempfile::tempdir().unwrap();
        let build_root = dir.path().join("build");
        let missing = dir.path().join("does-not-exist.cpp");

        let project = ProjectBuilder::new(&build_root, toolchain())
            .with_target(TargetSpec::new("app", TargetKind::Executable).with_sources(vec![missing]))
            .build()
            .unwrap();

        let fs = StdFileSystem;
        let runner = DryRunCommandRunner::new();
        let result = build_project(
            &project,
            &fs,
            &runner,
            &[],
            CacheMode::On,
            4,
            &crate::observer::NoopLinkObserver,
            NoopEventEmitter,
        );

        assert!(matches!(result, Err(EngineError::OpenSource { .. })));
        assert!(runner.logged_invocations().is_empty());
    }

    #[test]
    fn zero_file_target_short_circuits_and_downstream_still_links() {
        let dir = tempfile::tempdir().unwrap();
        let main = write_source(dir.path(), "main.cpp");
        let build_root = dir.path().join("build");

        let project = ProjectBuilder::new(&build_root, toolchain())
            .with_target(TargetSpec::new("headers_only", TargetKind::StaticLibrary))
            .with_target(
                TargetSpec::new("app", TargetKind::Executable)
                    .with_sources(vec![main])
                    .with_upstream(vec!["headers_only".to_string()]),
            )
            .build()
            .unwrap();

        let fs = StdFileSystem;
        let runner = DryRunCommandRunner::new();
        let outcome = build_project(
            &project,
            &fs,
            &runner,
            &[],
            CacheMode::On,
            2,
            &crate::observer::NoopLinkObserver,
            NoopEventEmitter,
        )
        .unwrap();

        assert!(outcome.success);
        let headers_only = outcome.targets.iter().find(|t| t.target == "headers_only").unwrap();
        assert_eq!(headers_only.compile_status, CompileStatus::Success);
        assert_eq!(headers_only.link_status, LinkStatus::Success);
        let app = outcome.targets.iter().find(|t| t.target == "app").unwrap();
        assert_eq!(app.link_status, LinkStatus::Success);
    }

    #[test]
    fn selecting_a_subset_still_preserves_unselected_registry_entries() {
        let dir = tempfile::tempdir().unwrap();
        let main_a = write_source(dir.path(), "a.cpp");
        let main_b = write_source(dir.path(), "b.cpp");
        let build_root = dir.path().join("build");

        let project = ProjectBuilder::new(&build_root, toolchain())
            .with_target(TargetSpec::new("liba", TargetKind::StaticLibrary).with_sources(vec![main_a]))
            .with_target(TargetSpec::new("libb", TargetKind::StaticLibrary).with_sources(vec![main_b]))
            .build()
            .unwrap();

        let fs = StdFileSystem;
        let runner = DryRunCommandRunner::new();

        // First build covers both targets, populating the registry.
        let outcome = build_project(
            &project,
            &fs,
            &runner,
            &[],
            CacheMode::On,
            2,
            &crate::observer::NoopLinkObserver,
            NoopEventEmitter,
        )
        .unwrap();
        assert_eq!(outcome.targets.len(), 2);

        // Second build only selects liba; libb's registry segment must
        // survive untouched rather than be dropped from the flushed file.
        let outcome = build_project(
            &project,
            &fs,
            &runner,
            &["liba".to_string()],
            CacheMode::On,
            2,
            &crate::observer::NoopLinkObserver,
            NoopEventEmitter,
        )
        .unwrap();
        assert_eq!(outcome.targets.len(), 1);
        assert_eq!(outcome.targets[0].target, "liba");

        let reloaded = cbuild_registry::Registry::load(&cbuild_registry::registry_path(&build_root));
        assert_eq!(reloaded.target_count(), 2);
        assert!(reloaded.find_target("libb").is_some());
    }

    /// A runner that fails any invocation whose object output path contains
    /// `fail_needle`, and succeeds everything else. Used to reproduce spec
    /// §8 scenario S5 (a compile failure must propagate to downstream
    /// targets instead of leaving them stuck waiting forever).
    struct FailingCommandRunner {
        fail_needle: &'static str,
        invocations: std::sync::Mutex<Vec<cbuild_runner::CommandInvocation>>,
    }

    impl FailingCommandRunner {
        fn new(fail_needle: &'static str) -> Self {
            Self { fail_needle, invocations: std::sync::Mutex::new(Vec::new()) }
        }
    }

    impl CommandRunner for FailingCommandRunner {
        fn run(&self, invocation: &cbuild_runner::CommandInvocation) -> anyhow::Result<cbuild_runner::CommandOutput> {
            self.invocations.lock().unwrap().push(invocation.clone());
            let command = invocation.display_command();
            let success = !command.contains(self.fail_needle);
            Ok(cbuild_runner::CommandOutput {
                status: cbuild_runner::CommandStatus::new(success, Some(if success { 0 } else { 1 })),
                stdout: String::new(),
                stderr: if success { String::new() } else { "error: synthetic failure".to_string() },
            })
        }
    }

    #[test]
    fn compile_failure_propagates_to_downstream_targets() {
        let dir = tempfile::tempdir().unwrap();
        let lib_src = write_source(dir.path(), "lib.cpp");
        let bin_src = write_source(dir.path(), "bin.cpp");
        let build_root = dir.path().join("build");

        let project = ProjectBuilder::new(&build_root, toolchain())
            .with_target(TargetSpec::new("lib1", TargetKind::StaticLibrary).with_sources(vec![lib_src]))
            .with_target(
                TargetSpec::new("bin1", TargetKind::Executable)
                    .with_sources(vec![bin_src])
                    .with_upstream(vec!["lib1".to_string()]),
            )
            .build()
            .unwrap();

        let fs = StdFileSystem;
        let runner = FailingCommandRunner::new("lib.cpp");
        let outcome = build_project(
            &project,
            &fs,
            &runner,
            &[],
            CacheMode::On,
            2,
            &crate::observer::NoopLinkObserver,
            NoopEventEmitter,
        )
        .unwrap();

        assert!(!outcome.success);
        let lib1 = outcome.targets.iter().find(|t| t.target == "lib1").unwrap();
        assert_eq!(lib1.compile_status, CompileStatus::Failed);
        assert_eq!(lib1.link_status, LinkStatus::Failed);

        // The crux of the regression: bin1 must settle, not hang in Waiting,
        // because nothing ever ran its Link task before this fix.
        let bin1 = outcome.targets.iter().find(|t| t.target == "bin1").unwrap();
        assert_eq!(bin1.link_status, LinkStatus::Failed);

        // bin1's own compile succeeded; only linking failed due to upstream.
        assert_eq!(bin1.compile_status, CompileStatus::Success);

        // Only lib1's (failing) compile and bin1's (succeeding) compile ran;
        // no link command was ever attempted for either target.
        assert_eq!(runner.invocations.lock().unwrap().len(), 2);
    }
}
