//! `cbuild build` / `cbuild update` — drives [`cbuild_engine::build_project`]
//! against the minimal built-in project (spec §4.5, §6 `build` options
//! `builders`, `cache`, `targets`).

use std::process::ExitCode;

use anyhow::Result;
use cbuild_project::StdFileSystem;
use cbuild_runner::ProcessCommandRunner;

use super::project::{discover_default_project, ensure_source_dir_exists, resolve_project_root};
use super::toolchain::locate_toolchain;
use super::{BuildArgs, Cli};

#[cfg(feature = "exec-events")]
type Emitter = cbuild_exec_events::TracingEventEmitter;
#[cfg(not(feature = "exec-events"))]
type Emitter = cbuild_exec_events::NoopEventEmitter;

#[cfg(feature = "exec-events")]
fn new_runner() -> cbuild_runner::EventfulCommandRunner<ProcessCommandRunner, Emitter> {
    cbuild_runner::EventfulCommandRunner::new(ProcessCommandRunner::new(), Emitter::default())
}
#[cfg(not(feature = "exec-events"))]
fn new_runner() -> ProcessCommandRunner {
    ProcessCommandRunner::new()
}

pub fn run(args: &Cli, build_args: &BuildArgs) -> Result<ExitCode> {
    run_with_cache(args, build_args, build_args.cache.into())
}

/// `update` bypasses the registry's skip decision for this run (as if
/// `cache=flush` were passed) but still flushes a fresh registry afterward
/// — a full, unconditional rebuild (spec §6 `update` subcommand).
pub fn run_update(args: &Cli, build_args: &BuildArgs) -> Result<ExitCode> {
    run_with_cache(args, build_args, cbuild_engine::CacheMode::Flush)
}

fn run_with_cache(args: &Cli, build_args: &BuildArgs, cache: cbuild_engine::CacheMode) -> Result<ExitCode> {
    let project_root = resolve_project_root(&args.project);
    ensure_source_dir_exists(&project_root)?;
    let toolchain = locate_toolchain()?;
    let rebuild_required = cache == cbuild_engine::CacheMode::Flush;
    let project = discover_default_project(&project_root, toolchain, rebuild_required)?;

    let fs = StdFileSystem;
    let runner = new_runner();
    let observer = cbuild_engine::NoopLinkObserver;

    let outcome = cbuild_engine::build_project(
        &project,
        &fs,
        &runner,
        &build_args.targets,
        cache,
        build_args.builders,
        &observer,
        Emitter::default(),
    )?;

    for target in &outcome.targets {
        println!("{:<16} compile={:?} link={:?}", target.target, target.compile_status, target.link_status);
    }

    if outcome.success { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}
