//! Minimal built-in project discovery.
//!
//! Real project configuration is loaded from a project-defined shared
//! library (spec §1, §6 "Project input"), which is explicitly out of scope
//! for this engine. In its place this CLI scans `<project>/project` for
//! `.c`/`.cpp` files and assembles a single executable target named
//! `main` — just enough to drive the engine end to end (spec §8 scenario
//! S1: `init` produces `project/build.(cpp|c)` and `project/cbuild.h`;
//! `build` produces `.cbuild/build/out/main.exe`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cbuild_commons::paths::canonicalize_workspace;
use cbuild_project::{Project, ProjectBuilder, TargetKind, TargetSpec, Toolchain};

/// The conventional subdirectory `init` scaffolds sources into and `build`
/// scans for them.
pub const SOURCE_DIR_NAME: &str = "project";

/// The conventional build root, relative to the project root.
pub const BUILD_ROOT_NAME: &str = ".cbuild/build";

/// Resolves `--project` to an absolute directory. Falls back to the
/// path as given if it doesn't exist yet (e.g. before `init` has run).
pub fn resolve_project_root(raw: &Path) -> PathBuf {
    canonicalize_workspace(raw)
}

/// Fails fast, before bothering to locate a toolchain, if `init` hasn't
/// been run yet.
pub fn ensure_source_dir_exists(project_root: &Path) -> Result<()> {
    let source_dir = project_root.join(SOURCE_DIR_NAME);
    if !source_dir.is_dir() {
        bail!(
            "no `{SOURCE_DIR_NAME}` directory found under {} — run `cbuild init` first",
            project_root.display()
        );
    }
    Ok(())
}

/// Scans `<project_root>/project` for `.c`/`.cpp` files and builds a
/// single-executable [`Project`] rooted at `<project_root>/.cbuild/build`.
pub fn discover_default_project(
    project_root: &Path,
    toolchain: Toolchain,
    rebuild_required: bool,
) -> Result<Project> {
    let source_dir = project_root.join(SOURCE_DIR_NAME);
    if !source_dir.is_dir() {
        bail!(
            "no `{SOURCE_DIR_NAME}` directory found under {} — run `cbuild init` first",
            project_root.display()
        );
    }

    let sources = scan_sources(&source_dir)
        .with_context(|| format!("failed to scan {}", source_dir.display()))?;

    let build_root = project_root.join(BUILD_ROOT_NAME);
    let target = TargetSpec::new("main", TargetKind::Executable).with_sources(sources);

    let project = ProjectBuilder::new(build_root, toolchain)
        .with_include_dirs(vec![source_dir])
        .rebuild_required(rebuild_required)
        .with_target(target)
        .build()
        .context("failed to assemble project from discovered sources")?;
    Ok(project)
}

fn scan_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_source =
            matches!(path.extension().and_then(|ext| ext.to_str()), Some("c") | Some("cpp") | Some("cc") | Some("cxx"));
        if is_source {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}
