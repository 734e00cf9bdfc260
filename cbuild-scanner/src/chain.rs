//! Recursive, memoized `#include` dependency-chain walk (spec §4.2).
//!
//! A translation unit's own freshness is the compile handler's job (spec
//! §4.4 step 2: comparing the source file's timestamp against the
//! target's file record). This module only answers "has anything this
//! file transitively includes changed since the last build" — the
//! compile handler ORs the two together.

use std::path::{Path, PathBuf};

use cbuild_project::FileSystem;
use cbuild_registry::{ChainStatus, Registry, UpdateSet};

use crate::arena::ScanArena;
use crate::lex::scan_includes;

/// Walks `file`'s include chain and reports whether anything in it
/// changed since the last build. Always walks top-down from `file`
/// itself — unlike headers, a translation unit is never memoized in the
/// dependency table (spec §4.2 "Protocol", step 1 applies to headers
/// reached via `#include`, not to the compile unit that starts the
/// walk).
pub fn scan_dependency_chain(
    arena: &mut ScanArena,
    fs: &dyn FileSystem,
    update_set: &UpdateSet,
    registry: &Registry,
    extra_include_dirs: &[PathBuf],
    file: &Path,
) -> bool {
    let including_dir = fs.get_folder_path(file);
    let Some(bytes) = read_file(fs, file) else {
        // Can't read our own source file during a scan: conservatively
        // treat as changed so the compile handler re-attempts and surfaces
        // the real I/O error there (spec §4.2 "Failure semantics").
        return true;
    };

    let scan = scan_includes(&bytes);
    if scan.aborted {
        return true;
    }

    let mut updated = false;
    for include in &scan.includes {
        let Some(resolved) = resolve_include(arena, fs, &including_dir, extra_include_dirs, include) else {
            // An include that can't be resolved (deleted or renamed header)
            // is itself a change worth rebuilding for (spec §8 boundary
            // behaviour 10: log every directory that was searched).
            warn_unresolved_include(file, include, &including_dir, extra_include_dirs);
            updated = true;
            continue;
        };
        if walk_header(arena, fs, update_set, registry, extra_include_dirs, &resolved) {
            updated = true;
        }
    }
    updated
}

/// Recursive, memoized per-header walk (spec §4.2 "Protocol" steps 1-5).
fn walk_header(
    arena: &mut ScanArena,
    fs: &dyn FileSystem,
    update_set: &UpdateSet,
    registry: &Registry,
    extra_include_dirs: &[PathBuf],
    header: &Path,
) -> bool {
    let Ok(file_id) = fs.get_file_id(header) else {
        return true;
    };

    // Step 1: look for an existing slot. A `Checking` slot means a parent
    // frame on this same walk is already resolving this header — a cycle.
    // Returning `false` here is correct: only `Updated` propagates upward,
    // so a cycle never forces a spurious rebuild, and the frame already in
    // progress still produces the real answer once it unwinds (spec §4.2
    // step 2, testable property #12).
    if let Some(index) = update_set.find_dependency_slot(file_id) {
        return match update_set.chain_status(index) {
            ChainStatus::Updated => true,
            ChainStatus::Unchanged | ChainStatus::Checking | ChainStatus::Unchecked => false,
        };
    }

    let index = match update_set.claim_dependency_slot(file_id) {
        Ok(index) => index,
        Err(err) => {
            tracing::warn!(header = %header.display(), error = %err, "dependency table full, treating as updated");
            return true;
        }
    };

    let timestamp = match fs.get_last_update_timestamp(header) {
        Ok(timestamp) => timestamp,
        Err(_) => {
            update_set.resolve_dependency(index, ChainStatus::Updated, 0);
            return true;
        }
    };

    let previously_unchanged = registry.find_dependency(file_id) == Some(timestamp);

    let including_dir = fs.get_folder_path(header);
    let Some(bytes) = read_file(fs, header) else {
        update_set.resolve_dependency(index, ChainStatus::Updated, timestamp);
        return true;
    };

    let scan = scan_includes(&bytes);
    let mut children_updated = scan.aborted;
    if !scan.aborted {
        for include in &scan.includes {
            let Some(resolved) = resolve_include(arena, fs, &including_dir, extra_include_dirs, include) else {
                warn_unresolved_include(header, include, &including_dir, extra_include_dirs);
                children_updated = true;
                continue;
            };
            if walk_header(arena, fs, update_set, registry, extra_include_dirs, &resolved) {
                children_updated = true;
            }
        }
    }

    let this_updated = !previously_unchanged || children_updated;
    let status = if this_updated {
        ChainStatus::Updated
    } else {
        ChainStatus::Unchanged
    };
    update_set.resolve_dependency(index, status, timestamp);
    this_updated
}

/// Logs every directory searched for an include that resolved nowhere
/// (spec §8 boundary behaviour 10: "produces a log line listing all
/// searched directories").
fn warn_unresolved_include(from: &Path, include: &str, including_dir: &Path, extra_include_dirs: &[PathBuf]) {
    let mut searched: Vec<String> = vec![including_dir.display().to_string()];
    searched.extend(extra_include_dirs.iter().map(|dir| dir.display().to_string()));
    tracing::warn!(
        file = %from.display(),
        include = %include,
        searched_dirs = ?searched,
        "include could not be resolved in any search directory"
    );
}

/// Resolves a quoted include literal against the including file's own
/// directory first, then each of `extra_include_dirs` in order (spec
/// §4.2.1 "Resolution order").
fn resolve_include(
    arena: &mut ScanArena,
    fs: &dyn FileSystem,
    including_dir: &Path,
    extra_include_dirs: &[PathBuf],
    include: &str,
) -> Option<PathBuf> {
    let local = arena.join(including_dir, include);
    if fs.check_file_exists(&local) {
        return Some(local);
    }
    for dir in extra_include_dirs {
        let candidate = arena.join(dir, include);
        if fs.check_file_exists(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn read_file(fs: &dyn FileSystem, path: &Path) -> Option<Vec<u8>> {
    let file = fs.open_file(path).ok()?;
    let mmap = fs.map_file_into_memory(&file).ok()?;
    Some(mmap.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbuild_project::{Project, ProjectBuilder, StdFileSystem, TargetKind, TargetSpec, Toolchain, ToolchainKind};
    use std::path::PathBuf;

    fn toolchain() -> Toolchain {
        let existing = std::env::current_exe().unwrap();
        Toolchain::new(ToolchainKind::Gcc, &existing, &existing, &existing, &existing)
    }

    fn project(root: &Path) -> Project {
        ProjectBuilder::new(root, toolchain())
            .with_target(TargetSpec::new("app", TargetKind::Executable).with_sources(vec![PathBuf::from("main.cpp")]))
            .build()
            .unwrap()
    }

    #[test]
    fn detects_change_in_included_header() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("a.h");
        let main = dir.path().join("main.cpp");
        std::fs::write(&header, b"int a();\n").unwrap();
        std::fs::write(&main, b"#include \"a.h\"\nint main() { return a(); }\n").unwrap();

        let fs = StdFileSystem;
        let project = project(dir.path());
        let registry = Registry::empty();
        let update_set = UpdateSet::new(&project, &registry);
        let mut arena = ScanArena::new();

        let updated = scan_dependency_chain(&mut arena, &fs, &update_set, &registry, &[], &main);
        assert!(updated, "first build against an empty registry is always updated");
    }

    #[test]
    fn memoizes_diamond_include_shared_header() {
        let dir = tempfile::tempdir().unwrap();
        let shared = dir.path().join("shared.h");
        let a = dir.path().join("a.h");
        let b = dir.path().join("b.h");
        let main = dir.path().join("main.cpp");
        std::fs::write(&shared, b"int shared();\n").unwrap();
        std::fs::write(&a, b"#include \"shared.h\"\n").unwrap();
        std::fs::write(&b, b"#include \"shared.h\"\n").unwrap();
        std::fs::write(&main, b"#include \"a.h\"\n#include \"b.h\"\nint main() { return 0; }\n").unwrap();

        let fs = StdFileSystem;
        let project = project(dir.path());
        let registry = Registry::empty();
        let update_set = UpdateSet::new(&project, &registry);
        let mut arena = ScanArena::new();

        // Should not panic or double-claim a slot for shared.h.
        let updated = scan_dependency_chain(&mut arena, &fs, &update_set, &registry, &[], &main);
        assert!(updated);

        let shared_id = fs.get_file_id(&shared).unwrap();
        assert!(update_set.find_dependency_slot(shared_id).is_some());
    }

    #[test]
    fn cyclic_headers_do_not_hang() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.h");
        let b = dir.path().join("b.h");
        let main = dir.path().join("main.cpp");
        std::fs::write(&a, b"#include \"b.h\"\n").unwrap();
        std::fs::write(&b, b"#include \"a.h\"\n").unwrap();
        std::fs::write(&main, b"#include \"a.h\"\nint main() { return 0; }\n").unwrap();

        let fs = StdFileSystem;
        let project = project(dir.path());
        let registry = Registry::empty();
        let update_set = UpdateSet::new(&project, &registry);
        let mut arena = ScanArena::new();

        // Must terminate rather than recurse forever.
        let _ = scan_dependency_chain(&mut arena, &fs, &update_set, &registry, &[], &main);
    }

    #[test]
    fn unresolvable_include_counts_as_updated() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.cpp");
        std::fs::write(&main, b"#include \"missing.h\"\nint main() { return 0; }\n").unwrap();

        let fs = StdFileSystem;
        let project = project(dir.path());
        let registry = Registry::empty();
        let update_set = UpdateSet::new(&project, &registry);
        let mut arena = ScanArena::new();

        let updated = scan_dependency_chain(&mut arena, &fs, &update_set, &registry, &[], &main);
        assert!(updated);
    }
}
