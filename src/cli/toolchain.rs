//! Toolchain *location*: resolving bare compiler/linker/archiver names to
//! absolute, `.exists()`-valid paths by walking `PATH` (spec §6 "toolchain
//! (four absolute paths + kind tag)"; spec §9 explicitly places toolchain
//! *location*, as opposed to toolchain *use*, out of scope for the engine
//! — this is the configuration collaborator's job, stood in for here).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cbuild_project::{Toolchain, ToolchainKind};

#[cfg(unix)]
const C_CANDIDATES: &[&str] = &["cc", "clang", "gcc"];
#[cfg(unix)]
const CPP_CANDIDATES: &[&str] = &["c++", "clang++", "g++"];
#[cfg(unix)]
const ARCHIVER_CANDIDATES: &[&str] = &["ar"];

#[cfg(windows)]
const C_CANDIDATES: &[&str] = &["cl.exe", "clang.exe", "gcc.exe"];
#[cfg(windows)]
const CPP_CANDIDATES: &[&str] = &["cl.exe", "clang++.exe", "g++.exe"];
#[cfg(windows)]
const ARCHIVER_CANDIDATES: &[&str] = &["lib.exe", "ar.exe"];

/// Finds a working C/C++ toolchain on `PATH` (spec §4.5 step 1 consumes the
/// result; actually resolving it is out of the engine's scope).
pub fn locate_toolchain() -> Result<Toolchain> {
    let c_compiler = locate_first(C_CANDIDATES).context("no C compiler found on PATH")?;
    let cpp_compiler = locate_first(CPP_CANDIDATES).context("no C++ compiler found on PATH")?;
    let archiver = locate_first(ARCHIVER_CANDIDATES).context("no archiver found on PATH")?;
    // The C++ driver doubles as the linker (standard for gcc/clang/MSVC):
    // it knows how to invoke the platform linker with the right runtime
    // libraries already on the command line.
    let linker = cpp_compiler.clone();

    let kind = toolchain_kind(&c_compiler);
    let toolchain = Toolchain::new(kind, c_compiler, cpp_compiler, linker, archiver);
    toolchain.validate().context("located toolchain failed validation")?;
    Ok(toolchain)
}

fn toolchain_kind(c_compiler: &Path) -> ToolchainKind {
    let name = c_compiler.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if name.contains("clang") {
        ToolchainKind::Clang
    } else if cfg!(windows) && (name.eq_ignore_ascii_case("cl")) {
        ToolchainKind::Msvc
    } else {
        ToolchainKind::Gcc
    }
}

/// Returns the first candidate name found as an executable file in any
/// `PATH` directory, in preference order.
fn locate_first(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|name| locate_on_path(name))
}

fn locate_on_path(program: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(program);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
