use std::path::{Path, PathBuf};

use crate::error::ProjectError;

/// Tag identifying which compiler family a [`Toolchain`] wraps. Carried
/// through but not interpreted by the engine — argument assembly differences
/// between families live in the CLI/config collaborator (spec §1, out of
/// scope here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainKind {
    Gcc,
    Clang,
    Msvc,
}

/// Four absolute compiler/linker paths plus a kind tag (spec §6 "Project
/// input"). Constructed once by the configuration collaborator and treated
/// as read-only for the rest of a build.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub kind: ToolchainKind,
    pub c_compiler: PathBuf,
    pub cpp_compiler: PathBuf,
    pub linker: PathBuf,
    pub archiver: PathBuf,
}

impl Toolchain {
    pub fn new(
        kind: ToolchainKind,
        c_compiler: impl Into<PathBuf>,
        cpp_compiler: impl Into<PathBuf>,
        linker: impl Into<PathBuf>,
        archiver: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind,
            c_compiler: c_compiler.into(),
            cpp_compiler: cpp_compiler.into(),
            linker: linker.into(),
            archiver: archiver.into(),
        }
    }

    /// Validates every path resolves on disk (spec §4.5 step 1). Any failure
    /// is fatal.
    pub fn validate(&self) -> Result<(), ProjectError> {
        validate_path("c", &self.c_compiler)?;
        validate_path("c++", &self.cpp_compiler)?;
        validate_path("linker", &self.linker)?;
        validate_path("archiver", &self.archiver)?;
        Ok(())
    }
}

fn validate_path(kind: &'static str, path: &Path) -> Result<(), ProjectError> {
    if path.as_os_str().is_empty() || !path.exists() {
        return Err(ProjectError::ToolchainPathMissing {
            kind,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
