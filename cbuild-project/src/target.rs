use std::path::PathBuf;

/// Index into a [`crate::Project`]'s target vector. Targets reference each
/// other by ID rather than by pointer (spec §9 "Cross-linked target graph"),
/// which keeps the whole model `Copy`/`Send` and lets trackers be stored in
/// a parallel `Vec` indexed the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(pub u32);

impl TargetId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a [`Target`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    StaticLibrary,
    SharedLibrary,
    Executable,
}

/// A single build target (spec §3).
///
/// `upstream`/`downstream` are the two halves of the dependency graph: a
/// target's `upstream` set must finish linking before its own link step may
/// run; its `downstream` set is notified when it does (§4.4 Link handler
/// step 7).
#[derive(Debug, Clone)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub kind: TargetKind,
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub link_libraries: Vec<String>,
    pub upstream: Vec<TargetId>,
    pub downstream: Vec<TargetId>,
}

impl Target {
    pub fn file_count(&self) -> usize {
        self.sources.len()
    }
}

/// Maximum target-name length enforced at construction (spec §3: "≤32
/// bytes"), matching the registry's fixed-size `name[32]` field (spec §6).
pub const MAX_TARGET_NAME_BYTES: usize = 32;

pub(crate) fn validate_target_name(name: &str) -> Result<(), crate::ProjectError> {
    if name.len() > MAX_TARGET_NAME_BYTES {
        return Err(crate::ProjectError::NameTooLong(name.to_string()));
    }
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !valid {
        return Err(crate::ProjectError::InvalidNameCharacters(name.to_string()));
    }
    Ok(())
}
