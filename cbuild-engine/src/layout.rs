//! Object and output file path computation (spec §4.4 compile handler step
//! 1, §4.5 step 5; SPEC_FULL §B "`ObjectPaths` helper").
//!
//! The original implementation computes the object-file path inline at
//! three separate call sites in `target_builder.cpp` (compiling, linking,
//! and the skip-check). Centralizing it here means the compile and link
//! handlers can never compute two different paths for the same file.

use std::path::{Path, PathBuf};

use cbuild_project::{Target, TargetKind};

#[cfg(unix)]
const OBJECT_EXTENSION: &str = "o";
#[cfg(not(unix))]
const OBJECT_EXTENSION: &str = "obj";

#[cfg(unix)]
const EXECUTABLE_EXTENSION: Option<&str> = None;
#[cfg(not(unix))]
const EXECUTABLE_EXTENSION: Option<&str> = Some("exe");

#[cfg(unix)]
const SHARED_LIBRARY_EXTENSION: &str = "so";
#[cfg(not(unix))]
const SHARED_LIBRARY_EXTENSION: &str = "dll";

#[cfg(unix)]
const STATIC_LIBRARY_EXTENSION: &str = "a";
#[cfg(not(unix))]
const STATIC_LIBRARY_EXTENSION: &str = "lib";

/// The object file a given target's compiled `source` produces, under
/// `object_dir/<target-name>/<source-basename>.<o|obj>` (spec §4.4 compile
/// handler step 1: "object file path from target name + source basename").
pub fn object_file_path(object_dir: &Path, target: &Target, source: &Path) -> PathBuf {
    let stem = source.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    object_dir.join(&target.name).join(format!("{stem}.{OBJECT_EXTENSION}"))
}

/// A target's final linked artifact path under `out_dir` (spec §6
/// `get_output_file_path_for_target` equivalent).
pub fn output_file_path(out_dir: &Path, target: &Target) -> PathBuf {
    match target.kind {
        TargetKind::StaticLibrary => out_dir.join(format!("{}.{STATIC_LIBRARY_EXTENSION}", target.name)),
        TargetKind::SharedLibrary => out_dir.join(format!("{}.{SHARED_LIBRARY_EXTENSION}", target.name)),
        TargetKind::Executable => match EXECUTABLE_EXTENSION {
            Some(ext) => out_dir.join(format!("{}.{ext}", target.name)),
            None => out_dir.join(&target.name),
        },
    }
}

/// The artifact path of an upstream library as it would be referenced on a
/// link line (always the upstream's own static/shared extension, never the
/// downstream's kind).
pub fn upstream_artifact_path(out_dir: &Path, upstream: &Target) -> PathBuf {
    output_file_path(out_dir, upstream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbuild_project::TargetId;

    fn target(name: &str, kind: TargetKind) -> Target {
        Target {
            id: TargetId(0),
            name: name.to_string(),
            kind,
            sources: Vec::new(),
            include_dirs: Vec::new(),
            compile_flags: Vec::new(),
            link_flags: Vec::new(),
            link_libraries: Vec::new(),
            upstream: Vec::new(),
            downstream: Vec::new(),
        }
    }

    #[test]
    fn object_path_uses_target_name_and_source_basename() {
        let target = target("lib1", TargetKind::StaticLibrary);
        let path = object_file_path(Path::new("/build/obj"), &target, Path::new("/src/a/foo.cpp"));
        assert_eq!(path, PathBuf::from(format!("/build/obj/lib1/foo.cpp.{OBJECT_EXTENSION}")));
    }

    #[test]
    fn output_path_picks_extension_by_kind() {
        let lib = target("lib1", TargetKind::StaticLibrary);
        let shared = target("dyn1", TargetKind::SharedLibrary);
        let exe = target("bin1", TargetKind::Executable);
        assert_eq!(
            output_file_path(Path::new("/build/out"), &lib),
            PathBuf::from(format!("/build/out/lib1.{STATIC_LIBRARY_EXTENSION}"))
        );
        assert_eq!(
            output_file_path(Path::new("/build/out"), &shared),
            PathBuf::from(format!("/build/out/dyn1.{SHARED_LIBRARY_EXTENSION}"))
        );
        let expected_exe = match EXECUTABLE_EXTENSION {
            Some(ext) => PathBuf::from(format!("/build/out/bin1.{ext}")),
            None => PathBuf::from("/build/out/bin1"),
        };
        assert_eq!(output_file_path(Path::new("/build/out"), &exe), expected_exe);
    }
}
