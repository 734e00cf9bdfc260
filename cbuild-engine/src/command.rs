//! Compiler/archiver/linker command-line assembly (spec §4.4 compile
//! handler step 3, link handler step 6; grounded in
//! `original_source/code/target_builder.cpp`'s `compile_file`/`link_target`).
//!
//! This module only builds [`CommandInvocation`]s; running them is
//! `cbuild-runner`'s job (spec §6 `CommandRunner`, deliberately out of
//! scope for argument assembly beyond what's needed to drive it).

use std::path::{Path, PathBuf};

use cbuild_project::{Project, Target, TargetKind, ToolchainKind};
use cbuild_runner::CommandInvocation;

use crate::layout::{output_file_path, upstream_artifact_path};

fn is_msvc(kind: ToolchainKind) -> bool {
    matches!(kind, ToolchainKind::Msvc)
}

fn is_cpp_source(source: &Path) -> bool {
    matches!(
        source.extension().and_then(|ext| ext.to_str()),
        Some("cpp") | Some("cc") | Some("cxx")
    )
}

/// Assembles a single-file compile invocation: `toolchain + project flags +
/// target flags + include directories + output path` (spec §4.4 step 3).
pub fn compile_invocation(
    project: &Project,
    target: &Target,
    source: &Path,
    object_path: &Path,
) -> CommandInvocation {
    let msvc = is_msvc(project.toolchain.kind);
    let compiler = if is_cpp_source(source) {
        &project.toolchain.cpp_compiler
    } else {
        &project.toolchain.c_compiler
    };

    let mut args = Vec::new();
    args.extend(project.compile_flags.iter().cloned());
    args.extend(target.compile_flags.iter().cloned());

    for dir in project.include_dirs.iter().chain(target.include_dirs.iter()) {
        args.push(include_flag(msvc, dir));
    }

    if msvc {
        args.push("/c".to_string());
        args.push(source.to_string_lossy().into_owned());
        args.push(format!("/Fo{}", object_path.display()));
    } else {
        args.push("-c".to_string());
        args.push(source.to_string_lossy().into_owned());
        args.push("-o".to_string());
        args.push(object_path.to_string_lossy().into_owned());
    }

    CommandInvocation::new(compiler.clone(), project.build_root.clone()).with_args(args)
}

fn include_flag(msvc: bool, dir: &Path) -> String {
    if msvc { format!("/I{}", dir.display()) } else { format!("-I{}", dir.display()) }
}

/// Assembles the archive/link invocation for `target`'s terminal artifact
/// (spec §4.4 step 6; `target_builder.cpp`'s per-kind `link_target` switch).
pub fn link_invocation(
    project: &Project,
    target: &Target,
    out_dir: &Path,
    object_paths: &[PathBuf],
    upstream_targets: &[&Target],
) -> CommandInvocation {
    let msvc = is_msvc(project.toolchain.kind);
    let output_path = output_file_path(out_dir, target);

    match target.kind {
        TargetKind::StaticLibrary => {
            let mut args = Vec::new();
            args.extend(project.archive_flags.iter().cloned());
            args.extend(object_paths.iter().map(|p| p.to_string_lossy().into_owned()));
            push_output_args(&mut args, msvc, &output_path);
            CommandInvocation::new(project.toolchain.archiver.clone(), project.build_root.clone())
                .with_args(args)
        }
        TargetKind::SharedLibrary => {
            let mut args = Vec::new();
            args.push(if msvc { "/DLL".to_string() } else { "-shared".to_string() });
            args.extend(project.link_flags.iter().cloned());
            args.extend(target.link_flags.iter().cloned());
            args.extend(object_paths.iter().map(|p| p.to_string_lossy().into_owned()));
            for upstream in upstream_targets {
                args.push(upstream_artifact_path(out_dir, upstream).to_string_lossy().into_owned());
            }
            args.extend(target.link_libraries.iter().cloned());
            push_output_args(&mut args, msvc, &output_path);
            CommandInvocation::new(project.toolchain.linker.clone(), project.build_root.clone())
                .with_args(args)
        }
        TargetKind::Executable => {
            let mut args = Vec::new();
            args.extend(project.link_flags.iter().cloned());
            args.extend(target.link_flags.iter().cloned());
            args.extend(object_paths.iter().map(|p| p.to_string_lossy().into_owned()));
            for upstream in upstream_targets {
                args.push(upstream_artifact_path(out_dir, upstream).to_string_lossy().into_owned());
            }
            args.extend(target.link_libraries.iter().cloned());
            push_output_args(&mut args, msvc, &output_path);
            CommandInvocation::new(project.toolchain.linker.clone(), project.build_root.clone())
                .with_args(args)
        }
    }
}

/// Appends the output-path arguments for the running toolchain: a single
/// `/OUT:<path>` token for MSVC, or a separate `-o` `<path>` pair otherwise.
fn push_output_args(args: &mut Vec<String>, msvc: bool, path: &Path) {
    if msvc {
        args.push(format!("/OUT:{}", path.display()));
    } else {
        args.push("-o".to_string());
        args.push(path.to_string_lossy().into_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbuild_project::{ProjectBuilder, TargetSpec, Toolchain, ToolchainKind};
    use std::path::PathBuf;

    fn toolchain() -> Toolchain {
        let existing = std::env::current_exe().unwrap();
        Toolchain::new(ToolchainKind::Gcc, &existing, &existing, &existing, &existing)
    }

    #[test]
    fn compile_invocation_picks_cpp_compiler_for_cpp_source() {
        let project = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new("lib1", cbuild_project::TargetKind::StaticLibrary))
            .build()
            .unwrap();
        let target = project.target(project.find_by_name("lib1").unwrap()).clone();
        let invocation = compile_invocation(
            &project,
            &target,
            Path::new("/src/a.cpp"),
            Path::new("/build/obj/lib1/a.cpp.o"),
        );
        assert_eq!(invocation.program, project.toolchain.cpp_compiler);
        assert!(invocation.args.contains(&"-c".to_string()));
    }

    #[test]
    fn compile_invocation_picks_c_compiler_for_c_source() {
        let project = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new("lib1", cbuild_project::TargetKind::StaticLibrary))
            .build()
            .unwrap();
        let target = project.target(project.find_by_name("lib1").unwrap()).clone();
        let invocation = compile_invocation(
            &project,
            &target,
            Path::new("/src/a.c"),
            Path::new("/build/obj/lib1/a.c.o"),
        );
        assert_eq!(invocation.program, project.toolchain.c_compiler);
    }

    #[test]
    fn static_library_link_uses_archiver() {
        let project = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new("lib1", cbuild_project::TargetKind::StaticLibrary))
            .build()
            .unwrap();
        let target = project.target(project.find_by_name("lib1").unwrap()).clone();
        let invocation = link_invocation(
            &project,
            &target,
            Path::new("/build/out"),
            &[PathBuf::from("/build/obj/lib1/a.cpp.o")],
            &[],
        );
        assert_eq!(invocation.program, project.toolchain.archiver);
    }

    #[test]
    fn executable_link_includes_upstream_artifacts() {
        let project = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new("lib1", cbuild_project::TargetKind::StaticLibrary))
            .with_target(
                TargetSpec::new("bin1", cbuild_project::TargetKind::Executable)
                    .with_upstream(vec!["lib1".to_string()]),
            )
            .build()
            .unwrap();
        let lib1 = project.target(project.find_by_name("lib1").unwrap()).clone();
        let bin1 = project.target(project.find_by_name("bin1").unwrap()).clone();
        let invocation = link_invocation(
            &project,
            &bin1,
            Path::new("/build/out"),
            &[PathBuf::from("/build/obj/bin1/main.cpp.o")],
            &[&lib1],
        );
        assert_eq!(invocation.program, project.toolchain.linker);
        let joined = invocation.args.join(" ");
        assert!(joined.contains("lib1"));
    }

    #[test]
    fn target_level_flags_and_include_dirs_and_libraries_are_included() {
        let project = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(
                TargetSpec::new("bin1", cbuild_project::TargetKind::Executable)
                    .with_include_dirs(vec![PathBuf::from("/bin1/include")])
                    .with_compile_flags(vec!["-DBIN1".to_string()])
                    .with_link_flags(vec!["-static".to_string()])
                    .with_link_libraries(vec!["-lm".to_string()]),
            )
            .build()
            .unwrap();
        let bin1 = project.target(project.find_by_name("bin1").unwrap()).clone();

        let compile = compile_invocation(&project, &bin1, Path::new("/src/main.cpp"), Path::new("/build/main.cpp.o"));
        assert!(compile.args.contains(&"-I/bin1/include".to_string()));
        assert!(compile.args.contains(&"-DBIN1".to_string()));

        let link = link_invocation(
            &project,
            &bin1,
            Path::new("/build/out"),
            &[PathBuf::from("/build/obj/bin1/main.cpp.o")],
            &[],
        );
        assert!(link.args.contains(&"-static".to_string()));
        assert!(link.args.contains(&"-lm".to_string()));
    }
}
