use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ProjectError;
use crate::target::{Target, TargetId, TargetKind, validate_target_name};
use crate::toolchain::Toolchain;

/// Builder-side description of a target, referencing its upstreams by name
/// since [`TargetId`]s don't exist until the whole project is assembled.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub name: String,
    pub kind: TargetKind,
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub link_libraries: Vec<String>,
    pub upstream: Vec<String>,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            sources: Vec::new(),
            include_dirs: Vec::new(),
            compile_flags: Vec::new(),
            link_flags: Vec::new(),
            link_libraries: Vec::new(),
            upstream: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_include_dirs(mut self, include_dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = include_dirs;
        self
    }

    pub fn with_compile_flags(mut self, flags: Vec<String>) -> Self {
        self.compile_flags = flags;
        self
    }

    pub fn with_link_flags(mut self, flags: Vec<String>) -> Self {
        self.link_flags = flags;
        self
    }

    pub fn with_link_libraries(mut self, libraries: Vec<String>) -> Self {
        self.link_libraries = libraries;
        self
    }

    pub fn with_upstream(mut self, upstream: Vec<String>) -> Self {
        self.upstream = upstream;
        self
    }
}

/// An ordered list of targets, a toolchain handle, a build root, and a
/// caching flag (spec §3 "Project (input)"). Populated once and then
/// read-only for the lifetime of a build.
#[derive(Debug, Clone)]
pub struct Project {
    pub build_root: PathBuf,
    pub registry_disabled: bool,
    pub rebuild_required: bool,
    pub toolchain: Toolchain,
    pub include_dirs: Vec<PathBuf>,
    pub compile_flags: Vec<String>,
    pub archive_flags: Vec<String>,
    pub link_flags: Vec<String>,
    targets: Vec<Target>,
    names: HashMap<String, TargetId>,
}

impl Project {
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, id: TargetId) -> &Target {
        &self.targets[id.index()]
    }

    pub fn find_by_name(&self, name: &str) -> Option<TargetId> {
        self.names.get(name).copied()
    }
}

/// Assembles a [`Project`] from [`TargetSpec`]s, enforcing name uniqueness,
/// name shape, upstream resolution, and acyclicity (spec §3).
#[derive(Debug, Clone)]
pub struct ProjectBuilder {
    build_root: PathBuf,
    registry_disabled: bool,
    rebuild_required: bool,
    toolchain: Toolchain,
    include_dirs: Vec<PathBuf>,
    compile_flags: Vec<String>,
    archive_flags: Vec<String>,
    link_flags: Vec<String>,
    targets: Vec<TargetSpec>,
}

impl ProjectBuilder {
    pub fn new(build_root: impl Into<PathBuf>, toolchain: Toolchain) -> Self {
        Self {
            build_root: build_root.into(),
            registry_disabled: false,
            rebuild_required: false,
            toolchain,
            include_dirs: Vec::new(),
            compile_flags: Vec::new(),
            archive_flags: Vec::new(),
            link_flags: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn registry_disabled(mut self, disabled: bool) -> Self {
        self.registry_disabled = disabled;
        self
    }

    pub fn rebuild_required(mut self, required: bool) -> Self {
        self.rebuild_required = required;
        self
    }

    pub fn with_include_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = dirs;
        self
    }

    pub fn with_target(mut self, spec: TargetSpec) -> Self {
        self.targets.push(spec);
        self
    }

    pub fn build(self) -> Result<Project, ProjectError> {
        self.toolchain.validate()?;

        let mut names = HashMap::with_capacity(self.targets.len());
        for (index, spec) in self.targets.iter().enumerate() {
            validate_target_name(&spec.name)?;
            let id = TargetId(index as u32);
            if names.insert(spec.name.clone(), id).is_some() {
                return Err(ProjectError::DuplicateTargetName(spec.name.clone()));
            }
        }

        let mut targets: Vec<Target> = Vec::with_capacity(self.targets.len());
        for (index, spec) in self.targets.iter().enumerate() {
            let mut upstream = Vec::with_capacity(spec.upstream.len());
            for upstream_name in &spec.upstream {
                let upstream_id =
                    *names
                        .get(upstream_name)
                        .ok_or_else(|| ProjectError::UnknownUpstream {
                            target: spec.name.clone(),
                            upstream: upstream_name.clone(),
                        })?;
                upstream.push(upstream_id);
            }
            targets.push(Target {
                id: TargetId(index as u32),
                name: spec.name.clone(),
                kind: spec.kind,
                sources: spec.sources.clone(),
                include_dirs: spec.include_dirs.clone(),
                compile_flags: spec.compile_flags.clone(),
                link_flags: spec.link_flags.clone(),
                link_libraries: spec.link_libraries.clone(),
                upstream,
                downstream: Vec::new(),
            });
        }

        for index in 0..targets.len() {
            let upstream = targets[index].upstream.clone();
            for upstream_id in upstream {
                targets[upstream_id.index()].downstream.push(TargetId(index as u32));
            }
        }

        detect_cycles(&targets)?;

        Ok(Project {
            build_root: self.build_root,
            registry_disabled: self.registry_disabled,
            rebuild_required: self.rebuild_required,
            toolchain: self.toolchain,
            include_dirs: self.include_dirs,
            compile_flags: self.compile_flags,
            archive_flags: self.archive_flags,
            link_flags: self.link_flags,
            targets,
            names,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn detect_cycles(targets: &[Target]) -> Result<(), ProjectError> {
    let mut marks = vec![Mark::Unvisited; targets.len()];
    for start in 0..targets.len() {
        if marks[start] == Mark::Unvisited {
            visit(targets, start, &mut marks)?;
        }
    }
    Ok(())
}

fn visit(targets: &[Target], index: usize, marks: &mut [Mark]) -> Result<(), ProjectError> {
    marks[index] = Mark::InProgress;
    for upstream in &targets[index].upstream {
        match marks[upstream.index()] {
            Mark::InProgress => {
                return Err(ProjectError::CyclicDependency(targets[index].name.clone()));
            }
            Mark::Unvisited => visit(targets, upstream.index(), marks)?,
            Mark::Done => {}
        }
    }
    marks[index] = Mark::Done;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::ToolchainKind;

    fn toolchain() -> Toolchain {
        let existing = std::env::current_exe().unwrap();
        Toolchain::new(ToolchainKind::Gcc, &existing, &existing, &existing, &existing)
    }

    #[test]
    fn builds_linear_dependency_chain() {
        let project = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new("lib1", TargetKind::StaticLibrary))
            .with_target(
                TargetSpec::new("bin1", TargetKind::Executable)
                    .with_upstream(vec!["lib1".to_string()]),
            )
            .build()
            .unwrap();

        let bin1 = project.find_by_name("bin1").unwrap();
        let lib1 = project.find_by_name("lib1").unwrap();
        assert_eq!(project.target(bin1).upstream, vec![lib1]);
        assert_eq!(project.target(lib1).downstream, vec![bin1]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new("lib1", TargetKind::StaticLibrary))
            .with_target(TargetSpec::new("lib1", TargetKind::StaticLibrary))
            .build();
        assert!(matches!(result, Err(ProjectError::DuplicateTargetName(_))));
    }

    #[test]
    fn rejects_unknown_upstream() {
        let result = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(
                TargetSpec::new("bin1", TargetKind::Executable)
                    .with_upstream(vec!["missing".to_string()]),
            )
            .build();
        assert!(matches!(result, Err(ProjectError::UnknownUpstream { .. })));
    }

    #[test]
    fn rejects_cycles() {
        let result = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(
                TargetSpec::new("a", TargetKind::StaticLibrary)
                    .with_upstream(vec!["b".to_string()]),
            )
            .with_target(
                TargetSpec::new("b", TargetKind::StaticLibrary)
                    .with_upstream(vec!["a".to_string()]),
            )
            .build();
        assert!(matches!(result, Err(ProjectError::CyclicDependency(_))));
    }

    #[test]
    fn rejects_overlong_name() {
        let result = ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new("a".repeat(33), TargetKind::StaticLibrary))
            .build();
        assert!(matches!(result, Err(ProjectError::NameTooLong(_))));
    }
}
