//! Build plan construction (spec §4.3 "Build Plan"; grounded in
//! `original_source/code/builder.cpp`'s `prepare_build_plan`).
//!
//! Selecting a subset of targets pulls in every upstream transitively, even
//! ones the caller didn't name directly — a target can't be linked without
//! its dependencies having been built first. Anything left over becomes a
//! "skipped" target whose registry entry must be carried forward untouched
//! (§4.3 step 4) rather than dropped.

use cbuild_project::{Project, TargetId};

use crate::error::EngineError;

/// The result of resolving a (possibly empty) list of target names against
/// a [`Project`]: which targets to actually build, in dependency order, and
/// which ones are being left alone this run.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub selected: Vec<TargetId>,
    pub skipped: Vec<TargetId>,
}

impl BuildPlan {
    /// An empty `selected_targets` list means "build everything" (spec §4.3
    /// step 1).
    pub fn resolve(project: &Project, selected_targets: &[String]) -> Result<Self, EngineError> {
        if selected_targets.is_empty() {
            return Ok(Self {
                selected: (0..project.targets().len() as u32).map(TargetId).collect(),
                skipped: Vec::new(),
            });
        }

        let mut selected = Vec::new();
        for name in selected_targets {
            let id = project
                .find_by_name(name)
                .ok_or_else(|| EngineError::UnknownSelectedTarget(name.clone()))?;
            add_with_upstreams(project, id, &mut selected);
        }

        let skipped = (0..project.targets().len() as u32)
            .map(TargetId)
            .filter(|id| !selected.contains(id))
            .collect();

        Ok(Self { selected, skipped })
    }
}

/// Depth-first, upstream-first insertion so a target never precedes any of
/// its own dependencies in `out` (mirrors the recursive `add_build_target`
/// lambda in the original).
fn add_with_upstreams(project: &Project, id: TargetId, out: &mut Vec<TargetId>) {
    if out.contains(&id) {
        return;
    }
    for upstream in project.target(id).upstream.clone() {
        add_with_upstreams(project, upstream, out);
    }
    if !out.contains(&id) {
        out.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbuild_project::{ProjectBuilder, TargetKind, TargetSpec, Toolchain, ToolchainKind};

    fn toolchain() -> Toolchain {
        let existing = std::env::current_exe().unwrap();
        Toolchain::new(ToolchainKind::Gcc, &existing, &existing, &existing, &existing)
    }

    fn sample_project() -> Project {
        ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new("lib1", TargetKind::StaticLibrary))
            .with_target(TargetSpec::new("lib2", TargetKind::StaticLibrary))
            .with_target(
                TargetSpec::new("bin1", TargetKind::Executable)
                    .with_upstream(vec!["lib1".to_string()]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn empty_selection_builds_everything() {
        let project = sample_project();
        let plan = BuildPlan::resolve(&project, &[]).unwrap();
        assert_eq!(plan.selected.len(), 3);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn selecting_a_target_pulls_in_its_upstream() {
        let project = sample_project();
        let plan = BuildPlan::resolve(&project, &["bin1".to_string()]).unwrap();
        let lib1 = project.find_by_name("lib1").unwrap();
        let bin1 = project.find_by_name("bin1").unwrap();
        let lib2 = project.find_by_name("lib2").unwrap();
        assert!(plan.selected.contains(&lib1));
        assert!(plan.selected.contains(&bin1));
        assert!(!plan.selected.contains(&lib2));
        assert_eq!(plan.skipped, vec![lib2]);
    }

    #[test]
    fn upstream_precedes_dependent_in_selection_order() {
        let project = sample_project();
        let plan = BuildPlan::resolve(&project, &["bin1".to_string()]).unwrap();
        let lib1 = project.find_by_name("lib1").unwrap();
        let bin1 = project.find_by_name("bin1").unwrap();
        let lib1_pos = plan.selected.iter().position(|id| *id == lib1).unwrap();
        let bin1_pos = plan.selected.iter().position(|id| *id == bin1).unwrap();
        assert!(lib1_pos < bin1_pos);
    }

    #[test]
    fn unknown_target_name_is_an_error() {
        let project = sample_project();
        let result = BuildPlan::resolve(&project, &["does-not-exist".to_string()]);
        assert!(matches!(result, Err(EngineError::UnknownSelectedTarget(_))));
    }
}
