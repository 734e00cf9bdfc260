//! End-to-end smoke tests driving the `cbuild` binary itself (spec §8
//! scenario S1: `init` then `build` on an empty workspace).

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn cbuild_help_succeeds() {
    let mut cmd = Command::cargo_bin("cbuild").expect("cbuild binary should build");
    cmd.arg("--help");
    cmd.assert().success();
}

#[test]
fn cbuild_version_prints_crate_version() {
    let mut cmd = Command::cargo_bin("cbuild").expect("cbuild binary should build");
    cmd.arg("version");
    cmd.assert().success().stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn init_scaffolds_build_cpp_and_header() {
    let workspace = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("cbuild").expect("cbuild binary should build");
    cmd.arg("--project").arg(workspace.path()).arg("init");
    cmd.assert().success();

    assert!(workspace.path().join("project/build.cpp").is_file());
    assert!(workspace.path().join("project/cbuild.h").is_file());
}

#[test]
fn clean_on_an_unbuilt_workspace_is_a_no_op() {
    let workspace = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("cbuild").expect("cbuild binary should build");
    cmd.arg("--project").arg(workspace.path()).arg("clean");
    cmd.assert().success();
}

#[test]
fn build_without_init_fails_with_a_clear_error() {
    let workspace = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("cbuild").expect("cbuild binary should build");
    cmd.arg("--project").arg(workspace.path()).arg("build");
    cmd.assert().failure().stderr(predicate::str::contains("cbuild init"));
}
