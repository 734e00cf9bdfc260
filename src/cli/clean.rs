//! `cbuild clean` — removes the build root, including the registry and
//! every object/output file (spec §6 `clean` subcommand, listed for
//! reference; full reset is the only sensible reading in the engine's
//! absence of an incremental "clean" concept).

use std::process::ExitCode;

use anyhow::{Context, Result};

use super::Cli;
use super::project::resolve_project_root;

pub fn run(args: &Cli) -> Result<ExitCode> {
    let project_root = resolve_project_root(&args.project);
    let cbuild_dir = project_root.join(".cbuild");

    if !cbuild_dir.exists() {
        tracing::info!(path = %cbuild_dir.display(), "nothing to clean");
        return Ok(ExitCode::SUCCESS);
    }

    std::fs::remove_dir_all(&cbuild_dir)
        .with_context(|| format!("failed to remove {}", cbuild_dir.display()))?;
    tracing::info!(path = %cbuild_dir.display(), "removed build root");
    println!("Removed {}", cbuild_dir.display());
    Ok(ExitCode::SUCCESS)
}
