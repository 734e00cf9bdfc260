//! `cbuild init` — scaffolds a new project (spec §8 scenario S1).

use std::process::ExitCode;

use anyhow::{Context, Result};

use super::Cli;
use super::project::{SOURCE_DIR_NAME, resolve_project_root};

const CBUILD_H: &str = "#ifndef CBUILD_H\n\
#define CBUILD_H\n\
\n\
void cbuild_greet(void);\n\
\n\
#endif\n";

const BUILD_CPP: &str = "#include \"cbuild.h\"\n\
#include <cstdio>\n\
\n\
void cbuild_greet(void) {\n\
    std::printf(\"Thank you for trying cbuild!\\n\");\n\
}\n\
\n\
int main(void) {\n\
    cbuild_greet();\n\
    return 0;\n\
}\n";

pub fn run(args: &Cli) -> Result<ExitCode> {
    let project_root = resolve_project_root(&args.project);
    let source_dir = project_root.join(SOURCE_DIR_NAME);

    std::fs::create_dir_all(&source_dir)
        .with_context(|| format!("failed to create {}", source_dir.display()))?;

    let header_path = source_dir.join("cbuild.h");
    let source_path = source_dir.join("build.cpp");

    std::fs::write(&header_path, CBUILD_H)
        .with_context(|| format!("failed to write {}", header_path.display()))?;
    std::fs::write(&source_path, BUILD_CPP)
        .with_context(|| format!("failed to write {}", source_path.display()))?;

    tracing::info!(
        header = %header_path.display(),
        source = %source_path.display(),
        "scaffolded new project"
    );
    println!("Initialized project at {}", source_dir.display());
    Ok(ExitCode::SUCCESS)
}
