//! `cbuild` - a parallel, incremental build driver for C and C++ projects.
//!
//! Thin binary entry point that delegates to the modular CLI handlers in
//! `src/cli/`. Argument parsing, subcommands, and toolchain *location* all
//! live here and in `cli/`; the actual incremental build algorithm lives in
//! `cbuild-engine`, which this binary only orchestrates.

use std::process::ExitCode;

use clap::Parser;

mod cli;

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.silence);

    let result = match &args.command {
        Commands::Init => cli::init::run(&args),
        Commands::Build(build_args) => cli::build::run(&args, build_args),
        Commands::Clean => cli::clean::run(&args),
        Commands::Update(build_args) => cli::build::run_update(&args, build_args),
        Commands::Version => {
            println!("cbuild {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Help => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

/// Sets up a `tracing` subscriber honoring `RUST_LOG`, falling back to
/// `info` unless `--silence` was passed (in which case only warnings and
/// above are shown).
fn init_tracing(silence: bool) {
    let default_directive = if silence { "warn" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .try_init();
}
