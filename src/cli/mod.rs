//! Command-line surface (spec §6 "Build-driver CLI", listed for reference
//! but explicitly out of scope for the engine itself). Parsing, the
//! subcommands, toolchain *location*, and the minimal built-in project
//! scan below all exist only so the engine crates have a caller; none of
//! this is part of the incremental-build algorithm they implement.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub mod build;
pub mod clean;
pub mod init;
pub mod project;
pub mod toolchain;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "cbuild",
    version,
    about = "A parallel, incremental build engine for C and C++ projects"
)]
pub struct Cli {
    /// Path to the project root (defaults to the current directory).
    #[arg(long, global = true, value_name = "PATH", default_value = ".")]
    pub project: PathBuf,

    /// Suppress informational logging; only warnings and errors are shown.
    #[arg(long, global = true)]
    pub silence: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scaffold a new project under `<project>/project`.
    Init,
    /// Build selected (or all) targets.
    Build(BuildArgs),
    /// Remove the `.cbuild` build root.
    Clean,
    /// Force a full rebuild, bypassing the registry, then flush a fresh one.
    Update(BuildArgs),
    /// Print the `cbuild` version.
    Version,
    /// Print this help message.
    Help,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Number of worker threads to use (clamped to available parallelism).
    #[arg(long, default_value_t = num_cpus::get() as u32)]
    pub builders: u32,

    /// Registry cache mode for this build.
    #[arg(long, value_enum, default_value_t = CacheArg::On)]
    pub cache: CacheArg,

    /// Comma-separated target names to build; empty means "build everything".
    #[arg(long, value_delimiter = ',')]
    pub targets: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheArg {
    On,
    Off,
    Flush,
}

impl From<CacheArg> for cbuild_engine::CacheMode {
    fn from(value: CacheArg) -> Self {
        match value {
            CacheArg::On => cbuild_engine::CacheMode::On,
            CacheArg::Off => cbuild_engine::CacheMode::Off,
            CacheArg::Flush => cbuild_engine::CacheMode::Flush,
        }
    }
}
