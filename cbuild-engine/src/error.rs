use std::path::PathBuf;

use cbuild_project::ProjectError;
use cbuild_registry::RegistryError;

/// Errors the build driver can fail on before a single task is scheduled
/// (spec §7 "Configuration error", "Registry I/O error"). Per-file compile
/// failures and per-target link failures are not represented here — they
/// are recorded on the offending [`crate::tracker::TargetTracker`] and
/// surfaced through the driver's exit code instead (spec §4.4, §7).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid project configuration: {0}")]
    Project(#[from] ProjectError),

    #[error("failed to flush build registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to create build directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("selected target `{0}` not found in project")]
    UnknownSelectedTarget(String),

    #[error("failed to open source file {path}: {source}")]
    OpenSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
