use std::path::PathBuf;

/// Configuration errors (spec §7): invalid toolchain paths, name collisions,
/// malformed target names. All are fatal — the driver aborts before any task
/// runs.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("target name `{0}` exceeds 32 bytes")]
    NameTooLong(String),

    #[error("target name `{0}` must be alphanumeric or underscore")]
    InvalidNameCharacters(String),

    #[error("duplicate target name `{0}`")]
    DuplicateTargetName(String),

    #[error("target `{target}` depends on unknown upstream `{upstream}`")]
    UnknownUpstream { target: String, upstream: String },

    #[error("cyclic upstream/downstream relation involving target `{0}`")]
    CyclicDependency(String),

    #[error("toolchain {kind} path `{path}` does not resolve on disk")]
    ToolchainPathMissing { kind: &'static str, path: PathBuf },
}
