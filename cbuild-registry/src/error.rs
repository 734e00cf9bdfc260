use std::path::PathBuf;

/// Registry I/O errors (spec §7). Load failures always fall back to an
/// empty registry at the call site — this type exists so that fallback can
/// be logged with a reason, not so callers branch on it.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read registry file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to map registry file {path}: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry file {path} is truncated: expected at least {expected} bytes, found {found}")]
    Truncated {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("failed to flush registry file {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dependency table exhausted (capacity {capacity}); rerun with a larger project or fewer headers")]
    DependencyTableFull { capacity: usize },
}
