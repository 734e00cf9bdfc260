use std::path::{Path, PathBuf};

use tracing::warn;

/// Canonicalize a path with fallback to the original path if canonicalization fails.
pub fn canonicalize_workspace(workspace_root: &Path) -> PathBuf {
    std::fs::canonicalize(workspace_root).unwrap_or_else(|error| {
        warn!(
            path = %workspace_root.display(),
            %error,
            "Failed to canonicalize workspace root; falling back to provided path"
        );
        workspace_root.to_path_buf()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_provided_path_when_canonicalization_fails() {
        let missing = Path::new("/definitely/not/a/real/path/cbuild");
        assert_eq!(canonicalize_workspace(missing), missing.to_path_buf());
    }
}
