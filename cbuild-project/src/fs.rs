use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

/// File-system collaborator interface (spec §6). The engine never calls
/// `std::fs` directly outside this trait, so tests can substitute an
/// in-memory implementation without touching disk.
///
/// Errors from `create_directory`/`check_file_exists` are fatal; errors from
/// scan-time opens (inside the include scanner) downgrade to "treat as
/// updated" at the call site (spec §4.2, §7).
pub trait FileSystem: Send + Sync {
    fn check_file_exists(&self, path: &Path) -> bool;

    /// Stable, inode-like identifier for a file, distinct from its path.
    /// Never returns 0 — the registry reserves that value for "empty slot"
    /// (spec §3).
    fn get_file_id(&self, path: &Path) -> std::io::Result<u64>;

    /// Unix timestamp (seconds) of the file's last modification.
    fn get_last_update_timestamp(&self, path: &Path) -> std::io::Result<u64>;

    fn open_file(&self, path: &Path) -> std::io::Result<File>;

    /// Maps a file read-only into memory for the include scanner (spec
    /// §4.2.1) and the registry loader (spec §4.1).
    ///
    /// # Safety
    /// The returned mapping is only sound so long as nothing else truncates
    /// or rewrites the underlying file while it is mapped; the caller
    /// (scanner, registry loader) holds the mapping only for the duration of
    /// a single scan/load and never mutates through it.
    fn map_file_into_memory(&self, file: &File) -> std::io::Result<Mmap>;

    fn create_directory(&self, path: &Path) -> std::io::Result<()>;

    fn get_folder_path(&self, path: &Path) -> PathBuf;
}

/// The only [`FileSystem`] implementation the engine ships: thin wrappers
/// over `std::fs` and `memmap2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn check_file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn get_file_id(&self, path: &Path) -> std::io::Result<u64> {
        let metadata = std::fs::metadata(path)?;
        Ok(file_id_from_metadata(&metadata))
    }

    fn get_last_update_timestamp(&self, path: &Path) -> std::io::Result<u64> {
        let metadata = std::fs::metadata(path)?;
        let modified = metadata.modified()?;
        let secs = modified
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(secs)
    }

    fn open_file(&self, path: &Path) -> std::io::Result<File> {
        File::open(path)
    }

    fn map_file_into_memory(&self, file: &File) -> std::io::Result<Mmap> {
        // SAFETY: see the `FileSystem::map_file_into_memory` contract.
        unsafe { Mmap::map(file) }
    }

    fn create_directory(&self, path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn get_folder_path(&self, path: &Path) -> PathBuf {
        path.parent().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf())
    }
}

#[cfg(unix)]
fn file_id_from_metadata(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    let ino = metadata.ino();
    if ino == 0 { u64::MAX } else { ino }
}

#[cfg(not(unix))]
fn file_id_from_metadata(metadata: &std::fs::Metadata) -> u64 {
    // Non-unix platforms have no portable inode; fold the volume/file index
    // equivalents exposed by the platform crate into one token. Out of scope
    // here (spec §9, Windows arch toggle) — callers on unix get a real
    // inode, everyone else gets a length/modified-time fingerprint that is
    // stable across a single build but not a hard identity guarantee.
    use std::time::UNIX_EPOCH;
    let len = metadata.len();
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let folded = len ^ modified.rotate_left(32);
    if folded == 0 { u64::MAX } else { folded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_is_never_zero_for_real_files() {
        let fs = StdFileSystem;
        let path = std::env::current_exe().unwrap();
        let id = fs.get_file_id(&path).unwrap();
        assert_ne!(id, 0);
    }

    #[test]
    fn get_folder_path_returns_parent() {
        let fs = StdFileSystem;
        assert_eq!(fs.get_folder_path(Path::new("/a/b/c.cpp")), PathBuf::from("/a/b"));
    }
}
