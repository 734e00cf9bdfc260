use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::RegistryError;
use crate::layout::{HEADER_SIZE, TABLE_ALIGNMENT, TARGET_INFO_SIZE, TARGET_NAME_BYTES, align_up};

/// One parsed `Target_Info` entry: fixed-size name, offset into the files
/// table, file count at last flush, and the aligned capacity of its
/// segment (spec §6).
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub name: String,
    pub files_offset: u64,
    pub files_count: u64,
    pub aligned_max_files_count: u32,
}

/// Read-only, memory-mapped snapshot of the last successful build (spec
/// §3 "Registry"). An empty or missing file on disk yields
/// [`Registry::empty`] (spec §4.1 "Failure semantics").
pub struct Registry {
    mmap: Option<Mmap>,
    version: u16,
    targets: Vec<TargetInfo>,
    aligned_total_files_count: u32,
    dependencies_count: u32,
    files_table_offset: usize,
    file_records_offset: usize,
    dependencies_table_offset: usize,
    dependency_records_offset: usize,
}

impl Registry {
    /// An empty registry — every build against it is a full rebuild.
    pub fn empty() -> Self {
        Self {
            mmap: None,
            version: crate::layout::REGISTRY_VERSION,
            targets: Vec::new(),
            aligned_total_files_count: 0,
            dependencies_count: 0,
            files_table_offset: HEADER_SIZE,
            file_records_offset: HEADER_SIZE,
            dependencies_table_offset: HEADER_SIZE,
            dependency_records_offset: HEADER_SIZE,
        }
    }

    /// Loads and parses `path`. Any I/O error, or an empty/missing file,
    /// yields [`Registry::empty`] rather than an error — forcing a full
    /// rebuild is always a safe fallback (spec §4.1, §7).
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "falling back to empty registry");
                Self::empty()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, RegistryError> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(err) => {
                return Err(RegistryError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let len = file
            .metadata()
            .map_err(|err| RegistryError::Read {
                path: path.to_path_buf(),
                source: err,
            })?
            .len() as usize;

        if len == 0 {
            return Ok(Self::empty());
        }

        if len < HEADER_SIZE {
            return Err(RegistryError::Truncated {
                path: path.to_path_buf(),
                expected: HEADER_SIZE,
                found: len,
            });
        }

        // SAFETY: the registry file is owned by this build and not
        // concurrently truncated while mapped — the engine treats the
        // mapping as read-only and drops it at build end (spec §3
        // "Lifecycle summary").
        let mmap = unsafe { Mmap::map(&file) }.map_err(|err| RegistryError::Map {
            path: path.to_path_buf(),
            source: err,
        })?;

        let version = read_u16(&mmap, 0);
        let targets_count = read_u16(&mmap, 2) as usize;
        let aligned_total_files_count = read_u32(&mmap, 4);
        let dependencies_count = read_u32(&mmap, 8);

        let target_info_table_end = HEADER_SIZE + targets_count * TARGET_INFO_SIZE;
        let files_table_offset = align_up(target_info_table_end, TABLE_ALIGNMENT);
        let files_table_len = aligned_total_files_count as usize * 8;
        let file_records_offset = files_table_offset + files_table_len;
        let file_records_len = aligned_total_files_count as usize * 8;
        let dependencies_table_offset =
            align_up(file_records_offset + file_records_len, TABLE_ALIGNMENT);
        let dependencies_len = dependencies_count as usize * 8;
        let dependency_records_offset = dependencies_table_offset + dependencies_len;
        let dependency_records_len = dependencies_count as usize * 8;

        let expected_len = dependency_records_offset + dependency_records_len;
        if len < expected_len {
            return Err(RegistryError::Truncated {
                path: path.to_path_buf(),
                expected: expected_len,
                found: len,
            });
        }

        let mut targets = Vec::with_capacity(targets_count);
        for index in 0..targets_count {
            let entry_offset = HEADER_SIZE + index * TARGET_INFO_SIZE;
            let name_bytes = &mmap[entry_offset..entry_offset + TARGET_NAME_BYTES];
            let nul_pos = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
            let name = String::from_utf8_lossy(&name_bytes[..nul_pos]).into_owned();
            let files_offset = read_u64(&mmap, entry_offset + TARGET_NAME_BYTES);
            let files_count = read_u64(&mmap, entry_offset + TARGET_NAME_BYTES + 8);
            let aligned_max_files_count = read_u32(&mmap, entry_offset + TARGET_NAME_BYTES + 16);
            targets.push(TargetInfo {
                name,
                files_offset,
                files_count,
                aligned_max_files_count,
            });
        }

        Ok(Self {
            mmap: Some(mmap),
            version,
            targets,
            aligned_total_files_count,
            dependencies_count,
            files_table_offset,
            file_records_offset,
            dependencies_table_offset,
            dependency_records_offset,
        })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn targets(&self) -> &[TargetInfo] {
        &self.targets
    }

    pub fn find_target(&self, name: &str) -> Option<&TargetInfo> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn find_target_index(&self, name: &str) -> Option<usize> {
        self.targets.iter().position(|t| t.name == name)
    }

    /// Scans a target's file segment for `file_id`, returning its
    /// timestamp if found (spec §4.4 compile handler step 2).
    ///
    /// Implemented as a 4-wide grouped scalar loop with a tail (spec §4.1,
    /// §9: "a scalar loop is acceptable — the algorithm is not
    /// correctness-critical, only throughput-critical").
    pub fn find_file_in_target(&self, target: &TargetInfo, file_id: u64) -> Option<u64> {
        let Some(mmap) = &self.mmap else { return None };
        let base = self.files_table_offset + target.files_offset as usize * 8;
        let count = target.files_count as usize;
        crate::simd::find_u64(mmap, base, count, file_id)
            .map(|index| read_u64(mmap, self.file_records_offset + (target.files_offset as usize + index) * 8))
    }

    /// Scans the full dependencies table for `file_id`, returning its
    /// timestamp if found (spec §4.2 scanner protocol step 2).
    pub fn find_dependency(&self, file_id: u64) -> Option<u64> {
        let mmap = self.mmap.as_ref()?;
        let count = self.dependencies_count as usize;
        crate::simd::find_u64(mmap, self.dependencies_table_offset, count, file_id)
            .map(|index| read_u64(mmap, self.dependency_records_offset + index * 8))
    }

    pub fn aligned_total_files_count(&self) -> u32 {
        self.aligned_total_files_count
    }

    pub fn dependencies_count(&self) -> u32 {
        self.dependencies_count
    }

    pub(crate) fn file_id_at(&self, table_offset: usize, index: usize) -> u64 {
        match &self.mmap {
            Some(mmap) => read_u64(mmap, table_offset + index * 8),
            None => 0,
        }
    }

    pub(crate) fn timestamp_at(&self, table_offset: usize, index: usize) -> u64 {
        match &self.mmap {
            Some(mmap) => read_u64(mmap, table_offset + index * 8),
            None => 0,
        }
    }

    pub(crate) fn files_table_offset(&self) -> usize {
        self.files_table_offset
    }

    pub(crate) fn file_records_offset(&self) -> usize {
        self.file_records_offset
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(bytes[offset..offset + 2].try_into().expect("2-byte slice"))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("4-byte slice"))
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().expect("8-byte slice"))
}

/// Path of the registry file under a project's build root (spec §4.5 step
/// 3: `<build>/__registry`).
pub fn registry_path(build_root: &Path) -> PathBuf {
    build_root.join("__registry")
}
