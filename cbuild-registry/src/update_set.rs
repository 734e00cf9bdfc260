use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

use cbuild_project::{Project, TargetId};

use crate::error::RegistryError;
use crate::layout::{
    HEADER_SIZE, REGISTRY_VERSION, TABLE_ALIGNMENT, TARGET_INFO_SIZE, TARGET_NAME_BYTES, align_up,
    align_file_capacity, next_pow2,
};
use crate::registry::Registry;

/// Per-target bookkeeping in the in-memory staging registry (spec §3
/// "Update Set"). `files_count` is the atomic claim counter described in
/// spec §4.1 ("atomic_fetch_add(files_count, 1) to claim the next slot").
struct UpdateTargetInfo {
    name: String,
    files_offset: usize,
    files_count: AtomicU64,
    aligned_max_files_count: u32,
}

/// Scan-memoization state for one dependency-table slot (spec §3 "Chain
/// Status array").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Unchecked,
    Checking,
    Updated,
    Unchanged,
}

impl ChainStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ChainStatus::Checking,
            2 => ChainStatus::Updated,
            3 => ChainStatus::Unchanged,
            _ => ChainStatus::Unchecked,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ChainStatus::Unchecked => 0,
            ChainStatus::Checking => 1,
            ChainStatus::Updated => 2,
            ChainStatus::Unchanged => 3,
        }
    }
}

/// In-memory staging mirror of the Registry being written during the
/// current build (spec §3, §4.1). The Update Set is the sole writer during
/// a build; the [`Registry`] it was built from is the sole reader.
pub struct UpdateSet {
    targets: Vec<UpdateTargetInfo>,
    files: Vec<AtomicU64>,
    file_records: Vec<AtomicU64>,
    dependencies: Vec<AtomicU64>,
    dependency_records: Vec<AtomicU64>,
    dependency_claimed: AtomicUsize,
    dependency_capacity: usize,
    chain_status: Vec<AtomicU8>,
    last_info: Vec<Option<usize>>,
}

impl UpdateSet {
    /// Allocates fresh tables sized for `project`'s current targets, aligns
    /// per-target file capacities to 4, and matches each current target
    /// against a previous-build target by name, recording `last_info`
    /// (spec §4.1 `init_update_set` contract).
    pub fn new(project: &Project, registry: &Registry) -> Self {
        let mut targets = Vec::with_capacity(project.targets().len());
        let mut offset = 0usize;
        for target in project.targets() {
            let aligned = align_file_capacity(target.file_count()) as u32;
            targets.push(UpdateTargetInfo {
                name: target.name.clone(),
                files_offset: offset,
                files_count: AtomicU64::new(0),
                aligned_max_files_count: aligned,
            });
            offset += aligned as usize;
        }
        let total_files_capacity = offset;

        let last_info = project
            .targets()
            .iter()
            .map(|target| registry.find_target_index(&target.name))
            .collect();

        // Dependency table capacity isn't specified exactly (spec §4.1
        // only describes the claim protocol, not the upfront sizing); sized
        // generously relative to the project's source-file count and
        // rounded to the table alignment, documented as a resolved open
        // question in DESIGN.md.
        let source_file_count: usize = project.targets().iter().map(|t| t.file_count()).sum();
        let dependency_capacity = next_pow2(align_up((source_file_count * 64).max(1024), 4));

        Self {
            targets,
            files: (0..total_files_capacity).map(|_| AtomicU64::new(0)).collect(),
            file_records: (0..total_files_capacity).map(|_| AtomicU64::new(0)).collect(),
            dependencies: (0..dependency_capacity).map(|_| AtomicU64::new(0)).collect(),
            dependency_records: (0..dependency_capacity).map(|_| AtomicU64::new(0)).collect(),
            dependency_claimed: AtomicUsize::new(0),
            dependency_capacity,
            chain_status: (0..dependency_capacity).map(|_| AtomicU8::new(0)).collect(),
            last_info,
        }
    }

    /// The previous build's target-info index for `target_id`, if the
    /// target existed by the same name in the loaded registry.
    pub fn last_info(&self, target_id: TargetId) -> Option<usize> {
        self.last_info[target_id.index()]
    }

    /// Atomically claims the next file slot within `target_id`'s segment
    /// (spec §4.1 "Algorithms"), returning its index within that segment.
    pub fn claim_file_slot(&self, target_id: TargetId) -> usize {
        let target = &self.targets[target_id.index()];
        let claimed = target.files_count.fetch_add(1, Ordering::Relaxed);
        debug_assert!(
            claimed < target.aligned_max_files_count as u64,
            "target file segment overflowed its aligned capacity"
        );
        claimed as usize
    }

    /// Writes `(file_id, timestamp)` into the slot previously returned by
    /// [`Self::claim_file_slot`] (spec §4.4 compile handler step 5).
    pub fn write_file(&self, target_id: TargetId, slot_index: usize, file_id: u64, timestamp: u64) {
        let target = &self.targets[target_id.index()];
        let global_index = target.files_offset + slot_index;
        self.files[global_index].store(file_id, Ordering::Release);
        self.file_records[global_index].store(timestamp, Ordering::Release);
    }

    /// Copies a non-selected target's previous file segment verbatim from
    /// `registry` into this target's slot so a flush does not lose it
    /// (spec §4.1 "Targets that are skipped in a targeted build").
    pub fn preserve_skipped_target(&self, target_id: TargetId, registry: &Registry) {
        let Some(old_index) = self.last_info(target_id) else {
            return;
        };
        let old_info = &registry.targets()[old_index];
        let target = &self.targets[target_id.index()];
        let count = old_info.files_count as usize;
        for i in 0..count {
            let file_id = registry.file_id_at(registry.files_table_offset(), old_info.files_offset as usize + i);
            let timestamp =
                registry.timestamp_at(registry.file_records_offset(), old_info.files_offset as usize + i);
            let global_index = target.files_offset + i;
            self.files[global_index].store(file_id, Ordering::Relaxed);
            self.file_records[global_index].store(timestamp, Ordering::Relaxed);
        }
        target.files_count.store(count as u64, Ordering::Relaxed);
    }

    /// Scans currently-written dependency slots for `file_id` (spec §4.2
    /// scanner protocol step 2). Scalar scan — see spec §9 on SIMD linear
    /// search being throughput-, not correctness-, critical.
    pub fn find_dependency_slot(&self, file_id: u64) -> Option<usize> {
        if file_id == 0 {
            return None;
        }
        let claimed = self.dependency_claimed.load(Ordering::Acquire);
        (0..claimed).find(|&index| self.dependencies[index].load(Ordering::Acquire) == file_id)
    }

    /// Claims a fresh dependency slot, marking it `Checking` (spec §4.2
    /// step 2 "otherwise allocates a new slot, marks it Checking").
    pub fn claim_dependency_slot(&self, file_id: u64) -> Result<usize, RegistryError> {
        let index = self.dependency_claimed.fetch_add(1, Ordering::Relaxed);
        if index >= self.dependency_capacity {
            return Err(RegistryError::DependencyTableFull {
                capacity: self.dependency_capacity,
            });
        }
        self.dependencies[index].store(file_id, Ordering::Release);
        self.chain_status[index].store(ChainStatus::Checking.as_u8(), Ordering::Release);
        Ok(index)
    }

    pub fn chain_status(&self, index: usize) -> ChainStatus {
        ChainStatus::from_u8(self.chain_status[index].load(Ordering::Acquire))
    }

    /// Writes the resolved status and timestamp back (spec §4.2 step 5).
    pub fn resolve_dependency(&self, index: usize, status: ChainStatus, timestamp: u64) {
        self.dependency_records[index].store(timestamp, Ordering::Release);
        self.chain_status[index].store(status.as_u8(), Ordering::Release);
    }

    /// Serializes the Update Set to the on-disk registry format and
    /// (over)writes `path` (spec §4.1 `flush_registry`).
    pub fn flush(&self, path: &Path) -> Result<(), RegistryError> {
        let total_files_capacity = self.files.len();
        let dependencies_count = self.dependency_claimed.load(Ordering::Acquire).min(self.dependency_capacity);

        let target_info_table_end = HEADER_SIZE + self.targets.len() * TARGET_INFO_SIZE;
        let files_table_offset = align_up(target_info_table_end, TABLE_ALIGNMENT);
        let files_table_len = total_files_capacity * 8;
        let file_records_offset = files_table_offset + files_table_len;
        let file_records_len = total_files_capacity * 8;
        let dependencies_table_offset = align_up(file_records_offset + file_records_len, TABLE_ALIGNMENT);
        let dependencies_len = dependencies_count * 8;
        let dependency_records_offset = dependencies_table_offset + dependencies_len;
        let dependency_records_len = dependencies_count * 8;
        let total_len = dependency_records_offset + dependency_records_len;

        let mut buffer = vec![0u8; total_len];

        buffer[0..2].copy_from_slice(&REGISTRY_VERSION.to_le_bytes());
        buffer[2..4].copy_from_slice(&(self.targets.len() as u16).to_le_bytes());
        buffer[4..8].copy_from_slice(&(total_files_capacity as u32).to_le_bytes());
        buffer[8..12].copy_from_slice(&(dependencies_count as u32).to_le_bytes());

        for (index, target) in self.targets.iter().enumerate() {
            let entry_offset = HEADER_SIZE + index * TARGET_INFO_SIZE;
            let name_bytes = target.name.as_bytes();
            let copy_len = name_bytes.len().min(TARGET_NAME_BYTES);
            buffer[entry_offset..entry_offset + copy_len].copy_from_slice(&name_bytes[..copy_len]);
            let files_offset = target.files_offset as u64;
            let files_count = target.files_count.load(Ordering::Acquire);
            buffer[entry_offset + TARGET_NAME_BYTES..entry_offset + TARGET_NAME_BYTES + 8]
                .copy_from_slice(&files_offset.to_le_bytes());
            buffer[entry_offset + TARGET_NAME_BYTES + 8..entry_offset + TARGET_NAME_BYTES + 16]
                .copy_from_slice(&files_count.to_le_bytes());
            buffer[entry_offset + TARGET_NAME_BYTES + 16..entry_offset + TARGET_NAME_BYTES + 20]
                .copy_from_slice(&target.aligned_max_files_count.to_le_bytes());
        }

        for index in 0..total_files_capacity {
            let id = self.files[index].load(Ordering::Acquire);
            let at = files_table_offset + index * 8;
            buffer[at..at + 8].copy_from_slice(&id.to_le_bytes());
            let ts = self.file_records[index].load(Ordering::Acquire);
            let at = file_records_offset + index * 8;
            buffer[at..at + 8].copy_from_slice(&ts.to_le_bytes());
        }

        for index in 0..dependencies_count {
            let id = self.dependencies[index].load(Ordering::Acquire);
            let at = dependencies_table_offset + index * 8;
            buffer[at..at + 8].copy_from_slice(&id.to_le_bytes());
            let ts = self.dependency_records[index].load(Ordering::Acquire);
            let at = dependency_records_offset + index * 8;
            buffer[at..at + 8].copy_from_slice(&ts.to_le_bytes());
        }

        std::fs::write(path, &buffer).map_err(|source| RegistryError::Flush {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbuild_project::{Project, ProjectBuilder, TargetKind, TargetSpec, Toolchain, ToolchainKind};
    use std::path::PathBuf;

    fn toolchain() -> Toolchain {
        let existing = std::env::current_exe().unwrap();
        Toolchain::new(ToolchainKind::Gcc, &existing, &existing, &existing, &existing)
    }

    fn single_target_project(name: &str, file_count: usize) -> Project {
        let sources: Vec<PathBuf> = (0..file_count).map(|i| PathBuf::from(format!("{i}.cpp"))).collect();
        ProjectBuilder::new("/tmp/proj", toolchain())
            .with_target(TargetSpec::new(name, TargetKind::StaticLibrary).with_sources(sources))
            .build()
            .unwrap()
    }

    #[test]
    fn claims_sequential_file_slots() {
        let project = single_target_project("lib1", 3);
        let registry = Registry::empty();
        let update_set = UpdateSet::new(&project, &registry);
        let target_id = project.find_by_name("lib1").unwrap();

        let first = update_set.claim_file_slot(target_id);
        let second = update_set.claim_file_slot(target_id);
        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }

    #[test]
    fn flush_round_trips_through_registry_load() {
        let project = single_target_project("lib1", 2);
        let registry = Registry::empty();
        let update_set = UpdateSet::new(&project, &registry);
        let target_id = project.find_by_name("lib1").unwrap();

        let slot = update_set.claim_file_slot(target_id);
        update_set.write_file(target_id, slot, 42, 100);
        let slot = update_set.claim_file_slot(target_id);
        update_set.write_file(target_id, slot, 43, 101);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("__registry");
        update_set.flush(&path).unwrap();

        let reloaded = Registry::load(&path);
        assert_eq!(reloaded.target_count(), 1);
        let info = reloaded.find_target("lib1").unwrap();
        assert_eq!(reloaded.find_file_in_target(info, 42), Some(100));
        assert_eq!(reloaded.find_file_in_target(info, 43), Some(101));
        assert_eq!(reloaded.find_file_in_target(info, 999), None);
    }

    #[test]
    fn dependency_slot_lifecycle() {
        let project = single_target_project("lib1", 1);
        let registry = Registry::empty();
        let update_set = UpdateSet::new(&project, &registry);

        assert_eq!(update_set.find_dependency_slot(7), None);
        let index = update_set.claim_dependency_slot(7).unwrap();
        assert_eq!(update_set.chain_status(index), ChainStatus::Checking);
        update_set.resolve_dependency(index, ChainStatus::Unchanged, 55);
        assert_eq!(update_set.chain_status(index), ChainStatus::Unchanged);
        assert_eq!(update_set.find_dependency_slot(7), Some(index));
    }
}
