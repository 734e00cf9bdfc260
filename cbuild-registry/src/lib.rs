//! On-disk registry and in-memory update set for the incremental build
//! engine (spec §3, §4.1, §6). The registry is a single memory-mapped file
//! of 32-byte-aligned tables; the update set is the same shape, built fresh
//! in memory for each build and flushed to disk on success.

pub mod layout;

mod error;
mod registry;
mod simd;
mod update_set;

pub use error::RegistryError;
pub use registry::{Registry, TargetInfo, registry_path};
pub use update_set::{ChainStatus, UpdateSet};
