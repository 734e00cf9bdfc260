//! Project/Target/Toolchain data model (spec §3) and the file-system
//! collaborator trait (spec §6), shared by every other `cbuild` crate.
//!
//! Construction goes through [`ProjectBuilder`], which enforces target-name
//! uniqueness and shape and rejects cyclic upstream/downstream graphs before
//! a [`Project`] ever reaches the engine. Once built, a `Project` is
//! read-only for the remainder of the build.

mod error;
mod fs;
mod project;
mod target;
mod toolchain;

pub use error::ProjectError;
pub use fs::{FileSystem, StdFileSystem};
pub use project::{Project, ProjectBuilder, TargetSpec};
pub use target::{MAX_TARGET_NAME_BYTES, Target, TargetId, TargetKind};
pub use toolchain::{Toolchain, ToolchainKind};
