//! `BuildTask` (spec §3 "BuildTask", §4.4): the value moved through the
//! [`cbuild_queue::Queue`] between producers and the worker/main-thread
//! consumers.

use std::path::PathBuf;

use cbuild_project::TargetId;

/// A tagged build task. `Compile` carries the file handle's path and the
/// `dependencies_updated` flag computed at scan time (spec §3); `Link`
/// carries only the target, since the link handler re-derives everything
/// else from the tracker and project (spec §4.4).
#[derive(Debug, Clone)]
pub enum BuildTask {
    Compile {
        target: TargetId,
        source: PathBuf,
        dependencies_updated: bool,
    },
    Link {
        target: TargetId,
    },
}
