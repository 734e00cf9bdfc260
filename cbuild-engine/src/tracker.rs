//! Per-target coordination state (spec §3 "TargetTracker", §4.4 "Target
//! State Machine").
//!
//! Every field that the compile and link handlers touch across threads is
//! atomic; the ordering each access uses is documented inline and mirrors
//! spec §5. `needs_linking` is made atomic rather than left a plain bool —
//! spec §9's open question permits either as long as the ordering edge to
//! `compile_status`'s publishing store holds, and an atomic makes that edge
//! explicit instead of resting on "the compiler won't reorder this".

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU32, Ordering};

use cbuild_project::TargetId;

/// `compile_status` (spec §3): starts `Compiling`, transitions to exactly
/// one of `Failed`/`Success` when `files_pending` reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompileStatus {
    Compiling = 0,
    Failed = 1,
    Success = 2,
}

impl CompileStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CompileStatus::Failed,
            2 => CompileStatus::Success,
            _ => CompileStatus::Compiling,
        }
    }
}

/// `link_status` (spec §3): starts `Waiting`, moves to `Linking` via a
/// single winning CAS, then settles on `Failed`/`Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkStatus {
    Waiting = 0,
    Linking = 1,
    Failed = 2,
    Success = 3,
}

impl LinkStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkStatus::Linking,
            2 => LinkStatus::Failed,
            3 => LinkStatus::Success,
            _ => LinkStatus::Waiting,
        }
    }
}

/// `upstream_status` (spec §3): written by an upstream's link handler once
/// it settles, read by this target's own link handler before it decides
/// whether linking is actually required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpstreamStatus {
    Ignore = 0,
    Updated = 1,
    Failed = 2,
}

impl UpstreamStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => UpstreamStatus::Updated,
            2 => UpstreamStatus::Failed,
            _ => UpstreamStatus::Ignore,
        }
    }
}

/// The outcome a link (or archive) step settles on, passed to downstream
/// propagation and to the [`crate::observer::LinkObserver`] hook (spec §4.4
/// link handler steps 5-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Success,
    /// Linking was skipped because nothing about the target or its
    /// upstreams changed (spec §4.4 step 5 "treat as Ignore result").
    Ignore,
    Failed,
}

/// Per-target coordination state (spec §3 "TargetTracker"). One instance
/// per selected target, indexed in a `Vec` by [`TargetId`] rather than
/// referenced by pointer (spec §9 "Target ↔ Tracker back-reference").
pub struct TargetTracker {
    compile_status: AtomicU8,
    link_status: AtomicU8,
    upstream_status: AtomicU8,
    skipped_counter: AtomicU32,
    files_pending: AtomicI64,
    waiting_on_counter: AtomicI64,
    needs_linking: AtomicBool,
}

impl TargetTracker {
    /// `files_pending` starts at the target's file count, `waiting_on_counter`
    /// at its upstream count (spec §3 invariants).
    pub fn new(file_count: usize, upstream_count: usize) -> Self {
        Self {
            compile_status: AtomicU8::new(CompileStatus::Compiling as u8),
            link_status: AtomicU8::new(LinkStatus::Waiting as u8),
            upstream_status: AtomicU8::new(UpstreamStatus::Ignore as u8),
            skipped_counter: AtomicU32::new(0),
            files_pending: AtomicI64::new(file_count as i64),
            waiting_on_counter: AtomicI64::new(upstream_count as i64),
            needs_linking: AtomicBool::new(true),
        }
    }

    pub fn compile_status(&self) -> CompileStatus {
        CompileStatus::from_u8(self.compile_status.load(Ordering::Acquire))
    }

    pub fn link_status(&self) -> LinkStatus {
        LinkStatus::from_u8(self.link_status.load(Ordering::Acquire))
    }

    pub fn upstream_status(&self) -> UpstreamStatus {
        UpstreamStatus::from_u8(self.upstream_status.load(Ordering::Acquire))
    }

    pub fn skipped_counter(&self) -> u32 {
        self.skipped_counter.load(Ordering::Acquire)
    }

    pub fn increment_skipped(&self) {
        self.skipped_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn needs_linking(&self) -> bool {
        self.needs_linking.load(Ordering::Acquire)
    }

    pub fn set_needs_linking(&self, value: bool) {
        self.needs_linking.store(value, Ordering::Release);
    }

    /// Decrements `files_pending`, returning `true` exactly once — for the
    /// thread whose decrement brought it to zero (spec §3 invariant
    /// "reaches 0 exactly once").
    pub fn decrement_files_pending(&self) -> bool {
        let previous = self.files_pending.fetch_sub(1, Ordering::AcqRel);
        previous - 1 == 0
    }

    /// Publishes the compile phase's terminal status. The caller must have
    /// already written `needs_linking` (when settling on `Success`) so this
    /// store's release ordering carries that write with it (spec §3, §5).
    pub fn finish_compiling(&self, status: CompileStatus) {
        debug_assert_ne!(status, CompileStatus::Compiling);
        self.compile_status.store(status as u8, Ordering::Release);
    }

    /// Wins exactly one of possibly many concurrent attempts to move
    /// `link_status` out of `Waiting` (spec §4.4 link handler step 3).
    pub fn begin_linking(&self) -> bool {
        self.link_status
            .compare_exchange(
                LinkStatus::Waiting as u8,
                LinkStatus::Linking as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn finish_linking(&self, status: LinkStatus) {
        debug_assert!(matches!(status, LinkStatus::Failed | LinkStatus::Success));
        self.link_status.store(status as u8, Ordering::Release);
    }

    /// Never overwrites a `Failed` upstream status with `Updated` (spec
    /// §4.4 step 7 "never overwrite Failed").
    pub fn mark_upstream(&self, outcome: LinkOutcome) {
        let target = match outcome {
            LinkOutcome::Failed => UpstreamStatus::Failed,
            LinkOutcome::Success | LinkOutcome::Ignore => UpstreamStatus::Updated,
        };
        if target == UpstreamStatus::Failed {
            self.upstream_status.store(UpstreamStatus::Failed as u8, Ordering::Release);
        } else {
            let _ = self.upstream_status.compare_exchange(
                UpstreamStatus::Ignore as u8,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    /// Decrements `waiting_on_counter`, returning `true` for the thread that
    /// brought it to zero — that thread submits this target's Link task
    /// (spec §4.4 step 7, §3 invariant).
    pub fn decrement_waiting_on(&self) -> bool {
        let previous = self.waiting_on_counter.fetch_sub(1, Ordering::AcqRel);
        previous - 1 == 0
    }

    pub fn waiting_on_count(&self) -> i64 {
        self.waiting_on_counter.load(Ordering::Acquire)
    }
}

/// A newtype purely to keep call sites readable; trackers live in a flat
/// `Vec<TargetTracker>` indexed by [`TargetId::index`].
pub type TrackerId = TargetId;
