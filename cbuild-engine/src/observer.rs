//! `on_linked` hook (spec §6 "Project input", §9 "Hooks / callbacks").
//!
//! The original implementation stores this as a raw function pointer on
//! each `Target`. Spec §9 explicitly steers away from reproducing that as
//! dynamic plugin dispatch; a small trait with one method and a no-op
//! default gets the same observability seam without it.

use crate::tracker::LinkOutcome;

/// Notified once per target, right after its link (or archive) step
/// settles — including targets whose link was skipped because nothing
/// needed relinking (spec §4.4 link handler step 8).
pub trait LinkObserver: Send + Sync {
    fn on_linked(&self, target: &str, outcome: LinkOutcome);
}

/// Default implementation used when the configuration collaborator (out of
/// scope here) doesn't register a hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLinkObserver;

impl LinkObserver for NoopLinkObserver {
    fn on_linked(&self, _target: &str, _outcome: LinkOutcome) {}
}

/// Collects every `on_linked` call into memory; used by the engine's own
/// integration tests and by a CLI layer that wants a final summary without
/// re-deriving it from tracker state.
#[derive(Default)]
pub struct RecordingLinkObserver {
    pub events: std::sync::Mutex<Vec<(String, LinkOutcome)>>,
}

impl LinkObserver for RecordingLinkObserver {
    fn on_linked(&self, target: &str, outcome: LinkOutcome) {
        self.events.lock().unwrap().push((target.to_string(), outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_observer_accepts_every_outcome() {
        let observer = NoopLinkObserver;
        observer.on_linked("lib1", LinkOutcome::Success);
        observer.on_linked("lib2", LinkOutcome::Failed);
        observer.on_linked("lib3", LinkOutcome::Ignore);
    }

    #[test]
    fn recording_observer_captures_calls() {
        let observer = RecordingLinkObserver::default();
        observer.on_linked("lib1", LinkOutcome::Success);
        assert_eq!(observer.events.lock().unwrap().len(), 1);
    }
}
