//! Loading flag and single-slot error reporting.
//!
//! # Invariants
//! - `error` holds at most one message; every `set_error` overwrites it.
//! - `loading` is a plain flag, not a counter: whichever operation finishes
//!   last leaves it cleared, so it cannot stay stuck after all settle.

use crate::model::task::Task;

pub(crate) const STARTUP_SYNC_FAILED: &str = "Failed to sync with server. Using local data.";
pub(crate) const CREATE_SYNC_FAILED: &str = "Failed to sync with server. Task saved locally.";
pub(crate) const UPDATE_SYNC_FAILED: &str = "Failed to sync with server. Changes saved locally.";
pub(crate) const DELETE_SYNC_FAILED: &str = "Failed to sync with server. Task deleted locally.";
pub(crate) const MANUAL_SYNC_FAILED: &str = "Failed to sync with server.";

/// Consumer-visible status of background synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReporter {
    loading: bool,
    error: Option<String>,
}

impl StatusReporter {
    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Starts an operation: clears the error, optionally raises `loading`.
    pub(crate) fn begin(&mut self, raise_loading: bool) {
        self.error = None;
        if raise_loading {
            self.loading = true;
        }
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub(crate) fn finish_loading(&mut self) {
        self.loading = false;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Point-in-time copy of everything the UI layer reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::StatusReporter;

    #[test]
    fn error_slot_is_overwritten_not_queued() {
        let mut status = StatusReporter::default();
        status.set_error("first");
        status.set_error("second");
        assert_eq!(status.error(), Some("second"));

        status.clear_error();
        assert_eq!(status.error(), None);
    }

    #[test]
    fn begin_clears_error_and_raises_loading_only_when_asked() {
        let mut status = StatusReporter::default();
        status.set_error("stale");
        status.begin(false);
        assert_eq!(status.error(), None);
        assert!(!status.loading());

        status.begin(true);
        assert!(status.loading());
        status.finish_loading();
        assert!(!status.loading());
    }
}
