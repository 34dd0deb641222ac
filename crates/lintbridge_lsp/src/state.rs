//! Server state shared by the orchestrator.

/// Document content and editor revision.
#[derive(Debug, Clone)]
pub(crate) struct DocumentData {
    pub text: String,
    pub version: i32,
}

/// Tracks engine load attempts.
///
/// `loading` is set while an attempt runs; `failed` records that the last
/// attempt did not produce an engine and blocks further automatic attempts
/// until a retry succeeds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerLoadState {
    loading: bool,
    failed: bool,
}

impl ServerLoadState {
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Starts a first load. Refused while loading or after a failure.
    pub fn try_begin_load(&mut self) -> bool {
        if self.loading || self.failed {
            return false;
        }
        self.loading = true;
        true
    }

    /// Whether a retry of a failed load may start now.
    pub fn can_retry(&self) -> bool {
        self.failed && !self.loading
    }

    /// Starts a retry of a failed load.
    pub fn try_begin_retry(&mut self) -> bool {
        if !self.can_retry() {
            return false;
        }
        self.loading = true;
        true
    }

    /// Ends the attempt in flight.
    pub fn finish(&mut self, success: bool) {
        self.loading = false;
        self.failed = !success;
    }

    /// Ends the attempt in flight without recording its result, for a load
    /// that no longer matches the workspace.
    pub fn abandon(&mut self) {
        self.loading = false;
    }

    /// Forgets a previous failure, e.g. when the workspace changes.
    pub fn clear_failure(&mut self) {
        self.failed = false;
    }
}
