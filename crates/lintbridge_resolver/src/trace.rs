//! Trace sink for resolution diagnostics.

use parking_lot::Mutex;
use tracing::debug;

/// Receives human-readable notes about each resolution step.
///
/// Resolution never fails loudly; everything that was tried (commands,
/// outputs, candidate paths) is reported here instead.
pub trait TraceSink: Send + Sync {
    fn trace(&self, message: &str);
}

/// Records trace messages and mirrors them to `tracing`.
#[derive(Debug, Default)]
pub struct TraceLog {
    messages: Mutex<Vec<String>>,
}

impl TraceLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every message recorded so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Drains the recorded messages.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl TraceSink for TraceLog {
    fn trace(&self, message: &str) {
        debug!("{}", message);
        self.messages.lock().push(message.to_string());
    }
}

impl<F> TraceSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn trace(&self, message: &str) {
        self(message)
    }
}
