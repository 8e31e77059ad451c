//! Streamed assistant-text capture.
//!
//! The droid protocol has no explicit turn-complete marker: the agent simply
//! stops emitting `assistant_text_delta` notifications.  [`TurnAggregator`]
//! therefore infers completion from surface text shape — the concatenated
//! buffer ending in terminal punctuation, or containing a line break.
//!
//! This is a heuristic with two documented failure modes, preserved from the
//! protocol's observed behaviour rather than "fixed":
//!
//! - **False-early completion**: fragments `"3"`, `"."`, `"1"`, `"4"` stop
//!   the capture at `"3."`, truncating `"3.14"`.
//! - **False-late completion**: text with no terminal punctuation and no
//!   newline runs until the caller's capture window elapses.

use tracing::trace;

use crate::rpc::wire::{Notification, SESSION_NOTIFICATION_METHOD};

/// Capture state machine: Idle → Capturing → Done, reset to Idle by
/// [`TurnAggregator::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Not capturing; notifications are ignored.
    Idle,
    /// Appending text-delta fragments.
    Capturing,
    /// Completion heuristic fired; fragments are no longer appended.
    Done,
}

/// Accumulates one turn of streamed assistant text.
#[derive(Debug)]
pub struct TurnAggregator {
    state: CaptureState,
    buffer: String,
}

impl TurnAggregator {
    /// Create an idle aggregator with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            buffer: String::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether the completion heuristic has fired.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == CaptureState::Done
    }

    /// Clear the buffer and enter `Capturing`.
    pub fn begin_capture(&mut self) {
        self.buffer.clear();
        self.state = CaptureState::Capturing;
    }

    /// Feed one inbound notification to the capture.
    ///
    /// Only meaningful while `Capturing`: text-delta session events append
    /// their fragment in arrival order; every other notification is ignored,
    /// keeping the capture forward-compatible with unrelated event traffic.
    pub fn on_notification(&mut self, notification: &Notification) {
        if self.state != CaptureState::Capturing {
            return;
        }
        if notification.method != SESSION_NOTIFICATION_METHOD {
            return;
        }
        let Some(fragment) = notification.text_delta() else {
            return;
        };

        self.buffer.push_str(fragment);

        if looks_complete(&self.buffer) {
            trace!(len = self.buffer.len(), "aggregator: turn looks complete");
            self.state = CaptureState::Done;
        }
    }

    /// Freeze and return the captured text, returning the aggregator to Idle.
    ///
    /// Valid regardless of whether the heuristic fired: on a capture-window
    /// timeout the partial buffer is a reportable outcome, not an error.
    pub fn finish(&mut self) -> String {
        self.state = CaptureState::Idle;
        std::mem::take(&mut self.buffer)
    }
}

impl Default for TurnAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion heuristic: trimmed buffer ends with `.`, `!` or `?`, or the
/// buffer contains a newline.
fn looks_complete(buffer: &str) -> bool {
    buffer.trim().ends_with(['.', '!', '?']) || buffer.contains('\n')
}
