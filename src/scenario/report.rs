//! Probe outcome collection and rendering.

use crate::driver::LoadOutcome;

/// Truncation applied to the originating turn's text in the rendered report.
const TURN_ONE_PREVIEW: usize = 200;

/// Truncation applied to the resuming turn's text in the rendered report.
const TURN_TWO_PREVIEW: usize = 400;

/// Collected outcome of one two-credential probe run.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Session identifier returned by the originating turn.
    pub session_id: String,
    /// Assistant text captured in the originating turn.
    pub turn_one_text: String,
    /// Outcome of the cross-credential `load_session` attempt.
    pub load_outcome: LoadOutcome,
    /// Assistant text captured in the resuming turn.
    pub turn_two_text: String,
    /// The planted secret token.
    pub token: String,
}

impl ProbeReport {
    /// Whether the planted token appeared in the resuming turn's text.
    #[must_use]
    pub fn token_leaked(&self) -> bool {
        self.turn_two_text.contains(&self.token)
    }

    /// Render the `key value` line report written to stdout.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut line = |key: &str, value: &str| {
            out.push_str(key);
            out.push(' ');
            out.push_str(value);
            out.push('\n');
        };

        line("turn1.sessionId", &self.session_id);
        line(
            "turn1.assistant",
            &preview(self.turn_one_text.trim(), TURN_ONE_PREVIEW),
        );
        match &self.load_outcome {
            LoadOutcome::Accepted => line("turn2.load_session.ok", "true"),
            LoadOutcome::Rejected { message } => {
                line("turn2.load_session.ok", "false");
                line("turn2.load_session.error", message);
            }
        }
        line(
            "turn2.assistant",
            &preview(self.turn_two_text.trim(), TURN_TWO_PREVIEW),
        );
        line("token.expected", &self.token);
        line(
            "token.found_in_turn2",
            if self.token_leaked() { "True" } else { "False" },
        );
        out
    }
}

/// First `max_chars` characters of `text` (char-boundary safe).
fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
