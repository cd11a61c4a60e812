use serde::{Deserialize, Serialize};

use super::code_input::{CodeEvent, CodeInput};

pub const INCOMPLETE_CODE_MESSAGE: &str = "Enter the 6-digit code";

/// View state for the elevation challenge: the six-cell input, the
/// trust-device toggle, and the current inline error. The pending challenge
/// itself (temporary token + identity snapshot) is held by the session
/// store; this struct only drives the input surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeFlow {
    input: CodeInput,
    trust_device: bool,
    error: Option<String>,
}

impl ChallengeFlow {
    pub fn input(&self) -> &CodeInput {
        &self.input
    }

    pub fn trust_device(&self) -> bool {
        self.trust_device
    }

    pub fn set_trust_device(&mut self, on: bool) {
        self.trust_device = on;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// A digit landed in `cell`. Returns the full code when this keystroke
    /// completed it: submission is triggered the instant all six digits are
    /// populated.
    pub fn digit(&mut self, cell: usize, value: &str) -> Option<String> {
        self.error = None;
        match self.input.enter(cell, value) {
            CodeEvent::Complete(code) => Some(code),
            CodeEvent::Incomplete => None,
        }
    }

    pub fn backspace(&mut self, cell: usize) {
        self.error = None;
        self.input.backspace(cell);
    }

    /// A paste replaces the whole input; a six-digit paste submits at once.
    pub fn paste(&mut self, text: &str) -> Option<String> {
        self.error = None;
        match self.input.paste(text) {
            CodeEvent::Complete(code) => Some(code),
            CodeEvent::Incomplete => None,
        }
    }

    /// The explicit submit action. Fails locally when cells are missing,
    /// before any network call.
    pub fn submit(&self) -> Result<String, &'static str> {
        self.input.code().ok_or(INCOMPLETE_CODE_MESSAGE)
    }

    /// Record a local validation message without touching the cells.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// A verification attempt was rejected: wipe the cells, put focus back
    /// on the first one, and record the message. The pending challenge is
    /// left untouched by the caller so the user can retry without
    /// re-entering the password.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.input.clear();
        self.error = Some(message.into());
    }
}
