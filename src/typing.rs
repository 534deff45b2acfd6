//! Typing signal debounce (outbound) and typing line (inbound).
//!
//! Timers are modelled as generations: every keystroke bumps the generation
//! and asks the runtime for a timer tagged with it. A timer that fires with an
//! older generation was superseded and does nothing.

use std::time::Duration;

pub const DEFAULT_TYPING_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Result of a local keystroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Keystroke {
    /// Send `typing:true` now.
    pub send_start: bool,
    /// Arm a stop timer for this generation.
    pub generation: u64,
}

#[derive(Debug)]
pub struct TypingDebouncer {
    window: Duration,
    generation: u64,
    active: bool,
}

impl TypingDebouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, generation: 0, active: false }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn keystroke(&mut self) -> Keystroke {
        let send_start = !self.active;
        self.active = true;
        self.generation += 1;
        Keystroke { send_start, generation: self.generation }
    }

    /// A stop timer fired. Returns `true` when `typing:false` should be sent.
    pub fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.active {
            return false;
        }
        self.active = false;
        true
    }

    /// Forget the active window without signalling (connection dropped).
    pub fn reset(&mut self) {
        self.active = false;
        self.generation += 1;
    }
}

/// Apply a remote typing signal to the single shared typing line.
///
/// Signals from `self_name` are ignored and leave `line` as it was. Last
/// writer wins: a stop from any user clears the line.
pub fn apply_remote_typing(line: &mut Option<String>, self_name: &str, username: &str, typing: bool) -> bool {
    if username == self_name {
        return false;
    }
    let next = typing.then(|| format!("{username} is typing..."));
    if *line == next {
        return false;
    }
    *line = next;
    true
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
