//! # Speech Output
//!
//! The "announce a label, debounced" contract. An [`Announcer`] is the
//! text-to-speech collaborator; [`SpeechGate`] enforces the policy that
//! only the top label is spoken, only when it changes, and never while a
//! previous utterance is still in progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use colored::Colorize;

/// Text-to-speech collaborator contract.
pub trait Announcer: Send + Sync {
    /// Whether an utterance is currently in progress.
    fn speaking(&self) -> bool;

    /// Speaks a short label.
    fn announce(&self, text: &str);
}

/// Announcer that swallows everything.
pub struct NullAnnouncer;

impl Announcer for NullAnnouncer {
    fn speaking(&self) -> bool {
        false
    }

    fn announce(&self, _text: &str) {}
}

/// Console stand-in for a speech synthesizer.
pub struct ConsoleAnnouncer;

impl Announcer for ConsoleAnnouncer {
    fn speaking(&self) -> bool {
        false
    }

    fn announce(&self, text: &str) {
        println!("{} {}", "speaking:".dimmed(), text.bold());
    }
}

/// Debounce policy over an announcer: prevents audio overlap and a
/// backlog of identical utterances.
pub struct SpeechGate {
    enabled: AtomicBool,
    last_spoken: Mutex<Option<String>>,
}

impl SpeechGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            last_spoken: Mutex::new(None),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Announces the label only when it differs from the previously
    /// spoken one and no utterance is in progress. Returns whether the
    /// label was actually announced.
    pub fn maybe_announce(&self, label: &str, announcer: &dyn Announcer) -> bool {
        if !self.enabled() || label.is_empty() || announcer.speaking() {
            return false;
        }
        let Ok(mut last) = self.last_spoken.lock() else {
            return false;
        };
        if last.as_deref() == Some(label) {
            return false;
        }
        announcer.announce(label);
        *last = Some(label.to_string());
        true
    }

    /// Announces without the changed-label check (one-shot paths).
    pub fn announce_now(&self, label: &str, announcer: &dyn Announcer) -> bool {
        if !self.enabled() || label.is_empty() || announcer.speaking() {
            return false;
        }
        announcer.announce(label);
        if let Ok(mut last) = self.last_spoken.lock() {
            *last = Some(label.to_string());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recording {
        spoken: Mutex<Vec<String>>,
        busy: AtomicBool,
    }

    impl Recording {
        fn new() -> Self {
            Self { spoken: Mutex::new(Vec::new()), busy: AtomicBool::new(false) }
        }
    }

    impl Announcer for Recording {
        fn speaking(&self) -> bool {
            self.busy.load(Ordering::Relaxed)
        }

        fn announce(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn repeated_label_is_spoken_once() {
        let gate = SpeechGate::new(true);
        let announcer = Recording::new();
        assert!(gate.maybe_announce("tench", &announcer));
        assert!(!gate.maybe_announce("tench", &announcer));
        assert_eq!(*announcer.spoken.lock().unwrap(), vec!["tench"]);
    }

    #[test]
    fn changed_label_is_spoken_again() {
        let gate = SpeechGate::new(true);
        let announcer = Recording::new();
        gate.maybe_announce("tench", &announcer);
        gate.maybe_announce("goldfish", &announcer);
        assert_eq!(*announcer.spoken.lock().unwrap(), vec!["tench", "goldfish"]);
    }

    #[test]
    fn in_progress_utterance_blocks_speech() {
        let gate = SpeechGate::new(true);
        let announcer = Recording::new();
        announcer.busy.store(true, Ordering::Relaxed);
        assert!(!gate.maybe_announce("tench", &announcer));
        assert!(announcer.spoken.lock().unwrap().is_empty());
    }

    #[test]
    fn disabled_gate_is_silent() {
        let gate = SpeechGate::new(false);
        let announcer = Recording::new();
        assert!(!gate.maybe_announce("tench", &announcer));
        gate.set_enabled(true);
        assert!(gate.maybe_announce("tench", &announcer));
    }
}
