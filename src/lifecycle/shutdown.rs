//! Shutdown guard and completion signal.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// What triggered the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Operator typed `/quit`.
    Quit,
    /// Console input reached end-of-file.
    InputClosed,
    /// Interrupt signal (Ctrl+C).
    Interrupted,
    /// Remote side revoked the credentials.
    LoggedOut,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ShutdownReason::Quit => "quit requested",
            ShutdownReason::InputClosed => "console input closed",
            ShutdownReason::Interrupted => "interrupted",
            ShutdownReason::LoggedOut => "logged out",
        };
        f.write_str(text)
    }
}

/// Process-wide shutdown flag.
///
/// [`ShutdownState::begin`] returns `true` for exactly one caller; every
/// trigger path goes through it. Completion is published on a watch channel
/// so an embedding host decides what to do on exit.
#[derive(Debug)]
pub struct ShutdownState {
    shutting_down: AtomicBool,
    done: watch::Sender<Option<ShutdownReason>>,
}

impl ShutdownState {
    pub fn new() -> Self {
        let (done, _) = watch::channel(None);
        Self {
            shutting_down: AtomicBool::new(false),
            done,
        }
    }

    /// Claim the shutdown. Only the first call returns `true`.
    pub fn begin(&self) -> bool {
        self.shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Publish that teardown finished.
    pub fn complete(&self, reason: ShutdownReason) {
        self.done.send_replace(Some(reason));
    }

    /// Receiver that observes `Some(reason)` once teardown finished.
    pub fn subscribe(&self) -> watch::Receiver<Option<ShutdownReason>> {
        self.done.subscribe()
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}
