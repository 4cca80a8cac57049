//! Lifecycle state machine.

use crate::protocol::DisconnectError;

/// How a close is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectClass {
    /// Remote side revoked the credentials. Terminal.
    LoggedOut,
    /// Anything else, including a close with no error. Reconnects.
    Transient,
}

impl DisconnectClass {
    pub fn classify(error: Option<&DisconnectError>) -> Self {
        match error {
            Some(err) if err.reason().is_logged_out() => DisconnectClass::LoggedOut,
            _ => DisconnectClass::Transient,
        }
    }
}

/// Lifecycle of the connection across all generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Nothing started yet.
    #[default]
    Bootstrapping,
    /// A session exists and is establishing its transport.
    Connecting,
    /// The active session reported `open`.
    Open,
    /// The active session reported `close`.
    Closing(DisconnectClass),
    /// Building the next generation.
    Reconnecting,
    /// Shut down. No further transitions.
    Terminated,
}

impl LifecycleState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Bootstrapping -> Connecting
    /// - Reconnecting -> Connecting
    /// - Connecting -> Open
    /// - Connecting -> Reconnecting (the transport never came up)
    /// - Connecting | Open -> Closing
    /// - Closing(Transient) -> Reconnecting
    /// - any non-terminal -> Terminated
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        match (*self, target) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Bootstrapping, Connecting)
            | (Reconnecting, Connecting)
            | (Connecting, Open)
            | (Connecting, Reconnecting)
            | (Connecting, Closing(_))
            | (Open, Closing(_))
            | (Closing(DisconnectClass::Transient), Reconnecting) => true,
            _ => false,
        }
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: LifecycleState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::ChatwireError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Terminated)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, LifecycleState::Open)
    }
}
