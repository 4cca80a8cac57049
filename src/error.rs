//! Error types for chatwire.

use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Main error type for chatwire operations.
#[derive(Error, Debug)]
pub enum ChatwireError {
    /// The session is not open, so nothing can be sent over it.
    #[error("session is not connected")]
    NotConnected,

    /// Unsubscribe was called with an id the session never issued.
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(u64),

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Credential store failure.
    #[error("credential store error: {0}")]
    Credentials(String),

    /// Could not establish the transport.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Outbound message was rejected or lost.
    #[error("send failed: {0}")]
    Send(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// The runtime inbox was closed.
    #[error("channel closed")]
    ChannelClosed,
}

/// Convenience Result type for chatwire operations.
pub type Result<T> = std::result::Result<T, ChatwireError>;
