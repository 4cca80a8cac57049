//! Events emitted by a protocol session.

use serde::{Deserialize, Serialize};

use super::{Credentials, MessageBatch};

/// Event categories a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Authentication material changed and must be re-persisted.
    Credentials,
    /// Inbound message batches.
    Messages,
    /// Connection lifecycle updates.
    Connection,
}

/// A single event from a protocol session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    CredentialsUpdated(Credentials),
    Messages(MessageBatch),
    Connection(ConnectionUpdate),
}

impl SessionEvent {
    /// Category this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::CredentialsUpdated(_) => EventKind::Credentials,
            SessionEvent::Messages(_) => EventKind::Messages,
            SessionEvent::Connection(_) => EventKind::Connection,
        }
    }
}

/// Transport phase reported by a connection update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    Connecting,
    Open,
    Close,
}

/// Connection update: any combination of phase, disconnect cause and
/// pairing payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    #[serde(rename = "connection")]
    pub phase: Option<ConnectionPhase>,
    #[serde(rename = "lastDisconnect")]
    pub disconnect: Option<DisconnectError>,
    #[serde(rename = "qr")]
    pub pairing: Option<String>,
}

impl ConnectionUpdate {
    pub fn open() -> Self {
        Self {
            phase: Some(ConnectionPhase::Open),
            ..Self::default()
        }
    }

    pub fn connecting() -> Self {
        Self {
            phase: Some(ConnectionPhase::Connecting),
            ..Self::default()
        }
    }

    pub fn closed(disconnect: Option<DisconnectError>) -> Self {
        Self {
            phase: Some(ConnectionPhase::Close),
            disconnect,
            pairing: None,
        }
    }

    pub fn pairing(payload: impl Into<String>) -> Self {
        Self {
            pairing: Some(payload.into()),
            ..Self::default()
        }
    }
}

/// Error attached to a close update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectError {
    /// Status code the service attached to the disconnect, if any.
    pub status_code: Option<u16>,
    /// Human-readable cause.
    #[serde(default)]
    pub message: String,
}

impl DisconnectError {
    pub fn new(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Build an error carrying the canonical status code for `reason`.
    pub fn from_reason(reason: DisconnectReason, message: impl Into<String>) -> Self {
        Self::new(reason.status_code(), message)
    }

    pub fn reason(&self) -> DisconnectReason {
        DisconnectReason::from_status(self.status_code)
    }
}

impl std::fmt::Display for DisconnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status_code, self.message.is_empty()) {
            (Some(code), false) => write!(f, "{} (status {})", self.message, code),
            (Some(code), true) => write!(f, "status {}", code),
            (None, false) => write!(f, "{}", self.message),
            (None, true) => write!(f, "unknown cause"),
        }
    }
}

/// Disconnect causes known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Credentials were revoked remotely. Terminal.
    LoggedOut,
    Forbidden,
    /// Connection lost or timed out (both reported as 408).
    ConnectionLost,
    MultideviceMismatch,
    ConnectionClosed,
    /// Another client took over this login.
    ConnectionReplaced,
    BadSession,
    UnavailableService,
    RestartRequired,
    /// No status, or a status this client does not recognise.
    Unknown,
}

impl DisconnectReason {
    pub fn from_status(code: Option<u16>) -> Self {
        match code {
            Some(401) => DisconnectReason::LoggedOut,
            Some(403) => DisconnectReason::Forbidden,
            Some(408) => DisconnectReason::ConnectionLost,
            Some(411) => DisconnectReason::MultideviceMismatch,
            Some(428) => DisconnectReason::ConnectionClosed,
            Some(440) => DisconnectReason::ConnectionReplaced,
            Some(500) => DisconnectReason::BadSession,
            Some(503) => DisconnectReason::UnavailableService,
            Some(515) => DisconnectReason::RestartRequired,
            _ => DisconnectReason::Unknown,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DisconnectReason::LoggedOut => Some(401),
            DisconnectReason::Forbidden => Some(403),
            DisconnectReason::ConnectionLost => Some(408),
            DisconnectReason::MultideviceMismatch => Some(411),
            DisconnectReason::ConnectionClosed => Some(428),
            DisconnectReason::ConnectionReplaced => Some(440),
            DisconnectReason::BadSession => Some(500),
            DisconnectReason::UnavailableService => Some(503),
            DisconnectReason::RestartRequired => Some(515),
            DisconnectReason::Unknown => None,
        }
    }

    /// Whether stored credentials are permanently invalid.
    pub fn is_logged_out(&self) -> bool {
        matches!(self, DisconnectReason::LoggedOut)
    }
}
