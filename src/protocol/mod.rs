//! Contracts for the messaging transport.
//!
//! The protocol itself (pairing, encryption, multi-device sync) lives
//! behind [`ProtocolSession`] and [`SessionFactory`]. This module defines
//! what the client needs from it: typed events, a per-category
//! subscribe/unsubscribe seam, sending, and a non-destructive close.
//! [`loopback`] provides an in-process transport that honours the same
//! contract.

mod credentials;
mod event;
pub mod loopback;
mod message;
mod session;
mod subscribers;

pub use credentials::{CredentialStore, Credentials, FileCredentialStore, CREDENTIALS_FILE};
pub use event::{
    ConnectionPhase, ConnectionUpdate, DisconnectError, DisconnectReason, EventKind, SessionEvent,
};
pub use message::{
    ButtonsResponse, CaptionedMedia, ExtendedText, MessageBatch, MessageContent, MessageEnvelope,
    MessageKey, TemplateButtonReply, UpsertKind,
};
pub use session::{ProtocolSession, SessionFactory};
pub use subscribers::{EventHandler, SubscriptionId, Subscribers};
