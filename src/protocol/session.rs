//! Session and factory traits.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Credentials, EventHandler, EventKind, SubscriptionId};
use crate::Result;

/// One live connection to the messaging service.
///
/// Handlers must be registered before [`ProtocolSession::connect`] so no
/// event is emitted into the void.
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// Register a handler for one event category.
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<SubscriptionId>;

    /// Remove a handler previously returned by `subscribe`.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// Start the transport. Progress is reported through connection events.
    async fn connect(&self) -> Result<()>;

    /// Send a text message to a fully-qualified address.
    async fn send_text(&self, address: &str, text: &str) -> Result<()>;

    /// Close the transport without logging out.
    async fn close(&self) -> Result<()>;
}

/// Builds a new session for each lifecycle generation.
pub trait SessionFactory: Send + Sync {
    fn create(&self, credentials: &Credentials) -> Result<Arc<dyn ProtocolSession>>;
}
