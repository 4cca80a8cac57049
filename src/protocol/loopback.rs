//! In-process loopback transport.
//!
//! Every message sent is echoed back twice: once as the self-echo the
//! service would deliver (`fromMe`), once as a reply from the recipient.
//! Lets the client run end to end without a network, and gives tests a
//! session whose remote side they can drive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::{
    ConnectionUpdate, CredentialStore, Credentials, DisconnectError, DisconnectReason,
    EventHandler, EventKind, MessageBatch, MessageEnvelope, ProtocolSession, SessionEvent,
    SessionFactory, SubscriptionId, Subscribers,
};
use crate::error::ChatwireError;
use crate::Result;

/// How `connect` behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectMode {
    #[default]
    Complete,
    Refuse,
    /// Never completes.
    Stall,
}

/// How `send_text` behaves once the session is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SendMode {
    #[default]
    Deliver,
    Reject,
    /// Never completes.
    Stall,
}

/// Loopback session.
pub struct LoopbackSession {
    credentials: Credentials,
    subscribers: Subscribers,
    open: AtomicBool,
    connect_mode: ConnectMode,
    send_mode: SendMode,
    sent: Mutex<Vec<(String, String)>>,
    close_calls: AtomicUsize,
}

impl LoopbackSession {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            subscribers: Subscribers::new(),
            open: AtomicBool::new(false),
            connect_mode: ConnectMode::Complete,
            send_mode: SendMode::Deliver,
            sent: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Messages accepted by `send_text`, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Handlers currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.subscribers.count(kind)
    }

    pub fn total_listeners(&self) -> usize {
        self.subscribers.total()
    }

    /// Emit an arbitrary event as if it came from the service.
    pub fn inject(&self, event: SessionEvent) -> usize {
        self.subscribers.emit(event)
    }

    /// Simulate the service dropping the connection.
    pub fn drop_connection(&self, reason: DisconnectReason) {
        self.open.store(false, Ordering::SeqCst);
        let error = DisconnectError::from_reason(reason, format!("{reason:?}"));
        self.subscribers
            .emit(SessionEvent::Connection(ConnectionUpdate::closed(Some(
                error,
            ))));
    }

    fn pairing_payload() -> String {
        format!("loopback-pair:{}", std::process::id())
    }
}

#[async_trait]
impl ProtocolSession for LoopbackSession {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<SubscriptionId> {
        self.subscribers.subscribe(kind, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.subscribers.unsubscribe(id)
    }

    async fn connect(&self) -> Result<()> {
        match self.connect_mode {
            ConnectMode::Complete => {}
            ConnectMode::Refuse => {
                return Err(ChatwireError::Connect("loopback refused connection".into()));
            }
            ConnectMode::Stall => std::future::pending::<()>().await,
        }

        self.subscribers
            .emit(SessionEvent::Connection(ConnectionUpdate::connecting()));

        if !self.credentials.is_registered() {
            self.subscribers
                .emit(SessionEvent::Connection(ConnectionUpdate::pairing(
                    Self::pairing_payload(),
                )));
            let paired = Credentials::new(json!({
                "registered": true,
                "me": { "id": "loopback" },
            }));
            self.subscribers
                .emit(SessionEvent::CredentialsUpdated(paired));
        }

        self.open.store(true, Ordering::SeqCst);
        self.subscribers
            .emit(SessionEvent::Connection(ConnectionUpdate::open()));
        debug!("Loopback session open");
        Ok(())
    }

    async fn send_text(&self, address: &str, text: &str) -> Result<()> {
        if !self.is_open() {
            return Err(ChatwireError::NotConnected);
        }
        match self.send_mode {
            SendMode::Deliver => {}
            SendMode::Reject => {
                return Err(ChatwireError::Send("recipient unreachable".into()));
            }
            SendMode::Stall => std::future::pending::<()>().await,
        }

        self.sent
            .lock()
            .map_err(|_| ChatwireError::LockPoisoned)?
            .push((address.to_string(), text.to_string()));

        let echo = MessageEnvelope::text(address, text).from_me();
        let reply = MessageEnvelope::text(address, text);
        self.subscribers
            .emit(SessionEvent::Messages(MessageBatch::notify(vec![echo, reply])));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.open.swap(false, Ordering::SeqCst) {
            let error = DisconnectError::from_reason(
                DisconnectReason::ConnectionClosed,
                "closed by client",
            );
            self.subscribers
                .emit(SessionEvent::Connection(ConnectionUpdate::closed(Some(
                    error,
                ))));
        }
        Ok(())
    }
}

/// Factory producing [`LoopbackSession`]s and remembering each one.
#[derive(Default)]
pub struct LoopbackFactory {
    sessions: Mutex<Vec<Arc<LoopbackSession>>>,
    /// Number of sessions that connect normally, and what the rest do.
    degrade_after: Option<(usize, ConnectMode)>,
    send_mode: SendMode,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions created after the first `n` refuse to connect.
    pub fn refusing_after(n: usize) -> Self {
        Self {
            degrade_after: Some((n, ConnectMode::Refuse)),
            ..Self::default()
        }
    }

    /// Sessions created after the first `n` never finish connecting.
    pub fn stalling_after(n: usize) -> Self {
        Self {
            degrade_after: Some((n, ConnectMode::Stall)),
            ..Self::default()
        }
    }

    /// Every session created from now on sends with `mode`.
    pub fn with_send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }

    /// Every session created so far, oldest first.
    pub fn sessions(&self) -> Vec<Arc<LoopbackSession>> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Most recently created session.
    pub fn latest(&self) -> Option<Arc<LoopbackSession>> {
        self.sessions().last().cloned()
    }
}

impl SessionFactory for LoopbackFactory {
    fn create(&self, credentials: &Credentials) -> Result<Arc<dyn ProtocolSession>> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| ChatwireError::LockPoisoned)?;

        let mut session = LoopbackSession::new(credentials.clone());
        if let Some((n, mode)) = self.degrade_after {
            if sessions.len() >= n {
                session.connect_mode = mode;
            }
        }
        session.send_mode = self.send_mode;

        let session = Arc::new(session);
        sessions.push(Arc::clone(&session));
        info!("Created loopback session #{}", sessions.len());
        Ok(session)
    }
}

/// Credential store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryCredentialStore {
    current: Mutex<Option<Credentials>>,
    loads: AtomicUsize,
    persists: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            current: Mutex::new(Some(credentials)),
            ..Self::default()
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Credentials> {
        self.current.lock().ok().and_then(|c| c.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Credentials> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.current().unwrap_or_default())
    }

    async fn persist(&self, credentials: &Credentials) -> Result<()> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        *self
            .current
            .lock()
            .map_err(|_| ChatwireError::LockPoisoned)? = Some(credentials.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
