//! Handler registry for session implementations.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::{EventKind, SessionEvent};
use crate::error::ChatwireError;
use crate::Result;

/// Callback invoked for each event of the subscribed kind.
pub type EventHandler = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// Handle returned by `subscribe`, required to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Entry {
    kind: EventKind,
    handler: Arc<dyn Fn(SessionEvent) + Send + Sync>,
}

/// Thread-safe set of event handlers, keyed by subscription id.
pub struct Subscribers {
    next_id: AtomicU64,
    entries: RwLock<HashMap<SubscriptionId, Entry>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ChatwireError::LockPoisoned)?;

        entries.insert(
            id,
            Entry {
                kind,
                handler: Arc::from(handler),
            },
        );
        Ok(id)
    }

    /// Remove a handler. Unknown ids are an error.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ChatwireError::LockPoisoned)?;

        entries
            .remove(&id)
            .map(|_| ())
            .ok_or(ChatwireError::SubscriptionNotFound(id.as_u64()))
    }

    /// Deliver `event` to every handler of its kind.
    ///
    /// Handlers run after the lock is released, so a handler may call back
    /// into `subscribe`/`unsubscribe`.
    pub fn emit(&self, event: SessionEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<_> = match self.entries.read() {
            Ok(entries) => entries
                .values()
                .filter(|entry| entry.kind == kind)
                .map(|entry| Arc::clone(&entry.handler))
                .collect(),
            Err(_) => return 0,
        };

        for handler in &handlers {
            handler(event.clone());
        }
        handlers.len()
    }

    /// Number of handlers registered for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.kind == kind).count())
            .unwrap_or(0)
    }

    /// Number of handlers across all kinds.
    pub fn total(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for Subscribers {
    fn default() -> Self {
        Self::new()
    }
}
