//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chatwire::console::ConsoleInput;
use chatwire::output::MemorySink;
use chatwire::protocol::loopback::{LoopbackFactory, LoopbackSession, MemoryCredentialStore};
use chatwire::protocol::{CredentialStore, SessionEvent};
use chatwire::{AppEvent, Generation, Runtime, ShutdownReason};
use tokio::io::{BufReader, DuplexStream};

/// A runtime wired to the loopback transport and an in-memory sink.
pub struct Client {
    pub runtime: Runtime,
    pub factory: Arc<LoopbackFactory>,
    pub store: Arc<MemoryCredentialStore>,
    pub sink: Arc<MemorySink>,
    /// Writer half of the console input. Dropping it ends the input.
    pub input: Option<DuplexStream>,
}

impl Client {
    pub fn new() -> Self {
        Self::with(LoopbackFactory::new(), MemoryCredentialStore::new())
    }

    pub fn with(factory: LoopbackFactory, store: MemoryCredentialStore) -> Self {
        let factory = Arc::new(factory);
        let store = Arc::new(store);
        let sink = Arc::new(MemorySink::new());
        let (writer, reader) = tokio::io::duplex(256);
        let input: ConsoleInput = Box::new(BufReader::new(reader));

        let runtime = Runtime::new(factory.clone(), store.clone(), sink.clone(), input);
        Self {
            runtime,
            factory,
            store,
            sink,
            input: Some(writer),
        }
    }

    /// Bootstrap and process every event up to the open connection.
    pub async fn connected() -> Self {
        let mut client = Self::new();
        client.runtime.bootstrap().await.expect("bootstrap");
        client.runtime.pump().await.expect("pump");
        client
    }

    pub fn session(&self) -> Arc<LoopbackSession> {
        self.factory.latest().expect("no session created")
    }

    pub fn generation(&self) -> Generation {
        self.runtime.manager().generation().expect("no active session")
    }

    /// Queue a console line as if the operator typed it.
    pub fn type_line(&self, line: &str) {
        self.runtime
            .events()
            .send(AppEvent::ConsoleLine(line.to_string()))
            .expect("inbox closed");
    }

    /// Queue a protocol event tagged with `generation`.
    pub fn deliver(&self, generation: Generation, event: SessionEvent) {
        self.runtime
            .events()
            .send(AppEvent::Session { generation, event })
            .expect("inbox closed");
    }

    pub async fn pump(&mut self) -> Option<ShutdownReason> {
        self.runtime.pump().await.expect("pump")
    }

    /// Pump until the shutdown procedure runs, giving spawned readers time
    /// to deliver their events.
    pub async fn pump_until_shutdown(&mut self) -> ShutdownReason {
        for _ in 0..200 {
            if let Some(reason) = self.pump().await {
                return reason;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("shutdown never ran");
    }
}

/// Poll `done` until it holds, sleeping between checks.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held");
}

/// A credential store whose reads never complete.
pub struct StalledStore;

#[async_trait::async_trait]
impl CredentialStore for StalledStore {
    async fn load(&self) -> chatwire::Result<chatwire::Credentials> {
        std::future::pending().await
    }

    async fn persist(&self, _credentials: &chatwire::Credentials) -> chatwire::Result<()> {
        Ok(())
    }

    fn location(&self) -> String {
        "stalled".to_string()
    }
}

/// A credential store whose reads always fail.
pub struct UnreadableStore;

#[async_trait::async_trait]
impl CredentialStore for UnreadableStore {
    async fn load(&self) -> chatwire::Result<chatwire::Credentials> {
        Err(chatwire::ChatwireError::Credentials("permission denied".into()))
    }

    async fn persist(&self, _credentials: &chatwire::Credentials) -> chatwire::Result<()> {
        Ok(())
    }

    fn location(&self) -> String {
        "unreadable".to_string()
    }
}
