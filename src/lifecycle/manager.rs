//! Session lifecycle manager.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DisconnectClass, Generation, GenerationCounter, LifecycleState, ShutdownReason, ShutdownState};
use crate::error::ChatwireError;
use crate::output::OutputSink;
use crate::protocol::{
    ConnectionPhase, ConnectionUpdate, CredentialStore, Credentials, DisconnectError,
    EventHandler, EventKind, ProtocolSession, SessionFactory, SubscriptionId,
};
use crate::runtime::AppEvent;
use crate::Result;

/// Event categories every generation subscribes to.
const BOUND_KINDS: [EventKind; 3] = [
    EventKind::Credentials,
    EventKind::Messages,
    EventKind::Connection,
];

/// Transport state of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Connecting,
    Open,
    Closed,
}

/// Follow-up the runtime must perform after a connection update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    None,
    /// First (or repeated) `open`; starting the console is idempotent.
    StartConsole,
    /// Run the shared shutdown procedure.
    Shutdown(ShutdownReason),
}

struct ActiveSession {
    generation: Generation,
    session: Arc<dyn ProtocolSession>,
    subscriptions: Vec<SubscriptionId>,
    phase: SessionPhase,
    connecting: Option<JoinHandle<()>>,
}

/// Owns the single active session and drives (re)connection.
///
/// The active session is replaced, never mutated in place: `start` unbinds
/// every listener of the previous generation before the next one exists.
/// The transport connect runs on its own task and reports failure through
/// [`AppEvent::ConnectFailed`], so the event loop never waits on it.
pub struct LifecycleManager {
    factory: Arc<dyn SessionFactory>,
    store: Arc<dyn CredentialStore>,
    sink: Arc<dyn OutputSink>,
    events: mpsc::UnboundedSender<AppEvent>,
    credentials: Option<Credentials>,
    active: Option<ActiveSession>,
    generations: GenerationCounter,
    state: LifecycleState,
    shutdown: ShutdownState,
    opened_once: bool,
}

impl LifecycleManager {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn OutputSink>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            factory,
            store,
            sink,
            events,
            credentials: None,
            active: None,
            generations: GenerationCounter::new(),
            state: LifecycleState::Bootstrapping,
            shutdown: ShutdownState::new(),
            opened_once: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn shutdown_state(&self) -> &ShutdownState {
        &self.shutdown
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_shutting_down()
    }

    /// Generation of the active session, if one exists.
    pub fn generation(&self) -> Option<Generation> {
        self.active.as_ref().map(|a| a.generation)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation() == Some(generation)
    }

    /// Whether the active session has live listeners.
    pub fn is_bound(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.subscriptions.is_empty())
    }

    /// The active session, only while it is open.
    pub fn open_session(&self) -> Option<Arc<dyn ProtocolSession>> {
        self.active
            .as_ref()
            .filter(|a| self.state.is_open() && a.phase == SessionPhase::Open)
            .map(|a| Arc::clone(&a.session))
    }

    /// Build a new generation, bind its listeners and start connecting.
    ///
    /// Listeners of the previous generation are removed first; failures to
    /// remove them are logged and otherwise ignored. Returns once the
    /// listeners are bound; the connect itself completes in the background.
    /// On error the manager is left in `Reconnecting` with no active session.
    pub async fn start(&mut self) -> Result<Generation> {
        if self.state == LifecycleState::Connecting {
            // Previous generation never opened.
            self.state.transition_to(LifecycleState::Reconnecting)?;
        }
        self.state.transition_to(LifecycleState::Connecting)?;
        self.unbind_active();

        match self.bind_next().await {
            Ok(generation) => Ok(generation),
            Err(e) => {
                self.unbind_active();
                self.state.transition_to(LifecycleState::Reconnecting)?;
                Err(e)
            }
        }
    }

    async fn bind_next(&mut self) -> Result<Generation> {
        let credentials = self.ensure_credentials().await?;
        let session = self.factory.create(&credentials)?;
        let generation = self.generations.next();
        let subscriptions = self.bind(generation, &session)?;
        let connecting = self.spawn_connect(generation, Arc::clone(&session));

        self.active = Some(ActiveSession {
            generation,
            session,
            subscriptions,
            phase: SessionPhase::Connecting,
            connecting: Some(connecting),
        });
        info!(%generation, "Connecting");
        Ok(generation)
    }

    fn spawn_connect(
        &self,
        generation: Generation,
        session: Arc<dyn ProtocolSession>,
    ) -> JoinHandle<()> {
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(error) = session.connect().await {
                let _ = events.send(AppEvent::ConnectFailed { generation, error });
            }
        })
    }

    /// The connect of `generation` failed.
    ///
    /// Before any generation has opened this is a bootstrap failure and the
    /// error is returned. Afterwards it is reported once and not retried:
    /// the next close/open event is the only trigger.
    pub fn on_connect_failed(
        &mut self,
        generation: Generation,
        error: ChatwireError,
    ) -> Result<()> {
        if !self.is_current(generation) {
            debug!(%generation, "Ignoring connect failure of stale generation");
            return Ok(());
        }
        self.unbind_active();
        self.state.transition_to(LifecycleState::Reconnecting)?;

        if !self.opened_once {
            return Err(error);
        }
        error!(%generation, "Reconnect failed: {}", error);
        self.sink.line(&format!("Reconnect failed: {error}"))?;
        Ok(())
    }

    /// Apply a connection update from the active generation.
    pub async fn on_connection_update(&mut self, update: ConnectionUpdate) -> Result<Directive> {
        if let Some(payload) = update.pairing.as_deref() {
            debug!("Pairing payload received");
            self.sink.pairing(payload)?;
        }

        match update.phase {
            Some(ConnectionPhase::Open) => self.on_open(),
            Some(ConnectionPhase::Close) => self.on_close(update.disconnect).await,
            Some(ConnectionPhase::Connecting) | None => Ok(Directive::None),
        }
    }

    fn on_open(&mut self) -> Result<Directive> {
        if self.state.is_open() {
            return Ok(Directive::StartConsole);
        }
        if let Err(e) = self.state.transition_to(LifecycleState::Open) {
            warn!("Ignoring open update: {}", e);
            return Ok(Directive::None);
        }
        self.opened_once = true;
        if let Some(active) = self.active.as_mut() {
            active.phase = SessionPhase::Open;
            info!(generation = %active.generation, "Connection open");
        }
        self.sink.line("Connected.")?;
        Ok(Directive::StartConsole)
    }

    async fn on_close(&mut self, disconnect: Option<DisconnectError>) -> Result<Directive> {
        if self.shutdown.is_shutting_down() {
            debug!("Close during shutdown, not reconnecting");
            return Ok(Directive::None);
        }

        let class = DisconnectClass::classify(disconnect.as_ref());
        if let Err(e) = self.state.transition_to(LifecycleState::Closing(class)) {
            warn!("Ignoring close update: {}", e);
            return Ok(Directive::None);
        }
        if let Some(active) = self.active.as_mut() {
            active.phase = SessionPhase::Closed;
        }

        match class {
            DisconnectClass::LoggedOut => {
                error!("Credentials were revoked by the server");
                self.sink.line(&format!(
                    "Logged out by the server. Delete the '{}' folder and restart to pair again.",
                    self.store.location()
                ))?;
                Ok(Directive::Shutdown(ShutdownReason::LoggedOut))
            }
            DisconnectClass::Transient => {
                let cause = disconnect
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "no error".to_string());
                warn!(%cause, "Connection closed, reconnecting");
                self.sink
                    .line(&format!("Connection closed ({cause}). Reconnecting..."))?;

                self.state.transition_to(LifecycleState::Reconnecting)?;
                if let Err(e) = self.start().await {
                    error!("Reconnect failed: {}", e);
                    self.sink.line(&format!("Reconnect failed: {e}"))?;
                }
                Ok(Directive::None)
            }
        }
    }

    /// Cache and persist updated credentials. Failures are logged.
    pub async fn persist_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials.clone());
        match self.store.persist(&credentials).await {
            Ok(()) => debug!("Credentials persisted to {}", self.store.location()),
            Err(e) => error!("Failed to persist credentials: {}", e),
        }
    }

    /// Unbind and close the active session without logging out.
    ///
    /// A connect still in flight is abandoned.
    pub async fn terminate(&mut self) {
        let session = self.active.as_ref().map(|a| Arc::clone(&a.session));
        self.unbind_active();

        if let Some(session) = session {
            if let Err(e) = session.close().await {
                warn!("Error while closing session: {}", e);
            }
        }
        if !self.state.is_terminal() {
            self.state = LifecycleState::Terminated;
        }
        info!("Session terminated");
    }

    async fn ensure_credentials(&mut self) -> Result<Credentials> {
        if let Some(ref credentials) = self.credentials {
            return Ok(credentials.clone());
        }
        let loaded = self.store.load().await?;
        debug!(registered = loaded.is_registered(), "Credentials loaded");
        self.credentials = Some(loaded.clone());
        Ok(loaded)
    }

    fn bind(
        &self,
        generation: Generation,
        session: &Arc<dyn ProtocolSession>,
    ) -> Result<Vec<SubscriptionId>> {
        let mut ids = Vec::with_capacity(BOUND_KINDS.len());

        for kind in BOUND_KINDS {
            let tx = self.events.clone();
            let handler: EventHandler = Box::new(move |event| {
                // A closed inbox means the runtime is gone.
                let _ = tx.send(AppEvent::Session { generation, event });
            });

            match session.subscribe(kind, handler) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    for id in ids {
                        let _ = session.unsubscribe(id);
                    }
                    return Err(e);
                }
            }
        }
        Ok(ids)
    }

    fn unbind_active(&mut self) {
        let Some(ActiveSession {
            generation,
            session,
            subscriptions,
            connecting,
            ..
        }) = self.active.take()
        else {
            return;
        };

        if let Some(task) = connecting.filter(|t| !t.is_finished()) {
            task.abort();
            debug!(%generation, "Abandoned pending connect");
        }
        for id in subscriptions {
            if let Err(e) = session.unsubscribe(id) {
                warn!(%generation, "Failed to remove listener {}: {}", id, e);
            }
        }
        debug!(%generation, "Listeners unbound");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use crate::protocol::loopback::{LoopbackFactory, MemoryCredentialStore};
    use crate::protocol::DisconnectReason;

    struct Harness {
        manager: LifecycleManager,
        factory: Arc<LoopbackFactory>,
        store: Arc<MemoryCredentialStore>,
        sink: Arc<MemorySink>,
        rx: mpsc::UnboundedReceiver<AppEvent>,
    }

    fn harness_with(factory: LoopbackFactory) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = Arc::new(factory);
        let store = Arc::new(MemoryCredentialStore::new());
        let sink = Arc::new(MemorySink::new());
        let manager = LifecycleManager::new(factory.clone(), store.clone(), sink.clone(), tx);
        Harness {
            manager,
            factory,
            store,
            sink,
            rx,
        }
    }

    fn harness() -> Harness {
        harness_with(LoopbackFactory::new())
    }

    impl Harness {
        /// Let spawned connects run, then take the first reported failure.
        async fn connect_failure(&mut self) -> Option<(Generation, ChatwireError)> {
            tokio::task::yield_now().await;
            while let Ok(event) = self.rx.try_recv() {
                if let AppEvent::ConnectFailed { generation, error } = event {
                    return Some((generation, error));
                }
            }
            None
        }
    }

    #[tokio::test]
    async fn test_start_binds_three_listeners() {
        let mut h = harness();
        let generation = h.manager.start().await.unwrap();

        assert_eq!(generation, Generation::from_raw(1));
        assert_eq!(h.manager.state(), LifecycleState::Connecting);
        assert!(h.manager.is_bound());
        assert_eq!(h.factory.latest().unwrap().total_listeners(), 3);
    }

    #[tokio::test]
    async fn test_events_are_tagged_with_generation() {
        let mut h = harness();
        let generation = h.manager.start().await.unwrap();
        tokio::task::yield_now().await;

        let mut seen = 0;
        while let Ok(event) = h.rx.try_recv() {
            let AppEvent::Session { generation: g, .. } = event else {
                panic!("unexpected event");
            };
            assert_eq!(g, generation);
            seen += 1;
        }
        // connecting, pairing, credentials, open
        assert_eq!(seen, 4);
    }

    #[tokio::test]
    async fn test_restart_unbinds_previous_generation() {
        let mut h = harness();
        h.manager.start().await.unwrap();
        let second = h.manager.start().await.unwrap();

        let sessions = h.factory.sessions();
        assert_eq!(sessions[0].total_listeners(), 0);
        assert_eq!(sessions[1].total_listeners(), 3);
        assert!(h.manager.is_current(second));
        assert!(!h.manager.is_current(Generation::from_raw(1)));
    }

    #[tokio::test]
    async fn test_credentials_loaded_once() {
        let mut h = harness();
        h.manager.start().await.unwrap();
        h.manager.start().await.unwrap();
        assert_eq!(h.store.load_count(), 1);
    }

    #[tokio::test]
    async fn test_open_requests_console() {
        let mut h = harness();
        h.manager.start().await.unwrap();

        let directive = h
            .manager
            .on_connection_update(ConnectionUpdate::open())
            .await
            .unwrap();

        assert_eq!(directive, Directive::StartConsole);
        assert_eq!(h.manager.state(), LifecycleState::Open);
        assert!(h.manager.open_session().is_some());
        assert_eq!(h.sink.matching("Connected").len(), 1);
    }

    #[tokio::test]
    async fn test_pairing_is_surfaced() {
        let mut h = harness();
        h.manager
            .on_connection_update(ConnectionUpdate::pairing("PAIR"))
            .await
            .unwrap();
        assert_eq!(h.sink.pairings(), vec!["PAIR"]);
        assert_eq!(h.manager.state(), LifecycleState::Bootstrapping);
    }

    #[tokio::test]
    async fn test_transient_close_starts_next_generation() {
        let mut h = harness();
        h.manager.start().await.unwrap();
        h.manager
            .on_connection_update(ConnectionUpdate::open())
            .await
            .unwrap();

        let error = DisconnectError::from_reason(DisconnectReason::RestartRequired, "restart");
        let directive = h
            .manager
            .on_connection_update(ConnectionUpdate::closed(Some(error)))
            .await
            .unwrap();

        assert_eq!(directive, Directive::None);
        assert_eq!(h.manager.generation(), Some(Generation::from_raw(2)));
        assert_eq!(h.manager.state(), LifecycleState::Connecting);
        assert!(h.manager.open_session().is_none());
        assert_eq!(h.sink.matching("Reconnecting").len(), 1);
    }

    #[tokio::test]
    async fn test_close_without_error_reconnects() {
        let mut h = harness();
        h.manager.start().await.unwrap();
        h.manager
            .on_connection_update(ConnectionUpdate::closed(None))
            .await
            .unwrap();
        assert_eq!(h.manager.generation(), Some(Generation::from_raw(2)));
    }

    #[tokio::test]
    async fn test_logged_out_requests_shutdown() {
        let mut h = harness();
        h.manager.start().await.unwrap();

        let error = DisconnectError::from_reason(DisconnectReason::LoggedOut, "revoked");
        let directive = h
            .manager
            .on_connection_update(ConnectionUpdate::closed(Some(error)))
            .await
            .unwrap();

        assert_eq!(directive, Directive::Shutdown(ShutdownReason::LoggedOut));
        assert_eq!(h.factory.sessions().len(), 1);
        assert_eq!(h.sink.matching("Delete the 'memory' folder").len(), 1);
    }

    #[tokio::test]
    async fn test_close_while_shutting_down_is_ignored() {
        let mut h = harness();
        h.manager.start().await.unwrap();
        assert!(h.manager.shutdown_state().begin());

        let directive = h
            .manager
            .on_connection_update(ConnectionUpdate::closed(None))
            .await
            .unwrap();

        assert_eq!(directive, Directive::None);
        assert_eq!(h.factory.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_start_returns_before_connect_completes() {
        let mut h = harness_with(LoopbackFactory::stalling_after(0));
        let generation = h.manager.start().await.unwrap();
        tokio::task::yield_now().await;

        assert!(h.manager.is_current(generation));
        assert!(h.manager.is_bound());
        assert_eq!(h.manager.state(), LifecycleState::Connecting);
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_restart_abandons_pending_connect() {
        let mut h = harness_with(LoopbackFactory::stalling_after(0));
        h.manager.start().await.unwrap();
        tokio::task::yield_now().await;

        let second = h.manager.start().await.unwrap();
        h.manager.terminate().await;

        let sessions = h.factory.sessions();
        assert_eq!(second, Generation::from_raw(2));
        assert!(sessions.iter().all(|s| s.total_listeners() == 0));
        assert_eq!(h.manager.state(), LifecycleState::Terminated);
    }

    #[tokio::test]
    async fn test_bootstrap_connect_failure_is_returned() {
        let mut h = harness_with(LoopbackFactory::refusing_after(0));
        h.manager.start().await.unwrap();

        let (generation, error) = h.connect_failure().await.unwrap();
        let result = h.manager.on_connect_failed(generation, error);

        assert!(matches!(result, Err(ChatwireError::Connect(_))));
        assert!(h.manager.generation().is_none());
        assert!(h.sink.matching("Reconnect failed").is_empty());
    }

    #[tokio::test]
    async fn test_stale_connect_failure_is_ignored() {
        let mut h = harness();
        h.manager.start().await.unwrap();

        let outcome = h.manager.on_connect_failed(
            Generation::from_raw(7),
            ChatwireError::Connect("late".into()),
        );

        assert!(outcome.is_ok());
        assert!(h.manager.is_current(Generation::from_raw(1)));
        assert_eq!(h.manager.state(), LifecycleState::Connecting);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_not_retried() {
        let mut h = harness_with(LoopbackFactory::refusing_after(1));
        h.manager.start().await.unwrap();
        h.manager
            .on_connection_update(ConnectionUpdate::open())
            .await
            .unwrap();

        h.manager
            .on_connection_update(ConnectionUpdate::closed(None))
            .await
            .unwrap();
        let (generation, error) = h.connect_failure().await.unwrap();
        h.manager.on_connect_failed(generation, error).unwrap();

        assert_eq!(generation, Generation::from_raw(2));
        assert!(h.connect_failure().await.is_none());
        assert_eq!(h.factory.sessions().len(), 2);
        assert_eq!(h.manager.state(), LifecycleState::Reconnecting);
        assert!(h.manager.generation().is_none());
        assert_eq!(h.sink.matching("Reconnect failed").len(), 1);
    }

    #[tokio::test]
    async fn test_persist_updates_cache() {
        let mut h = harness();
        let creds = Credentials::new(serde_json::json!({ "registered": true }));
        h.manager.persist_credentials(creds.clone()).await;

        assert_eq!(h.store.current(), Some(creds));
        h.manager.start().await.unwrap();
        assert_eq!(h.store.load_count(), 0);
    }

    #[tokio::test]
    async fn test_terminate_closes_without_listeners() {
        let mut h = harness();
        h.manager.start().await.unwrap();
        let session = h.factory.latest().unwrap();

        h.manager.terminate().await;

        assert_eq!(session.close_calls(), 1);
        assert_eq!(session.total_listeners(), 0);
        assert_eq!(h.manager.state(), LifecycleState::Terminated);
        assert!(h.manager.generation().is_none());
    }
}
