//! Event loop tying the lifecycle manager, listener and console together.
//!
//! Every input the client reacts to arrives on one inbox and is handled in
//! arrival order on a single task: protocol events (tagged with the
//! generation that produced them), console lines, end of console input and
//! the interrupt signal. Nothing awaited here waits on the network: the
//! transport connect and outbound sends run on their own tasks and report
//! back through the inbox.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::DEFAULT_ADDRESS_SUFFIX;
use crate::console::{Console, ConsoleAction, ConsoleInput};
use crate::error::ChatwireError;
use crate::lifecycle::{Directive, Generation, LifecycleManager, ShutdownReason};
use crate::listener::MessageListener;
use crate::output::OutputSink;
use crate::protocol::{CredentialStore, SessionEvent, SessionFactory};
use crate::Result;

/// One entry in the runtime inbox.
#[derive(Debug)]
pub enum AppEvent {
    /// Event from the protocol session of `generation`.
    Session {
        generation: Generation,
        event: SessionEvent,
    },
    /// The connect of `generation` failed.
    ConnectFailed {
        generation: Generation,
        error: ChatwireError,
    },
    /// A line typed at the console.
    ConsoleLine(String),
    /// Console input ended or failed.
    ConsoleClosed,
    /// Interrupt signal received.
    Interrupt,
}

pub struct Runtime {
    manager: LifecycleManager,
    console: Console,
    listener: MessageListener,
    sink: Arc<dyn OutputSink>,
    events: mpsc::UnboundedSender<AppEvent>,
    inbox: mpsc::UnboundedReceiver<AppEvent>,
}

impl Runtime {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn OutputSink>,
        input: ConsoleInput,
    ) -> Self {
        let (events, inbox) = mpsc::unbounded_channel();
        let manager = LifecycleManager::new(factory, store, Arc::clone(&sink), events.clone());
        let console = Console::new(input, Arc::clone(&sink));

        Self {
            manager,
            console,
            listener: MessageListener::new(DEFAULT_ADDRESS_SUFFIX),
            sink,
            events,
            inbox,
        }
    }

    /// Use `suffix` for outbound addresses and for display stripping.
    pub fn with_address_suffix(mut self, suffix: &str) -> Self {
        self.console = self.console.with_address_suffix(suffix);
        self.listener = MessageListener::new(suffix);
        self
    }

    /// Sender side of the inbox.
    pub fn events(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.events.clone()
    }

    pub fn manager(&self) -> &LifecycleManager {
        &self.manager
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Observes `Some(reason)` once the shutdown procedure has finished.
    pub fn shutdown_signal(&self) -> watch::Receiver<Option<ShutdownReason>> {
        self.manager.shutdown_state().subscribe()
    }

    /// Load credentials and start the first connection.
    ///
    /// Returns once the first generation is bound; the outcome of its
    /// connect arrives later through the inbox.
    pub async fn bootstrap(&mut self) -> Result<Generation> {
        let generation = self.manager.start().await?;
        info!(%generation, "Bootstrap started");
        Ok(generation)
    }

    /// Handle one event. Returns the reason if this event ran the shutdown.
    pub async fn dispatch(&mut self, event: AppEvent) -> Result<Option<ShutdownReason>> {
        match event {
            // Credentials are persisted whatever the generation or phase.
            AppEvent::Session {
                event: SessionEvent::CredentialsUpdated(credentials),
                ..
            } => {
                self.manager.persist_credentials(credentials).await;
                Ok(None)
            }
            _ if self.manager.is_shutting_down() => {
                trace!("Shutting down, event ignored");
                Ok(None)
            }
            AppEvent::Session { generation, event } => {
                self.on_session_event(generation, event).await
            }
            AppEvent::ConnectFailed { generation, error } => {
                self.manager.on_connect_failed(generation, error)?;
                Ok(None)
            }
            AppEvent::ConsoleLine(line) => self.on_console_line(&line).await,
            AppEvent::ConsoleClosed => Ok(self.shutdown(ShutdownReason::InputClosed).await),
            AppEvent::Interrupt => Ok(self.shutdown(ShutdownReason::Interrupted).await),
        }
    }

    async fn on_session_event(
        &mut self,
        generation: Generation,
        event: SessionEvent,
    ) -> Result<Option<ShutdownReason>> {
        if !self.manager.is_current(generation) {
            debug!(%generation, kind = ?event.kind(), "Dropping event from stale generation");
            return Ok(None);
        }

        match event {
            SessionEvent::CredentialsUpdated(credentials) => {
                self.manager.persist_credentials(credentials).await;
            }
            SessionEvent::Messages(batch) => {
                self.listener.handle(&batch, self.sink.as_ref())?;
            }
            SessionEvent::Connection(update) => {
                match self.manager.on_connection_update(update).await? {
                    Directive::None => {}
                    Directive::StartConsole => {
                        self.console.start(self.events.clone())?;
                    }
                    Directive::Shutdown(reason) => return Ok(self.shutdown(reason).await),
                }
            }
        }
        Ok(None)
    }

    async fn on_console_line(&mut self, line: &str) -> Result<Option<ShutdownReason>> {
        let session = self.manager.open_session();
        match self.console.handle_line(line, session)? {
            ConsoleAction::Continue => Ok(None),
            ConsoleAction::Quit => Ok(self.shutdown(ShutdownReason::Quit).await),
            // Detached; the send reports its own outcome.
            ConsoleAction::Sending(_) => Ok(None),
        }
    }

    /// Shared shutdown procedure.
    ///
    /// Only the first caller tears down; later calls return `None`. The
    /// connection is closed without logging out, so the stored credentials
    /// stay valid for the next run. In-flight sends are left to finish or
    /// fail on their own.
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> Option<ShutdownReason> {
        if !self.manager.shutdown_state().begin() {
            debug!(%reason, "Shutdown already in progress");
            return None;
        }
        info!(%reason, "Shutting down");

        self.console.close_input();
        self.manager.terminate().await;
        if let Err(e) = self.sink.line("Goodbye.") {
            warn!("Failed to write farewell: {}", e);
        }

        self.manager.shutdown_state().complete(reason);
        Some(reason)
    }

    /// Dispatch everything queued, letting spawned tasks run between
    /// rounds, until a round finds the inbox empty. Returns the shutdown
    /// reason if one ran.
    ///
    /// Tasks that stay pending (a stalled connect or send) do not hold the
    /// pump up.
    pub async fn pump(&mut self) -> Result<Option<ShutdownReason>> {
        let mut outcome = None;
        loop {
            tokio::task::yield_now().await;
            let mut handled = 0;
            while let Ok(event) = self.inbox.try_recv() {
                handled += 1;
                if let Some(reason) = self.dispatch(event).await? {
                    outcome = Some(reason);
                }
            }
            if handled == 0 {
                return Ok(outcome);
            }
        }
    }

    /// Bootstrap, then handle events until the shutdown procedure has run.
    ///
    /// The interrupt watcher is live before bootstrap, so an interrupt
    /// during a slow credential load ends the run cleanly.
    pub async fn run(mut self) -> Result<ShutdownReason> {
        let watcher = self.spawn_interrupt_watcher();

        let early = match self.bootstrap_until_interrupt().await {
            Ok(Some(early)) => early,
            Ok(None) => {
                let reason = ShutdownReason::Interrupted;
                self.shutdown(reason).await;
                watcher.abort();
                return Ok(reason);
            }
            Err(e) => {
                error!("Bootstrap failed: {}", e);
                watcher.abort();
                return Err(e);
            }
        };

        let mut queued = early.into_iter();
        let outcome = loop {
            let event = match queued.next() {
                Some(event) => event,
                None => match self.inbox.recv().await {
                    Some(event) => event,
                    None => break Err(ChatwireError::ChannelClosed),
                },
            };
            match self.dispatch(event).await {
                Ok(Some(reason)) => break Ok(reason),
                Ok(None) => {}
                Err(e) => {
                    error!("Fatal error: {}", e);
                    self.console.close_input();
                    self.manager.terminate().await;
                    break Err(e);
                }
            }
        };

        watcher.abort();
        outcome
    }

    fn spawn_interrupt_watcher(&self) -> JoinHandle<()> {
        let interrupts = self.events();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = interrupts.send(AppEvent::Interrupt);
                }
                Err(e) => warn!("Cannot listen for interrupt signal: {}", e),
            }
        })
    }

    /// Run the first `start` while watching the inbox for an interrupt.
    ///
    /// Returns `None` if interrupted, otherwise the events that arrived
    /// meanwhile, in order, for the main loop to handle first.
    async fn bootstrap_until_interrupt(&mut self) -> Result<Option<Vec<AppEvent>>> {
        let mut early = Vec::new();
        let start = self.manager.start();
        tokio::pin!(start);

        loop {
            tokio::select! {
                result = &mut start => {
                    let generation = result?;
                    info!(%generation, "Bootstrap started");
                    return Ok(Some(early));
                }
                event = self.inbox.recv() => match event {
                    Some(AppEvent::Interrupt) => {
                        info!("Interrupted during bootstrap");
                        return Ok(None);
                    }
                    Some(other) => early.push(other),
                    None => return Err(ChatwireError::ChannelClosed),
                },
            }
        }
    }
}
