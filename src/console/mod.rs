//! Operator command console.
//!
//! The console starts at most once per process, however many times the
//! connection reopens. Each line is dispatched by its first token; sends run
//! as spawned tasks so a slow transport never stalls the event loop.

mod command;
mod input;

pub use command::{Command, UsageError, MSG_USAGE};
pub use input::{spawn_reader, ConsoleInput};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_ADDRESS_SUFFIX;
use crate::output::OutputSink;
use crate::protocol::ProtocolSession;
use crate::runtime::AppEvent;
use crate::Result;

/// Help text, one line per entry.
pub const HELP_LINES: &[&str] = &[
    "Available commands:",
    "  /msg <number> <message>  Send a text message",
    "  /help                    Show this help",
    "  /quit                    Disconnect and exit",
];

pub const NOT_READY: &str = "Not connected yet. Wait for the connection to open and try again.";

/// Whether the console has started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleState {
    started: bool,
}

impl ConsoleState {
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Mark started. Returns `false` if it already was.
    fn mark_started(&mut self) -> bool {
        !std::mem::replace(&mut self.started, true)
    }
}

/// Outcome of one console line.
#[derive(Debug)]
pub enum ConsoleAction {
    Continue,
    /// Run the shared shutdown procedure.
    Quit,
    /// A send is in flight; the handle resolves once its result is printed.
    Sending(JoinHandle<()>),
}

pub struct Console {
    state: ConsoleState,
    input: Option<ConsoleInput>,
    reader: Option<JoinHandle<()>>,
    sink: Arc<dyn OutputSink>,
    address_suffix: String,
}

impl Console {
    pub fn new(input: ConsoleInput, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            state: ConsoleState::default(),
            input: Some(input),
            reader: None,
            sink,
            address_suffix: DEFAULT_ADDRESS_SUFFIX.to_string(),
        }
    }

    pub fn with_address_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.address_suffix = suffix.into();
        self
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Whether the line reader is still attached to its input.
    pub fn is_reading(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Print help, prompt, and start reading lines. No-op after the first call.
    pub fn start(&mut self, events: mpsc::UnboundedSender<AppEvent>) -> Result<bool> {
        if !self.state.mark_started() {
            debug!("Console already started");
            return Ok(false);
        }
        let Some(input) = self.input.take() else {
            return Ok(false);
        };

        self.print_help()?;
        self.sink.prompt()?;
        self.reader = Some(spawn_reader(input, events));
        info!("Console started");
        Ok(true)
    }

    pub fn print_help(&self) -> Result<()> {
        for line in HELP_LINES {
            self.sink.line(line)?;
        }
        Ok(())
    }

    /// Dispatch one input line.
    ///
    /// `session` is the open session, or `None` while disconnected; messages
    /// are dropped rather than queued in that case.
    pub fn handle_line(
        &mut self,
        line: &str,
        session: Option<Arc<dyn ProtocolSession>>,
    ) -> Result<ConsoleAction> {
        let line = line.trim();
        if line.is_empty() {
            self.sink.prompt()?;
            return Ok(ConsoleAction::Continue);
        }

        let action = match Command::parse(line) {
            Ok(Command::Help) => {
                self.print_help()?;
                ConsoleAction::Continue
            }
            Ok(Command::Quit) => return Ok(ConsoleAction::Quit),
            Ok(Command::Send { address, text }) => match session {
                Some(session) => ConsoleAction::Sending(self.spawn_send(session, address, text)),
                None => {
                    self.sink.line(NOT_READY)?;
                    ConsoleAction::Continue
                }
            },
            Ok(Command::Unknown { raw }) => {
                self.sink.line(&format!(
                    "Unknown command: {raw}. Type /help for the list of commands."
                ))?;
                ConsoleAction::Continue
            }
            Err(usage) => {
                self.sink.line(&usage.to_string())?;
                ConsoleAction::Continue
            }
        };

        self.sink.prompt()?;
        Ok(action)
    }

    fn spawn_send(
        &self,
        session: Arc<dyn ProtocolSession>,
        address: String,
        text: String,
    ) -> JoinHandle<()> {
        let recipient = format!("{}@{}", address, self.address_suffix);
        let sink = Arc::clone(&self.sink);

        tokio::spawn(async move {
            let report = match session.send_text(&recipient, &text).await {
                Ok(()) => {
                    debug!(%recipient, "Message sent");
                    sink.line(&format!("Message sent to {address}"))
                }
                Err(e) => {
                    warn!(%recipient, "Send failed: {}", e);
                    sink.line(&format!("Failed to send message: {e}"))
                }
            };
            if let Err(e) = report {
                error!("Failed to report send result: {}", e);
            }
        })
    }

    /// Release the input stream. Further lines are never read.
    pub fn close_input(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            debug!("Console input closed");
        }
        self.input = None;
    }
}
