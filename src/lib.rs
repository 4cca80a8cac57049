//! # chatwire
//!
//! Line-based chat client over a pluggable messaging-protocol session.
//!
//! The protocol itself (pairing, encryption, framing) lives behind the
//! [`ProtocolSession`] trait. This crate keeps one session alive across
//! reconnects, reports inbound messages, and lets an operator send messages
//! with typed commands.
//!
//! ## Features
//!
//! - **Lifecycle**: explicit state machine with per-generation listener handles
//! - **Listener**: text extraction from every payload shape the service sends
//! - **Console**: `/msg`, `/help` and `/quit`, started once per process
//! - **Shutdown**: one idempotent procedure for every exit path
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chatwire::protocol::loopback::LoopbackFactory;
//! use chatwire::{FileCredentialStore, Runtime, StdoutSink};
//! use tokio::io::BufReader;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> chatwire::Result<()> {
//!     chatwire::logging::try_init("info").ok();
//!
//!     let runtime = Runtime::new(
//!         Arc::new(LoopbackFactory::new()),
//!         Arc::new(FileCredentialStore::new("auth_info")),
//!         Arc::new(StdoutSink::new()),
//!         Box::new(BufReader::new(tokio::io::stdin())),
//!     );
//!
//!     let reason = runtime.run().await?;
//!     println!("stopped: {reason}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod output;
pub mod protocol;
pub mod runtime;

// Re-export commonly used types
pub use config::Config;
pub use console::{Command, Console, ConsoleAction};
pub use error::{ChatwireError, Result};
pub use lifecycle::{
    Directive, Generation, LifecycleManager, LifecycleState, ShutdownReason, ShutdownState,
};
pub use listener::{message_text, MessageListener};
pub use output::{MemorySink, OutputSink, StdoutSink};
pub use protocol::{
    CredentialStore, Credentials, FileCredentialStore, ProtocolSession, SessionEvent,
    SessionFactory,
};
pub use runtime::{AppEvent, Runtime};
