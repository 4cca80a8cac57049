//! Console line reader.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::runtime::AppEvent;

/// Line source for the console: stdin in the binary, buffers in tests.
pub type ConsoleInput = Box<dyn AsyncBufRead + Send + Unpin>;

/// Forward each input line to the runtime inbox.
///
/// Sends [`AppEvent::ConsoleClosed`] once the input ends or fails.
pub fn spawn_reader(input: ConsoleInput, events: mpsc::UnboundedSender<AppEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if events.send(AppEvent::ConsoleLine(line)).is_err() {
                        debug!("Inbox closed, console reader stopping");
                        return;
                    }
                }
                Ok(None) => {
                    debug!("Console input reached end of file");
                    break;
                }
                Err(e) => {
                    warn!("Console input error: {}", e);
                    break;
                }
            }
        }
        let _ = events.send(AppEvent::ConsoleClosed);
    })
}
