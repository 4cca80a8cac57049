//! Output sinks for operator-facing text.

use std::io::Write;
use std::sync::Mutex;

use crate::error::ChatwireError;
use crate::Result;

/// Destination for everything the operator sees.
///
/// Errors propagate to the caller; a broken terminal is fatal.
pub trait OutputSink: Send + Sync {
    /// Write one line.
    fn line(&self, text: &str) -> Result<()>;

    /// Surface a pairing payload for scanning.
    fn pairing(&self, payload: &str) -> Result<()>;

    /// Show the input prompt.
    fn prompt(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes to the process's standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for StdoutSink {
    fn line(&self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        // Start on a fresh line in case a prompt is pending.
        writeln!(out, "\r{}", text)?;
        Ok(())
    }

    fn pairing(&self, payload: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "\rScan this pairing code with the app on your phone:")?;
        writeln!(out, "{}", payload)?;
        Ok(())
    }

    fn prompt(&self) -> Result<()> {
        let mut out = std::io::stdout().lock();
        write!(out, "> ")?;
        out.flush()?;
        Ok(())
    }
}

/// Records output in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    pairings: Mutex<Vec<String>>,
    prompts: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn pairings(&self) -> Vec<String> {
        self.pairings.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn prompts(&self) -> usize {
        self.prompts.lock().map(|p| *p).unwrap_or(0)
    }

    /// Lines containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl OutputSink for MemorySink {
    fn line(&self, text: &str) -> Result<()> {
        self.lines
            .lock()
            .map_err(|_| ChatwireError::LockPoisoned)?
            .push(text.to_string());
        Ok(())
    }

    fn pairing(&self, payload: &str) -> Result<()> {
        self.pairings
            .lock()
            .map_err(|_| ChatwireError::LockPoisoned)?
            .push(payload.to_string());
        Ok(())
    }

    fn prompt(&self) -> Result<()> {
        *self.prompts.lock().map_err(|_| ChatwireError::LockPoisoned)? += 1;
        Ok(())
    }
}
