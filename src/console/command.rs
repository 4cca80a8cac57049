//! Console command parsing.

use std::fmt;

/// Usage line for `/msg`.
pub const MSG_USAGE: &str = "Usage: /msg <number> <message>";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/msg <address> <text...>`
    Send { address: String, text: String },
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// Anything else.
    Unknown { raw: String },
}

/// `/msg` was missing its address or its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageError;

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MSG_USAGE)
    }
}

impl std::error::Error for UsageError {}

impl Command {
    /// Parse a line by its first whitespace-separated token.
    pub fn parse(input: &str) -> Result<Self, UsageError> {
        let input = input.trim();
        let (head, rest) = split_token(input);

        match head {
            "/help" => Ok(Command::Help),
            "/quit" => Ok(Command::Quit),
            "/msg" => {
                let (address, text) = split_token(rest);
                if address.is_empty() || text.is_empty() {
                    return Err(UsageError);
                }
                Ok(Command::Send {
                    address: address.to_string(),
                    text: text.to_string(),
                })
            }
            _ => Ok(Command::Unknown {
                raw: input.to_string(),
            }),
        }
    }
}

/// Split off the first token; the remainder is trimmed.
fn split_token(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (input, ""),
    }
}
