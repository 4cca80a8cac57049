//! Command-line interface for chatwire.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Folder holding persisted credentials.
    pub auth_dir: Option<PathBuf>,
    /// Protocol domain suffix for addresses.
    pub address_suffix: Option<String>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('a') | Long("auth-dir") => {
                result.auth_dir = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("address-suffix") => {
                let value: String = parser.value()?.parse()?;
                let trimmed = value.trim().trim_start_matches('@');
                if trimmed.is_empty() {
                    return Err(ArgsError::InvalidValue("address-suffix", value));
                }
                result.address_suffix = Some(trimmed.to_string());
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"chatwire {version}
Command-line chat client with automatic session recovery

USAGE:
    chatwire [OPTIONS]

OPTIONS:
    -a, --auth-dir <DIR>         Credential folder [default: auth_info]
    -s, --address-suffix <SFX>   Address domain suffix [default: s.whatsapp.net]
    -c, --config <FILE>          Path to configuration file (JSON)
    -l, --log-level <LVL>        Log level (error, warn, info, debug, trace)
    -h, --help                   Print help
    -V, --version                Print version

CONSOLE COMMANDS:
    /msg <number> <text>         Send a text message
    /help                        Show the command list
    /quit                        Disconnect and exit

ENVIRONMENT VARIABLES:
    CHATWIRE_AUTH_DIR            Credential folder (overrides config)
    CHATWIRE_ADDRESS_SUFFIX      Address domain suffix (overrides config)
    CHATWIRE_LOG_LEVEL           Log level (overrides config)
    RUST_LOG                     Alternative log level setting

EXAMPLES:
    # Start with defaults
    chatwire

    # Keep credentials for a second profile elsewhere
    chatwire -a ~/.chatwire/work

    # Verbose diagnostics on stderr
    chatwire -l debug 2> chatwire.log
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("chatwire {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("chatwire")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.auth_dir.is_none());
        assert!(result.address_suffix.is_none());
        assert!(!result.help);
    }

    #[test]
    fn test_auth_dir() {
        let result = parse_args_from(args(&["-a", "profiles/main"])).unwrap();
        assert_eq!(result.auth_dir, Some(PathBuf::from("profiles/main")));

        let result = parse_args_from(args(&["--auth-dir", "/tmp/creds"])).unwrap();
        assert_eq!(result.auth_dir, Some(PathBuf::from("/tmp/creds")));
    }

    #[test]
    fn test_address_suffix_strips_at() {
        let result = parse_args_from(args(&["-s", "@example.net"])).unwrap();
        assert_eq!(result.address_suffix.as_deref(), Some("example.net"));
    }

    #[test]
    fn test_empty_address_suffix() {
        assert!(parse_args_from(args(&["-s", "  "])).is_err());
        assert!(parse_args_from(args(&["--address-suffix", "@"])).is_err());
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/chatwire.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/chatwire.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_positional_rejected() {
        let err = parse_args_from(args(&["stray"])).unwrap_err();
        assert!(err.to_string().contains("stray"));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(parse_args_from(args(&["--port", "80"])).is_err());
    }
}
