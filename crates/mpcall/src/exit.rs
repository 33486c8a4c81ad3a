use std::fmt;
use std::io;

use mpcall_client::{CallError, ConfigError};
use mpcall_transport::TransportError;
use mpcall_types::ParseError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// The server answered with an error.
pub const REMOTE_ERROR: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    if err.is_timeout() {
        return CliError::new(TIMEOUT, format!("{context}: {err}"));
    }
    match err {
        TransportError::Resolve { ref source, .. }
        | TransportError::Connect { ref source, .. }
        | TransportError::Bind { ref source, .. } => {
            let code = io_error(context, io::Error::from(source.kind())).code;
            CliError::new(code, format!("{context}: {err}"))
        }
        TransportError::Accept(source) | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn call_error(err: CallError) -> CliError {
    match err {
        CallError::InvalidCall { .. } => CliError::new(USAGE, err.to_string()),
        CallError::Encode { .. }
        | CallError::RequestTooLarge { .. }
        | CallError::Decode { .. } => {
            CliError::new(DATA_INVALID, err.to_string())
        }
        CallError::Transport { method, source } => transport_error(&method, source),
        CallError::Remote(remote) => CliError::new(REMOTE_ERROR, remote.to_string()),
    }
}

pub fn config_error(err: ConfigError) -> CliError {
    match err {
        ConfigError::Read { path, source } => {
            io_error(&format!("cannot read {}", path.display()), source)
        }
        ConfigError::Parse(_) => CliError::new(DATA_INVALID, format!("invalid config: {err}")),
    }
}

pub fn parse_error(context: &str, err: ParseError) -> CliError {
    CliError::usage(format!("{context}: {err}"))
}
