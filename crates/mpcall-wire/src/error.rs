/// Errors that can occur while encoding, decoding or exchanging messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The byte stream is not valid MessagePack.
    #[error("malformed msgpack: {0}")]
    Malformed(String),

    /// A value or declared length exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    /// Containers are nested deeper than the configured limit.
    #[error("nesting deeper than {max} levels")]
    TooDeep { max: usize },

    /// A well-formed value is not a valid MessagePack-RPC message.
    #[error("invalid rpc message: {0}")]
    InvalidMessage(String),

    /// An I/O error occurred while reading or writing messages.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

impl WireError {
    /// True when the underlying I/O operation hit its deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            WireError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
