use std::fmt;

use mpcall_transport::TransportError;
use mpcall_types::{DecodeError, EncodeError};
use mpcall_wire::WireValue;

/// MessagePack-RPC error code for a method the server does not know.
pub const ERROR_UNKNOWN_METHOD: u64 = 1;
/// MessagePack-RPC error code for arguments the server could not convert.
pub const ERROR_TYPE_MISMATCH: u64 = 2;

/// Classification of a remote error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    UnknownMethod,
    TypeMismatch,
    Application,
}

impl RemoteErrorKind {
    pub fn of(payload: &WireValue) -> Self {
        match payload.as_u64() {
            Some(ERROR_UNKNOWN_METHOD) => RemoteErrorKind::UnknownMethod,
            Some(ERROR_TYPE_MISMATCH) => RemoteErrorKind::TypeMismatch,
            _ => RemoteErrorKind::Application,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RemoteErrorKind::UnknownMethod => "unknown method",
            RemoteErrorKind::TypeMismatch => "type mismatch",
            RemoteErrorKind::Application => "application error",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote method failed. The payload is kept verbatim.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{method}: remote {kind}: {payload}")]
pub struct RemoteError {
    pub method: String,
    pub kind: RemoteErrorKind,
    pub payload: WireValue,
}

impl RemoteError {
    pub fn new(method: impl Into<String>, payload: WireValue) -> Self {
        Self {
            method: method.into(),
            kind: RemoteErrorKind::of(&payload),
            payload,
        }
    }

    /// Text message carried by the payload, if any.
    pub fn message(&self) -> Option<&str> {
        self.payload.as_str()
    }
}

/// Failure of one transport round trip.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with an error payload.
    #[error("remote error: {0}")]
    Remote(WireValue),

    /// The encoded request exceeds the message size limit. Nothing was sent.
    #[error("request too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
}

/// Errors surfaced by [`crate::ClientBase::call`].
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Argument and descriptor counts differ. Nothing was sent.
    #[error("{method}: expected {expected} arguments, found {found}")]
    InvalidCall {
        method: String,
        expected: usize,
        found: usize,
    },

    /// An argument does not fit its descriptor. Nothing was sent.
    #[error("{method}: argument {index} does not fit {descriptor}: {source}")]
    Encode {
        method: String,
        index: usize,
        descriptor: String,
        source: EncodeError,
    },

    /// The encoded request exceeds the message size limit. Nothing was sent.
    #[error("{method}: request too large ({size} bytes, max {max})")]
    RequestTooLarge {
        method: String,
        size: usize,
        max: usize,
    },

    /// The response does not fit the result descriptor.
    #[error("{method}: response does not fit {descriptor}: {source}")]
    Decode {
        method: String,
        descriptor: String,
        source: DecodeError,
    },

    /// Connectivity or deadline failure. The caller may retry.
    #[error("{method}: {source}")]
    Transport {
        method: String,
        source: TransportError,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl CallError {
    pub fn method(&self) -> &str {
        match self {
            CallError::InvalidCall { method, .. }
            | CallError::Encode { method, .. }
            | CallError::RequestTooLarge { method, .. }
            | CallError::Decode { method, .. }
            | CallError::Transport { method, .. } => method,
            CallError::Remote(err) => &err.method,
        }
    }

    /// Only transport failures are worth retrying; everything else would
    /// fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallError::Transport { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Transport { source, .. } if source.is_timeout())
    }

    pub(crate) fn from_invoke(method: &str, err: InvokeError) -> Self {
        match err {
            InvokeError::Transport(source) => CallError::Transport {
                method: method.to_string(),
                source,
            },
            InvokeError::Remote(payload) => CallError::Remote(RemoteError::new(method, payload)),
            InvokeError::TooLarge { size, max } => CallError::RequestTooLarge {
                method: method.to_string(),
                size,
                max,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CallError>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn remote_error_codes_are_classified() {
        assert_eq!(
            RemoteErrorKind::of(&WireValue::from(1u64)),
            RemoteErrorKind::UnknownMethod
        );
        assert_eq!(
            RemoteErrorKind::of(&WireValue::from(2u64)),
            RemoteErrorKind::TypeMismatch
        );
        assert_eq!(
            RemoteErrorKind::of(&WireValue::from("boom")),
            RemoteErrorKind::Application
        );
    }

    #[test]
    fn remote_error_keeps_payload() {
        let err = CallError::from_invoke("get", InvokeError::Remote(WireValue::from("no such key")));
        match &err {
            CallError::Remote(remote) => {
                assert_eq!(remote.message(), Some("no such key"));
                assert_eq!(remote.kind, RemoteErrorKind::Application);
            }
            other => panic!("expected remote error, got {other:?}"),
        }
        assert_eq!(err.to_string(), r#"get: remote application error: "no such key""#);
        assert!(!err.is_retryable());
    }

    #[test]
    fn only_transport_failures_are_retryable() {
        let timeout = CallError::from_invoke(
            "get",
            InvokeError::Transport(TransportError::Timeout(Duration::from_secs(1))),
        );
        assert!(timeout.is_retryable());
        assert!(timeout.is_timeout());
        assert_eq!(timeout.method(), "get");

        let invalid = CallError::InvalidCall {
            method: "put".to_string(),
            expected: 2,
            found: 1,
        };
        assert!(!invalid.is_retryable());
        assert_eq!(invalid.to_string(), "put: expected 2 arguments, found 1");
    }

    #[test]
    fn oversized_request_is_not_retryable() {
        let err = CallError::from_invoke("put", InvokeError::TooLarge { size: 900, max: 64 });
        assert!(matches!(err, CallError::RequestTooLarge { size: 900, max: 64, .. }));
        assert!(!err.is_retryable());
        assert!(!err.is_timeout());
        assert_eq!(err.method(), "put");
        assert_eq!(err.to_string(), "put: request too large (900 bytes, max 64)");
    }
}
