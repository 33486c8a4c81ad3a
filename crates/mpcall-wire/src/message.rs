use crate::error::{Result, WireError};
use crate::value::WireValue;

/// Message type tag of a request.
pub const REQUEST: u64 = 0;
/// Message type tag of a response.
pub const RESPONSE: u64 = 1;
/// Message type tag of a notification.
pub const NOTIFICATION: u64 = 2;

/// `[0, msgid, method, params]`
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub msgid: u32,
    pub method: String,
    pub params: Vec<WireValue>,
}

/// `[1, msgid, error, result]`; a nil `error` means success.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub msgid: u32,
    pub error: WireValue,
    pub result: WireValue,
}

/// `[2, method, params]`
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Vec<WireValue>,
}

impl Response {
    /// A successful response.
    pub fn ok(msgid: u32, result: WireValue) -> Self {
        Self {
            msgid,
            error: WireValue::Nil,
            result,
        }
    }

    /// A failed response carrying an error payload.
    pub fn err(msgid: u32, error: WireValue) -> Self {
        Self {
            msgid,
            error,
            result: WireValue::Nil,
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_nil()
    }

    /// Split into the result or the remote error payload.
    pub fn into_result(self) -> std::result::Result<WireValue, WireValue> {
        if self.is_error() {
            Err(self.error)
        } else {
            Ok(self.result)
        }
    }
}

/// Any MessagePack-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// Convert into the array form sent on the wire.
    pub fn into_wire(self) -> WireValue {
        match self {
            Message::Request(req) => WireValue::Array(vec![
                WireValue::from(REQUEST),
                WireValue::from(req.msgid),
                WireValue::String(req.method),
                WireValue::Array(req.params),
            ]),
            Message::Response(resp) => WireValue::Array(vec![
                WireValue::from(RESPONSE),
                WireValue::from(resp.msgid),
                resp.error,
                resp.result,
            ]),
            Message::Notification(note) => WireValue::Array(vec![
                WireValue::from(NOTIFICATION),
                WireValue::String(note.method),
                WireValue::Array(note.params),
            ]),
        }
    }

    /// Interpret a decoded value as a message.
    pub fn from_wire(value: WireValue) -> Result<Self> {
        let items = match value {
            WireValue::Array(items) => items,
            other => {
                return Err(WireError::InvalidMessage(format!(
                    "expected array, found {}",
                    other.kind()
                )))
            }
        };

        let tag = items.first().and_then(WireValue::as_u64).ok_or_else(|| {
            WireError::InvalidMessage("missing or non-integer message type".to_string())
        })?;

        match tag {
            REQUEST => {
                let [_, msgid, method, params] = expect_fields::<4>(items, "request")?;
                Ok(Message::Request(Request {
                    msgid: msgid_of(&msgid)?,
                    method: method_of(method)?,
                    params: params_of(params)?,
                }))
            }
            RESPONSE => {
                let [_, msgid, error, result] = expect_fields::<4>(items, "response")?;
                Ok(Message::Response(Response {
                    msgid: msgid_of(&msgid)?,
                    error,
                    result,
                }))
            }
            NOTIFICATION => {
                let [_, method, params] = expect_fields::<3>(items, "notification")?;
                Ok(Message::Notification(Notification {
                    method: method_of(method)?,
                    params: params_of(params)?,
                }))
            }
            other => Err(WireError::InvalidMessage(format!(
                "unknown message type {other}"
            ))),
        }
    }
}

impl From<Request> for Message {
    fn from(value: Request) -> Self {
        Message::Request(value)
    }
}

impl From<Response> for Message {
    fn from(value: Response) -> Self {
        Message::Response(value)
    }
}

impl From<Notification> for Message {
    fn from(value: Notification) -> Self {
        Message::Notification(value)
    }
}

fn expect_fields<const N: usize>(items: Vec<WireValue>, what: &str) -> Result<[WireValue; N]> {
    let len = items.len();
    items.try_into().map_err(|_| {
        WireError::InvalidMessage(format!("{what} must have {N} elements, found {len}"))
    })
}

fn msgid_of(value: &WireValue) -> Result<u32> {
    value
        .as_u64()
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| WireError::InvalidMessage(format!("invalid msgid {value}")))
}

fn method_of(value: WireValue) -> Result<String> {
    match value {
        WireValue::String(name) => Ok(name),
        WireValue::Binary(raw) => String::from_utf8(raw.to_vec())
            .map_err(|_| WireError::InvalidMessage("method name is not utf-8".to_string())),
        other => Err(WireError::InvalidMessage(format!(
            "method name must be a string, found {}",
            other.kind()
        ))),
    }
}

fn params_of(value: WireValue) -> Result<Vec<WireValue>> {
    match value {
        WireValue::Array(params) => Ok(params),
        other => Err(WireError::InvalidMessage(format!(
            "params must be an array, found {}",
            other.kind()
        ))),
    }
}
