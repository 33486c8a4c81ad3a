//! MessagePack values and MessagePack-RPC messages.
//!
//! Every RPC message is a single MessagePack array:
//! - request: `[0, msgid, method, params]`
//! - response: `[1, msgid, error, result]`
//! - notification: `[2, method, params]`
//!
//! MessagePack is self-delimiting, so no extra length prefix is used. The
//! reader buffers partial input until a complete value is available.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod value;
pub mod writer;

pub use codec::{
    decode_value, encode_value, from_slice, to_vec, WireConfig, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_MESSAGE_SIZE,
};
pub use error::{Result, WireError};
pub use message::{Message, Notification, Request, Response};
pub use reader::MessageReader;
pub use value::{Integer, WireKind, WireValue};
pub use writer::MessageWriter;
