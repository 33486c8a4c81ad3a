//! Typed RPC calls over MessagePack-RPC.
//!
//! [`ClientBase::call`] is the single marshaling primitive: it checks the
//! argument count, encodes every argument with its descriptor, performs one
//! round trip through a [`Transport`] and decodes the result with the result
//! descriptor. Generated stubs ([`service!`], [`kvs::Kvs`]) are thin
//! declarative bindings over it.

pub mod client;
pub mod config;
pub mod error;
pub mod kvs;
pub mod server;
mod stub;
pub mod transport;

pub use client::{ClientBase, Status};
pub use config::{ClientConfig, ConfigError, Endpoint, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{CallError, InvokeError, RemoteError, RemoteErrorKind, Result};
pub use server::{Handler, KvsService, RpcServer, ServerHandle};
pub use transport::{TcpTransport, Transport};

#[doc(hidden)]
pub use mpcall_types as __types;
