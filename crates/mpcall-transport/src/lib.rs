//! Blocking TCP transport for mpcall.
//!
//! This is the lowest layer of mpcall. It resolves endpoints, opens
//! connections with a bounded connect timeout and hands out [`RpcStream`]
//! values that the wire layer reads MessagePack-RPC messages from.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::RpcStream;
pub use tcp::{connect, RpcListener};
