//! Typed remote procedure calls over MessagePack-RPC.
//!
//! mpcall marshals native values into wire values according to explicit type
//! descriptors, performs one request/response round trip and unmarshals the
//! result.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connect/listen and transport errors
//! - [`wire`]: MessagePack values, codec and RPC message shapes
//! - [`types`]: type descriptors, records and native values
//! - [`client`]: `ClientBase`, generated stubs and a minimal server
//!
//! ```no_run
//! use mpcall::{ClientBase, Endpoint, TypeDescriptor, Value};
//!
//! let client = ClientBase::connect(Endpoint::new("127.0.0.1", 9199).with_name("kvs"));
//! let stored = client.call(
//!     "put",
//!     &[Value::from("k"), Value::from(42i32)],
//!     &[TypeDescriptor::string(), TypeDescriptor::int32()],
//!     &TypeDescriptor::bool(),
//! )?;
//! assert_eq!(stored, Value::Bool(true));
//! # Ok::<(), mpcall::CallError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use mpcall_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use mpcall_wire::*;
}

/// Re-export descriptor and value types.
pub mod types {
    pub use mpcall_types::*;
}

/// Re-export client types.
pub mod client {
    pub use mpcall_client::*;
}

pub use mpcall_client::{
    kvs, service, CallError, ClientBase, ClientConfig, Endpoint, RemoteError, RemoteErrorKind,
    TcpTransport, Transport,
};
pub use mpcall_types::{record, Record, RecordType, TypeDescriptor, Typed, Value};
