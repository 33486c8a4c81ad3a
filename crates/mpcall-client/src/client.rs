use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use mpcall_types::{TypeDescriptor, Typed, Value};
use mpcall_wire::WireValue;
use tracing::debug;

use crate::config::{ClientConfig, Endpoint};
use crate::error::{CallError, Result};
use crate::transport::{TcpTransport, Transport};

/// Server status as returned by `get_status`: server id to key/value pairs.
pub type Status = BTreeMap<String, BTreeMap<String, String>>;

/// Addressing plus the generic typed call.
///
/// A `ClientBase` holds no per-call state and can be shared by reference
/// across threads. When the transport cannot run calls concurrently, calls
/// are serialized and the lock is held for exactly one round trip.
pub struct ClientBase<T = TcpTransport> {
    endpoint: Endpoint,
    transport: T,
    gate: Option<Mutex<()>>,
}

impl ClientBase<TcpTransport> {
    /// Client over TCP. No connection is opened until the first call.
    pub fn connect(endpoint: Endpoint) -> Self {
        let transport = TcpTransport::new(&endpoint);
        Self::with_transport(endpoint, transport)
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let transport = TcpTransport::with_wire_config(&config.endpoint, config.wire_config());
        Self::with_transport(config.endpoint.clone(), transport)
    }
}

impl<T: Transport> ClientBase<T> {
    pub fn with_transport(endpoint: Endpoint, transport: T) -> Self {
        let gate = (!transport.supports_concurrent_calls()).then(|| Mutex::new(()));
        Self {
            endpoint,
            transport,
            gate,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Service name sent with every request.
    pub fn get_name(&self) -> &str {
        &self.endpoint.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.endpoint.name = name.into();
    }

    pub fn timeout(&self) -> Duration {
        self.endpoint.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Invoke `method` remotely.
    ///
    /// Arguments are checked against `arg_types` and encoded before anything
    /// is sent. Exactly one round trip is made; failures are never retried.
    pub fn call(
        &self,
        method: &str,
        args: &[Value],
        arg_types: &[TypeDescriptor],
        result_type: &TypeDescriptor,
    ) -> Result<Value> {
        let raw = self.round_trip(method, args, arg_types)?;
        result_type
            .decode(raw)
            .map_err(|source| CallError::Decode {
                method: method.to_string(),
                descriptor: result_type.to_string(),
                source,
            })
    }

    /// [`ClientBase::call`] with the result converted to a Rust type.
    pub fn call_as<R: Typed>(
        &self,
        method: &str,
        args: &[Value],
        arg_types: &[TypeDescriptor],
    ) -> Result<R> {
        let result_type = R::descriptor();
        let value = self.call(method, args, arg_types, &result_type)?;
        R::from_value(value).map_err(|source| CallError::Decode {
            method: method.to_string(),
            descriptor: result_type.to_string(),
            source,
        })
    }

    fn round_trip(
        &self,
        method: &str,
        args: &[Value],
        arg_types: &[TypeDescriptor],
    ) -> Result<WireValue> {
        if args.len() != arg_types.len() {
            return Err(CallError::InvalidCall {
                method: method.to_string(),
                expected: arg_types.len(),
                found: args.len(),
            });
        }

        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(WireValue::String(self.endpoint.name.clone()));
        for (index, (arg, ty)) in args.iter().zip(arg_types).enumerate() {
            let encoded = ty.encode(arg).map_err(|source| CallError::Encode {
                method: method.to_string(),
                index,
                descriptor: ty.to_string(),
                source,
            })?;
            params.push(encoded);
        }

        debug!(method, endpoint = %self.endpoint, args = args.len(), "call");
        let started = Instant::now();
        let result = {
            let _serialized = self
                .gate
                .as_ref()
                .map(|gate| gate.lock().unwrap_or_else(PoisonError::into_inner));
            self.transport.invoke(method, params, self.endpoint.timeout)
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(raw) => {
                debug!(method, elapsed_ms, "call finished");
                Ok(raw)
            }
            Err(err) => {
                let err = CallError::from_invoke(method, err);
                debug!(method, elapsed_ms, error = %err, "call failed");
                Err(err)
            }
        }
    }

    /// Server configuration as a JSON string.
    pub fn get_config(&self) -> Result<String> {
        self.call_as("get_config", &[], &[])
    }

    /// Save the model under `id`; returns server id to saved path.
    pub fn save(&self, id: &str) -> Result<BTreeMap<String, String>> {
        self.call_as("save", &[Value::from(id)], &[TypeDescriptor::string()])
    }

    pub fn load(&self, id: &str) -> Result<bool> {
        self.call_as("load", &[Value::from(id)], &[TypeDescriptor::string()])
    }

    pub fn get_status(&self) -> Result<Status> {
        self.call_as("get_status", &[], &[])
    }

    /// Reset the server model. Whatever the server returns is discarded.
    pub fn clear(&self) -> Result<()> {
        self.call_as("clear", &[], &[])
    }

    pub fn do_mix(&self) -> Result<bool> {
        self.call_as("do_mix", &[], &[])
    }

    pub fn get_proxy_status(&self) -> Result<Status> {
        self.call_as("get_proxy_status", &[], &[])
    }
}

impl<T> std::fmt::Debug for ClientBase<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBase")
            .field("endpoint", &self.endpoint)
            .field("serialized", &self.gate.is_some())
            .finish()
    }
}
