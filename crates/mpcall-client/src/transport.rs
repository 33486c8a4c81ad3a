use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use mpcall_transport::{RpcStream, TransportError};
use mpcall_wire::{Message, MessageReader, MessageWriter, Request, WireConfig, WireError, WireValue};
use tracing::{debug, trace, warn};

use crate::config::Endpoint;
use crate::error::InvokeError;

/// One request/response exchange with a remote server.
///
/// `params` are already encoded, including any leading service name.
/// Implementations must not retry on their own.
pub trait Transport: Send + Sync {
    fn invoke(
        &self,
        method: &str,
        params: Vec<WireValue>,
        timeout: Duration,
    ) -> Result<WireValue, InvokeError>;

    /// True if `invoke` may run on several threads at once.
    fn supports_concurrent_calls(&self) -> bool {
        false
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn invoke(
        &self,
        method: &str,
        params: Vec<WireValue>,
        timeout: Duration,
    ) -> Result<WireValue, InvokeError> {
        (**self).invoke(method, params, timeout)
    }

    fn supports_concurrent_calls(&self) -> bool {
        (**self).supports_concurrent_calls()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn invoke(
        &self,
        method: &str,
        params: Vec<WireValue>,
        timeout: Duration,
    ) -> Result<WireValue, InvokeError> {
        (**self).invoke(method, params, timeout)
    }

    fn supports_concurrent_calls(&self) -> bool {
        (**self).supports_concurrent_calls()
    }
}

struct Connection {
    reader: MessageReader<RpcStream>,
    writer: MessageWriter<RpcStream>,
}

/// MessagePack-RPC over one lazily opened TCP connection.
///
/// One request is in flight at a time. After any transport failure the
/// connection is dropped and the next call opens a fresh one.
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    wire: WireConfig,
    conn: Mutex<Option<Connection>>,
    next_msgid: AtomicU32,
}

impl TcpTransport {
    pub fn new(endpoint: &Endpoint) -> Self {
        Self::with_wire_config(endpoint, WireConfig::default())
    }

    pub fn with_wire_config(endpoint: &Endpoint, wire: WireConfig) -> Self {
        Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            connect_timeout: endpoint.timeout,
            wire,
            conn: Mutex::new(None),
            next_msgid: AtomicU32::new(0),
        }
    }

    /// True while a connection is open.
    pub fn is_connected(&self) -> bool {
        self.conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Close the current connection, if any.
    pub fn disconnect(&self) {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = conn.take() {
            let _ = conn.writer.get_ref().shutdown();
            debug!(host = %self.host, port = self.port, "connection closed");
        }
    }

    fn open(&self) -> Result<Connection, TransportError> {
        let stream = mpcall_transport::connect(&self.host, self.port, self.connect_timeout)?;
        let reader_stream = stream.try_clone()?;
        debug!(host = %self.host, port = self.port, "connected");
        Ok(Connection {
            reader: MessageReader::with_config(reader_stream, self.wire.clone()),
            writer: MessageWriter::with_config(stream, self.wire.clone()),
        })
    }

    fn round_trip(
        conn: &mut Connection,
        request: Request,
        timeout: Duration,
    ) -> Result<WireValue, InvokeError> {
        let deadline = Instant::now() + timeout;
        let msgid = request.msgid;

        conn.writer
            .get_ref()
            .set_write_timeout(remaining(deadline, timeout)?)?;
        match conn.writer.write_message(Message::Request(request)) {
            Ok(()) => {}
            // The writer checks the size before sending anything.
            Err(WireError::TooLarge { size, max }) => {
                return Err(InvokeError::TooLarge { size, max });
            }
            Err(err) => return Err(wire_to_transport_error(err, timeout).into()),
        }

        loop {
            // Each chunk read gets only what is left of the deadline.
            let message = conn
                .reader
                .read_message_with(|stream| {
                    let left = remaining(deadline, timeout)
                        .map_err(|_| WireError::Io(io::ErrorKind::TimedOut.into()))?;
                    stream.set_read_timeout(left).map_err(transport_to_wire)
                })
                .map_err(|err| wire_to_transport_error(err, timeout))?;
            match message {
                Message::Response(response) if response.msgid == msgid => {
                    return response.into_result().map_err(InvokeError::Remote);
                }
                Message::Response(response) => {
                    return Err(TransportError::Protocol(format!(
                        "response msgid {} does not match request {msgid}",
                        response.msgid
                    ))
                    .into());
                }
                Message::Notification(note) => {
                    trace!(method = %note.method, "ignoring notification");
                }
                Message::Request(req) => {
                    return Err(TransportError::Protocol(format!(
                        "unexpected request '{}' from server",
                        req.method
                    ))
                    .into());
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    fn invoke(
        &self,
        method: &str,
        params: Vec<WireValue>,
        timeout: Duration,
    ) -> Result<WireValue, InvokeError> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(TransportError::Shutdown.into());
        };

        let request = Request {
            msgid: self.next_msgid.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params,
        };
        let result = Self::round_trip(conn, request, timeout);
        if let Err(InvokeError::Transport(err)) = &result {
            warn!(host = %self.host, port = self.port, method, error = %err, "dropping connection");
            if let Some(conn) = guard.take() {
                let _ = conn.writer.get_ref().shutdown();
            }
        }
        result
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Time left before `deadline`, as a socket timeout. A zero `timeout`
/// disables the deadline.
fn remaining(deadline: Instant, timeout: Duration) -> Result<Option<Duration>, TransportError> {
    if timeout.is_zero() {
        return Ok(None);
    }
    match deadline.checked_duration_since(Instant::now()) {
        Some(left) if !left.is_zero() => Ok(Some(left)),
        _ => Err(TransportError::Timeout(timeout)),
    }
}

fn transport_to_wire(err: TransportError) -> WireError {
    match err {
        TransportError::Io(err) => WireError::Io(err),
        other => WireError::Io(io::Error::other(other)),
    }
}

fn wire_to_transport_error(err: WireError, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(timeout);
    }
    match err {
        WireError::Io(io) => TransportError::Io(io),
        WireError::ConnectionClosed => TransportError::Disconnected,
        other => TransportError::Protocol(other.to_string()),
    }
}
