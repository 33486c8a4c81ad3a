use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{decode_next, Scanner, WireConfig};
use crate::error::{Result, WireError};
use crate::message::Message;
use crate::value::WireValue;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete MessagePack values from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete values.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    scanner: Scanner,
    config: WireConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WireConfig::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: WireConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanner: Scanner::default(),
            config,
        }
    }

    /// Read the next complete value (blocking).
    ///
    /// Returns `Err(WireError::ConnectionClosed)` when EOF is reached.
    pub fn read_value(&mut self) -> Result<WireValue> {
        self.read_value_with(|_| Ok(()))
    }

    /// Like [`read_value`](Self::read_value), but calls `before_read` ahead
    /// of every blocking read on the stream.
    ///
    /// A caller with a deadline uses this to shrink the stream timeout as
    /// time passes; an error from `before_read` aborts the read.
    pub fn read_value_with<F>(&mut self, mut before_read: F) -> Result<WireValue>
    where
        F: FnMut(&T) -> Result<()>,
    {
        loop {
            if let Some(value) = decode_next(&mut self.scanner, &mut self.buf, &self.config)? {
                return Ok(value);
            }

            before_read(&self.inner)?;
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            };

            if read == 0 {
                if !self.buf.is_empty() {
                    debug!(buffered = self.buf.len(), "stream closed mid-value");
                }
                return Err(WireError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next value and interpret it as an RPC message.
    pub fn read_message(&mut self) -> Result<Message> {
        let value = self.read_value()?;
        Message::from_wire(value)
    }

    /// Read the next RPC message, calling `before_read` ahead of every
    /// blocking read.
    pub fn read_message_with<F>(&mut self, before_read: F) -> Result<Message>
    where
        F: FnMut(&T) -> Result<()>,
    {
        let value = self.read_value_with(before_read)?;
        Message::from_wire(value)
    }

    /// True if bytes of a partially received value are buffered.
    pub fn has_buffered(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &WireConfig {
        &self.config
    }
}
