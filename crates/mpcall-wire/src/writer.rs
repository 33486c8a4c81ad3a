use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{encode_value, WireConfig};
use crate::error::{Result, WireError};
use crate::message::Message;
use crate::value::WireValue;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete MessagePack values to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: WireConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WireConfig::default())
    }

    /// Create a new writer with explicit configuration.
    pub fn with_config(inner: T, config: WireConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write a message (blocking).
    pub fn write_message(&mut self, message: Message) -> Result<()> {
        self.write_value(&message.into_wire())
    }

    /// Encode and write one value, then flush.
    pub fn write_value(&mut self, value: &WireValue) -> Result<()> {
        self.buf.clear();
        encode_value(value, &mut self.buf)?;

        if self.buf.len() > self.config.max_message_size {
            debug!(
                size = self.buf.len(),
                max = self.config.max_message_size,
                "refusing to write oversized message"
            );
            return Err(WireError::TooLarge {
                size: self.buf.len(),
                max: self.config.max_message_size,
            });
        }

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &WireConfig {
        &self.config
    }
}
