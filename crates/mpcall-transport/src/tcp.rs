use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{is_timeout_kind, Result, TransportError};
use crate::stream::RpcStream;

/// Connect to `host:port`, bounding each attempt by `timeout`.
///
/// Every resolved address is tried in order; the last failure is reported if
/// none accepts. A zero timeout means "no timeout" and falls back to a plain
/// blocking connect.
pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<RpcStream> {
    let addr = format!("{host}:{port}");
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.clone(),
            source,
        })?
        .collect();

    if candidates.is_empty() {
        return Err(TransportError::Resolve {
            addr,
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "host resolved to no addresses",
            ),
        });
    }

    let mut last_err = None;
    for candidate in candidates {
        let attempt = if timeout.is_zero() {
            TcpStream::connect(candidate)
        } else {
            TcpStream::connect_timeout(&candidate, timeout)
        };
        match attempt {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!(%candidate, "connected");
                return Ok(RpcStream::from_tcp(stream));
            }
            Err(err) => {
                debug!(%candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    let source = last_err
        .unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::AddrNotAvailable));
    if is_timeout_kind(source.kind()) {
        return Err(TransportError::Timeout(timeout));
    }
    Err(TransportError::Connect { addr, source })
}

/// Listening TCP socket handing out [`RpcStream`] connections.
pub struct RpcListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RpcListener {
    /// Bind and listen on `addr` (e.g. `127.0.0.1:9199`, or port 0 for an
    /// ephemeral port).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        info!(%local_addr, "listening");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<RpcStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        // Accepted sockets inherit O_NONBLOCK from the listener on BSDs.
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted connection");
        Ok(RpcStream::from_tcp(stream))
    }

    /// Switch the listener between blocking and non-blocking accepts.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener
            .set_nonblocking(nonblocking)
            .map_err(Into::into)
    }

    /// The bound address (with the actual port when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = RpcListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().port();

        let handle = std::thread::spawn(move || {
            let mut client = connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert!(server.peer_addr().is_some());

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port that nothing listens on.
        let port = {
            let listener = RpcListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().port()
        };

        let err = connect("127.0.0.1", port, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_resolve_failure() {
        let err = connect("invalid host name with spaces", 80, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransportError::Resolve { .. }));
    }

    #[test]
    fn test_bind_rejects_bad_address() {
        let result = RpcListener::bind("not-an-address");
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_read_timeout_applies() {
        let listener = RpcListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().port();

        let mut client = connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let _server = listener.accept().unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();

        let mut buf = [0u8; 1];
        let err = client.read(&mut buf).unwrap_err();
        assert!(is_timeout_kind(err.kind()));
    }
}
