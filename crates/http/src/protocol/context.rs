use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Allocates the next connection id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The wire protocol a connection speaks, fixed once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// HTTP/1.1 on the plaintext port, answered only with redirects
    PlaintextHttp1,
    /// HTTP/1.1 negotiated over TLS
    TlsHttp1,
    /// HTTP/2 negotiated over TLS
    TlsHttp2,
}

impl TransportKind {
    pub fn is_http2(self) -> bool {
        matches!(self, TransportKind::TlsHttp2)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::PlaintextHttp1 => "plaintext-1.1",
            TransportKind::TlsHttp1 => "tls-1.1",
            TransportKind::TlsHttp2 => "tls-2.0",
        };
        f.write_str(name)
    }
}

/// Addressing identity of one exchange.
///
/// Handed to the handler inside the request extensions and used by the response
/// writer to address the right multiplexed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamContext {
    connection: ConnectionId,
    transport: TransportKind,
    stream_id: Option<u32>,
}

impl StreamContext {
    /// Context of the single in-flight exchange of an HTTP/1.1 connection.
    pub fn http1(connection: ConnectionId, transport: TransportKind) -> Self {
        Self { connection, transport, stream_id: None }
    }

    /// Context of one HTTP/2 stream.
    pub fn http2(connection: ConnectionId, stream_id: u32) -> Self {
        Self { connection, transport: TransportKind::TlsHttp2, stream_id: Some(stream_id) }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// The HTTP/2 stream id, `None` on HTTP/1.1.
    pub fn stream_id(&self) -> Option<u32> {
        self.stream_id
    }
}
