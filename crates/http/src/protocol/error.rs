use std::error::Error;
use std::fmt;
use std::io;
use thiserror::Error;

/// Boxed error type produced by handlers and body encoders.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("negotiation error: {source}")]
    NegotiationError {
        #[from]
        source: NegotiationError,
    },

    #[error("http2 error: {source}")]
    Http2Error {
        #[from]
        source: h2::Error,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("unsupported transfer-encoding, request bodies must declare content-length")]
    UnsupportedTransferEncoding,

    #[error("declared body size {declared} exceed the limit {max_size}")]
    TooLargeBody { declared: u64, max_size: u64 },

    #[error("connection received {received} body bytes, exceed the limit {max_size}")]
    ConnectionLimit { received: u64, max_size: u64 },

    #[error("received {received} body bytes but only {declared} were declared")]
    BodyOverflow { declared: u64, received: u64 },

    #[error("end of request after {received} of {declared} declared body bytes")]
    IncompleteBody { declared: u64, received: u64 },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("unexpected {frame} frame {state}")]
    UnexpectedFrame { frame: &'static str, state: &'static str },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn unexpected_frame(frame: &'static str, state: &'static str) -> Self {
        Self::UnexpectedFrame { frame, state }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Whether the connection-wide body ceiling was hit, as opposed to a
    /// malformed exchange.
    pub fn is_size_limit(&self) -> bool {
        matches!(self, ParseError::TooLargeBody { .. } | ParseError::ConnectionLimit { .. })
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("serialize response body error: {source}")]
    Serialize { source: BoxError },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("http2 send error: {source}")]
    Http2 {
        #[from]
        source: h2::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn serialize<E: Into<BoxError>>(e: E) -> Self {
        Self::Serialize { source: e.into() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Whether this failure means the peer is already gone.
    pub fn is_closed(&self) -> bool {
        match self {
            SendError::Io { source } => is_disconnect(source),
            SendError::Http2 { source } => source.is_io() || source.is_reset() || source.is_go_away(),
            SendError::InvalidBody { .. } | SendError::Serialize { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("tls handshake failed: {source}")]
    Handshake {
        #[from]
        source: io::Error,
    },

    #[error("unsupported application protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },
}

impl NegotiationError {
    pub fn unsupported_protocol(protocol: &[u8]) -> Self {
        Self::UnsupportedProtocol { protocol: String::from_utf8_lossy(protocol).into_owned() }
    }
}

/// The failure taxonomy every pipeline error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// TLS handshake or ALPN mismatch: close, no response
    Negotiation,
    /// Malformed frames or size violations: close, no response
    ProtocolViolation,
    /// The handler failed: answered with a `500`
    Handler,
    /// The response body could not be encoded: answered with a `500`
    Serialization,
    /// A write hit a connection that is already gone: dropped
    WriteAfterClose,
    /// Any other transport failure
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Negotiation => "negotiation",
            ErrorCategory::ProtocolViolation => "protocol_violation",
            ErrorCategory::Handler => "handler",
            ErrorCategory::Serialization => "serialization",
            ErrorCategory::WriteAfterClose => "write_after_close",
            ErrorCategory::Io => "io",
        };
        f.write_str(name)
    }
}

impl HttpError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HttpError::NegotiationError { .. } => ErrorCategory::Negotiation,
            HttpError::RequestError { source: ParseError::Io { .. } } => ErrorCategory::Io,
            HttpError::RequestError { .. } => ErrorCategory::ProtocolViolation,
            HttpError::ResponseError { source } if source.is_closed() => ErrorCategory::WriteAfterClose,
            HttpError::ResponseError { source: SendError::Serialize { .. } } => ErrorCategory::Serialization,
            HttpError::ResponseError { .. } => ErrorCategory::Io,
            HttpError::Http2Error { source } if source.is_io() => ErrorCategory::Io,
            HttpError::Http2Error { .. } => ErrorCategory::ProtocolViolation,
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}
