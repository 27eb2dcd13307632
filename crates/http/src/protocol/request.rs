//! HTTP request head handling.
//!
//! A [`RequestHeader`] is the immutable head of a request as soon as it has been
//! parsed (method, URI, version and every header value in arrival order). Once the
//! body has been fully assembled the head is combined with it into a [`Request`].

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version, header};

use crate::protocol::{ParseError, PayloadSize};

/// A fully assembled request: the head plus the complete, length-checked body.
///
/// The originating connection/stream identity is stored in the request
/// extensions as a [`StreamContext`](crate::protocol::StreamContext).
pub type Request = http::Request<Bytes>;

/// Represents an HTTP request header.
///
/// This struct wraps a `http::Request<()>`; `http::HeaderMap` keeps header names
/// case-insensitive and preserves every value of a repeated header in order.
#[derive(Debug)]
pub struct RequestHeader {
    inner: http::Request<()>,
}

impl AsRef<http::Request<()>> for RequestHeader {
    fn as_ref(&self) -> &http::Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> http::Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> http::Request<T> {
        self.inner.map(|()| body)
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The body size declared by the `content-length` header.
    ///
    /// An absent header declares an empty body. Repeated headers must agree.
    pub fn payload_size(&self) -> Result<PayloadSize, ParseError> {
        declared_length(self.headers()).map(PayloadSize::from_length)
    }

    /// Whether the client asked for the connection to stay open after this exchange.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `connection: close` is sent,
    /// HTTP/1.0 only keeps alive on an explicit `connection: keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;
        for value in self.headers().get_all(header::CONNECTION) {
            for token in value.as_bytes().split(|b| *b == b',') {
                let token = token.trim_ascii();
                if token.eq_ignore_ascii_case(b"close") {
                    close = true;
                } else if token.eq_ignore_ascii_case(b"keep-alive") {
                    keep_alive = true;
                }
            }
        }

        match self.version() {
            Version::HTTP_11 => !close,
            Version::HTTP_10 => keep_alive && !close,
            _ => false,
        }
    }
}

/// Parses the declared body length out of the `content-length` header(s).
pub fn declared_length(headers: &HeaderMap) -> Result<u64, ParseError> {
    let mut declared: Option<u64> = None;
    for value in headers.get_all(header::CONTENT_LENGTH) {
        let cl_str = value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;
        let length =
            cl_str.trim().parse::<u64>().map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

        match declared {
            Some(previous) if previous != length => {
                return Err(ParseError::invalid_content_length(format!("conflicting values {previous} and {length}")));
            }
            _ => declared = Some(length),
        }
    }
    Ok(declared.unwrap_or(0))
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: http::Request::from_parts(parts, ()) }
    }
}

impl From<http::Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: http::Request<()>) -> Self {
        Self { inner }
    }
}
