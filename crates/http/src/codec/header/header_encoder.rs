//! HTTP/1.1 response head encoder.
//!
//! Serializes the status line and header fields of a [`ResponseHead`]. The
//! `content-length` on the wire always matches the [`PayloadSize`] the head is
//! encoded with; a bodyless response is framed with `content-length: 0`.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// # Errors
    ///
    /// Returns error if the head is not an HTTP/1.1 head
    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        if head.version() != Version::HTTP_11 {
            error!(http_version = ?head.version(), "unsupported http version");
            return Err(io::Error::from(ErrorKind::Unsupported).into());
        }

        dst.reserve(INIT_HEADER_SIZE);
        let status = head.status();
        write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or("<none>"))?;

        const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
        let content_length = match payload_size {
            PayloadSize::Length(n) => HeaderValue::from(n),
            PayloadSize::Empty => ZERO_VALUE,
        };
        head.headers_mut().insert(header::CONTENT_LENGTH, content_length);

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// `io::Write` over a `BytesMut` that has already reserved room for the head.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn encodes_status_line_and_length() {
        let head = http::Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, "999")
            .header(header::CONTENT_TYPE, "application/json")
            .body(())
            .unwrap();

        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, PayloadSize::Length(27)), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 27\r\n"));
        assert!(!text.contains("999"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn empty_payload_is_framed_with_zero() {
        let head = http::Response::builder().status(StatusCode::PERMANENT_REDIRECT).body(()).unwrap();
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst).unwrap();

        let text = std::str::from_utf8(&dst).unwrap();
        assert!(text.starts_with("HTTP/1.1 308 Permanent Redirect\r\n"));
        assert!(text.contains("content-length: 0\r\n"));
    }

    #[test]
    fn rejects_http2_head() {
        let head = http::Response::builder().version(Version::HTTP_2).body(()).unwrap();
        let mut dst = BytesMut::new();
        assert!(HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst).is_err());
    }
}
