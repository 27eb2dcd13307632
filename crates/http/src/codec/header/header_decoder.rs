//! HTTP/1.1 request head decoder.
//!
//! Parses the request line and header fields with `httparse`, then converts them
//! into a [`RequestHeader`] without copying header bytes: the byte ranges of every
//! name/value are recorded against the read buffer and sliced out of the frozen
//! head afterwards.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum head size: 8KB
//! - HTTP/1.0 and HTTP/1.1 only; HTTP/2 is negotiated through ALPN instead

use std::mem::MaybeUninit;

use bytes::{Bytes, BytesMut};
use http::{HeaderName, HeaderValue, Request};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Shortest possible head: `GET / HTTP/1.1\r\n\r\n`
const MIN_HEAD_BYTES: usize = 18;

/// Decoder for HTTP request heads implementing the [`Decoder`] trait.
///
/// Yields the parsed head together with the body size declared by `content-length`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// # Errors
    ///
    /// Returns `ParseError` if:
    /// - The number of headers exceeds `MAX_HEADER_NUM`
    /// - The total header size exceeds `MAX_HEADER_BYTES`
    /// - The HTTP version is not supported
    /// - The body is framed by anything but a valid `content-length`
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MIN_HEAD_BYTES {
            return Ok(None);
        }

        let mut req = httparse::Request::new(&mut []);
        let mut headers: [MaybeUninit<httparse::Header>; MAX_HEADER_NUM] = [const { MaybeUninit::uninit() }; MAX_HEADER_NUM];

        let parsed_result = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        let body_offset = match parsed_result? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(head_size = body_offset, "parsed request head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => http::Version::HTTP_10,
            Some(1) => http::Version::HTTP_11,
            _ => return Err(ParseError::InvalidVersion(req.version)),
        };

        let header_count = req.headers.len();
        let mut header_index = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
        HeaderIndex::record(src, req.headers, &mut header_index);

        let mut builder = Request::builder()
            .method(req.method.ok_or(ParseError::InvalidMethod)?)
            .uri(req.path.ok_or(ParseError::InvalidUri)?)
            .version(version);

        let head_bytes = src.split_to(body_offset).freeze();
        if let Some(headers) = builder.headers_mut() {
            headers.reserve(header_count);
            for index in &header_index[..header_count] {
                let (name, value) = index.slice(&head_bytes)?;
                headers.append(name, value);
            }
        }

        let header = RequestHeader::from(builder.body(()).map_err(ParseError::invalid_header)?);
        let payload_size = payload_size(&header)?;

        Ok(Some((header, payload_size)))
    }
}

/// Byte ranges of one header's name and value within the read buffer.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

impl HeaderIndex {
    const EMPTY: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, index) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            index.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            index.value = (value_start, value_start + header.value.len());
        }
    }

    fn slice(&self, head: &Bytes) -> Result<(HeaderName, HeaderValue), ParseError> {
        let name = HeaderName::from_bytes(&head[self.name.0..self.name.1]).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_maybe_shared(head.slice(self.value.0..self.value.1)).map_err(ParseError::invalid_header)?;
        Ok((name, value))
    }
}

/// Determines the declared body size of a request.
///
/// Only `content-length` framing is accepted: a request carrying `transfer-encoding`
/// cannot be bounded up front and is rejected.
fn payload_size(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
    if header.headers().contains_key(http::header::TRANSFER_ENCODING) {
        return Err(ParseError::UnsupportedTransferEncoding);
    }
    header.payload_size()
}
