//! HTTP/1.1 request decoder.
//!
//! Turns the raw byte stream of one connection into the frame sequence the
//! request assembler consumes: a head, then the body chunks, then the end marker.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use teapot_http::codec::RequestDecoder;
//! use teapot_http::protocol::{Message, PayloadItem};
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("POST /reverse HTTP/1.1\r\ncontent-length: 2\r\n\r\nhi");
//!
//! assert!(matches!(decoder.decode(&mut buffer), Ok(Some(Message::Header(_)))));
//! assert!(matches!(decoder.decode(&mut buffer), Ok(Some(Message::Payload(PayloadItem::Chunk(_))))));
//! assert!(matches!(decoder.decode(&mut buffer), Ok(Some(Message::Payload(PayloadItem::Eof)))));
//! ```

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder for HTTP requests that handles both heads and payloads
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: waiting for the next request head
/// - `Some(PayloadDecoder)`: reading the body of the current request
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the decoder sits between two requests.
    pub fn is_idle(&self) -> bool {
        self.payload_decoder.is_none()
    }

    fn payload_message(&mut self, item: Option<PayloadItem>) -> Option<Message<(RequestHeader, PayloadSize)>> {
        match item {
            Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
            Some(item @ PayloadItem::Eof) => {
                self.payload_decoder.take();
                Some(Message::Payload(item))
            }
            None => None,
        }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: decoded a request head
    /// - `Ok(Some(Message::Payload(_)))`: decoded a body chunk or the end marker
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: the bytes do not form a valid request
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode(src)?;
            return Ok(self.payload_message(item));
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    /// Like [`decode`](Self::decode), but the peer has stopped sending: a request
    /// cut off in the middle of its head or body is an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode_eof(src)?;
            return Ok(self.payload_message(item));
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::invalid_header(format!("connection closed with {} bytes of an incomplete head", src.len()))),
        }
    }
}
