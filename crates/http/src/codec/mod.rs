//! HTTP/1.1 wire codec.
//!
//! Translates between the bytes of an HTTP/1.1 connection and the
//! transport-agnostic [`Message`](crate::protocol::Message) frames.
//!
//! - [`RequestDecoder`]: request head via `httparse`, then a `content-length` delimited body
//! - [`ResponseEncoder`]: status line and headers, then a `content-length` delimited body
//!
//! Bodies are always length-delimited; `transfer-encoding` is not accepted on requests
//! and never produced on responses.

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
