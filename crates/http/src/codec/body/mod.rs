//! HTTP/1.1 body framing.
//!
//! Request and response bodies on the HTTP/1.1 wire are always delimited by
//! `content-length`:
//!
//! - [`PayloadDecoder`]: splits exactly the declared number of request body bytes off the wire
//! - [`PayloadEncoder`]: writes a response body of known length

mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
