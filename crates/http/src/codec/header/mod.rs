//! HTTP/1.1 head processing.
//!
//! - [`HeaderDecoder`]: decodes request heads from raw bytes, enforcing size and count limits
//! - [`HeaderEncoder`]: encodes response heads, keeping `content-length` in line with the body

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
