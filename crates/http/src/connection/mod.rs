//! Per-connection pipelines.
//!
//! # Components
//!
//! - [`ConnectionGuard`]: the body-size ceiling of one connection
//! - [`RequestAssembler`]: frames to [`Request`](crate::protocol::Request) state machine
//! - [`ResponseWriter`]: header fixups and the head / body / end write sequence
//! - [`Http1Connection`]: HTTP/1.1 keep-alive loop, one request in flight
//! - [`Http2Connection`]: HTTP/2 streams multiplexed on one task
//! - [`RedirectResponder`]: the plaintext port
//! - [`error_stage`]: the last stop of every failed connection
//!
//! Both transports translate their wire frames into
//! [`Message`](crate::protocol::Message) frames, so the assembler and the writer
//! are shared between them.

mod assembler;
pub mod error_stage;
mod guard;
mod http1;
mod http2;
mod redirect;
mod writer;

pub use assembler::AssemblyStage;
pub use assembler::RequestAssembler;
pub use guard::ConnectionGuard;
pub use guard::DEFAULT_MAX_BODY_SIZE;
pub use http1::DEFAULT_READ_BUFFER_SIZE;
pub use http1::Http1Connection;
pub use http1::Http1Sink;
pub use http2::DEFAULT_MAX_CONCURRENT_STREAMS;
pub use http2::Http2Connection;
pub use http2::Http2Sink;
pub use redirect::RedirectResponder;
pub use writer::Disposition;
pub use writer::FrameSink;
pub use writer::LocalFrameSink;
pub use writer::ResponseWriter;
pub use writer::SERVER_NAME;
pub use writer::X_STREAM_ID;
pub use writer::prepare;
