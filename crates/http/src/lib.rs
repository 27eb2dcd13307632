//! The transport and framing core of the teapot HTTP server.
//!
//! Two ports are served: a plaintext port that answers every request with a
//! permanent redirect, and a TLS port that negotiates HTTP/1.1 or HTTP/2 via
//! ALPN. Both wire protocols are reduced to the same head / body chunk / end
//! frames, assembled into one immutable request, handed to the application
//! [`Handler`](handler::Handler) off the connection task, and written back with
//! the header bookkeeping each transport needs.
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use teapot_http::handler::{HandlerError, make_handler};
//! use teapot_http::negotiate::TlsContext;
//! use teapot_http::protocol::{Request, Response, ResponseBody};
//! use teapot_http::server::{Server, ServerConfig};
//!
//! async fn hello(_request: Request) -> Result<Response, HandlerError> {
//!     Ok(Response::new(ResponseBody::text("Hello World!")))
//! }
//!
//! # async fn run(tls: TlsContext) -> Result<(), Box<dyn Error>> {
//! let server = Server::builder()
//!     .config(ServerConfig::default())
//!     .tls(tls)
//!     .handler(make_handler(hello))
//!     .build()?;
//!
//! server.start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: frames, requests, responses and the error taxonomy
//! - [`codec`]: the HTTP/1.1 wire codec
//! - [`connection`]: guard, assembler, writer and the per-transport pipelines
//! - [`handler`]: the handler contract and the worker pool dispatch
//! - [`negotiate`]: TLS handshake and ALPN selection
//! - [`server`]: configuration and the two accept loops
//!
//! # Logging
//!
//! The library never installs a global subscriber. Pass a [`tracing::Dispatch`]
//! to [`ServerBuilder::dispatch`](server::ServerBuilder::dispatch); without one
//! every log call is a no-op.
//!
//! # Limitations
//!
//! - Request and response bodies are fully buffered, up to 10 MiB per connection
//! - HTTP/1.1 bodies must be framed by `content-length`
//! - No handler timeout

pub mod codec;
pub mod connection;
pub mod handler;
pub mod negotiate;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
