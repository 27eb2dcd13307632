//! Core HTTP protocol abstractions shared by both transports.
//!
//! # Architecture
//!
//! - **Frames** ([`message`]): the transport-agnostic head / body-chunk / end shape
//!   - [`Message`]: either a head or a payload item
//!   - [`PayloadItem`]: one body chunk, or the end-of-message marker
//!   - [`PayloadSize`]: the declared body size
//!
//! - **Requests** ([`request`]): [`RequestHeader`] and the assembled [`Request`]
//!
//! - **Responses** ([`response`]): [`Response`], [`ResponseBody`] and the fixed `500`
//!
//! - **Addressing** ([`context`]): [`ConnectionId`], [`TransportKind`], [`StreamContext`]
//!
//! - **Errors** ([`error`]): [`HttpError`] and the [`ErrorCategory`] taxonomy

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;
pub use request::RequestHeader;
pub use request::declared_length;

mod response;
pub use response::EncodedBody;
pub use response::INTERNAL_SERVER_ERROR_BODY;
pub use response::Response;
pub use response::ResponseBody;
pub use response::ResponseHead;
pub use response::internal_server_error;

mod context;
pub use context::ConnectionId;
pub use context::StreamContext;
pub use context::TransportKind;

mod error;
pub use error::BoxError;
pub use error::ErrorCategory;
pub use error::HttpError;
pub use error::NegotiationError;
pub use error::ParseError;
pub use error::SendError;
