//! HTTP response types.
//!
//! Handlers answer with a [`Response`], an `http::Response` whose body is a
//! [`ResponseBody`]. The body carries its bytes together with the declared MIME
//! type, and may defer its encoding until the response writer serializes it.

use std::error::Error;
use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use mime::Mime;

use crate::protocol::SendError;

/// Type alias for HTTP response headers before a body is attached.
pub type ResponseHead = http::Response<()>;

/// The response contract of a handler.
pub type Response = http::Response<ResponseBody>;

/// Fixed machine-readable body sent for handler and serialization failures.
pub const INTERNAL_SERVER_ERROR_BODY: &str = r#"{"status": false, "code": 500, "msg": "Internal Server Error"}"#;

type Encode = Box<dyn FnOnce() -> Result<Bytes, Box<dyn Error + Send + Sync>> + Send>;

/// An optional, fully buffered response body with its MIME type.
pub struct ResponseBody {
    kind: Kind,
}

enum Kind {
    Empty,
    Once { bytes: Bytes, mime: Option<Mime> },
    Deferred { encode: Encode, mime: Mime },
}

/// A body after encoding, ready to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Bytes,
    pub mime: Mime,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    /// Raw bytes; without a MIME type the writer declares plain text.
    pub fn once(bytes: impl Into<Bytes>, mime: Option<Mime>) -> Self {
        Self { kind: Kind::Once { bytes: bytes.into(), mime } }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::once(text.into(), Some(mime::TEXT_PLAIN_UTF_8))
    }

    /// A body whose bytes are produced by the response writer.
    ///
    /// If `encode` fails the writer answers with the fixed internal server error
    /// response instead.
    pub fn deferred<F, E>(mime: Mime, encode: F) -> Self
    where
        F: FnOnce() -> Result<Bytes, E> + Send + 'static,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self { kind: Kind::Deferred { encode: Box::new(move || encode().map_err(Into::into)), mime } }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::Empty)
    }

    /// Produces the body bytes, `None` when there is no body.
    pub fn encode(self) -> Result<Option<EncodedBody>, SendError> {
        match self.kind {
            Kind::Empty => Ok(None),
            Kind::Once { bytes, mime } => Ok(Some(EncodedBody { bytes, mime: mime.unwrap_or(mime::TEXT_PLAIN_UTF_8) })),
            Kind::Deferred { encode, mime } => {
                let bytes = encode().map_err(SendError::serialize)?;
                Ok(Some(EncodedBody { bytes, mime }))
            }
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Empty => f.write_str("ResponseBody::Empty"),
            Kind::Once { bytes, mime } => {
                f.debug_struct("ResponseBody::Once").field("len", &bytes.len()).field("mime", mime).finish()
            }
            Kind::Deferred { mime, .. } => f.debug_struct("ResponseBody::Deferred").field("mime", mime).finish(),
        }
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<()> for ResponseBody {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()), Some(mime::TEXT_PLAIN_UTF_8))
    }
}

impl From<Bytes> for ResponseBody {
    fn from(value: Bytes) -> Self {
        Self::once(value, None)
    }
}

/// The fixed `500` response used for handler and serialization failures.
pub fn internal_server_error() -> Response {
    let mut response =
        Response::new(ResponseBody::once(Bytes::from_static(INTERNAL_SERVER_ERROR_BODY.as_bytes()), Some(mime::APPLICATION_JSON)));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
