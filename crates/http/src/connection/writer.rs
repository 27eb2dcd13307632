//! Response serialization, shared by both transports.
//!
//! [`ResponseWriter`] applies the header bookkeeping to a handler's [`Response`]
//! and emits it as the frame sequence head, optional body chunk, end marker into
//! a [`FrameSink`]. The sink translates frames into wire bytes for its transport.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Version, header};
use tracing::{debug, error};

use crate::protocol::{
    ErrorCategory, Message, PayloadItem, PayloadSize, Response, ResponseHead, SendError, StreamContext, internal_server_error,
};

/// Value of the `server` header on every response.
pub const SERVER_NAME: HeaderValue = HeaderValue::from_static("teapot");

/// Carries the decimal HTTP/2 stream id on HTTP/2 responses.
pub static X_STREAM_ID: HeaderName = HeaderName::from_static("x-stream-id");

/// Connection-specific headers that have no meaning on HTTP/2.
const HOP_BY_HOP: [&str; 5] = ["connection", "keep-alive", "proxy-connection", "transfer-encoding", "upgrade"];

type Frame = Message<(ResponseHead, PayloadSize)>;

/// The write half of a connection or stream, one frame at a time.
#[trait_variant::make(FrameSink: Send)]
pub trait LocalFrameSink {
    /// Whether the peer can still receive frames.
    fn is_alive(&mut self) -> bool;

    async fn send_frame(&mut self, frame: Frame) -> Result<(), SendError>;
}

/// What happens to the connection once a response has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Accept the next request (HTTP/1.1) or leave the other streams running (HTTP/2)
    KeepAlive,
    /// Close the connection
    Close,
}

pub struct ResponseWriter<S> {
    sink: S,
    dropped: bool,
}

impl<S: FrameSink> ResponseWriter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, dropped: false }
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Whether the last write reached a live peer.
    pub fn is_alive(&self) -> bool {
        !self.dropped
    }

    /// Writes `response` and decides the fate of the connection.
    ///
    /// Liveness is checked before every frame. A dead peer is not an error:
    /// the remaining frames are dropped and the write-after-close is logged once.
    pub async fn write(&mut self, response: Response, context: &StreamContext, keep_alive: bool) -> Result<Disposition, SendError> {
        let (head, body, disposition) = prepare(response, context, keep_alive);
        let payload_size = PayloadSize::from_length(body.as_ref().map_or(0, |body| body.len() as u64));

        let mut frames = Vec::with_capacity(3);
        frames.push(Message::Header((head, payload_size)));
        if let Some(body) = body.filter(|body| !body.is_empty()) {
            frames.push(Message::Payload(PayloadItem::Chunk(body)));
        }
        frames.push(Message::Payload(PayloadItem::Eof));

        for frame in frames {
            if self.dropped {
                break;
            }
            if !self.sink.is_alive() {
                self.drop_writes(None);
                break;
            }
            match self.sink.send_frame(frame).await {
                Ok(()) => {}
                Err(e) if e.is_closed() => self.drop_writes(Some(&e)),
                Err(e) => return Err(e),
            }
        }

        Ok(if self.dropped { Disposition::Close } else { disposition })
    }

    fn drop_writes(&mut self, cause: Option<&SendError>) {
        if !self.dropped {
            self.dropped = true;
            match cause {
                Some(e) => debug!(category = %ErrorCategory::WriteAfterClose, cause = %e, "peer is gone, dropping response"),
                None => debug!(category = %ErrorCategory::WriteAfterClose, "peer is gone, dropping response"),
            }
        }
    }
}

/// Encodes the body and applies the header fixups.
///
/// - `content-length` is always recomputed from the encoded body, and omitted without one
/// - `content-type` is the body's MIME type
/// - `server` is set; HTTP/2 adds `x-stream-id` and loses the hop-by-hop headers
/// - HTTP/1.1 adds `connection: close` when the connection will not be reused
pub fn prepare(response: Response, context: &StreamContext, keep_alive: bool) -> (ResponseHead, Option<Bytes>, Disposition) {
    let (mut parts, body) = response.into_parts();

    let encoded = match body.encode() {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(category = %ErrorCategory::Serialization, cause = %e, "failed to serialize response body");
            let (fallback_parts, fallback_body) = internal_server_error().into_parts();
            parts = fallback_parts;
            fallback_body.encode().ok().flatten()
        }
    };

    let headers = &mut parts.headers;
    headers.remove(header::CONTENT_LENGTH);
    let body = encoded.map(|encoded| {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(encoded.bytes.len()));
        if let Ok(content_type) = HeaderValue::from_str(encoded.mime.as_ref()) {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        encoded.bytes
    });
    headers.insert(header::SERVER, SERVER_NAME);

    let disposition = match context.stream_id() {
        Some(stream_id) => {
            parts.version = Version::HTTP_2;
            strip_hop_by_hop(&mut parts.headers);
            parts.headers.insert(X_STREAM_ID.clone(), HeaderValue::from(stream_id));
            Disposition::KeepAlive
        }
        None => {
            parts.version = Version::HTTP_11;
            if keep_alive && !wants_close(&parts.headers) {
                Disposition::KeepAlive
            } else {
                parts.headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
                Disposition::Close
            }
        }
    };

    (ResponseHead::from_parts(parts, ()), body, disposition)
}

fn wants_close(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .any(|value| value.as_bytes().split(|b| *b == b',').any(|token| token.trim_ascii().eq_ignore_ascii_case(b"close")))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ConnectionId, ResponseBody, TransportKind};
    use http::StatusCode;
    use std::io;

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Frame>,
        alive_for: Option<usize>,
        fail_with: Option<io::ErrorKind>,
    }

    impl FrameSink for RecordingSink {
        fn is_alive(&mut self) -> bool {
            self.alive_for.is_none_or(|n| self.frames.len() < n)
        }

        async fn send_frame(&mut self, frame: Frame) -> Result<(), SendError> {
            if let Some(kind) = self.fail_with {
                return Err(SendError::io(io::Error::from(kind)));
            }
            self.frames.push(frame);
            Ok(())
        }
    }

    fn http1() -> StreamContext {
        StreamContext::http1(ConnectionId::next(), TransportKind::TlsHttp1)
    }

    fn json_response(body: &'static str) -> Response {
        http::Response::builder()
            .header(header::CONTENT_LENGTH, "9999")
            .body(ResponseBody::once(Bytes::from_static(body.as_bytes()), Some(mime::APPLICATION_JSON)))
            .unwrap()
    }

    #[test]
    fn content_length_is_derived_from_body() {
        let (head, body, disposition) = prepare(json_response(r#"{"status":true,"data":"ok"}"#), &http1(), true);

        assert_eq!(head.headers()[header::CONTENT_LENGTH], "27");
        assert_eq!(head.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(head.headers()[header::SERVER], "teapot");
        assert_eq!(body.unwrap().len(), 27);
        assert_eq!(disposition, Disposition::KeepAlive);
    }

    #[test]
    fn missing_mime_defaults_to_plain_text() {
        let response = Response::new(ResponseBody::once(Bytes::from_static(b"hi"), None));
        let (head, _, _) = prepare(response, &http1(), true);
        assert_eq!(head.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn bodyless_response_has_no_content_length() {
        let response = http::Response::builder().status(StatusCode::NO_CONTENT).header(header::CONTENT_LENGTH, "5").body(ResponseBody::empty()).unwrap();
        let (head, body, _) = prepare(response, &http1(), true);
        assert!(head.headers().get(header::CONTENT_LENGTH).is_none());
        assert!(body.is_none());
    }

    #[test]
    fn serialization_failure_becomes_internal_server_error() {
        let body = ResponseBody::deferred(mime::APPLICATION_JSON, || Err::<Bytes, _>("not utf-8"));
        let response = http::Response::builder().status(StatusCode::OK).header("x-custom", "1").body(body).unwrap();

        let (head, body, disposition) = prepare(response, &http1(), true);
        assert_eq!(head.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(head.headers().get("x-custom").is_none());
        assert_eq!(&body.unwrap()[..], crate::protocol::INTERNAL_SERVER_ERROR_BODY.as_bytes());
        assert_eq!(disposition, Disposition::KeepAlive);
    }

    #[test]
    fn http1_close_is_announced() {
        let (head, _, disposition) = prepare(json_response("{}"), &http1(), false);
        assert_eq!(head.headers()[header::CONNECTION], "close");
        assert_eq!(disposition, Disposition::Close);

        let response = http::Response::builder().header(header::CONNECTION, "close").body(ResponseBody::empty()).unwrap();
        let (_, _, disposition) = prepare(response, &http1(), true);
        assert_eq!(disposition, Disposition::Close);
    }

    #[test]
    fn http2_gets_stream_id_and_loses_hop_by_hop() {
        let context = StreamContext::http2(ConnectionId::next(), 7);
        let response = http::Response::builder()
            .header(header::CONNECTION, "keep-alive")
            .header(header::TRANSFER_ENCODING, "chunked")
            .body(ResponseBody::text("ok"))
            .unwrap();

        let (head, _, disposition) = prepare(response, &context, false);
        assert_eq!(head.version(), Version::HTTP_2);
        assert_eq!(head.headers()[&X_STREAM_ID], "7");
        assert!(head.headers().get(header::CONNECTION).is_none());
        assert!(head.headers().get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(disposition, Disposition::KeepAlive);
    }

    #[tokio::test]
    async fn writes_head_body_end_in_order() {
        let mut writer = ResponseWriter::new(RecordingSink::default());
        let disposition = writer.write(json_response("{}"), &http1(), true).await.unwrap();
        assert_eq!(disposition, Disposition::KeepAlive);

        let frames = &writer.sink_mut().frames;
        assert_eq!(frames.len(), 3);
        assert!(frames[0].is_header());
        assert!(matches!(&frames[1], Message::Payload(PayloadItem::Chunk(bytes)) if &bytes[..] == b"{}"));
        assert!(matches!(&frames[2], Message::Payload(PayloadItem::Eof)));
    }

    #[tokio::test]
    async fn empty_body_writes_head_and_end() {
        let mut writer = ResponseWriter::new(RecordingSink::default());
        writer.write(Response::new(ResponseBody::empty()), &http1(), true).await.unwrap();
        assert_eq!(writer.sink_mut().frames.len(), 2);
    }

    #[tokio::test]
    async fn dead_peer_drops_remaining_frames() {
        let sink = RecordingSink { alive_for: Some(1), ..Default::default() };
        let mut writer = ResponseWriter::new(sink);

        let disposition = writer.write(json_response("{}"), &http1(), true).await.unwrap();
        assert_eq!(disposition, Disposition::Close);
        assert!(!writer.is_alive());
        assert_eq!(writer.sink_mut().frames.len(), 1);
    }

    #[tokio::test]
    async fn broken_pipe_is_not_an_error() {
        let sink = RecordingSink { fail_with: Some(io::ErrorKind::BrokenPipe), ..Default::default() };
        let mut writer = ResponseWriter::new(sink);
        assert_eq!(writer.write(json_response("{}"), &http1(), true).await.unwrap(), Disposition::Close);
    }

    #[tokio::test]
    async fn other_io_errors_surface() {
        let sink = RecordingSink { fail_with: Some(io::ErrorKind::PermissionDenied), ..Default::default() };
        let mut writer = ResponseWriter::new(sink);
        assert!(writer.write(json_response("{}"), &http1(), true).await.is_err());
    }
}
