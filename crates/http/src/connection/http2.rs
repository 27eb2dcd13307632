use std::future::poll_fn;

use bytes::Bytes;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use h2::server::SendResponse;
use h2::{RecvStream, SendStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tracing::{Instrument, debug, debug_span, error};

use crate::connection::writer::{FrameSink, ResponseWriter};
use crate::connection::{ConnectionGuard, RequestAssembler};
use crate::handler::Dispatcher;
use crate::protocol::{
    ConnectionId, HttpError, Message, ParseError, PayloadItem, PayloadSize, Request, RequestHeader, ResponseHead,
    SendError, StreamContext,
};

/// Default limit of streams one client may have open at once.
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 100;

/// An HTTP/2 connection multiplexing independent request/response streams.
///
/// All streams are driven on the connection's own task: accepting new streams
/// keeps the shared socket flowing while each stream assembles its request,
/// waits for the handler and writes its response. Request body capacity is
/// handed back to the peer only after the assembler accepted a chunk.
pub struct Http2Connection<IO> {
    io: IO,
    connection: ConnectionId,
    max_concurrent_streams: u32,
}

impl<IO> Http2Connection<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: IO, connection: ConnectionId) -> Self {
        Self { io, connection, max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS }
    }

    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.max_concurrent_streams = max;
        self
    }

    /// Serves streams until the client goes away or the connection must close.
    pub async fn process(self, dispatcher: &Dispatcher, guard: ConnectionGuard) -> Result<(), HttpError> {
        let mut h2 =
            h2::server::Builder::new().max_concurrent_streams(self.max_concurrent_streams).handshake::<_, Bytes>(self.io).await?;
        let mut streams = FuturesUnordered::new();

        loop {
            select! {
                accepted = h2.accept() => match accepted {
                    Some(Ok((request, respond))) => {
                        let stream_id = respond.stream_id().as_u32();
                        let context = StreamContext::http2(self.connection, stream_id);
                        let span = debug_span!("stream", stream_id);
                        streams.push(serve_stream(request, respond, context, guard.clone(), dispatcher).instrument(span));
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        debug!("client closed the connection");
                        return Ok(());
                    }
                },

                Some(result) = streams.next(), if !streams.is_empty() => result?,
            }
        }
    }
}

/// Drives one stream; errors returned from here close the whole connection.
///
/// Any body violation is fatal to the connection, whether the assembler caught
/// it or h2 reset the stream itself over a `content-length` mismatch. Only a
/// reset sent by the client ends the stream quietly.
async fn serve_stream(
    request: http::Request<RecvStream>,
    respond: SendResponse<Bytes>,
    context: StreamContext,
    guard: ConnectionGuard,
    dispatcher: &Dispatcher,
) -> Result<(), HttpError> {
    let request = match assemble(request, context, guard).await {
        Ok(request) => request,
        Err(HttpError::Http2Error { source }) if source.is_reset() && source.is_remote() => {
            debug!(cause = %source, "stream reset by client");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let response = dispatcher.dispatch(request).await;
    let mut writer = ResponseWriter::new(Http2Sink::new(respond));
    if let Err(e) = writer.write(response, &context, true).await {
        let e = HttpError::from(e);
        error!(category = %e.category(), cause = %e, "failed to write stream response");
    }
    Ok(())
}

async fn assemble(request: http::Request<RecvStream>, context: StreamContext, guard: ConnectionGuard) -> Result<Request, HttpError> {
    let (parts, mut body) = request.into_parts();
    let mut assembler = RequestAssembler::new(context, guard);
    assembler.push(Message::Header(RequestHeader::from(parts)))?;

    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        let len = chunk.len();
        assembler.push(Message::Payload(PayloadItem::Chunk(chunk)))?;
        body.flow_control().release_capacity(len)?;
    }

    let request = assembler.push(Message::Payload(PayloadItem::Eof))?;
    request.ok_or_else(|| ParseError::unexpected_frame("end of stream", "before the request completed").into())
}

/// Writes frames onto one HTTP/2 stream.
pub struct Http2Sink {
    respond: SendResponse<Bytes>,
    body: Option<SendStream<Bytes>>,
    finished: bool,
}

impl Http2Sink {
    pub fn new(respond: SendResponse<Bytes>) -> Self {
        Self { respond, body: None, finished: false }
    }
}

impl FrameSink for Http2Sink {
    /// A stream is dead once the client reset it.
    fn is_alive(&mut self) -> bool {
        if self.finished {
            return true;
        }
        let reset = match &mut self.body {
            Some(body) => poll_fn(|cx| body.poll_reset(cx)).now_or_never(),
            None => poll_fn(|cx| self.respond.poll_reset(cx)).now_or_never(),
        };
        reset.is_none()
    }

    async fn send_frame(&mut self, frame: Message<(ResponseHead, PayloadSize)>) -> Result<(), SendError> {
        match frame {
            Message::Header((head, payload_size)) => {
                let end_of_stream = payload_size.is_empty();
                let body = self.respond.send_response(head, end_of_stream)?;
                if end_of_stream {
                    self.finished = true;
                } else {
                    self.body = Some(body);
                }
            }
            Message::Payload(PayloadItem::Chunk(bytes)) => {
                let body = self.body.as_mut().ok_or_else(|| SendError::invalid_body("body chunk without response head"))?;
                body.send_data(bytes, false)?;
            }
            Message::Payload(PayloadItem::Eof) => {
                if let Some(mut body) = self.body.take() {
                    body.send_data(Bytes::new(), true)?;
                }
                self.finished = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use crate::protocol::{Response, ResponseBody};
    use bytes::BytesMut;
    use http::{Method, StatusCode, header};
    use std::sync::Arc;
    use tokio::io::{DuplexStream, duplex};
    use tokio::task::JoinHandle;

    async fn echo(request: Request) -> Result<Response, crate::handler::HandlerError> {
        let context = request.extensions().get::<StreamContext>().copied();
        if context.and_then(|context| context.stream_id()).is_none() {
            return Err("missing stream context".into());
        }
        if request.uri().path() == "/length" {
            return Ok(Response::new(ResponseBody::text(request.body().len().to_string())));
        }
        Ok(Response::new(ResponseBody::once(request.into_body(), Some(mime::APPLICATION_OCTET_STREAM))))
    }

    async fn start(guard: ConnectionGuard) -> (h2::client::SendRequest<Bytes>, JoinHandle<Result<(), HttpError>>) {
        let (client_io, server_io) = duplex(64 * 1024);
        let server = tokio::spawn(async move {
            let dispatcher = Dispatcher::new(Arc::new(make_handler(echo)), 4);
            Http2Connection::new(server_io, ConnectionId::next()).process(&dispatcher, guard).await
        });

        let (client, connection) = h2::client::handshake::<DuplexStream>(client_io).await.unwrap();
        tokio::spawn(async move {
            let _ = connection.await;
        });
        (client.ready().await.unwrap(), server)
    }

    fn post(path: &str, content_length: Option<u64>) -> http::Request<()> {
        let mut builder = http::Request::builder().method(Method::POST).uri(format!("https://localhost{path}"));
        if let Some(content_length) = content_length {
            builder = builder.header(header::CONTENT_LENGTH, content_length);
        }
        builder.body(()).unwrap()
    }

    async fn read_body(mut body: RecvStream) -> BytesMut {
        let mut collected = BytesMut::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk.unwrap();
            body.flow_control().release_capacity(chunk.len()).unwrap();
            collected.extend_from_slice(&chunk);
        }
        collected
    }

    #[tokio::test]
    async fn streams_are_served_independently() {
        let (mut client, _server) = start(ConnectionGuard::default()).await;

        let (first, mut first_body) = client.send_request(post("/echo", Some(5)), false).unwrap();
        let mut client = client.ready().await.unwrap();
        let (second, mut second_body) = client.send_request(post("/echo", Some(3)), false).unwrap();
        second_body.send_data(Bytes::from_static(b"two"), true).unwrap();
        first_body.send_data(Bytes::from_static(b"first"), true).unwrap();

        let second = second.await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers()["x-stream-id"], "3");
        assert_eq!(second.headers()["server"], "teapot");
        assert_eq!(second.headers()[header::CONTENT_LENGTH], "3");
        assert_eq!(&read_body(second.into_body()).await[..], b"two");

        let first = first.await.unwrap();
        assert_eq!(first.headers()["x-stream-id"], "1");
        assert_eq!(&read_body(first.into_body()).await[..], b"first");
    }

    #[tokio::test]
    async fn body_larger_than_the_initial_window_is_delivered_whole() {
        // 65_535 bytes is the initial window of both the stream and the connection
        let (mut client, _server) = start(ConnectionGuard::default()).await;
        let size = 200_000;

        let (response, mut body) = client.send_request(post("/length", Some(size)), false).unwrap();
        body.send_data(Bytes::from(vec![b'x'; 200_000]), true).unwrap();

        let response = response.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&read_body(response.into_body()).await[..], b"200000");
    }

    #[tokio::test]
    async fn body_past_the_declared_length_closes_the_connection() {
        let (mut client, server) = start(ConnectionGuard::default()).await;

        // no content-length declares an empty body
        let (response, mut body) = client.send_request(post("/echo", None), false).unwrap();
        body.send_data(Bytes::from_static(b"unexpected"), true).unwrap();

        let result = server.await.unwrap();
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::BodyOverflow { declared: 0, .. } })));
        assert!(response.await.is_err());
    }

    #[tokio::test]
    async fn incomplete_body_closes_the_connection() {
        let (mut client, server) = start(ConnectionGuard::default()).await;

        let (response, mut body) = client.send_request(post("/echo", Some(10)), false).unwrap();
        body.send_data(Bytes::from_static(b"abc"), true).unwrap();

        let result = server.await.unwrap();
        assert!(result.is_err());
        assert!(response.await.is_err());
    }

    #[tokio::test]
    async fn lifetime_ceiling_spans_streams() {
        let (mut client, server) = start(ConnectionGuard::new(8)).await;

        let (first, mut first_body) = client.send_request(post("/echo", Some(5)), false).unwrap();
        first_body.send_data(Bytes::from_static(b"hello"), true).unwrap();
        let first = first.await.unwrap();
        assert_eq!(&read_body(first.into_body()).await[..], b"hello");

        let mut client = client.ready().await.unwrap();
        let (second, mut second_body) = client.send_request(post("/echo", Some(5)), false).unwrap();
        second_body.send_data(Bytes::from_static(b"world"), true).unwrap();

        let result = server.await.unwrap();
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::ConnectionLimit { received: 10, max_size: 8 } })));
        assert!(second.await.is_err());
    }

    #[tokio::test]
    async fn oversized_declared_body_closes_the_connection() {
        let (mut client, server) = start(ConnectionGuard::new(1024)).await;

        let (response, _body) = client.send_request(post("/echo", Some(2048)), false).unwrap();
        let result = server.await.unwrap();
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::TooLargeBody { declared: 2048, .. } })));
        assert!(response.await.is_err());
    }
}
