use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::connection::writer::{Disposition, FrameSink, ResponseWriter};
use crate::connection::{ConnectionGuard, RequestAssembler};
use crate::handler::Dispatcher;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, Request, ResponseHead, SendError, StreamContext};

/// Default size of one read from the socket.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// An HTTP/1.1 connection serving one request at a time.
///
/// The connection alternates between reading one full request and writing its
/// response. Nothing is read while the handler runs, which is the backpressure
/// on this transport, and bytes the client sent ahead stay in the read buffer
/// until the next request is due.
pub struct Http1Connection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    writer: ResponseWriter<Http1Sink<W>>,
    context: StreamContext,
}

impl<R, W> Http1Connection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, context: StreamContext) -> Self {
        Self::with_read_buffer(reader, writer, context, DEFAULT_READ_BUFFER_SIZE)
    }

    pub fn with_read_buffer(reader: R, writer: W, context: StreamContext, read_buffer_size: usize) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), read_buffer_size),
            writer: ResponseWriter::new(Http1Sink::new(writer)),
            context,
        }
    }

    /// Serves requests until the client closes, asks to close, or misbehaves.
    pub async fn process(mut self, dispatcher: &Dispatcher, guard: ConnectionGuard) -> Result<(), HttpError> {
        let mut assembler = RequestAssembler::new(self.context, guard);

        loop {
            let Some((request, keep_alive)) = self.next_request(&mut assembler).await? else {
                debug!("client closed the connection");
                return Ok(());
            };

            let response = dispatcher.dispatch(request).await;
            match self.writer.write(response, &self.context, keep_alive).await? {
                Disposition::KeepAlive => continue,
                Disposition::Close => {
                    debug!("closing connection after response");
                    self.writer.sink_mut().shutdown().await;
                    return Ok(());
                }
            }
        }
    }

    /// Reads frames until the assembler yields a request, `None` on a clean close.
    async fn next_request(&mut self, assembler: &mut RequestAssembler) -> Result<Option<(Request, bool)>, HttpError> {
        let mut keep_alive = false;

        loop {
            match self.framed_read.next().await {
                Some(Ok(message)) => {
                    if let Message::Header((header, _)) = &message {
                        keep_alive = header.is_keep_alive();
                    }
                    if let Some(request) = assembler.push(message.map_header(|(header, _)| header))? {
                        return Ok(Some((request, keep_alive)));
                    }
                }

                Some(Err(e)) => return Err(e.into()),

                None if assembler.is_idle() => return Ok(None),

                None => return Err(ParseError::unexpected_frame("end of stream", "in the middle of a request").into()),
            }
        }
    }
}

/// Writes frames through the HTTP/1.1 encoder, flushing on the end marker.
pub struct Http1Sink<W> {
    framed_write: FramedWrite<W, ResponseEncoder>,
    alive: bool,
}

impl<W: AsyncWrite + Unpin> Http1Sink<W> {
    pub fn new(writer: W) -> Self {
        Self { framed_write: FramedWrite::new(writer, ResponseEncoder::new()), alive: true }
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.framed_write.get_mut()
    }

    /// Flushes and closes the write side, sending TLS `close_notify` where there is one.
    pub async fn shutdown(&mut self) {
        if !self.alive {
            return;
        }
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(cause = %e, "failed to shut down connection");
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> FrameSink for Http1Sink<W> {
    fn is_alive(&mut self) -> bool {
        self.alive
    }

    async fn send_frame(&mut self, frame: Message<(ResponseHead, PayloadSize)>) -> Result<(), SendError> {
        let result = match frame {
            // using send instead of feed on the end marker, the whole response is flushed at once
            end @ Message::Payload(PayloadItem::Eof) => self.framed_write.send(end).await,
            frame => self.framed_write.feed(frame).await,
        };

        if matches!(&result, Err(e) if e.is_closed()) {
            self.alive = false;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Dispatcher, make_handler};
    use crate::protocol::{ConnectionId, Response, ResponseBody, TransportKind};
    use bytes::Bytes;
    use indoc::indoc;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, duplex};

    async fn echo(request: Request) -> Result<Response, crate::handler::HandlerError> {
        let body = request.body().clone();
        if request.uri().path() == "/fail" {
            return Err("handler exploded".into());
        }
        Ok(Response::new(ResponseBody::once(body, Some(mime::APPLICATION_OCTET_STREAM))))
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(make_handler(echo)), 4)
    }

    async fn run(input: &str, max_body_size: u64) -> (Result<(), HttpError>, String) {
        let (client, server) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.shutdown().await.unwrap();

        let context = StreamContext::http1(ConnectionId::next(), TransportKind::TlsHttp1);
        let connection = Http1Connection::new(server_read, server_write, context);
        let result = connection.process(&dispatcher(), ConnectionGuard::new(max_body_size)).await;

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();
        (result, output)
    }

    #[tokio::test]
    async fn echoes_body_and_keeps_alive() {
        let input = indoc! {"
            POST /echo HTTP/1.1
            Content-Length: 5

            helloGET /echo HTTP/1.1
            Connection: close

        "}
        .replace('\n', "\r\n");

        let (result, output) = run(&input, 1024).await;
        assert!(result.is_ok());

        let mut responses = output.split("HTTP/1.1 ").skip(1);
        let first = responses.next().unwrap();
        assert!(first.starts_with("200 OK\r\n"));
        assert!(first.contains("content-length: 5\r\n"));
        assert!(first.contains("content-type: application/octet-stream\r\n"));
        assert!(first.ends_with("\r\n\r\nhello"));

        let second = responses.next().unwrap();
        assert!(second.contains("content-length: 0\r\n"));
        assert!(second.contains("connection: close\r\n"));
        assert!(responses.next().is_none());
    }

    #[tokio::test]
    async fn http10_closes_by_default() {
        let (result, output) = run("GET /echo HTTP/1.0\r\n\r\nGET /echo HTTP/1.1\r\n\r\n", 1024).await;
        assert!(result.is_ok());
        assert_eq!(output.matches("HTTP/1.1 200 OK").count(), 1);
    }

    #[tokio::test]
    async fn handler_failure_is_a_500_and_keeps_alive() {
        let (result, output) = run("GET /fail HTTP/1.1\r\n\r\nGET /echo HTTP/1.1\r\nConnection: close\r\n\r\n", 1024).await;
        assert!(result.is_ok());
        assert!(output.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(output.contains(crate::protocol::INTERNAL_SERVER_ERROR_BODY));
        assert_eq!(output.matches("HTTP/1.1 200 OK").count(), 1);
    }

    #[tokio::test]
    async fn oversized_declared_body_closes_without_response() {
        let (result, output) = run("POST /echo HTTP/1.1\r\nContent-Length: 11000000\r\n\r\nabc", 10 * 1024 * 1024).await;
        let err = result.unwrap_err();
        assert!(matches!(err, HttpError::RequestError { source: ParseError::TooLargeBody { declared: 11_000_000, .. } }));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn truncated_body_closes_without_response() {
        let (result, output) = run("POST /echo HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc", 1024).await;
        assert!(result.is_err());
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn malformed_head_closes_without_response() {
        let (result, output) = run("\x16\x03\x01\x02\x00\x01\x00\x01 garbage that is not http\r\n\r\n", 1024).await;
        assert!(result.is_err());
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn idle_close_is_clean() {
        let (result, output) = run("", 1024).await;
        assert!(result.is_ok());
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn writes_to_closed_peer_are_dropped() {
        let (client, server) = duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        drop(client);

        let context = StreamContext::http1(ConnectionId::next(), TransportKind::TlsHttp1);
        let mut connection = Http1Connection::new(server_read, server_write, context);
        let response = Response::new(ResponseBody::once(Bytes::from_static(b"late"), None));

        let disposition = connection.writer.write(response, &context, true).await.unwrap();
        assert_eq!(disposition, Disposition::Close);
        assert!(!connection.writer.is_alive());
    }
}
