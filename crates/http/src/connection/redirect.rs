//! The plaintext port: every request is sent to the TLS port.

use futures::StreamExt;
use http::header::InvalidHeaderValue;
use http::uri::Authority;
use http::{HeaderValue, StatusCode, header};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::codec::RequestDecoder;
use crate::connection::http1::{DEFAULT_READ_BUFFER_SIZE, Http1Sink};
use crate::connection::writer::ResponseWriter;
use crate::protocol::{HttpError, Message, ParseError, RequestHeader, Response, ResponseBody, StreamContext};

/// Answers any request with `308 Permanent Redirect` to `https://<host>:<tls port><path>`.
///
/// The body of the request is never read: the connection is closed once the
/// redirect has been flushed.
#[derive(Debug, Clone)]
pub struct RedirectResponder {
    public_host: String,
    tls_port: u16,
    fallback: HeaderValue,
}

impl RedirectResponder {
    /// `public_host` is used when a request does not name a usable host.
    pub fn new(public_host: &str, tls_port: u16) -> Result<Self, InvalidHeaderValue> {
        let public_host = bracket_ipv6(public_host);
        let fallback = HeaderValue::try_from(format!("https://{public_host}:{tls_port}/"))?;
        Ok(Self { public_host, tls_port, fallback })
    }

    /// The `location` a request is redirected to.
    pub fn location(&self, header: &RequestHeader) -> HeaderValue {
        let host = request_host(header).unwrap_or_else(|| self.public_host.clone());
        let path_and_query = header.uri().path_and_query().map_or("/", |path_and_query| path_and_query.as_str());

        HeaderValue::try_from(format!("https://{host}:{}{path_and_query}", self.tls_port)).unwrap_or_else(|_| self.fallback.clone())
    }

    pub fn response(&self, header: &RequestHeader) -> Response {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = StatusCode::PERMANENT_REDIRECT;
        response.headers_mut().insert(header::LOCATION, self.location(header));
        response
    }

    /// Reads one request head, redirects it and lets the connection close.
    pub async fn process<R, W>(&self, reader: R, writer: W, context: StreamContext) -> Result<(), HttpError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut framed_read = FramedRead::with_capacity(reader, RequestDecoder::new(), DEFAULT_READ_BUFFER_SIZE);

        let header = match framed_read.next().await {
            Some(Ok(Message::Header((header, _)))) => header,
            Some(Ok(Message::Payload(_))) => return Err(ParseError::unexpected_frame("body", "before a request head").into()),
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(()),
        };

        debug!(method = %header.method(), uri = %header.uri(), "redirecting to tls port");
        let mut writer = ResponseWriter::new(Http1Sink::new(writer));
        writer.write(self.response(&header), &context, false).await?;
        writer.sink_mut().shutdown().await;
        Ok(())
    }
}

fn request_host(header: &RequestHeader) -> Option<String> {
    let from_header = header
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Authority>().ok())
        .map(|authority| authority.host().to_owned());

    from_header.or_else(|| header.uri().host().map(bracket_ipv6)).filter(|host| !host.is_empty())
}

fn bracket_ipv6(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') { format!("[{host}]") } else { host.to_owned() }
}
