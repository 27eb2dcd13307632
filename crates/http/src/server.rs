//! The two-port listener.
//!
//! ```text
//! plaintext port ──▶ RedirectResponder ─────────────────────────────────────▶ 308
//! tls port ──▶ Negotiator ─┬─ http/1.1 ─▶ Http1Connection ─┐
//!                          └─ h2 ───────▶ Http2Connection ─┴─▶ Dispatcher ─▶ Handler
//! ```
//!
//! Every accepted socket becomes one task that owns the connection until it
//! closes. Failures end in [`error_stage::report`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use http::header::InvalidHeaderValue;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument, debug, info, info_span, warn};

use crate::connection::{
    ConnectionGuard, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_CONCURRENT_STREAMS, DEFAULT_READ_BUFFER_SIZE, Http1Connection,
    Http2Connection, RedirectResponder, error_stage,
};
use crate::handler::{DEFAULT_WORKER_PERMITS, Dispatcher, Handler};
use crate::negotiate::{Negotiator, TlsContext, Transport};
use crate::protocol::{ConnectionId, HttpError, StreamContext, TransportKind};

/// Process-wide settings, fixed once the server starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address both ports bind to
    pub host: String,
    /// Plaintext port, redirect only
    pub http_port: u16,
    /// TLS port
    pub https_port: u16,
    /// Host used in redirects when the request does not name one
    pub public_host: String,
    pub max_body_size: u64,
    pub backlog: u32,
    /// Bytes read from a socket at once
    pub read_buffer_size: usize,
    pub max_concurrent_streams: u32,
    /// Handler calls allowed to run at once
    pub worker_permits: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            host: "0.0.0.0".to_owned(),
            http_port: 8080,
            https_port: 4430,
            public_host: "localhost".to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            backlog: 256,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            worker_permits: DEFAULT_WORKER_PERMITS * cores,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("tls context must be set")]
    MissingTls,
    #[error("handler must be set")]
    MissingHandler,
    #[error("invalid public host: {source}")]
    InvalidPublicHost {
        #[from]
        source: InvalidHeaderValue,
    },
}

pub struct ServerBuilder {
    config: ServerConfig,
    tls: Option<TlsContext>,
    handler: Option<Arc<dyn Handler>>,
    dispatch: Option<Dispatch>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { config: ServerConfig::default(), tls: None, handler: None, dispatch: None }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tls(mut self, tls: TlsContext) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Where the server logs to. Without one, logging is a no-op.
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let tls = self.tls.ok_or(ServerBuildError::MissingTls)?;
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        let redirect = RedirectResponder::new(&self.config.public_host, self.config.https_port)?;

        Ok(Server {
            negotiator: Negotiator::new(&tls),
            dispatcher: Dispatcher::new(handler, self.config.worker_permits),
            redirect,
            dispatch: self.dispatch.unwrap_or_else(Dispatch::none),
            config: Arc::new(self.config),
        })
    }
}

#[derive(Clone)]
pub struct Server {
    config: Arc<ServerConfig>,
    negotiator: Negotiator,
    dispatcher: Dispatcher,
    redirect: RedirectResponder,
    dispatch: Dispatch,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds both ports and serves until the process ends.
    ///
    /// # Errors
    ///
    /// Returns error if a port can not be bound
    pub async fn start(self) -> io::Result<()> {
        let dispatch = self.dispatch.clone();
        async move {
            let plaintext = listen(&self.config.host, self.config.http_port, self.config.backlog).await?;
            let tls = listen(&self.config.host, self.config.https_port, self.config.backlog).await?;
            self.serve(plaintext, tls).await;
            Ok(())
        }
        .with_subscriber(dispatch)
        .await
    }

    /// Serves already bound listeners.
    pub async fn serve(self, plaintext: TcpListener, tls: TcpListener) {
        let dispatch = self.dispatch.clone();
        async move {
            log_listening(&plaintext, "plaintext");
            log_listening(&tls, "tls");
            futures::join!(self.accept_plaintext(plaintext), self.accept_tls(tls));
        }
        .with_subscriber(dispatch)
        .await;
    }

    async fn accept_plaintext(&self, listener: TcpListener) {
        loop {
            let Some((stream, remote_addr)) = accept(&listener).await else { continue };
            let id = ConnectionId::next();
            let redirect = self.redirect.clone();
            let span = info_span!("connection", conn = %id, transport = %TransportKind::PlaintextHttp1, %remote_addr);

            tokio::spawn(
                async move {
                    let (reader, writer) = stream.into_split();
                    let context = StreamContext::http1(id, TransportKind::PlaintextHttp1);
                    finish(redirect.process(reader, writer, context).await);
                }
                .instrument(span)
                .with_current_subscriber(),
            );
        }
    }

    async fn accept_tls(&self, listener: TcpListener) {
        loop {
            let Some((stream, remote_addr)) = accept(&listener).await else { continue };
            let id = ConnectionId::next();
            let server = self.clone();
            let span = info_span!("connection", conn = %id, transport = tracing::field::Empty, %remote_addr);

            tokio::spawn(
                async move {
                    let result = match server.negotiator.negotiate(stream).await {
                        Ok(transport) => server.serve_tls(id, transport).await,
                        Err(e) => Err(e.into()),
                    };
                    finish(result);
                }
                .instrument(span)
                .with_current_subscriber(),
            );
        }
    }

    async fn serve_tls<IO>(&self, id: ConnectionId, transport: Transport<IO>) -> Result<(), HttpError>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        tracing::Span::current().record("transport", tracing::field::display(transport.kind()));
        let guard = ConnectionGuard::new(self.config.max_body_size);

        match transport {
            Transport::Http1(stream) => {
                let (reader, writer) = tokio::io::split(stream);
                let context = StreamContext::http1(id, TransportKind::TlsHttp1);
                Http1Connection::with_read_buffer(reader, writer, context, self.config.read_buffer_size)
                    .process(&self.dispatcher, guard)
                    .await
            }
            Transport::Http2(stream) => {
                Http2Connection::new(stream, id)
                    .max_concurrent_streams(self.config.max_concurrent_streams)
                    .process(&self.dispatcher, guard)
                    .await
            }
        }
    }
}

/// Binds a listener with `SO_REUSEADDR` and the configured backlog.
pub async fn listen(host: &str, port: u16, backlog: u32) -> io::Result<TcpListener> {
    let addr = lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no address for {host}:{port}")))?;

    let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

async fn accept(listener: &TcpListener) -> Option<(TcpStream, SocketAddr)> {
    match listener.accept().await {
        Ok((stream, remote_addr)) => {
            if let Err(e) = stream.set_nodelay(true) {
                warn!(cause = %e, "failed to set TCP_NODELAY");
            }
            Some((stream, remote_addr))
        }
        Err(e) => {
            warn!(cause = %e, "failed to accept");
            None
        }
    }
}

fn finish(result: Result<(), HttpError>) {
    match result {
        Ok(()) => debug!("connection closed"),
        Err(e) => {
            error_stage::report(&e);
        }
    }
}

fn log_listening(listener: &TcpListener, port: &'static str) {
    match listener.local_addr() {
        Ok(addr) => info!(%addr, port, "start listening"),
        Err(e) => warn!(cause = %e, port, "listening on unknown address"),
    }
}
