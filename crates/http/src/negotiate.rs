//! TLS handshake and ALPN protocol selection for the TLS port.

use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{debug, info};

use crate::protocol::{NegotiationError, TransportKind};

/// ALPN id of HTTP/2.
pub const ALPN_H2: &[u8] = b"h2";

/// ALPN id of HTTP/1.1.
pub const ALPN_HTTP11: &[u8] = b"http/1.1";

/// The immutable TLS configuration shared by every connection of the TLS port.
///
/// Whatever ALPN list the given configuration carries, the context always
/// advertises `h2` then `http/1.1`.
#[derive(Clone)]
pub struct TlsContext {
    config: Arc<ServerConfig>,
}

impl TlsContext {
    pub fn new(mut config: ServerConfig) -> Self {
        config.alpn_protocols = vec![ALPN_H2.to_vec(), ALPN_HTTP11.to_vec()];
        Self { config: Arc::new(config) }
    }

    /// Builds a context for a certificate chain and its private key.
    pub fn from_single_cert(cert_chain: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Result<Self, rustls::Error> {
        let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }
}

/// A negotiated TLS connection, tagged once with the protocol it speaks.
pub enum Transport<IO> {
    Http1(TlsStream<IO>),
    Http2(TlsStream<IO>),
}

impl<IO> Transport<IO> {
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Http1(_) => TransportKind::TlsHttp1,
            Transport::Http2(_) => TransportKind::TlsHttp2,
        }
    }
}

#[derive(Clone)]
pub struct Negotiator {
    acceptor: TlsAcceptor,
}

impl Negotiator {
    pub fn new(tls: &TlsContext) -> Self {
        Self { acceptor: TlsAcceptor::from(Arc::clone(&tls.config)) }
    }

    /// Performs the handshake and picks the pipeline from the agreed protocol.
    ///
    /// Failures are final, the client has to reconnect.
    pub async fn negotiate<IO>(&self, io: IO) -> Result<Transport<IO>, NegotiationError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let stream = self.acceptor.accept(io).await?;
        let (_, session) = stream.get_ref();
        let kind = select_protocol(session.alpn_protocol())?;
        debug!(transport = %kind, "negotiated protocol");

        Ok(match kind {
            TransportKind::TlsHttp2 => Transport::Http2(stream),
            TransportKind::TlsHttp1 | TransportKind::PlaintextHttp1 => Transport::Http1(stream),
        })
    }
}

/// Maps the ALPN result to a transport; no ALPN at all means HTTP/1.1.
pub fn select_protocol(alpn: Option<&[u8]>) -> Result<TransportKind, NegotiationError> {
    match alpn {
        Some(ALPN_H2) => Ok(TransportKind::TlsHttp2),
        Some(ALPN_HTTP11) => Ok(TransportKind::TlsHttp1),
        Some(protocol) => Err(NegotiationError::unsupported_protocol(protocol)),
        None => {
            info!("no protocol negotiated via ALPN, using HTTP/1.1");
            Ok(TransportKind::TlsHttp1)
        }
    }
}
