//! Command line configuration of the `teapot` binary.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use clap::Parser;
use teapot_http::negotiate::TlsContext;
use teapot_http::server::ServerConfig;
use thiserror::Error;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "teapot", version, about = "https front end with a plaintext redirect port")]
pub struct Cli {
    /// Address both ports bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Plaintext port, answers every request with a redirect
    #[arg(long, default_value_t = 8080)]
    pub http_port: u16,

    #[arg(long, default_value_t = 4430)]
    pub https_port: u16,

    /// Host named in redirects when the request carries none
    #[arg(long, default_value = "localhost")]
    pub public_host: String,

    /// PEM certificate chain
    #[arg(long)]
    pub cert: PathBuf,

    /// PEM private key
    #[arg(long)]
    pub key: PathBuf,

    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            http_port: self.http_port,
            https_port: self.https_port,
            public_host: self.public_host.clone(),
            ..ServerConfig::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("no certificate found in {}", path.display())]
    NoCertificate { path: PathBuf },

    #[error("no private key found in {}", path.display())]
    NoPrivateKey { path: PathBuf },

    #[error("invalid tls material: {source}")]
    Tls {
        #[from]
        source: rustls::Error,
    },
}

impl ConfigError {
    fn read(path: &Path, source: io::Error) -> Self {
        Self::Read { path: path.to_owned(), source }
    }
}

/// Loads a PEM certificate chain and private key into a TLS context.
///
/// # Errors
///
/// Returns error if a file can not be read, holds no usable item, or the key
/// does not match the certificate
pub fn load_tls(cert: &Path, key: &Path) -> Result<TlsContext, ConfigError> {
    let cert_chain = rustls_pemfile::certs(&mut open(cert)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::read(cert, e))?;
    if cert_chain.is_empty() {
        return Err(ConfigError::NoCertificate { path: cert.to_owned() });
    }

    let key_der = rustls_pemfile::private_key(&mut open(key)?)
        .map_err(|e| ConfigError::read(key, e))?
        .ok_or_else(|| ConfigError::NoPrivateKey { path: key.to_owned() })?;

    Ok(TlsContext::from_single_cert(cert_chain, key_der)?)
}

fn open(path: &Path) -> Result<BufReader<File>, ConfigError> {
    File::open(path).map(BufReader::new).map_err(|e| ConfigError::read(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../http/testdata").join(name)
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["teapot", "--cert", "cert.pem", "--key", "key.pem"]).unwrap();
        assert_eq!(cli.log_level, Level::INFO);

        let config = cli.server_config();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.https_port, 4430);
        assert_eq!(config.max_body_size, 10 * 1024 * 1024);
    }

    #[test]
    fn overrides() {
        let cli = Cli::try_parse_from([
            "teapot",
            "--host",
            "127.0.0.1",
            "--http-port",
            "80",
            "--https-port",
            "443",
            "--public-host",
            "example.com",
            "--cert",
            "cert.pem",
            "--key",
            "key.pem",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, Level::DEBUG);

        let config = cli.server_config();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!((config.http_port, config.https_port), (80, 443));
        assert_eq!(config.public_host, "example.com");
    }

    #[test]
    fn cert_and_key_are_required() {
        let result = Cli::try_parse_from(["teapot"]);
        assert!(matches!(result, Err(e) if e.kind() == clap::error::ErrorKind::MissingRequiredArgument));
    }

    #[test]
    fn loads_pem_material() {
        let tls = load_tls(&testdata("server.pem"), &testdata("server.key")).unwrap();
        assert_eq!(tls.config().alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn missing_file_names_its_path() {
        let missing = testdata("missing.pem");
        let Err(ConfigError::Read { path, .. }) = load_tls(&missing, &testdata("server.key")) else {
            panic!("expected a read error");
        };
        assert_eq!(path, missing);
    }

    #[test]
    fn key_file_without_certificate() {
        let Err(ConfigError::NoCertificate { .. }) = load_tls(&testdata("server.key"), &testdata("server.key")) else {
            panic!("expected no certificate");
        };
    }
}
