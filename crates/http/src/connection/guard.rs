//! Body-size policy of one connection.
//!
//! The guard is consulted twice per request: once with the length a head
//! declares, before a single body byte is read, and once per body chunk to keep
//! a lifetime total across every request (or stream) of the connection.
//!
//! Read backpressure is not a buffer here. The transports only pull the next
//! frame once the previous one has been handed to the assembler: HTTP/1.1 stops
//! reading entirely while a request is with the handler, and HTTP/2 returns
//! flow-control capacity to the peer only after a chunk has been accepted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;

/// The largest request body a connection accepts: 10 MiB.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ConnectionGuard {
    max_body_size: u64,
    received: Arc<AtomicU64>,
}

impl ConnectionGuard {
    pub fn new(max_body_size: u64) -> Self {
        Self { max_body_size, received: Arc::new(AtomicU64::new(0)) }
    }

    pub fn max_body_size(&self) -> u64 {
        self.max_body_size
    }

    /// Body bytes received over the lifetime of the connection.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Checks the length declared by a freshly parsed head.
    pub fn admit_head(&self, declared: u64) -> Result<(), ParseError> {
        ensure!(declared <= self.max_body_size, ParseError::TooLargeBody { declared, max_size: self.max_body_size });
        Ok(())
    }

    /// Counts `len` more body bytes against the connection lifetime ceiling.
    pub fn admit_chunk(&self, len: u64) -> Result<(), ParseError> {
        let received = self.received.fetch_add(len, Ordering::Relaxed).saturating_add(len);
        trace!(len, received, "admitted body chunk");
        ensure!(received <= self.max_body_size, ParseError::ConnectionLimit { received, max_size: self.max_body_size });
        Ok(())
    }
}

impl Default for ConnectionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_length_over_limit_is_rejected() {
        let guard = ConnectionGuard::default();
        assert!(guard.admit_head(DEFAULT_MAX_BODY_SIZE).is_ok());

        let err = guard.admit_head(11_000_000).unwrap_err();
        assert!(matches!(err, ParseError::TooLargeBody { declared: 11_000_000, .. }));
        assert!(err.is_size_limit());
    }

    #[test]
    fn lifetime_total_is_shared_between_clones() {
        let guard = ConnectionGuard::new(10);
        let stream_guard = guard.clone();

        guard.admit_chunk(6).unwrap();
        assert_eq!(stream_guard.received(), 6);

        let err = stream_guard.admit_chunk(5).unwrap_err();
        assert!(matches!(err, ParseError::ConnectionLimit { received: 11, max_size: 10 }));
    }
}
