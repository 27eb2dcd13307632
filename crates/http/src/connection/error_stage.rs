use tracing::{debug, error, warn};

use crate::protocol::{ErrorCategory, HttpError};

/// Reports a failure that ended a connection.
///
/// Nothing is written back: by the time an error reaches this point the
/// connection state is not trusted, and the caller drops the socket right after.
pub fn report(e: &HttpError) -> ErrorCategory {
    let category = e.category();
    match category {
        ErrorCategory::Negotiation | ErrorCategory::ProtocolViolation => {
            warn!(%category, cause = %e, "closing connection");
        }
        ErrorCategory::WriteAfterClose => {
            debug!(%category, cause = %e, "peer closed before the response was written");
        }
        ErrorCategory::Handler | ErrorCategory::Serialization | ErrorCategory::Io => {
            error!(%category, cause = %e, "closing connection");
        }
    }
    category
}
