use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::instrument::WithSubscriber;
use tracing::{Instrument, debug, error};

use crate::handler::Handler;
use crate::protocol::{ErrorCategory, Request, Response, internal_server_error};

/// Default number of handler calls allowed to run at once, per available core.
pub const DEFAULT_WORKER_PERMITS: usize = 4;

/// Hands requests to the worker pool and their responses back.
///
/// Each call runs in its own task, so a slow or blocking handler never stalls
/// the connection that is waiting for it. The permits bound how many handler
/// calls run at once; a connection whose request is waiting for a permit reads
/// nothing further, which propagates the backpressure to the client.
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn Handler>,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn Handler>, permits: usize) -> Self {
        Self { handler, permits: Arc::new(Semaphore::new(permits.max(1))) }
    }

    /// Runs the handler for `request`. Never fails: handler errors and panics
    /// become the fixed internal server error response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            error!(category = %ErrorCategory::Handler, "worker pool is closed");
            return internal_server_error();
        };

        let handler = Arc::clone(&self.handler);
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        debug!(%method, %path, "dispatching request");

        let task = tokio::spawn(
            async move {
                let _permit = permit;
                handler.call(request).await
            }
            .in_current_span()
            .with_current_subscriber(),
        );

        match task.await {
            Ok(Ok(response)) => {
                debug!(%method, %path, status = response.status().as_u16(), "handler responded");
                response
            }
            Ok(Err(e)) => {
                error!(category = %ErrorCategory::Handler, %method, %path, cause = %e, "handler failed");
                internal_server_error()
            }
            Err(e) => {
                error!(category = %ErrorCategory::Handler, %method, %path, cause = %e, "handler task failed");
                internal_server_error()
            }
        }
    }
}
