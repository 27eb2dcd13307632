//! The application contract.
//!
//! A [`Handler`] turns one fully assembled [`Request`] into a [`Response`]. It is
//! never called on a connection task: the [`Dispatcher`] runs it on the worker
//! pool and hands the response back. Any error, or a panic, is answered with the
//! fixed `500` response.

mod dispatch;

pub use dispatch::DEFAULT_WORKER_PERMITS;
pub use dispatch::Dispatcher;

use async_trait::async_trait;

use crate::protocol::{BoxError, Request, Response};

/// Error type a handler fails with.
pub type HandlerError = BoxError;

#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, req: Request) -> Result<Response, HandlerError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<Err, F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Err: Into<HandlerError>,
    Fut: Future<Output = Result<Response, Err>> + Send,
{
    async fn call(&self, req: Request) -> Result<Response, HandlerError> {
        (self.f)(req).await.map_err(Into::into)
    }
}

/// Wraps an async function into a [`Handler`].
pub fn make_handler<F, Err, Fut>(f: F) -> HandlerFn<F>
where
    Err: Into<HandlerError>,
    Fut: Future<Output = Result<Response, Err>>,
    F: Fn(Request) -> Fut,
{
    HandlerFn { f }
}
