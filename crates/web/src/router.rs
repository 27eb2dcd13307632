//! Path and method routing on top of the [`Handler`] contract.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use http::Method;
use teapot_http::handler::{Handler, HandlerError};
use teapot_http::protocol::{Request, Response};
use tracing::debug;

use crate::model;

type InnerRouter<T> = matchit::Router<T>;

/// Routes a request to the handler registered for its path and method.
///
/// A request nothing is registered for is answered with the JSON `404`.
#[derive(Debug)]
pub struct Router {
    inner_router: InnerRouter<Vec<RouterItem>>,
}

/// A handler bound to one method.
pub struct RouterItem {
    method: Method,
    handler: Box<dyn Handler>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Every item registered for `path`, empty when no route matches.
    pub fn at(&self, path: &str) -> &[RouterItem] {
        self.inner_router.at(path).map(|matched| matched.value.as_slice()).unwrap_or_default()
    }
}

impl fmt::Debug for RouterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItem").field("method", &self.method).finish_non_exhaustive()
    }
}

impl RouterItem {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

#[async_trait]
impl Handler for Router {
    async fn call(&self, req: Request) -> Result<Response, HandlerError> {
        let item = self.at(req.uri().path()).iter().find(|item| item.method == req.method());
        match item {
            Some(item) => item.handler.call(req).await,
            None => {
                debug!(method = %req.method(), path = req.uri().path(), "no route");
                Ok(model::not_found())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RouterBuilder {
    data: HashMap<String, Vec<RouterItem>>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: impl Into<String>, item: RouterItem) -> Self {
        self.data.entry(route.into()).or_default().push(item);
        self
    }

    /// Builds the router from the accumulated routes.
    ///
    /// # Errors
    ///
    /// Returns error if two routes conflict or a route is malformed
    pub fn build(self) -> Result<Router, matchit::InsertError> {
        let mut inner_router = InnerRouter::new();
        for (path, items) in self.data {
            inner_router.insert(path, items)?;
        }
        Ok(Router { inner_router })
    }
}

macro_rules! method_router {
    ($name:ident, $method:expr) => {
        pub fn $name<H: Handler>(handler: H) -> RouterItem {
            RouterItem { method: $method, handler: Box::new(handler) }
        }
    };
}

method_router!(get, Method::GET);
method_router!(post, Method::POST);
