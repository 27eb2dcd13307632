//! The demo api served on the TLS port.

use teapot_http::handler::{HandlerError, make_handler};
use teapot_http::protocol::{Request, Response};

use crate::model::{ApiResponse, Health, ReverseRequest, json};
use crate::router::{Router, get, post};

/// Builds the api router.
///
/// # Errors
///
/// Returns error if the route table conflicts
pub fn router() -> Result<Router, matchit::InsertError> {
    Router::builder()
        .route("/", get(make_handler(index)))
        .route("/health", get(make_handler(health)))
        .route("/reverse", post(make_handler(reverse)))
        .build()
}

async fn index(_req: Request) -> Result<Response, HandlerError> {
    Ok(json(ApiResponse::ok("ok")))
}

async fn health(_req: Request) -> Result<Response, HandlerError> {
    let health = Health { database: "", server: "teapot", version: env!("CARGO_PKG_VERSION") };
    Ok(json(ApiResponse::ok(health)))
}

async fn reverse(req: Request) -> Result<Response, HandlerError> {
    let ReverseRequest { msg } = serde_json::from_slice(req.body())?;
    Ok(json(ApiResponse::ok(msg.chars().rev().collect::<String>())))
}
