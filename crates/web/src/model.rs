//! JSON shapes of the api.

use bytes::Bytes;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use teapot_http::protocol::{Response, ResponseBody};

/// Body of the `404` answered for unrouted requests.
pub const NOT_FOUND_BODY: &str = r#"{"status": false, "code": 404, "msg": "Not Found"}"#;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { status: true, data }
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub database: &'static str,
    pub server: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    pub msg: String,
}

/// A `200` whose JSON body is serialized by the response writer.
pub fn json<T: Serialize + Send + 'static>(value: T) -> Response {
    Response::new(ResponseBody::deferred(mime::APPLICATION_JSON, move || serde_json::to_vec(&value).map(Bytes::from)))
}

pub fn not_found() -> Response {
    let mut response =
        Response::new(ResponseBody::once(Bytes::from_static(NOT_FOUND_BODY.as_bytes()), Some(mime::APPLICATION_JSON)));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
