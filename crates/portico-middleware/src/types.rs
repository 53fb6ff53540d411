//! HTTP types used throughout the stage chain.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use portico_core::GatewayError;
use serde::Serialize;

/// The HTTP request type flowing through the chain.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by the chain.
pub type Response = http::Response<Full<Bytes>>;

/// Outcome of a stage or handler.
pub type StageResult = Result<Response, GatewayError>;

/// Response constructors.
pub trait ResponseExt {
    /// A response with `body` and `content_type`.
    fn with_body(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response;

    /// A JSON response; serialization failures become a 500 envelope.
    fn json<T: Serialize>(status: StatusCode, body: &T) -> Response;

    /// The error envelope for `error`.
    fn envelope(error: &GatewayError, expose_detail: bool) -> Response;
}

impl ResponseExt for Response {
    fn with_body(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response {
        let mut response = http::Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response
    }

    fn json<T: Serialize>(status: StatusCode, body: &T) -> Response {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self::with_body(status, "application/json", bytes),
            Err(err) => Self::envelope(
                &GatewayError::unhandled_with_source("failed to serialize response body", err),
                false,
            ),
        }
    }

    fn envelope(error: &GatewayError, expose_detail: bool) -> Response {
        Self::with_body(
            error.status_code(),
            "application/json",
            error.to_envelope(expose_detail).to_json(),
        )
    }
}
