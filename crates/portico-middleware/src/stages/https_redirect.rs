//! Encrypted transport enforcement.
//!
//! Requests that did not arrive over HTTPS are answered with
//! `308 Permanent Redirect` to the same path on `https://`. The scheme is
//! taken from the request URI, or from `x-forwarded-proto` when the gateway
//! sits behind a TLS-terminating proxy.

use http::header::{HeaderValue, HOST, LOCATION};
use http::StatusCode;
use portico_core::{BoxFuture, GatewayError};
use tracing::debug;

use crate::context::{RequestContext, RequestState};
use crate::stage::{Next, Stage};
use crate::types::{Request, Response, ResponseExt, StageResult};

/// Header set by proxies to the original request scheme.
pub const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// Redirects plain HTTP requests to HTTPS.
#[derive(Debug, Clone, Default)]
pub struct HttpsRedirectStage {
    https_port: Option<u16>,
}

impl HttpsRedirectStage {
    /// Creates the stage redirecting to the default HTTPS port.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirects to `port` instead of 443.
    #[must_use]
    pub fn with_https_port(mut self, port: u16) -> Self {
        self.https_port = Some(port);
        self
    }

    fn is_secure(request: &Request) -> bool {
        if request.uri().scheme_str() == Some("https") {
            return true;
        }
        request
            .headers()
            .get(FORWARDED_PROTO_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
    }

    fn location(&self, request: &Request) -> Result<String, GatewayError> {
        let authority = request
            .uri()
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                request
                    .headers()
                    .get(HOST)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            })
            .ok_or_else(|| GatewayError::bad_request("cannot redirect to https without a host"))?;

        let host = match authority.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
            _ => authority,
        };
        let host = match self.https_port {
            Some(port) if port != 443 => format!("{host}:{port}"),
            _ => host,
        };

        let path_and_query = request
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        Ok(format!("https://{host}{path_and_query}"))
    }
}

impl Stage for HttpsRedirectStage {
    fn name(&self) -> &'static str {
        "https-redirect"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            if Self::is_secure(&request) {
                return next.run(ctx, request).await;
            }

            let location = self.location(&request)?;
            let value = HeaderValue::from_str(&location)
                .map_err(|_| GatewayError::bad_request("request host is not a valid header value"))?;

            debug!(request_id = %ctx.request_id(), location = %location, "redirecting to https");
            ctx.transition(RequestState::Rejected);

            let mut response = Response::with_body(StatusCode::PERMANENT_REDIRECT, "text/plain", "");
            response.headers_mut().insert(LOCATION, value);
            Ok(response)
        })
    }
}
