//! Request ID propagation.
//!
//! Adopts a well-formed `x-request-id` from the caller, or keeps the
//! freshly generated one, and echoes it on the response.

use http::header::HeaderValue;
use portico_core::{BoxFuture, RequestId};
use tracing::debug;

use crate::context::RequestContext;
use crate::stage::{Next, Stage};
use crate::types::{Request, StageResult};

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reads and echoes the request ID header.
#[derive(Debug, Clone)]
pub struct RequestIdStage {
    trust_incoming: bool,
}

impl Default for RequestIdStage {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdStage {
    /// Creates the stage, adopting incoming IDs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    /// Sets whether caller-supplied IDs are adopted.
    #[must_use]
    pub fn trust_incoming(mut self, trust: bool) -> Self {
        self.trust_incoming = trust;
        self
    }

    fn incoming(request: &Request) -> Option<RequestId> {
        request
            .headers()
            .get(REQUEST_ID_HEADER)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }
}

impl Stage for RequestIdStage {
    fn name(&self) -> &'static str {
        "request-id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            if self.trust_incoming {
                if let Some(id) = Self::incoming(&request) {
                    debug!(request_id = %id, "adopted incoming request id");
                    ctx.set_request_id(id);
                }
            }

            let mut response = next.run(ctx, request).await?;
            if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}
