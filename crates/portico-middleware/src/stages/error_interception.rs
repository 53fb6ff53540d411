//! Error interception stage.
//!
//! The outermost stage. It wraps the rest of the chain and converts any
//! failure escaping it, whether an `Err` or a panic, into the uniform
//! error envelope:
//!
//! ```json
//! { "error": { "code": "INTERNAL_ERROR", "message": "An internal error occurred", "detail": null } }
//! ```
//!
//! Server-side faults are logged at `error` with full detail regardless of
//! what the client is shown. Detail reaches the client only when
//! [`expose_internal_errors`](ErrorInterceptionStage::expose_internal_errors)
//! is enabled, which is meant for development.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::header::HeaderValue;
use portico_core::{BoxFuture, GatewayError};
use tracing::{error, warn};

use crate::context::{RequestContext, RequestState};
use crate::stage::{Next, Stage, StageKind};
use crate::stages::request_id::REQUEST_ID_HEADER;
use crate::types::{Request, Response, ResponseExt, StageResult};

/// Converts downstream failures into envelopes.
#[derive(Debug, Clone, Default)]
pub struct ErrorInterceptionStage {
    expose_internal_errors: bool,
}

impl ErrorInterceptionStage {
    /// Creates the stage with detail exposure off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether envelopes carry internal detail.
    #[must_use]
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    fn render(&self, ctx: &mut RequestContext, error: &GatewayError) -> Response {
        let stage = ctx.current_stage().unwrap_or("-");
        if error.category().is_client_error() {
            warn!(
                request_id = %ctx.request_id(),
                caller = %ctx.identity().log_id(),
                stage,
                code = error.code(),
                status = error.status_code().as_u16(),
                error = %error,
                "request rejected"
            );
            ctx.transition(RequestState::Rejected);
        } else {
            error!(
                request_id = %ctx.request_id(),
                caller = %ctx.identity().log_id(),
                stage,
                code = error.code(),
                status = error.status_code().as_u16(),
                error = ?error,
                "request failed"
            );
            ctx.transition(RequestState::Errored);
        }

        let mut response = Response::envelope(error, self.expose_internal_errors);
        if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

impl Stage for ErrorInterceptionStage {
    fn name(&self) -> &'static str {
        "error-interception"
    }

    fn kind(&self) -> StageKind {
        StageKind::ErrorInterception
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(next.run(ctx, request))
                .catch_unwind()
                .await;

            let error = match outcome {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(error)) => error,
                Err(payload) => GatewayError::unhandled(format!(
                    "panic in stage '{}': {}",
                    ctx.current_stage().unwrap_or("-"),
                    panic_message(payload.as_ref())
                )),
            };

            Ok(self.render(ctx, &error))
        })
    }
}
