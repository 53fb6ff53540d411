//! The stage trait and the `Next` continuation.

use std::fmt;
use std::sync::Arc;

use portico_core::{BoxFuture, GatewayError};
use tracing::debug;

use crate::context::RequestContext;
use crate::types::{Request, StageResult};

/// The role a stage plays in the chain.
///
/// The four core kinds must each appear exactly once and in this relative
/// order. `Custom` stages may sit anywhere between error interception and
/// routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    /// Wraps the rest of the chain and turns failures into envelopes.
    ErrorInterception,
    /// Resolves the caller identity.
    Authentication,
    /// Gates the request on the route's policy.
    Authorization,
    /// Dispatches to the matched handler.
    Routing,
    /// Anything else (request ids, transport checks, ...).
    Custom,
}

impl StageKind {
    /// The core kinds in mandated order.
    pub const REQUIRED: [Self; 4] = [
        Self::ErrorInterception,
        Self::Authentication,
        Self::Authorization,
        Self::Routing,
    ];

    /// Returns `true` for the four core kinds.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        !matches!(self, Self::Custom)
    }

    /// Name for logs and errors.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ErrorInterception => "error-interception",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Routing => "routing",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of request processing.
///
/// A stage either calls `next.run(..)` to pass control onward, or returns
/// without calling it to short-circuit. Returning `Err` hands the failure
/// back to the enclosing stages; the error interception stage turns it into
/// an envelope.
///
/// ```ignore
/// struct Timing;
///
/// impl Stage for Timing {
///     fn name(&self) -> &'static str { "timing" }
///
///     fn process<'a>(
///         &'a self,
///         ctx: &'a mut RequestContext,
///         request: Request,
///         next: Next<'a>,
///     ) -> BoxFuture<'a, StageResult> {
///         Box::pin(async move {
///             let result = next.run(ctx, request).await;
///             tracing::debug!(elapsed_ms = ctx.elapsed().as_millis() as u64, "done");
///             result
///         })
///     }
/// }
/// ```
pub trait Stage: Send + Sync + 'static {
    /// Unique name of this stage.
    fn name(&self) -> &'static str;

    /// The role this stage plays.
    fn kind(&self) -> StageKind {
        StageKind::Custom
    }

    /// Processes the request.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult>;
}

/// Shared handle to a stage.
pub type BoxedStage = Arc<dyn Stage>;

/// The remainder of the chain after the current stage.
///
/// Consumed by [`run`](Self::run), so it can be invoked at most once.
pub struct Next<'a> {
    remaining: &'a [BoxedStage],
}

impl<'a> Next<'a> {
    pub(crate) const fn new(remaining: &'a [BoxedStage]) -> Self {
        Self { remaining }
    }

    /// Number of stages still to run.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Runs the next stage.
    ///
    /// Running past the last stage yields a not-found error, since no stage
    /// produced a response.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> StageResult {
        match self.remaining.split_first() {
            Some((stage, rest)) => {
                ctx.enter_stage(stage.name());
                debug!(
                    request_id = %ctx.request_id(),
                    stage = stage.name(),
                    kind = %stage.kind(),
                    "entering stage"
                );
                stage.process(ctx, request, Next::new(rest)).await
            }
            None => Err(GatewayError::not_found(format!(
                "no route for {} {}",
                request.method(),
                request.uri().path()
            ))),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field(
                "remaining",
                &self.remaining.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
