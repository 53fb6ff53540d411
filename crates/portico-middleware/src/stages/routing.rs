//! Routing stage: the terminal stage that dispatches to handlers.

use std::sync::Arc;

use portico_core::{BoxFuture, GatewayError};
use tracing::{debug, error};

use crate::context::{RequestContext, RequestState};
use crate::routing::{HandlerRequest, RouteTable};
use crate::stage::{Next, Stage, StageKind};
use crate::types::{Request, StageResult};

/// Dispatches to the route admitted by the authorization stage.
///
/// Never dispatches a route the authorization stage did not record. A
/// request without a recorded route yields 404 or 405, or an internal
/// error if a stage between the two rewrote it onto a real route.
#[derive(Debug, Clone)]
pub struct RoutingStage {
    routes: Arc<RouteTable>,
}

impl RoutingStage {
    /// Creates the stage over `routes`.
    #[must_use]
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }
}

impl Stage for RoutingStage {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn kind(&self) -> StageKind {
        StageKind::Routing
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        _next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let Some(route) = ctx.route().cloned() else {
                // Only the authorization stage may admit a route. Anything
                // still unmatched here ends as 404/405.
                let route = self.routes.resolve(request.method(), request.uri().path())?;
                error!(
                    request_id = %ctx.request_id(),
                    method = %request.method(),
                    pattern = route.pattern(),
                    route_group = route.group(),
                    "route matched after the authorization gate; refusing to dispatch"
                );
                return Err(GatewayError::unhandled(format!(
                    "route {} {} was not authorized",
                    request.method(),
                    route.pattern()
                )));
            };

            ctx.transition(RequestState::Routed);
            debug!(
                request_id = %ctx.request_id(),
                pattern = route.pattern(),
                route_group = route.group(),
                "dispatching to handler"
            );

            let input = HandlerRequest {
                request,
                params: route.params().clone(),
                identity: ctx.identity().clone(),
                request_id: ctx.request_id(),
            };
            route.handler().call(input).await
        })
    }
}
