//! Authorization gate.
//!
//! Resolves the request's route, then enforces the route group's
//! [`PolicyBinding`]:
//!
//! | Binding | Caller | Outcome |
//! |---------|--------|---------|
//! | `Anonymous` | any | continue |
//! | `Policy(p)` | anonymous | 401 `AUTHENTICATION_REQUIRED` |
//! | `Policy(p)` | authenticated, `p` allows | continue |
//! | `Policy(p)` | authenticated, `p` denies | 403 `AUTHORIZATION_DENIED` |
//!
//! Requests that match no route pass through untouched so the routing
//! stage can report 404/405; no handler can run for them.

use std::sync::Arc;

use portico_authz::{AuthzError, PolicyEvaluator};
use portico_core::{BoxFuture, GatewayError};
use portico_telemetry::metrics::record_authz_decision;
use tracing::{debug, error};

use crate::context::{RequestContext, RequestState};
use crate::routing::{PolicyBinding, RouteTable};
use crate::stage::{Next, Stage, StageKind};
use crate::types::{Request, StageResult};

/// Enforces route group policies.
#[derive(Debug, Clone)]
pub struct AuthorizationStage {
    routes: Arc<RouteTable>,
    evaluator: PolicyEvaluator,
}

impl AuthorizationStage {
    /// Creates the gate over `routes` using `evaluator`.
    #[must_use]
    pub fn new(routes: Arc<RouteTable>, evaluator: PolicyEvaluator) -> Self {
        Self { routes, evaluator }
    }

    fn authorize(&self, ctx: &RequestContext, binding: &PolicyBinding, group: &str) -> Result<(), GatewayError> {
        let PolicyBinding::Policy(policy) = binding else {
            return Ok(());
        };

        if !ctx.identity().is_authenticated() {
            return Err(GatewayError::authentication_required(format!(
                "route group '{group}' requires an authenticated caller"
            )));
        }

        match self.evaluator.evaluate_identity(policy, ctx.identity()) {
            Ok(true) => {
                record_authz_decision(policy, true);
                debug!(
                    request_id = %ctx.request_id(),
                    policy = %policy,
                    route_group = group,
                    "policy allowed request"
                );
                Ok(())
            }
            Ok(false) => {
                record_authz_decision(policy, false);
                Err(GatewayError::authorization(
                    format!("caller does not satisfy policy '{policy}'"),
                    policy.clone(),
                ))
            }
            Err(AuthzError::UnknownPolicy { name }) => {
                error!(policy = %name, route_group = group, "route bound to unregistered policy");
                Err(GatewayError::unknown_policy(name))
            }
            Err(other) => Err(GatewayError::unhandled_with_source(
                "policy evaluation failed",
                other,
            )),
        }
    }
}

impl Stage for AuthorizationStage {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn kind(&self) -> StageKind {
        StageKind::Authorization
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            ctx.transition(RequestState::Authorizing);

            match self.routes.resolve(request.method(), request.uri().path()) {
                Ok(route) => {
                    self.authorize(ctx, route.binding(), route.group())?;
                    ctx.set_route(route);
                }
                Err(GatewayError::NotFound { .. } | GatewayError::MethodNotAllowed { .. }) => {}
                Err(other) => return Err(other),
            }

            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::FnHandler;
    use crate::stage::BoxedStage;
    use crate::types::{Response, ResponseExt};
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;
    use portico_authz::PolicyRegistry;
    use portico_core::{CallerIdentity, Claims};

    struct Terminal;

    impl Stage for Terminal {
        fn name(&self) -> &'static str {
            "terminal"
        }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut RequestContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, StageResult> {
            Box::pin(async { Ok(Response::with_body(StatusCode::OK, "text/plain", "ok")) })
        }
    }

    fn stages() -> Vec<BoxedStage> {
        let mut policies = PolicyRegistry::new();
        policies.register("OnlyAdmins", ["SuperAdmin", "Admin"]).unwrap();
        let evaluator = policies.build();

        let handler = || {
            FnHandler::new(|_input| async {
                Ok(Response::with_body(StatusCode::OK, "text/plain", "ok"))
            })
        };
        let mut builder = RouteTable::builder();
        builder
            .group("users", PolicyBinding::policy("OnlyAdmins"))
            .unwrap()
            .group("operations", PolicyBinding::Anonymous)
            .unwrap()
            .route("users", Method::GET, "/users", handler())
            .unwrap()
            .route("operations", Method::GET, "/health", handler())
            .unwrap();
        let routes = Arc::new(builder.build(&evaluator).unwrap());

        vec![
            Arc::new(AuthorizationStage::new(routes, evaluator)),
            Arc::new(Terminal),
        ]
    }

    async fn run(path: &str, identity: CallerIdentity) -> (StageResult, RequestContext) {
        let stages = stages();
        let mut ctx = RequestContext::new();
        ctx.transition(RequestState::Authenticating);
        ctx.set_identity(identity);
        let request = http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let result = Next::new(&stages).run(&mut ctx, request).await;
        (result, ctx)
    }

    fn caller(roles: &[&str]) -> CallerIdentity {
        CallerIdentity::Authenticated(Claims::new("u-1").with_roles(roles.iter().copied()))
    }

    #[tokio::test]
    async fn test_anonymous_on_gated_route_requires_authentication() {
        let (result, ctx) = run("/users", CallerIdentity::Anonymous).await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), "AUTHENTICATION_REQUIRED");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert!(ctx.route().is_none());
    }

    #[tokio::test]
    async fn test_wrong_role_is_forbidden() {
        let (result, _) = run("/users", caller(&["Reader"])).await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_DENIED");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_is_allowed() {
        let (result, ctx) = run("/users", caller(&["Admin"])).await;
        assert!(result.is_ok());
        assert_eq!(ctx.state(), RequestState::Authorizing);
        assert_eq!(ctx.route().unwrap().group(), "users");
    }

    #[tokio::test]
    async fn test_anonymous_group_is_open() {
        let (result, ctx) = run("/health", CallerIdentity::Anonymous).await;
        assert!(result.is_ok());
        assert_eq!(ctx.route().unwrap().group(), "operations");
    }

    #[tokio::test]
    async fn test_unmatched_path_passes_through() {
        let (result, ctx) = run("/missing", CallerIdentity::Anonymous).await;
        assert!(result.is_ok());
        assert!(ctx.route().is_none());
    }
}
