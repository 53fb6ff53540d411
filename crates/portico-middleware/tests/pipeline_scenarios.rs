//! End-to-end behaviour of a fully assembled stage chain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use portico_authz::PolicyRegistry;
use portico_core::{BoxFuture, Claims, GatewayError};
use portico_middleware::routing::{FnHandler, HandlerRequest, PolicyBinding, RouteTable};
use portico_middleware::stages::{
    AuthenticationStage, AuthorizationStage, ErrorInterceptionStage, RequestIdStage, RoutingStage,
    StaticTokenValidator, REQUEST_ID_HEADER,
};
use portico_middleware::{
    BoxedStage, Next, Request, RequestContext, RequestState, Response, ResponseExt, Stage,
    StageChain, StageResult,
};

struct Fixture {
    chain: StageChain,
    user_calls: Arc<AtomicUsize>,
}

fn fixture() -> Fixture {
    fixture_with(None)
}

/// Builds the chain, optionally with `late` between authorization and routing.
fn fixture_with(late: Option<BoxedStage>) -> Fixture {
    let mut policies = PolicyRegistry::new();
    policies.register("OnlyAdmins", ["SuperAdmin", "Admin"]).unwrap();
    let evaluator = policies.build();

    let user_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&user_calls);

    let mut routes = RouteTable::builder();
    routes
        .group("users", PolicyBinding::policy("OnlyAdmins"))
        .unwrap()
        .group("operations", PolicyBinding::Anonymous)
        .unwrap()
        .route(
            "users",
            Method::GET,
            "/users/{id}",
            FnHandler::new(move |input: HandlerRequest| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let id = input.params.get("id").cloned().unwrap_or_default();
                    Ok(Response::json(StatusCode::OK, &serde_json::json!({ "id": id })))
                }
            }),
        )
        .unwrap()
        .route(
            "operations",
            Method::GET,
            "/health",
            FnHandler::new(|_| async {
                Ok(Response::with_body(StatusCode::OK, "text/plain", "Healthy"))
            }),
        )
        .unwrap()
        .route(
            "operations",
            Method::GET,
            "/explode",
            FnHandler::new(|_| async { Err(GatewayError::unhandled("database password rejected")) }),
        )
        .unwrap();
    let routes = Arc::new(routes.build(&evaluator).unwrap());

    let validator = StaticTokenValidator::new()
        .with_token("admin-token", Claims::new("alice").with_role("Admin"))
        .with_token("reader-token", Claims::new("bob").with_role("Reader"));

    let mut stages: Vec<BoxedStage> = vec![
        Arc::new(ErrorInterceptionStage::new()),
        Arc::new(RequestIdStage::new()),
        Arc::new(AuthenticationStage::new(validator)),
        Arc::new(AuthorizationStage::new(Arc::clone(&routes), evaluator)),
    ];
    stages.extend(late);
    stages.push(Arc::new(RoutingStage::new(routes)));

    Fixture {
        chain: StageChain::build(stages).unwrap(),
        user_calls,
    }
}

/// Strips a `/v1` prefix, as a versioning shim would.
struct StripVersionPrefix;

impl Stage for StripVersionPrefix {
    fn name(&self) -> &'static str {
        "strip-version"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            if let Some(rest) = parts.uri.path().strip_prefix("/v1") {
                parts.uri = rest.parse().unwrap();
            }
            next.run(ctx, Request::from_parts(parts, body)).await
        })
    }
}

fn request(method: Method, path: &str, token: Option<&str>) -> Request {
    let mut builder = http::Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_anonymous_caller_is_challenged_before_the_handler_runs() {
    let fx = fixture();
    let mut ctx = RequestContext::new();

    let response = fx
        .chain
        .process(&mut ctx, request(Method::GET, "/users/1", None))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    assert_eq!(json_body(response).await["error"]["code"], "AUTHENTICATION_REQUIRED");
    assert_eq!(fx.user_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.current_stage(), Some("authorization"));
    assert_eq!(ctx.state(), RequestState::Rejected);
}

#[tokio::test]
async fn test_admin_reaches_the_handler() {
    let fx = fixture();
    let mut ctx = RequestContext::new();

    let response = fx
        .chain
        .process(&mut ctx, request(Method::GET, "/users/42", Some("admin-token")))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["id"], "42");
    assert_eq!(fx.user_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.state(), RequestState::Handled);
    assert!(ctx.identity().has_role("Admin"));
}

#[tokio::test]
async fn test_caller_without_required_role_is_forbidden() {
    let fx = fixture();
    let response = fx
        .chain
        .handle(request(Method::GET, "/users/42", Some("reader-token")))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "AUTHORIZATION_DENIED");
    assert_eq!(fx.user_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_token_is_rejected_at_authentication() {
    let fx = fixture();
    let mut ctx = RequestContext::new();

    let response = fx
        .chain
        .process(&mut ctx, request(Method::GET, "/health", Some("forged")))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "INVALID_CREDENTIALS");
    assert_eq!(ctx.current_stage(), Some("authentication"));
}

#[tokio::test]
async fn test_anonymous_group_needs_no_credentials() {
    let fx = fixture();
    let response = fx.chain.handle(request(Method::GET, "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unmatched_requests_get_not_found_or_method_not_allowed() {
    let fx = fixture();

    let missing = fx.chain.handle(request(Method::GET, "/nowhere", None)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(missing).await["error"]["code"], "NOT_FOUND");

    let wrong_method = fx.chain.handle(request(Method::POST, "/health", None)).await;
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_handler_faults_are_masked_in_production_envelopes() {
    let fx = fixture();
    let mut ctx = RequestContext::new();

    let response = fx
        .chain
        .process(&mut ctx, request(Method::GET, "/explode", None))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"]["message"], "An internal error occurred");
    assert!(body["error"]["detail"].is_null());
    assert!(!body.to_string().contains("password"));
    assert_eq!(ctx.state(), RequestState::Errored);
}

#[tokio::test]
async fn test_route_rewritten_after_authorization_is_not_dispatched() {
    let fx = fixture_with(Some(Arc::new(StripVersionPrefix)));
    let mut ctx = RequestContext::new();

    let response = fx
        .chain
        .process(&mut ctx, request(Method::GET, "/v1/users/1", None))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(fx.user_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.state(), RequestState::Errored);
}

#[tokio::test]
async fn test_rewrite_of_unknown_path_still_not_found() {
    let fx = fixture_with(Some(Arc::new(StripVersionPrefix)));
    let response = fx.chain.handle(request(Method::GET, "/v1/nowhere", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
