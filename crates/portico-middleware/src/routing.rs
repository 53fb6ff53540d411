//! Route table: path matching, route groups and their policy bindings.
//!
//! Every route belongs to a named group, and every group is declared with
//! an explicit [`PolicyBinding`]: either a named policy or
//! [`PolicyBinding::Anonymous`]. Routes cannot reference undeclared groups,
//! so the table is complete by construction; [`RouteTableBuilder::build`]
//! additionally checks each bound policy against the evaluator.
//!
//! ```
//! use portico_authz::PolicyRegistry;
//! use portico_middleware::routing::{FnHandler, PolicyBinding, RouteTable};
//! use portico_middleware::{Response, ResponseExt};
//! use http::{Method, StatusCode};
//!
//! let mut policies = PolicyRegistry::new();
//! policies.register("OnlyAdmins", ["Admin"]).unwrap();
//! let evaluator = policies.build();
//!
//! let mut builder = RouteTable::builder();
//! builder
//!     .group("users", PolicyBinding::policy("OnlyAdmins")).unwrap()
//!     .route("users", Method::GET, "/users/{id}", FnHandler::new(|input| async move {
//!         let id = input.params.get("id").cloned().unwrap_or_default();
//!         Ok(Response::with_body(StatusCode::OK, "text/plain", id))
//!     })).unwrap();
//! let table = builder.build(&evaluator).unwrap();
//!
//! let matched = table.resolve(&Method::GET, "/users/42").unwrap();
//! assert_eq!(matched.group(), "users");
//! assert_eq!(matched.param("id"), Some("42"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::Method;
use portico_authz::PolicyEvaluator;
use portico_core::{BoxFuture, CallerIdentity, GatewayError, RequestId};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::types::{Request, StageResult};

/// How a route group is authorized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyBinding {
    /// Callers need not be authenticated.
    Anonymous,
    /// Callers must be authenticated and satisfy the named policy.
    Policy(String),
}

impl PolicyBinding {
    /// Binds to a named policy.
    #[must_use]
    pub fn policy(name: impl Into<String>) -> Self {
        Self::Policy(name.into())
    }

    /// The bound policy name, if any.
    #[must_use]
    pub fn policy_name(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Policy(name) => Some(name),
        }
    }
}

impl fmt::Display for PolicyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Policy(name) => write!(f, "policy:{name}"),
        }
    }
}

/// Everything a handler receives.
#[derive(Debug)]
pub struct HandlerRequest {
    /// The request.
    pub request: Request,
    /// Path parameters extracted from the route pattern.
    pub params: HashMap<String, String>,
    /// The caller, as resolved by the authentication stage.
    pub identity: CallerIdentity,
    /// Request ID.
    pub request_id: RequestId,
}

/// A domain endpoint.
pub trait Handler: Send + Sync + 'static {
    /// Handles a routed request.
    fn call(&self, input: HandlerRequest) -> BoxFuture<'_, StageResult>;
}

/// A handler backed by an async closure.
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(HandlerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    /// Wraps `func`.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(HandlerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    fn call(&self, input: HandlerRequest) -> BoxFuture<'_, StageResult> {
        Box::pin((self.func)(input))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

fn parse_pattern(pattern: &str) -> Result<Vec<PathSegment>, PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if !pattern.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if let Some(name) = segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            {
                if name.is_empty() {
                    return Err(invalid("empty parameter name"));
                }
                Ok(PathSegment::Param(name.to_string()))
            } else if segment.contains('{') || segment.contains('}') {
                Err(invalid("parameters must span a whole segment"))
            } else {
                Ok(PathSegment::Literal(segment.to_string()))
            }
        })
        .collect()
}

fn match_segments(segments: &[PathSegment], path: &str) -> Option<HashMap<String, String>> {
    let actual: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if actual.len() != segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pattern, value) in segments.iter().zip(actual) {
        match pattern {
            PathSegment::Literal(expected) if expected == value => {}
            PathSegment::Literal(_) => return None,
            PathSegment::Param(name) => {
                params.insert(name.clone(), value.to_string());
            }
        }
    }
    Some(params)
}

/// Two patterns overlap when they agree on every literal and place
/// parameters in the same positions, whatever the parameter names.
fn same_shape(a: &[PathSegment], b: &[PathSegment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (PathSegment::Literal(x), PathSegment::Literal(y)) => x == y,
            (PathSegment::Param(_), PathSegment::Param(_)) => true,
            _ => false,
        })
}

struct Route {
    method: Method,
    pattern: String,
    segments: Vec<PathSegment>,
    group: String,
    handler: Arc<dyn Handler>,
}

/// A resolved route.
#[derive(Clone)]
pub struct RouteMatch {
    pattern: String,
    group: String,
    binding: PolicyBinding,
    params: HashMap<String, String>,
    handler: Arc<dyn Handler>,
}

impl RouteMatch {
    /// The route's path pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The route group.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The group's policy binding.
    #[must_use]
    pub const fn binding(&self) -> &PolicyBinding {
        &self.binding
    }

    /// Extracted path parameters.
    #[must_use]
    pub const fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// A single path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The handler.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("group", &self.group)
            .field("binding", &self.binding)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Immutable table of routes and route groups.
pub struct RouteTable {
    routes: Vec<Route>,
    groups: BTreeMap<String, PolicyBinding>,
}

impl RouteTable {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Resolves `method` and `path` to a route.
    ///
    /// Fails with not-found when no pattern matches the path, and with
    /// method-not-allowed when a pattern matches but only for other methods.
    /// A route whose group has no binding is never served.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch, GatewayError> {
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = match_segments(&route.segments, path) else {
                continue;
            };
            if route.method != *method {
                path_matched = true;
                continue;
            }

            let binding = self.groups.get(&route.group).cloned().ok_or_else(|| {
                GatewayError::unhandled(format!(
                    "route {method} {} belongs to undeclared group '{}'",
                    route.pattern, route.group
                ))
            })?;
            return Ok(RouteMatch {
                pattern: route.pattern.clone(),
                group: route.group.clone(),
                binding,
                params,
                handler: Arc::clone(&route.handler),
            });
        }

        if path_matched {
            Err(GatewayError::method_not_allowed(method.as_str(), path))
        } else {
            Err(GatewayError::not_found(format!("no route for {method} {path}")))
        }
    }

    /// Policy binding of `group`.
    #[must_use]
    pub fn binding(&self, group: &str) -> Option<&PolicyBinding> {
        self.groups.get(group)
    }

    /// Declared groups and their bindings, sorted by name.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &PolicyBinding)> {
        self.groups.iter().map(|(name, binding)| (name.as_str(), binding))
    }

    /// Number of routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes.len())
            .field("groups", &self.groups)
            .finish()
    }
}

/// Collects route groups and routes during startup.
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
    groups: BTreeMap<String, PolicyBinding>,
}

impl RouteTableBuilder {
    /// Declares a route group and its binding.
    pub fn group(
        &mut self,
        name: impl Into<String>,
        binding: PolicyBinding,
    ) -> Result<&mut Self, PipelineError> {
        let name = name.into();
        if self.groups.contains_key(&name) {
            return Err(PipelineError::DuplicateRouteGroup { group: name });
        }
        self.groups.insert(name, binding);
        Ok(self)
    }

    /// Adds a route to a declared group.
    pub fn route(
        &mut self,
        group: &str,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<&mut Self, PipelineError> {
        self.route_arc(group, method, pattern, Arc::new(handler))
    }

    /// Like [`route`](Self::route) for an already shared handler.
    pub fn route_arc(
        &mut self,
        group: &str,
        method: Method,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, PipelineError> {
        if !self.groups.contains_key(group) {
            return Err(PipelineError::UndeclaredRouteGroup {
                method: method.to_string(),
                path: pattern.to_string(),
                group: group.to_string(),
            });
        }

        let segments = parse_pattern(pattern)?;
        if self
            .routes
            .iter()
            .any(|route| route.method == method && same_shape(&route.segments, &segments))
        {
            return Err(PipelineError::DuplicateRoute {
                method: method.to_string(),
                path: pattern.to_string(),
            });
        }

        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments,
            group: group.to_string(),
            handler,
        });
        Ok(self)
    }

    /// Checks every policy binding against `evaluator` and freezes the table.
    pub fn build(self, evaluator: &PolicyEvaluator) -> Result<RouteTable, PipelineError> {
        for (group, binding) in &self.groups {
            if let PolicyBinding::Policy(policy) = binding {
                if !evaluator.contains(policy) {
                    return Err(PipelineError::UnknownPolicy {
                        group: group.clone(),
                        policy: policy.clone(),
                    });
                }
            }
            if !self.routes.iter().any(|route| &route.group == group) {
                warn!(route_group = %group, "route group has no routes");
            }
            info!(route_group = %group, binding = %binding, "route group bound");
        }

        Ok(RouteTable {
            routes: self.routes,
            groups: self.groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Response, ResponseExt};
    use http::StatusCode;
    use portico_authz::PolicyRegistry;

    fn ok_handler() -> impl Handler {
        FnHandler::new(|_input| async {
            Ok(Response::with_body(StatusCode::OK, "text/plain", "ok"))
        })
    }

    fn evaluator() -> PolicyEvaluator {
        let mut registry = PolicyRegistry::new();
        registry.register("OnlyAdmins", ["SuperAdmin", "Admin"]).unwrap();
        registry.build()
    }

    fn table() -> RouteTable {
        let mut builder = RouteTable::builder();
        builder
            .group("users", PolicyBinding::policy("OnlyAdmins"))
            .unwrap()
            .group("public", PolicyBinding::Anonymous)
            .unwrap()
            .route("users", Method::GET, "/users", ok_handler())
            .unwrap()
            .route("users", Method::GET, "/users/{userId}", ok_handler())
            .unwrap()
            .route("users", Method::DELETE, "/users/{userId}", ok_handler())
            .unwrap()
            .route("public", Method::GET, "/status", ok_handler())
            .unwrap();
        builder.build(&evaluator()).unwrap()
    }

    #[test]
    fn test_resolve_with_params() {
        let matched = table().resolve(&Method::GET, "/users/42").unwrap();
        assert_eq!(matched.pattern(), "/users/{userId}");
        assert_eq!(matched.group(), "users");
        assert_eq!(matched.binding(), &PolicyBinding::policy("OnlyAdmins"));
        assert_eq!(matched.param("userId"), Some("42"));
    }

    #[test]
    fn test_resolve_trailing_slash() {
        let matched = table().resolve(&Method::GET, "/status/").unwrap();
        assert_eq!(matched.binding(), &PolicyBinding::Anonymous);
    }

    #[test]
    fn test_not_found_and_method_not_allowed() {
        let table = table();
        let err = table.resolve(&Method::GET, "/nope").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = table.resolve(&Method::POST, "/users/42").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_undeclared_group_rejected() {
        let mut builder = RouteTable::builder();
        let err = builder
            .route("ghost", Method::GET, "/ghost", ok_handler())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::UndeclaredRouteGroup { .. }));
    }

    #[test]
    fn test_duplicate_group_and_route_rejected() {
        let mut builder = RouteTable::builder();
        builder.group("a", PolicyBinding::Anonymous).unwrap();
        assert!(matches!(
            builder.group("a", PolicyBinding::Anonymous).err().unwrap(),
            PipelineError::DuplicateRouteGroup { .. }
        ));

        builder.route("a", Method::GET, "/x/{id}", ok_handler()).unwrap();
        assert!(matches!(
            builder
                .route("a", Method::GET, "/x/{other}", ok_handler())
                .err()
                .unwrap(),
            PipelineError::DuplicateRoute { .. }
        ));
    }

    #[test]
    fn test_unknown_policy_binding_rejected_at_build() {
        let mut builder = RouteTable::builder();
        builder
            .group("owners", PolicyBinding::policy("OnlyOwners"))
            .unwrap();
        let err = builder.build(&evaluator()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::UnknownPolicy {
                group: "owners".into(),
                policy: "OnlyOwners".into()
            }
        );
    }

    #[test]
    fn test_route_without_group_binding_is_not_served() {
        let mut table = table();
        table.groups.remove("public");

        let err = table.resolve(&Method::GET, "/status").unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(table.resolve(&Method::GET, "/users").is_ok());
    }

    #[test]
    fn test_invalid_patterns() {
        let mut builder = RouteTable::builder();
        builder.group("a", PolicyBinding::Anonymous).unwrap();
        for pattern in ["users", "/users/{}", "/users/id{x}"] {
            assert!(
                matches!(
                    builder.route("a", Method::GET, pattern, ok_handler()).err(),
                    Some(PipelineError::InvalidPattern { .. })
                ),
                "{pattern}"
            );
        }
    }

    #[tokio::test]
    async fn test_handler_receives_params() {
        let handler = FnHandler::new(|input: HandlerRequest| async move {
            let id = input.params.get("id").cloned().unwrap_or_default();
            Ok(Response::with_body(StatusCode::OK, "text/plain", id))
        });
        let input = HandlerRequest {
            request: http::Request::new(http_body_util::Full::new(bytes::Bytes::new())),
            params: HashMap::from([("id".to_string(), "7".to_string())]),
            identity: CallerIdentity::Anonymous,
            request_id: RequestId::new(),
        };
        let response = handler.call(input).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
