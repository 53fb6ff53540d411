//! The gateway composition root.
//!
//! [`GatewayBuilder::build`] turns a validated [`PorticoConfig`] plus the
//! domain handlers into an immutable [`Gateway`]:
//!
//! 1. registers every policy
//! 2. registers every probe
//! 3. declares route groups (configured ones plus the anonymous
//!    `operations` group) and checks every binding against the policies
//! 4. assembles the stage chain in the mandated order
//!
//! Any error along the way is a [`StartupError`] and the gateway is never
//! served.

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use portico_authz::{PolicyEvaluator, PolicyRegistry};
use portico_config::{PorticoConfig, ProbeConfig, ProbeKind};
use portico_core::Claims;
use portico_health::{HealthAggregator, HealthReport, ProbeRegistration, TcpProbe};
use portico_middleware::routing::{Handler, PolicyBinding, RouteTable};
use portico_middleware::stages::{
    AuthenticationStage, AuthorizationStage, CredentialValidator, ErrorInterceptionStage,
    HttpsRedirectStage, RequestIdStage, RoutingStage, StaticTokenValidator,
};
use portico_middleware::{BoxedStage, Request, RequestContext, Response, StageChain};
use tracing::info;

use crate::error::StartupError;
use crate::operations::{HealthEndpoint, MetricsEndpoint, HEALTH_PATH, METRICS_PATH, OPERATIONS_GROUP};

struct RouteSpec {
    group: String,
    method: Method,
    pattern: String,
    handler: Arc<dyn Handler>,
}

/// Collects handlers, probes and collaborators before assembly.
pub struct GatewayBuilder {
    config: PorticoConfig,
    validator: Option<Arc<dyn CredentialValidator>>,
    routes: Vec<RouteSpec>,
    probes: Vec<ProbeRegistration>,
    custom_stages: Vec<BoxedStage>,
}

impl GatewayBuilder {
    /// Replaces the token table from configuration with `validator`.
    #[must_use]
    pub fn credential_validator(mut self, validator: impl CredentialValidator) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Adds a domain route to a configured route group.
    #[must_use]
    pub fn route(
        mut self,
        group: impl Into<String>,
        method: Method,
        pattern: impl Into<String>,
        handler: impl Handler,
    ) -> Self {
        self.routes.push(RouteSpec {
            group: group.into(),
            method,
            pattern: pattern.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Adds a probe on top of the configured ones.
    #[must_use]
    pub fn probe(mut self, registration: ProbeRegistration) -> Self {
        self.probes.push(registration);
        self
    }

    /// Adds a custom stage, run after authentication and before the
    /// authorization gate.
    #[must_use]
    pub fn stage(mut self, stage: BoxedStage) -> Self {
        self.custom_stages.push(stage);
        self
    }

    /// Assembles the gateway.
    pub fn build(self) -> Result<Gateway, StartupError> {
        let config = self.config;
        config.validate()?;

        let evaluator = build_policies(&config)?;
        let health = build_health(&config, self.probes)?;

        let mut table = RouteTable::builder();
        for group in &config.routes.groups {
            let binding = match &group.policy {
                Some(policy) => PolicyBinding::policy(policy.clone()),
                None => PolicyBinding::Anonymous,
            };
            table.group(group.name.clone(), binding)?;
        }
        table
            .group(OPERATIONS_GROUP, PolicyBinding::Anonymous)?
            .route(OPERATIONS_GROUP, Method::GET, HEALTH_PATH, HealthEndpoint::new(health.clone()))?;
        if config.telemetry.metrics.enabled {
            table.route(OPERATIONS_GROUP, Method::GET, METRICS_PATH, MetricsEndpoint)?;
        }
        for spec in self.routes {
            table.route_arc(&spec.group, spec.method, &spec.pattern, spec.handler)?;
        }
        let routes = Arc::new(table.build(&evaluator)?);

        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(static_validator(&config)));

        let mut stages: Vec<BoxedStage> = vec![
            Arc::new(
                ErrorInterceptionStage::new()
                    .expose_internal_errors(config.server.expose_internal_errors),
            ),
            Arc::new(RequestIdStage::new()),
        ];
        if config.server.enforce_https {
            let mut redirect = HttpsRedirectStage::new();
            if let Some(port) = config.server.https_port {
                redirect = redirect.with_https_port(port);
            }
            stages.push(Arc::new(redirect));
        }
        stages.push(Arc::new(AuthenticationStage::from_arc(validator)));
        stages.extend(self.custom_stages);
        stages.push(Arc::new(AuthorizationStage::new(
            Arc::clone(&routes),
            evaluator.clone(),
        )));
        stages.push(Arc::new(RoutingStage::new(Arc::clone(&routes))));
        let chain = StageChain::build(stages)?;

        info!(
            policies = evaluator.len(),
            probes = health.probes().len(),
            routes = routes.route_count(),
            stages = chain.len(),
            "gateway assembled"
        );

        Ok(Gateway {
            config: Arc::new(config),
            chain,
            evaluator,
            health,
            routes,
        })
    }
}

impl std::fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("routes", &self.routes.len())
            .field("probes", &self.probes.len())
            .field("custom_stages", &self.custom_stages.len())
            .finish_non_exhaustive()
    }
}

fn build_policies(config: &PorticoConfig) -> Result<PolicyEvaluator, StartupError> {
    let mut registry = PolicyRegistry::new();
    for policy in &config.authorization.policies {
        registry.register(policy.name.clone(), policy.required_roles.iter().cloned())?;
    }
    Ok(registry.build())
}

fn build_health(
    config: &PorticoConfig,
    extra: Vec<ProbeRegistration>,
) -> Result<HealthAggregator, StartupError> {
    let mut builder = HealthAggregator::builder();
    builder.timeout(config.health_timeout())?;
    for probe in &config.health.probes {
        builder.register(configured_probe(probe))?;
    }
    for registration in extra {
        builder.register(registration)?;
    }
    Ok(builder.build())
}

fn configured_probe(probe: &ProbeConfig) -> ProbeRegistration {
    let registration = match probe.kind {
        ProbeKind::Tcp => {
            let mut tcp = TcpProbe::new(probe.target.clone());
            if let Some(ms) = probe.slow_threshold_ms {
                tcp = tcp.with_slow_threshold(Duration::from_millis(ms));
            }
            ProbeRegistration::new(probe.name.clone(), tcp)
        }
    };
    registration
        .with_target(probe.target.clone())
        .with_failure_status(probe.failure_status)
        .with_tags(probe.tags.iter().cloned())
}

fn static_validator(config: &PorticoConfig) -> StaticTokenValidator {
    config
        .authentication
        .tokens
        .iter()
        .fold(StaticTokenValidator::new(), |validator, token| {
            let mut claims = Claims::new(token.subject.clone()).with_roles(token.roles.iter().cloned());
            if let Some(name) = &token.name {
                claims = claims.with_name(name.clone());
            }
            validator.with_token(token.token.clone(), claims)
        })
}

/// The assembled, immutable gateway.
///
/// Cheap to clone; every clone shares the same chain, policies and probes.
#[derive(Debug, Clone)]
pub struct Gateway {
    config: Arc<PorticoConfig>,
    chain: StageChain,
    evaluator: PolicyEvaluator,
    health: HealthAggregator,
    routes: Arc<RouteTable>,
}

impl Gateway {
    /// Starts assembling a gateway from `config`.
    #[must_use]
    pub fn builder(config: PorticoConfig) -> GatewayBuilder {
        GatewayBuilder {
            config,
            validator: None,
            routes: Vec::new(),
            probes: Vec::new(),
            custom_stages: Vec::new(),
        }
    }

    /// Handles one request with a fresh context.
    pub async fn handle(&self, request: Request) -> Response {
        self.chain.handle(request).await
    }

    /// Handles one request with a caller-supplied context.
    pub async fn process(&self, ctx: &mut RequestContext, request: Request) -> Response {
        self.chain.process(ctx, request).await
    }

    /// Runs every probe.
    pub async fn check_health(&self) -> HealthReport {
        self.health.run().await
    }

    /// The configuration the gateway was built from.
    #[must_use]
    pub fn config(&self) -> &PorticoConfig {
        &self.config
    }

    /// The stage chain.
    #[must_use]
    pub const fn chain(&self) -> &StageChain {
        &self.chain
    }

    /// The registered policies.
    #[must_use]
    pub const fn policies(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    /// The probe set.
    #[must_use]
    pub const fn health(&self) -> &HealthAggregator {
        &self.health
    }

    /// The route table.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}
