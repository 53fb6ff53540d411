//! Authentication stage.
//!
//! Resolves the caller from an `Authorization: Bearer <token>` header:
//!
//! - no header: the caller is anonymous and the request continues; route
//!   groups bound to a policy reject it later at the authorization gate
//! - a bearer token the [`CredentialValidator`] accepts: the caller is
//!   authenticated with the returned claims
//! - any other header value: the request is rejected with
//!   `INVALID_CREDENTIALS`
//!
//! Token issuance and verification live behind [`CredentialValidator`];
//! [`StaticTokenValidator`] maps configured opaque tokens to claims.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::AUTHORIZATION;
use portico_core::{BoxFuture, CallerIdentity, Claims, GatewayError};
use tracing::debug;

use crate::context::{RequestContext, RequestState};
use crate::stage::{Next, Stage, StageKind};
use crate::types::{Request, StageResult};

/// Validates opaque bearer credentials.
pub trait CredentialValidator: Send + Sync + 'static {
    /// Returns the caller's claims, or `None` if the token is not valid.
    fn validate<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Option<Claims>, GatewayError>>;
}

/// Validator backed by a fixed token → claims table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, Claims>,
}

impl StaticTokenValidator {
    /// Creates an empty validator that rejects every token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token` as `claims`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, claims: Claims) -> Self {
        self.tokens.insert(token.into(), claims);
        self
    }

    /// Number of known tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl CredentialValidator for StaticTokenValidator {
    fn validate<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Option<Claims>, GatewayError>> {
        let claims = self.tokens.get(token).cloned();
        Box::pin(async move { Ok(claims) })
    }
}

/// Resolves the caller identity.
#[derive(Clone)]
pub struct AuthenticationStage {
    validator: Arc<dyn CredentialValidator>,
}

impl AuthenticationStage {
    /// Creates the stage with `validator`.
    pub fn new(validator: impl CredentialValidator) -> Self {
        Self::from_arc(Arc::new(validator))
    }

    /// Creates the stage with a shared validator.
    #[must_use]
    pub fn from_arc(validator: Arc<dyn CredentialValidator>) -> Self {
        Self { validator }
    }

    fn bearer_token(request: &Request) -> Result<Option<&str>, GatewayError> {
        let Some(header) = request.headers().get(AUTHORIZATION) else {
            return Ok(None);
        };
        let value = header
            .to_str()
            .map_err(|_| GatewayError::invalid_credentials("authorization header is not valid text"))?;

        let (scheme, token) = value
            .split_once(' ')
            .ok_or_else(|| GatewayError::invalid_credentials("malformed authorization header"))?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(GatewayError::invalid_credentials(format!(
                "unsupported authorization scheme '{scheme}'"
            )));
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(GatewayError::invalid_credentials("empty bearer token"));
        }
        Ok(Some(token))
    }
}

impl std::fmt::Debug for AuthenticationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationStage").finish_non_exhaustive()
    }
}

impl Stage for AuthenticationStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn kind(&self) -> StageKind {
        StageKind::Authentication
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            ctx.transition(RequestState::Authenticating);

            let identity = match Self::bearer_token(&request)? {
                None => CallerIdentity::Anonymous,
                Some(token) => match self.validator.validate(token).await? {
                    Some(claims) => CallerIdentity::Authenticated(claims),
                    None => return Err(GatewayError::invalid_credentials("bearer token was not accepted")),
                },
            };

            debug!(
                request_id = %ctx.request_id(),
                caller = %identity.log_id(),
                "caller resolved"
            );
            ctx.set_identity(identity);
            next.run(ctx, request).await
        })
    }
}
