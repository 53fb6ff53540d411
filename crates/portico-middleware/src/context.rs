//! Per-request context and lifecycle state.
//!
//! A [`RequestContext`] is created for every request and threaded by
//! mutable reference through each stage. Stages record what they learn
//! (request id, caller identity, matched route) and advance the
//! [`RequestState`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use portico_core::{CallerIdentity, RequestId};
use tracing::{debug, warn};

use crate::routing::RouteMatch;

/// Lifecycle of a request.
///
/// ```text
/// Received → Authenticating → Authorizing → Routed → Handled
///      \___________\______________\___________\____→ Rejected | Errored
/// ```
///
/// `Handled`, `Rejected` and `Errored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Accepted by the server, no stage has run yet.
    Received,
    /// The authentication stage is resolving the caller.
    Authenticating,
    /// The authorization gate is evaluating the route's policy.
    Authorizing,
    /// A route matched and its handler is running.
    Routed,
    /// A handler produced the response.
    Handled,
    /// Refused for a caller-attributable reason (4xx, redirect).
    Rejected,
    /// Failed on the gateway side (5xx).
    Errored,
}

impl RequestState {
    /// Returns `true` for terminal states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Handled | Self::Rejected | Self::Errored)
    }

    /// Returns `true` if `self → next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Handled | Self::Rejected | Self::Errored, _) => false,
            (_, Self::Rejected | Self::Errored) => true,
            (Self::Received, Self::Authenticating)
            | (Self::Authenticating, Self::Authorizing)
            | (Self::Authorizing, Self::Routed)
            | (Self::Routed, Self::Handled) => true,
            _ => false,
        }
    }

    /// Lowercase name for logs and labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Authenticating => "authenticating",
            Self::Authorizing => "authorizing",
            Self::Routed => "routed",
            Self::Handled => "handled",
            Self::Rejected => "rejected",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context that flows through the stage chain.
#[derive(Debug)]
pub struct RequestContext {
    request_id: RequestId,
    identity: CallerIdentity,
    state: RequestState,
    route: Option<RouteMatch>,
    current_stage: Option<&'static str>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            identity: CallerIdentity::Anonymous,
            state: RequestState::Received,
            route: None,
            current_stage: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Replaces the request ID (propagated from an upstream hop).
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the caller identity.
    #[must_use]
    pub const fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// Sets the caller identity.
    pub fn set_identity(&mut self, identity: CallerIdentity) {
        self.identity = identity;
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RequestState {
        self.state
    }

    /// Moves to `next`, logging the transition.
    ///
    /// Illegal transitions are logged and ignored; returns whether the
    /// state changed.
    pub fn transition(&mut self, next: RequestState) -> bool {
        if !self.state.can_transition_to(next) {
            if self.state != next {
                warn!(
                    request_id = %self.request_id,
                    from = %self.state,
                    to = %next,
                    "ignored illegal request state transition"
                );
            }
            return false;
        }

        debug!(
            request_id = %self.request_id,
            from = %self.state,
            to = %next,
            stage = self.current_stage.unwrap_or("-"),
            "request state transition"
        );
        self.state = next;
        true
    }

    /// The route matched for this request, once resolved.
    #[must_use]
    pub const fn route(&self) -> Option<&RouteMatch> {
        self.route.as_ref()
    }

    /// Records the matched route.
    pub fn set_route(&mut self, route: RouteMatch) {
        self.route = Some(route);
    }

    /// Name of the innermost stage entered so far.
    #[must_use]
    pub const fn current_stage(&self) -> Option<&'static str> {
        self.current_stage
    }

    pub(crate) fn enter_stage(&mut self, stage: &'static str) {
        self.current_stage = Some(stage);
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension, replacing any previous value of that type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a typed extension.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_defaults() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.state(), RequestState::Received);
        assert_eq!(ctx.identity(), &CallerIdentity::Anonymous);
        assert!(ctx.route().is_none());
        assert!(ctx.current_stage().is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut ctx = RequestContext::new();
        for next in [
            RequestState::Authenticating,
            RequestState::Authorizing,
            RequestState::Routed,
            RequestState::Handled,
        ] {
            assert!(ctx.transition(next), "{next}");
        }
        assert!(ctx.state().is_terminal());
    }

    #[test]
    fn test_reject_from_any_non_terminal_state() {
        for from in [
            RequestState::Received,
            RequestState::Authenticating,
            RequestState::Authorizing,
            RequestState::Routed,
        ] {
            assert!(from.can_transition_to(RequestState::Rejected));
            assert!(from.can_transition_to(RequestState::Errored));
        }
    }

    #[test]
    fn test_illegal_transitions_are_ignored() {
        let mut ctx = RequestContext::new();
        assert!(!ctx.transition(RequestState::Routed));
        assert_eq!(ctx.state(), RequestState::Received);

        ctx.transition(RequestState::Rejected);
        assert!(!ctx.transition(RequestState::Errored));
        assert!(!ctx.transition(RequestState::Handled));
        assert_eq!(ctx.state(), RequestState::Rejected);
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = RequestContext::new();
        assert!(ctx.get_extension::<Tenant>().is_none());
        ctx.set_extension(Tenant("acme"));
        assert_eq!(ctx.get_extension::<Tenant>(), Some(&Tenant("acme")));
    }
}
