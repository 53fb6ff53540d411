//! Built-in stages.
//!
//! The four core stages every chain must contain, in this order:
//!
//! 1. [`error_interception`] - turns failures and panics into envelopes
//! 2. [`authentication`] - resolves the caller identity
//! 3. [`authorization`] - enforces the route group's policy binding
//! 4. [`routing`] - dispatches to the matched handler
//!
//! And optional custom stages that sit between them:
//!
//! - [`request_id`] - adopts or echoes `x-request-id`
//! - [`https_redirect`] - redirects plain HTTP to HTTPS

pub mod authentication;
pub mod authorization;
pub mod error_interception;
pub mod https_redirect;
pub mod request_id;
pub mod routing;

pub use authentication::{AuthenticationStage, CredentialValidator, StaticTokenValidator};
pub use authorization::AuthorizationStage;
pub use error_interception::ErrorInterceptionStage;
pub use https_redirect::HttpsRedirectStage;
pub use request_id::{RequestIdStage, REQUEST_ID_HEADER};
pub use routing::RoutingStage;
