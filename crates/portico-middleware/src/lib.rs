//! # Portico Middleware
//!
//! The ordered stage chain every gateway request flows through.
//!
//! ```text
//! Request → ErrorInterception → [custom] → Authentication → [custom]
//!         → Authorization → [custom] → Routing → Handler
//! ```
//!
//! A [`StageChain`] is validated once at startup: the four core stages must
//! each appear exactly once, error interception must be outermost, and
//! nothing may follow routing. A chain that fails these checks is never
//! served.
//!
//! Each stage receives the [`RequestContext`] and a [`Next`] continuation.
//! Calling `next.run(..)` passes control on; returning without calling it
//! short-circuits, and no later stage (in particular no handler) runs.
//!
//! ```
//! use std::sync::Arc;
//! use portico_authz::PolicyRegistry;
//! use portico_middleware::routing::{FnHandler, PolicyBinding, RouteTable};
//! use portico_middleware::stages::{
//!     AuthenticationStage, AuthorizationStage, ErrorInterceptionStage, RoutingStage,
//!     StaticTokenValidator,
//! };
//! use portico_middleware::{BoxedStage, Response, ResponseExt, StageChain};
//! use http::{Method, StatusCode};
//!
//! let evaluator = PolicyRegistry::new().build();
//! let mut routes = RouteTable::builder();
//! routes
//!     .group("public", PolicyBinding::Anonymous).unwrap()
//!     .route("public", Method::GET, "/ping", FnHandler::new(|_| async {
//!         Ok(Response::with_body(StatusCode::OK, "text/plain", "pong"))
//!     })).unwrap();
//! let routes = Arc::new(routes.build(&evaluator).unwrap());
//!
//! let stages: Vec<BoxedStage> = vec![
//!     Arc::new(ErrorInterceptionStage::new()),
//!     Arc::new(AuthenticationStage::new(StaticTokenValidator::new())),
//!     Arc::new(AuthorizationStage::new(Arc::clone(&routes), evaluator)),
//!     Arc::new(RoutingStage::new(routes)),
//! ];
//! let chain = StageChain::build(stages).unwrap();
//! assert_eq!(chain.stage_names(), ["error-interception", "authentication", "authorization", "routing"]);
//! ```

#![doc(html_root_url = "https://docs.rs/portico-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod context;
pub mod error;
pub mod routing;
pub mod stage;
pub mod stages;
pub mod types;

pub use chain::StageChain;
pub use context::{RequestContext, RequestState};
pub use error::PipelineError;
pub use stage::{BoxedStage, Next, Stage, StageKind};
pub use types::{Request, Response, ResponseExt, StageResult};
