//! # Portico
//!
//! **API gateway core**
//!
//! Portico runs every request through a fixed chain of stages before it
//! reaches a domain handler:
//!
//! ```text
//! Request → ErrorInterception → RequestId → [HttpsRedirect] → Authentication
//!         → [custom stages] → Authorization → Routing → Handler
//! ```
//!
//! - Role-based policies guard whole route groups; a request is admitted
//!   when the caller holds any of the policy's roles
//! - Dependency probes run concurrently under a shared deadline and fold
//!   into one health report served on `GET /health`
//! - Every failure leaves the gateway as a uniform JSON error envelope
//!
//! ## Quick Start
//!
//! ```no_run
//! use portico::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_file("portico.toml")?.load()?;
//!     portico::telemetry::init_telemetry(&config.telemetry_config())?;
//!
//!     let gateway = Gateway::builder(config)
//!         .route("users", Method::GET, "/users/{id}", FnHandler::new(|input: HandlerRequest| async move {
//!             let id = input.params.get("id").cloned().unwrap_or_default();
//!             Ok(Response::with_body(StatusCode::OK, "text/plain", id))
//!         }))
//!         .build()?;
//!
//!     Server::new(gateway).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/portico/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use portico_core as core;

// Re-export policy types
pub use portico_authz as authz;

// Re-export health types
pub use portico_health as health;

// Re-export pipeline types
pub use portico_middleware as middleware;

// Re-export configuration types
pub use portico_config as config;

// Re-export telemetry setup
pub use portico_telemetry as telemetry;

// Re-export the gateway and server
pub use portico_server as server;

/// The crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
///
/// ```
/// use portico::prelude::*;
/// ```
pub mod prelude {
    pub use portico_authz::{Policy, PolicyEvaluator, PolicyRegistry};
    pub use portico_config::{ConfigLoader, PorticoConfig};
    pub use portico_core::{CallerIdentity, Claims, GatewayError, RequestId};
    pub use portico_health::{
        FnProbe, HealthAggregator, HealthReport, HealthStatus, ProbeOutcome, ProbeRegistration,
        TcpProbe,
    };
    pub use portico_middleware::routing::{FnHandler, Handler, HandlerRequest, PolicyBinding};
    pub use portico_middleware::stages::{CredentialValidator, StaticTokenValidator};
    pub use portico_middleware::{
        BoxedStage, Next, Request, RequestContext, Response, ResponseExt, Stage, StageKind,
        StageResult,
    };
    pub use portico_server::{Gateway, Server, ShutdownSignal, StartupError};

    pub use http::{Method, StatusCode};
}
