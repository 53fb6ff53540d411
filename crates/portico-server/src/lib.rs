//! # Portico Server
//!
//! The composition root and HTTP front end of the gateway.
//!
//! - [`Gateway`] - assembles policies, probes, route groups and the stage
//!   chain from a [`PorticoConfig`](portico_config::PorticoConfig); any
//!   [`StartupError`] is fatal
//! - [`Server`] - hyper/Tokio server feeding every request through the
//!   gateway, with per-request timeouts and graceful draining
//! - [`operations`] - the built-in anonymous `/health` and `/metrics`
//!   endpoints
//!
//! ```no_run
//! use http::{Method, StatusCode};
//! use portico_config::ConfigLoader;
//! use portico_middleware::routing::{FnHandler, HandlerRequest};
//! use portico_middleware::{Response, ResponseExt};
//! use portico_server::{Gateway, Server};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().with_env_prefix("PORTICO").load()?;
//! let gateway = Gateway::builder(config)
//!     .route("users", Method::GET, "/users/{id}", FnHandler::new(|input: HandlerRequest| async move {
//!         Ok(Response::with_body(StatusCode::OK, "text/plain", input.params["id"].clone()))
//!     }))
//!     .build()?;
//! Server::new(gateway).run().await?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/portico-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod gateway;
pub mod operations;
mod server;
pub mod shutdown;

pub use error::{ServerError, StartupError};
pub use gateway::{Gateway, GatewayBuilder};
pub use server::Server;
pub use shutdown::{ConnectionTracker, ShutdownSignal};
