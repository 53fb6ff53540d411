//! # Portico Core
//!
//! Foundational types shared by every Portico crate:
//!
//! - [`RequestId`] - UUID v7 request identifier
//! - [`CallerIdentity`] / [`Claims`] - the caller as seen by the authorization gate
//! - [`GatewayError`] - request-time failure taxonomy
//! - [`ErrorEnvelope`] - the uniform JSON error body
//! - [`BoxFuture`] - boxed, sendable future used at every async trait seam

#![doc(html_root_url = "https://docs.rs/portico-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod identity;
mod request_id;

pub use error::{ErrorCategory, ErrorEnvelope, ErrorBody, GatewayError, GatewayResult};
pub use identity::{CallerIdentity, Claims};
pub use request_id::RequestId;

use std::future::Future;
use std::pin::Pin;

/// A boxed future that is `Send` and borrows for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
