//! # Portico Health
//!
//! Runs a set of independent dependency probes concurrently under one
//! timeout budget and folds their results into a single [`HealthReport`].
//!
//! - [`Probe`] - one check against one dependency
//! - [`ProbeRegistration`] - a probe plus its name, target, failure status and tags
//! - [`HealthAggregator`] - the frozen probe set; [`HealthAggregator::run`] never fails
//! - [`TcpProbe`] / [`FnProbe`] - built-in probes
//!
//! ```
//! use portico_health::{FnProbe, HealthAggregator, HealthStatus, ProbeOutcome, ProbeRegistration};
//!
//! # tokio_test_block_on(async {
//! let mut builder = HealthAggregator::builder();
//! builder
//!     .register(ProbeRegistration::new(
//!         "self",
//!         FnProbe::new(|| async { Ok(ProbeOutcome::healthy()) }),
//!     ))
//!     .unwrap();
//! let report = builder.build().run().await;
//! assert_eq!(report.status, HealthStatus::Healthy);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/portico-health/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod aggregator;
mod error;
mod probe;
mod registration;
mod report;
mod status;

pub use aggregator::{HealthAggregator, HealthAggregatorBuilder, DEFAULT_TIMEOUT};
pub use error::{HealthError, HealthResult};
pub use probe::{FnProbe, Probe, ProbeError, ProbeOutcome, TcpProbe};
pub use registration::ProbeRegistration;
pub use report::{HealthEntry, HealthReport};
pub use status::HealthStatus;
